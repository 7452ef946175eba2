use crate::spatial::geometry::XY;
use std::collections::HashMap;

/// Uniform grid over projected points with an expanding-ring nearest query.
/// Stands in for an rtree; the reference layers are small enough that a grid
/// keeps the nearest-water scan close to O(1) per portfolio point.
pub struct GridIndex {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    points: Vec<XY>,
}

impl GridIndex {
    pub fn new(points: Vec<XY>, cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1000.0
        };
        let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            cells.entry(Self::cell_of(p, cell_size)).or_default().push(i);
        }
        Self {
            cell_size,
            cells,
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn cell_of(p: &XY, cell_size: f64) -> (i64, i64) {
        (
            (p.x / cell_size).floor() as i64,
            (p.y / cell_size).floor() as i64,
        )
    }

    /// Index and distance of the nearest point, or `None` for an empty index.
    pub fn nearest(&self, query: XY) -> Option<(usize, f64)> {
        if self.points.is_empty() {
            return None;
        }

        let (cx, cy) = Self::cell_of(&query, self.cell_size);
        let mut best: Option<(usize, f64)> = None;

        // Farthest populated cell bounds the expansion; cells are sparse, so an
        // empty ring says nothing about the rings beyond it.
        let max_ring = self
            .cells
            .keys()
            .map(|(x, y)| (x - cx).abs().max((y - cy).abs()))
            .max()
            .unwrap_or(0);

        for ring in 0..=max_ring {
            for dx in -ring..=ring {
                for dy in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue; // interior cells were scanned in earlier rings
                    }
                    if let Some(indices) = self.cells.get(&(cx + dx, cy + dy)) {
                        for &i in indices {
                            let d = query.distance(&self.points[i]);
                            if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                                best = Some((i, d));
                            }
                        }
                    }
                }
            }

            // A point past ring k sits at least (k * cell_size) away.
            if let Some((_, bd)) = best {
                if bd <= (ring as f64) * self.cell_size {
                    return best;
                }
            }
        }

        best
    }
}
