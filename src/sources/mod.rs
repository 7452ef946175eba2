pub mod landcover;
pub mod protected_sites;
pub mod waterbase;

use crate::spatial::ops::RefFeature;
use crate::utils::error::Result;
use std::path::Path;

/// Reference layers available for a screening run. Missing sample files are
/// simply absent layers, not errors; the corresponding screening step then
/// runs against an empty layer and leaves its derived columns null.
#[derive(Default)]
pub struct ReferenceData {
    pub protected_sites: Option<Vec<RefFeature>>,
    pub landcover: Option<Vec<RefFeature>>,
    pub water: Option<Vec<RefFeature>>,
}

pub fn load_reference_data(data_dir: &Path) -> Result<ReferenceData> {
    let mut refs = ReferenceData::default();

    let sites_path = data_dir.join(protected_sites::SAMPLE_FILE);
    if sites_path.exists() {
        let features = protected_sites::read_protected_sites(&sites_path)?;
        tracing::info!("🗺️ Loaded {} protected-site features", features.len());
        refs.protected_sites = Some(features);
    }

    let landcover_path = data_dir.join(landcover::SAMPLE_FILE);
    if landcover_path.exists() {
        let features = landcover::read_landcover(&landcover_path)?;
        tracing::info!("🗺️ Loaded {} land-cover features", features.len());
        refs.landcover = Some(features);
    }

    let water_path = data_dir.join(waterbase::SAMPLE_FILE);
    if water_path.exists() {
        let features = waterbase::read_waterbase_points_csv(&water_path)?;
        tracing::info!("🗺️ Loaded {} water points", features.len());
        refs.water = Some(features);
    }

    Ok(refs)
}
