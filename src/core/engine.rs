use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct ScreeningEngine<P: Pipeline> {
    pipeline: P,
    monitor: Option<SystemMonitor>,
}

impl<P: Pipeline> ScreeningEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            monitor: None,
        }
    }

    pub fn new_with_monitoring(pipeline: P, enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: enabled.then(|| SystemMonitor::new(true)),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting screening run");

        tracing::info!("📥 Extracting portfolio...");
        let portfolio = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} records", portfolio.len());
        if let Some(monitor) = &self.monitor {
            monitor.log_stats("extract");
        }

        tracing::info!("🔄 Screening portfolio...");
        let output = self.pipeline.transform(portfolio).await?;
        tracing::info!(
            "🔄 Screened {} records ({} located)",
            output.summary.total_records,
            output.summary.located_records
        );
        if let Some(monitor) = &self.monitor {
            monitor.log_stats("transform");
        }

        tracing::info!("💾 Writing output bundle...");
        let output_path = self.pipeline.load(output).await?;
        tracing::info!("💾 Output saved to: {}", output_path);
        if let Some(monitor) = &self.monitor {
            monitor.log_stats("load");
            monitor.log_final_stats();
        }

        Ok(output_path)
    }
}
