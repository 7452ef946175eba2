use crate::domain::model::{Coord, Portfolio, ReportMeta, ScreeningOutput, SpatialJoinConfig};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn portfolio_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn data_dir(&self) -> &str;
    fn rulepack_path(&self) -> &str;
    fn lat_column(&self) -> Option<&str>;
    fn lon_column(&self) -> Option<&str>;
    fn address_columns(&self) -> &[String];
    fn geocode_enabled(&self) -> bool;
    fn join_config(&self) -> SpatialJoinConfig;

    fn report_meta(&self) -> ReportMeta {
        ReportMeta::default()
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Portfolio>;
    async fn transform(&self, portfolio: Portfolio) -> Result<ScreeningOutput>;
    async fn load(&self, output: ScreeningOutput) -> Result<String>;
}

/// One upstream geocoding service. Implementations must return `Ok(None)` for
/// "no match" and reserve errors for transport-level failures.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn geocode(&self, query: &str) -> Result<Option<Coord>>;
}
