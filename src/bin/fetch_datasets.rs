use clap::{Parser, Subcommand};
use geoscreen::sources::{landcover, protected_sites, waterbase};
use geoscreen::utils::{logger, validation};
use std::path::Path;

/// Downloads the reference datasets the screening steps read from `data_dir`.
#[derive(Debug, Parser)]
#[command(name = "fetch_datasets")]
#[command(about = "Download reference datasets for spatial screening")]
struct FetchConfig {
    /// Directory the datasets are placed under
    #[arg(long, default_value = "./data/eu")]
    data_dir: String,

    #[arg(long, help = "Enable verbose output")]
    verbose: bool,

    #[command(subcommand)]
    dataset: Dataset,
}

#[derive(Debug, Subcommand)]
enum Dataset {
    /// Protected-sites boundaries (GeoJSON)
    ProtectedSites {
        #[arg(long, default_value = protected_sites::DEFAULT_URL)]
        url: String,
    },
    /// Land-cover polygons (GeoJSON)
    Landcover {
        #[arg(long, default_value = landcover::DEFAULT_URL)]
        url: String,
    },
    /// Surface-water monitoring points (CSV)
    Waterbase {
        #[arg(long, default_value = waterbase::DEFAULT_URL)]
        url: String,
    },
    /// All of the above, from their default locations
    All,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FetchConfig::parse();
    logger::init_cli_logger(config.verbose);

    let client = reqwest::Client::new();
    let data_dir = Path::new(&config.data_dir);

    if let Dataset::ProtectedSites { url } | Dataset::Landcover { url } | Dataset::Waterbase { url } =
        &config.dataset
    {
        validation::validate_url("url", url)?;
    }

    match &config.dataset {
        Dataset::ProtectedSites { url } => {
            let path =
                protected_sites::download_protected_sites(&client, url, &data_dir.join(protected_sites::SAMPLE_FILE))
                    .await?;
            println!("✅ Protected sites saved to {}", path.display());
        }
        Dataset::Landcover { url } => {
            let path =
                landcover::download_landcover(&client, url, &data_dir.join(landcover::SAMPLE_FILE)).await?;
            println!("✅ Land cover saved to {}", path.display());
        }
        Dataset::Waterbase { url } => {
            let path =
                waterbase::download_waterbase(&client, url, &data_dir.join(waterbase::SAMPLE_FILE)).await?;
            println!("✅ Waterbase saved to {}", path.display());
        }
        Dataset::All => {
            let sites = protected_sites::download_protected_sites(
                &client,
                protected_sites::DEFAULT_URL,
                &data_dir.join(protected_sites::SAMPLE_FILE),
            )
            .await?;
            println!("✅ Protected sites saved to {}", sites.display());

            let clc = landcover::download_landcover(
                &client,
                landcover::DEFAULT_URL,
                &data_dir.join(landcover::SAMPLE_FILE),
            )
            .await?;
            println!("✅ Land cover saved to {}", clc.display());

            let water = waterbase::download_waterbase(
                &client,
                waterbase::DEFAULT_URL,
                &data_dir.join(waterbase::SAMPLE_FILE),
            )
            .await?;
            println!("✅ Waterbase saved to {}", water.display());
        }
    }

    Ok(())
}
