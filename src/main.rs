//! steam-ppp - Compare Steam prices across regions in PPP-adjusted dollars.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use steam_ppp::commands::{
    ExportCommand, IndicatorsCommand, PipelineCommand, PricesCommand, TrainCommand,
};
use steam_ppp::config::{parse_region_list, Config, OutputFormat};
use steam_ppp::regions;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "steam-ppp",
    version,
    about = "Compare Steam game prices across regions, adjusted by purchasing power parity",
    long_about = "Fetches regional Steam storefront prices, converts them with World Bank PPP factors, \
                  exports CSV datasets for modelling and serves the comparison over HTTP."
)]
struct Cli {
    /// Regions to compare (comma-separated, e.g. us,pl,de)
    #[arg(short, long, global = true, env = "STEAM_PPP_REGIONS")]
    regions: Option<String>,

    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "STEAM_PPP_PROXY")]
    proxy: Option<String>,

    /// Minimum delay between requests to one upstream, in milliseconds
    #[arg(long, global = true, env = "STEAM_PPP_DELAY")]
    delay: Option<u64>,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare one game's PPP-adjusted price across regions
    #[command(alias = "p")]
    Prices {
        /// Steam app id
        app_id: u64,
    },

    /// Export raw regional prices to steam_prices_<app_id>.csv
    #[command(alias = "e")]
    Export {
        /// Steam app id
        app_id: u64,

        /// Ignore cached downloads
        #[arg(long)]
        force: bool,
    },

    /// Download World Bank indicators to worldbank_data.csv
    Indicators {
        /// Ignore cached downloads
        #[arg(long)]
        force: bool,
    },

    /// Join indicators with prices and fit a linear model
    Train {
        /// Steam app id
        app_id: u64,

        /// Game name used in the training file name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Download indicators, then export and train every configured game
    Pipeline {
        /// Ignore cached downloads
        #[arg(long)]
        force: bool,
    },

    /// Serve POST /api/get_prices
    Serve {
        /// Listen address
        #[arg(long)]
        host: Option<String>,

        /// Listen port
        #[arg(long)]
        port: Option<u16>,
    },

    /// List regions with known names
    Regions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(regions) = cli.regions.as_deref() {
        let regions = parse_region_list(regions)?;
        config.export_regions = regions.clone();
        config.regions = regions;
    }
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(delay) = cli.delay {
        config.delay_ms = delay;
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }

    match cli.command {
        Commands::Prices { app_id } => {
            let output = PricesCommand::new(config).execute(app_id).await?;
            println!("{}", output);
        }

        Commands::Export { app_id, force } => {
            let output = ExportCommand::new(config, force).execute(app_id).await?;
            println!("{}", output);
        }

        Commands::Indicators { force } => {
            let output = IndicatorsCommand::new(config, force).execute().await?;
            println!("{}", output);
        }

        Commands::Train { app_id, name } => {
            let output = TrainCommand::new(config).execute(app_id, name.as_deref())?;
            println!("{}", output);
        }

        Commands::Pipeline { force } => {
            let output = PipelineCommand::new(config, force).execute().await?;
            println!("{}", output);
        }

        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            steam_ppp::server::start_server(config).await?;
        }

        Commands::Regions => {
            let compared = regions::preset(regions::COMPARISON_REGIONS);
            let exported = regions::preset(regions::EXPORT_REGIONS);

            println!("Known regions:\n");
            println!("{:<6} {:<18} {:<8} {:<8}", "Code", "Country", "Compare", "Export");
            println!("{:-<6} {:-<18} {:-<8} {:-<8}", "", "", "", "");

            for region in regions::known() {
                println!(
                    "{:<6} {:<18} {:<8} {:<8}",
                    region.as_str(),
                    region.name().unwrap_or("-"),
                    if compared.contains(&region) { "yes" } else { "" },
                    if exported.contains(&region) { "yes" } else { "" },
                );
            }
        }
    }

    Ok(())
}
