use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use listing_radar::config::{Config, ConfigOverrides};
use listing_radar::output::csv::{listings_to_csv, quotas_to_csv};
use listing_radar::output::json::render_json;
use listing_radar::output::table::{
    render_cycle_table, render_listings_table, render_quota_table,
};
use listing_radar::pipeline::{run_check, CheckContext, CycleError, CycleReport};
use listing_radar::router::SourceRouter;
use listing_radar::scheduler::run_schedule;
use listing_radar::server::run_server;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(name = "listing-radar", about = "Multi-source MLS listing monitor")]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long = "data-dir")]
    data_dir: Option<String>,
    #[arg(short, long)]
    zipcodes: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one check cycle now.
    Check,
    /// Run check cycles on a fixed interval.
    Watch {
        #[arg(long, default_value_t = 3600)]
        interval_secs: u64,
        #[arg(long, default_value_t = 1)]
        iterations: u32,
    },
    /// Run the HTTP server together with the configured schedule.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Show stored listings.
    Listings {
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show provider quota status.
    Quotas,
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        data_dir: cli.data_dir.clone(),
        zipcodes: cli
            .zipcodes
            .as_deref()
            .map(parse_zipcode_list)
            .transpose()?,
    });

    if let Commands::Config { init, show } = &cli.command {
        if *init {
            Config::write_template(&config_path)?;
            println!("Wrote config template to {}", config_path.display());
        }
        if *show || !*init {
            println!("{}", render_json(&config)?);
        }
        return Ok(());
    }

    let ctx = Arc::new(CheckContext::from_config(config)?);

    match &cli.command {
        Commands::Check => {
            let report = run_check(&ctx).await.map_err(|e| anyhow!(e.to_string()))?;
            print_report(&report, cli.output)?;
        }
        Commands::Watch {
            interval_secs,
            iterations,
        } => {
            let total = (*iterations).max(1);
            let interval = Duration::from_secs((*interval_secs).max(1));
            for i in 0..total {
                info!("watch iteration {}", i + 1);
                match run_check(&ctx).await {
                    Ok(report) => print_report(&report, cli.output)?,
                    Err(CycleError::Busy) => warn!("cycle already running, skipping iteration"),
                    Err(CycleError::Failed(err)) => error!("check cycle failed: {err:#}"),
                }
                if i + 1 < total {
                    tokio::time::sleep(interval).await;
                }
            }
        }
        Commands::Serve { host, port } => {
            let bind = format!("{host}:{port}");
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            let _scheduler = tokio::spawn(run_schedule(ctx.clone()));
            run_server(ctx, addr).await?;
        }
        Commands::Listings { limit, offset } => {
            let stored = ctx.store.load_listings()?;
            let mut listings: Vec<_> = stored.into_values().collect();
            listings.sort_by(|a, b| b.first_seen.cmp(&a.first_seen).then(a.id.cmp(&b.id)));
            let page: Vec<_> = listings.into_iter().skip(*offset).take((*limit).max(1)).collect();
            match cli.output {
                OutputFormat::Table => println!("{}", render_listings_table(&page)),
                OutputFormat::Json => println!("{}", render_json(&page)?),
                OutputFormat::Csv => println!("{}", listings_to_csv(&page)?),
            }
        }
        Commands::Quotas => {
            let router = SourceRouter::new(&ctx.registry, &ctx.store, &ctx.config.providers);
            let status = router.quota_status();
            match cli.output {
                OutputFormat::Table => println!("{}", render_quota_table(&status)),
                OutputFormat::Json => println!("{}", render_json(&status)?),
                OutputFormat::Csv => println!("{}", quotas_to_csv(&status)?),
            }
        }
        Commands::Config { .. } => unreachable!("config command handled before dispatch"),
    }

    Ok(())
}

fn print_report(report: &CycleReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_cycle_table(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => {
            warn!("CSV output for cycle reports not implemented, using JSON");
            println!("{}", render_json(report)?);
        }
    }
    Ok(())
}

fn parse_zipcode_list(raw: &str) -> Result<Vec<String>> {
    let zipcodes: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|z| !z.is_empty())
        .map(str::to_string)
        .collect();
    if zipcodes.is_empty() {
        return Err(anyhow!("zipcode list is empty"));
    }
    Ok(zipcodes)
}
