//! Smoke suite entry point
//!
//! Exit code 0 when nothing failed, 1 when a scenario failed, 2 when the run
//! could not start.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use webapp_smoke::config::Profile;
use webapp_smoke::{Scenario, SmokeResult, SuiteConfig, SuiteRunner};

#[derive(Parser, Debug)]
#[command(name = "webapp-smoke")]
#[command(about = "Browser and HTTP smoke tests for the PHP/MySQL status page")]
#[command(version)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, default_value = "smoke.yaml")]
    config: PathBuf,

    /// Tolerance profile (replaces the file's `profile`; its other keys still apply)
    #[arg(short, long, value_enum)]
    profile: Option<Profile>,

    /// Page under test (overrides APP_URL)
    #[arg(long)]
    app_url: Option<String>,

    /// Run only these scenarios, in declaration order
    #[arg(short, long = "scenario", value_parser = parse_scenario)]
    scenarios: Vec<Scenario>,

    /// List scenario names and exit
    #[arg(long)]
    list: bool,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if args.list {
        for scenario in Scenario::ALL {
            println!("{}", scenario);
        }
        return;
    }

    let code = match run(args).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            error!("{}", e);
            2
        }
    };
    std::process::exit(code);
}

fn parse_scenario(name: &str) -> Result<Scenario, String> {
    name.parse().map_err(|e: webapp_smoke::SmokeError| e.to_string())
}

async fn run(args: Args) -> SmokeResult<bool> {
    let mut config = SuiteConfig::load(&args.config, args.profile)?;
    config.apply_env();

    if let Some(url) = args.app_url {
        config.app_url = url;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    config.validate()?;

    let selected: Vec<Scenario> = if args.scenarios.is_empty() {
        Scenario::ALL.to_vec()
    } else {
        Scenario::ALL
            .iter()
            .copied()
            .filter(|s| args.scenarios.contains(s))
            .collect()
    };

    info!(
        "webapp-smoke v{} ({:?} profile)",
        env!("CARGO_PKG_VERSION"),
        config.profile
    );

    let runner = SuiteRunner::new(config);
    let results = runner.run(&selected).await?;
    runner.write_results(&results)?;

    Ok(results.success())
}
