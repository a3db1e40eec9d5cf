//! Live harness entry point
//!
//! Runs the scenarios against the real target through Playwright. Skipped
//! unless `AUTHPROBE_LIVE=1`, so a plain `cargo test` needs neither network
//! nor Node.js.
//! Run with: AUTHPROBE_LIVE=1 cargo test --package authprobe-e2e --test live

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use authprobe_e2e::playwright::Browser;
use authprobe_e2e::report::TracingReporter;
use authprobe_e2e::{PlaywrightFactory, ProbeConfig, ProbeResult, ScenarioRunner, ScenarioSpec};

const LIVE_GATE: &str = "AUTHPROBE_LIVE";

#[derive(Parser, Debug)]
#[command(name = "authprobe-live")]
#[command(about = "Live authentication-flow run against the configured target")]
struct Args {
    /// Configuration file (defaults are used when it does not exist)
    #[arg(short, long, default_value = "authprobe.toml")]
    config: PathBuf,

    /// Directory of YAML scenarios; built-in scenarios when omitted
    #[arg(short, long)]
    scenarios: Option<PathBuf>,

    /// Run only scenarios with this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only the scenario with this name
    #[arg(short, long)]
    name: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    if std::env::var(LIVE_GATE).map(|v| v != "1").unwrap_or(true) {
        println!("live harness skipped: set {}=1 to run against the real target", LIVE_GATE);
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> ProbeResult<bool> {
    let mut config = ProbeConfig::load(&args.config)?;
    if let Some(browser) = args.browser {
        config.browser.kind = browser;
    }
    if args.headed {
        config.browser.headless = false;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }

    let specs = match &args.scenarios {
        Some(dir) => ScenarioSpec::load_all(dir)?,
        None => ScenarioSpec::builtin(),
    };
    let specs: Vec<ScenarioSpec> = specs
        .into_iter()
        .filter(|s| args.name.as_deref().map_or(true, |n| s.name == n))
        .filter(|s| args.tag.as_deref().map_or(true, |t| s.tags.iter().any(|x| x == t)))
        .collect();

    let factory = PlaywrightFactory::new(config.playwright());
    let runner = ScenarioRunner::new(config, factory)?;

    let suite = runner.run_all(&specs, &mut TracingReporter).await?;
    runner.write_results(&suite)?;

    Ok(suite.all_passed())
}
