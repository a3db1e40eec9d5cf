//! Check the environment before a run

use std::time::Duration;

use anyhow::Result;
use authprobe_e2e::playwright::check_playwright_installed;
use authprobe_e2e::preflight::check_site;
use authprobe_e2e::ProbeConfig;
use clap::Args;

use crate::output;

#[derive(Args, Debug)]
pub struct PreflightArgs {
    /// How long to keep retrying the target, in seconds
    #[arg(long, default_value = "10")]
    pub timeout_secs: u64,

    /// Skip the Node.js/Playwright check
    #[arg(long)]
    pub skip_browser: bool,
}

/// Returns whether every check passed
pub async fn execute(args: PreflightArgs, config: &ProbeConfig) -> Result<bool> {
    let mut ok = true;

    if let Err(e) = config.validate() {
        output::print_error(&format!("Configuration: {}", e));
        return Ok(false);
    }
    output::print_success("Configuration is valid");

    if args.skip_browser {
        output::print_info("Skipping Playwright check");
    } else {
        match check_playwright_installed(&config.browser.node_binary) {
            Ok(()) => output::print_success(&format!(
                "Playwright available via {}",
                config.browser.node_binary.display()
            )),
            Err(e) => {
                output::print_error(&e.to_string());
                ok = false;
            }
        }
    }

    match check_site(&config.site, Duration::from_secs(args.timeout_secs)).await {
        Ok(reached) => {
            for r in reached {
                output::print_success(&format!("{} answered {}", r.url, r.status));
            }
        }
        Err(e) => {
            output::print_error(&e.to_string());
            ok = false;
        }
    }

    Ok(ok)
}
