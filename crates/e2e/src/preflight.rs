//! Reachability checks before any browser is launched

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::SiteConfig;
use crate::error::{ProbeError, ProbeResult};

/// HTTP status of one reachable resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reachability {
    pub url: String,
    pub status: u16,
}

/// Poll `url` until it answers with a non-server-error status or `timeout_duration` elapses
pub async fn wait_for_reachable(url: &str, timeout_duration: Duration) -> ProbeResult<Reachability> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let start = std::time::Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) if !resp.status().is_server_error() => {
                return Ok(Reachability {
                    url: url.to_string(),
                    status: resp.status().as_u16(),
                });
            }
            Ok(resp) => {
                warn!("{} returned {}", url, resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} ...", url);
                }
                if !e.is_connect() && !e.is_timeout() {
                    warn!("Reachability check error: {}", e);
                }
            }
        }

        if start.elapsed() >= timeout_duration {
            return Err(ProbeError::Timeout(format!(
                "{} unreachable after {} attempt(s)",
                url, attempts
            )));
        }
        sleep(Duration::from_millis(250)).await;
    }
}

/// Check both the landing and protected resources answer
pub async fn check_site(site: &SiteConfig, timeout_duration: Duration) -> ProbeResult<Vec<Reachability>> {
    let mut results = Vec::with_capacity(2);
    for url in [&site.landing_url, &site.protected_url] {
        results.push(wait_for_reachable(url, timeout_duration).await?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_times_out() {
        // Port 9 on loopback: connection refused immediately
        let result = wait_for_reachable("http://127.0.0.1:9/", Duration::from_millis(300)).await;
        assert!(matches!(result, Err(ProbeError::Timeout(_))));
    }
}
