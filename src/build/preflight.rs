use std::time::Duration;

use tracing::{info, warn};

use super::target::TargetSystem;
use crate::config::BuildSettings;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreflightReport {
    pub warnings: Vec<String>,
}

/// Gate in front of every build. A missing site path or a target that is
/// not running aborts the build. Missing CLI tooling and storage that is
/// still starting only produce warnings.
pub async fn preflight(target: &dyn TargetSystem, settings: &BuildSettings) -> Result<PreflightReport> {
    let root = target.root();
    if !tokio::fs::try_exists(root).await.unwrap_or(false) {
        return Err(Error::not_ready(format!("site path {} does not exist", root.display())));
    }
    if !target.is_running().await {
        return Err(Error::not_ready(format!("target at {} is not running", root.display())));
    }

    let mut report = PreflightReport::default();
    if !target.cli_available().await {
        let msg = format!("CLI tool `{}` not found on PATH", settings.cli_tool);
        warn!("{}", msg);
        report.warnings.push(msg);
    }
    if !wait_for_storage(target, settings.storage_wait(), settings.storage_poll()).await {
        let msg = format!(
            "storage not ready after {:.1}s, continuing",
            settings.storage_wait().as_secs_f64()
        );
        warn!("{}", msg);
        report.warnings.push(msg);
    }

    info!(warnings = report.warnings.len(), "preflight passed");
    Ok(report)
}

async fn wait_for_storage(target: &dyn TargetSystem, wait: Duration, poll: Duration) -> bool {
    let probe = async {
        loop {
            if target.storage_ready().await {
                return;
            }
            tokio::time::sleep(poll).await;
        }
    };
    tokio::time::timeout(wait, probe).await.is_ok()
}
