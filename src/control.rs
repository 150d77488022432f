//! Operator Process Control
//!
//! The panic button: shells out to a local script that flattens positions and
//! halts the agent. Entirely outside the store/feed boundary; the HTTP layer
//! gates it behind a static shared secret.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
pub struct PanicOutcome {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub struct PanicButton {
    script: PathBuf,
}

impl PanicButton {
    pub fn new(script: PathBuf) -> Self {
        Self { script }
    }

    pub async fn fire(&self) -> Result<PanicOutcome> {
        warn!("🛑 Panic button pressed - running {}", self.script.display());

        let output = Command::new("sh")
            .arg(&self.script)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.script.display()))?;

        let outcome = PanicOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if output.status.success() {
            info!("✅ Panic script completed");
        } else {
            warn!("⚠️  Panic script exited with {:?}", outcome.exit_code);
        }

        Ok(outcome)
    }
}
