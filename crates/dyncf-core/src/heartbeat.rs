// # Heartbeat File
//
// Durable liveness marker. The reconciler rewrites it at the end of every
// cycle; the container health probe (`dyncfd healthcheck`) reads it and
// fails when the timestamp is older than interval + grace.
//
// ```json
// {"last_check": "2024-05-01T12:00:00Z", "status": "running"}
// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::error::{Error, Result};
use crate::status::{HealthStatus, is_fresh};

/// Contents of the heartbeat file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub last_check: DateTime<Utc>,
    pub status: String,
}

impl Heartbeat {
    pub fn running(last_check: DateTime<Utc>) -> Self {
        Self {
            last_check,
            status: "running".to_string(),
        }
    }
}

/// Heartbeat file at a fixed path
#[derive(Debug, Clone)]
pub struct HeartbeatFile {
    path: PathBuf,
}

impl HeartbeatFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the heartbeat (temp file + rename)
    pub async fn write(&self, last_check: DateTime<Utc>) -> Result<()> {
        let json = serde_json::to_string(&Heartbeat::running(last_check))?;

        let mut temp = self.path.clone();
        temp.set_extension("tmp");

        fs::write(&temp, json.as_bytes()).await.map_err(|e| {
            Error::heartbeat(format!("Failed to write {}: {}", temp.display(), e))
        })?;
        fs::rename(&temp, &self.path).await.map_err(|e| {
            Error::heartbeat(format!("Failed to move heartbeat into {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }

    pub async fn read(&self) -> Result<Heartbeat> {
        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            Error::heartbeat(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::heartbeat(format!("Malformed heartbeat {}: {}", self.path.display(), e)))
    }

    /// Probe verdict: active only if the file is readable and fresh
    pub async fn check(&self, limit: Duration, now: DateTime<Utc>) -> HealthStatus {
        match self.read().await {
            Ok(heartbeat) if is_fresh(heartbeat.last_check, now, limit) => HealthStatus::Active,
            Ok(heartbeat) => {
                tracing::debug!("Heartbeat is stale: last check {}", heartbeat.last_check);
                HealthStatus::Unhealthy
            }
            Err(e) => {
                tracing::debug!("{}", e);
                HealthStatus::Unhealthy
            }
        }
    }
}
