//! Step recorder sink: receives one record per executed node.

use crate::core::engine::context::ExecutionContext;
use crate::core::engine::result::ExecutionResult;
use crate::core::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub execution_id: String,
    pub workflow_id: String,
    pub node_id: String,
    pub node_type: String,
    pub recorded_at: DateTime<Utc>,
    pub result: ExecutionResult,
}

impl StepRecord {
    pub fn new(ctx: &ExecutionContext, node_type: &str, result: &ExecutionResult) -> Self {
        Self {
            execution_id: ctx.execution_id.clone(),
            workflow_id: ctx.workflow_id.clone(),
            node_id: ctx.node_id.clone(),
            node_type: node_type.to_string(),
            recorded_at: Utc::now(),
            result: result.clone(),
        }
    }
}

#[async_trait]
pub trait StepRecorder: Send + Sync {
    async fn record(&self, record: &StepRecord) -> Result<(), AppError>;
}

/// Appends records as JSON lines to a file, creating parent directories.
#[derive(Debug)]
pub struct JsonlStepRecorder {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlStepRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StepRecorder for JsonlStepRecorder {
    async fn record(&self, record: &StepRecord) -> Result<(), AppError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
