//! Batch execution through the external `parallel` utility

use crate::{JobBatch, ReplayError, ReplayResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Executes replay batches. Seam for tests and alternative launchers.
#[async_trait]
pub trait BatchExecutor: Send + Sync {
    /// Run every command of the batch, then its followup
    async fn run(&self, batch: &JobBatch) -> ReplayResult<()>;

    /// Forcibly terminate any running replay processes
    async fn kill(&self, analyzer: &str) -> ReplayResult<()>;
}

/// Fans a [`JobBatch`] out via `parallel`, reading the command list from
/// a temporary file on stdin. All job concurrency, ordering and process
/// management is `parallel`'s business.
pub struct ParallelExecutor {
    work_dir: PathBuf,
    parallel_bin: String,
}

impl ParallelExecutor {
    /// Create an executor running jobs in `work_dir` (the analyzer's
    /// expected working directory, passed explicitly rather than inherited
    /// from the shell).
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            parallel_bin: "parallel".to_string(),
        }
    }

    /// Override the `parallel` executable (used by tests)
    pub fn parallel_bin(mut self, bin: impl Into<String>) -> Self {
        self.parallel_bin = bin.into();
        self
    }
}

#[async_trait]
impl BatchExecutor for ParallelExecutor {
    async fn run(&self, batch: &JobBatch) -> ReplayResult<()> {
        if batch.is_empty() {
            return Err(ReplayError::EmptyBatch(batch.name.to_string()));
        }

        let list = tempfile::NamedTempFile::new()?;
        std::fs::write(list.path(), batch.list_text())?;

        info!(
            batch = batch.name,
            jobs = batch.len(),
            workers = ?batch.workers,
            niceness = batch.niceness,
            "starting replay batch"
        );
        for command in &batch.commands {
            debug!(batch = batch.name, "{}", command);
        }

        let mut cmd = Command::new(&self.parallel_bin);
        cmd.arg("--nice").arg(batch.niceness.to_string());
        if let Some(workers) = batch.workers {
            cmd.arg("-P").arg(workers.to_string());
        }
        cmd.stdin(Stdio::from(std::fs::File::open(list.path())?));
        cmd.current_dir(&self.work_dir);

        let status = cmd.status().await?;
        if !status.success() {
            return Err(ReplayError::Failed {
                command: self.parallel_bin.clone(),
                status,
            });
        }

        if let Some(followup) = &batch.followup {
            info!(batch = batch.name, "running followup: {}", followup);
            let status = Command::new("sh")
                .arg("-c")
                .arg(followup)
                .current_dir(&self.work_dir)
                .status()
                .await?;
            if !status.success() {
                return Err(ReplayError::Failed {
                    command: followup.clone(),
                    status,
                });
            }
        }

        info!(batch = batch.name, "replay batch complete");
        Ok(())
    }

    async fn kill(&self, analyzer: &str) -> ReplayResult<()> {
        for process in ["parallel", analyzer] {
            let status = Command::new("killall").arg("-9").arg(process).status().await?;
            if !status.success() {
                // killall exits nonzero when no process matched
                warn!(process, "no running processes to kill");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joblist::JobBatch;

    fn echo_batch() -> JobBatch {
        JobBatch {
            name: "test",
            commands: vec!["echo one".to_string(), "echo two".to_string()],
            followup: Some("true".to_string()),
            workers: Some(2),
            niceness: 10,
        }
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let executor = ParallelExecutor::new(".");
        let batch = JobBatch {
            name: "empty",
            commands: vec![],
            followup: None,
            workers: None,
            niceness: 10,
        };

        let err = executor.run(&batch).await.unwrap_err();
        assert!(matches!(err, ReplayError::EmptyBatch(_)));
    }

    // `true` stands in for `parallel`: it ignores arguments and stdin and
    // exits 0, which exercises the list-file and followup plumbing.
    #[tokio::test]
    async fn run_reports_success_and_runs_followup() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ParallelExecutor::new(dir.path()).parallel_bin("true");

        executor.run(&echo_batch()).await.unwrap();
    }

    #[tokio::test]
    async fn failing_runner_surfaces_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ParallelExecutor::new(dir.path()).parallel_bin("false");

        let err = executor.run(&echo_batch()).await.unwrap_err();
        assert!(matches!(err, ReplayError::Failed { .. }));
    }

    #[tokio::test]
    async fn failing_followup_surfaces_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ParallelExecutor::new(dir.path()).parallel_bin("true");

        let mut batch = echo_batch();
        batch.followup = Some("exit 3".to_string());

        let err = executor.run(&batch).await.unwrap_err();
        match err {
            ReplayError::Failed { command, .. } => assert_eq!(command, "exit 3"),
            other => panic!("unexpected error: {}", other),
        }
    }
}
