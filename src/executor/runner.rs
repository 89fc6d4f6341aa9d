use std::path::PathBuf;
use std::process::Command;

use crate::consts::SHELL;
use crate::error::StageFailure;
use crate::executor::job::Job;
use crate::graph::StageId;

/// Executes the shell commands of a stage.
///
/// Implementations block until the command has finished.
pub trait JobRunner: Send + Sync {
    fn run(&self, stage: StageId, job: &Job) -> Result<(), StageFailure>;
}

/// Runs each job through `bash -o pipefail -c` inside a working directory.
///
/// A failing command anywhere in a pipeline fails the job.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    workdir: PathBuf,
}

impl ShellRunner {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

impl JobRunner for ShellRunner {
    fn run(&self, stage: StageId, job: &Job) -> Result<(), StageFailure> {
        log::debug!("DEBUG [{}]: {}", stage, job.cmd());

        let output = Command::new(SHELL)
            .args(["-o", "pipefail", "-c"])
            .arg(job.cmd())
            .current_dir(&self.workdir)
            .output()
            .map_err(|source| StageFailure::Spawn {
                command: job.cmd().to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            log::debug!("DEBUG [{}]: {}", stage, stdout.trim_end());
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(StageFailure::Process {
                command: job.cmd().to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}
