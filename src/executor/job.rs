use std::path::{Path, PathBuf};

/// Struct to represent one shell command of a stage
///
/// # Example
///
/// ```rust, no_run
/// use genomeprep::executor::job::Job;
///
/// let job = Job::new()
///     .task("samtools faidx")
///     .path("genome.fa")
///     .writes("genome.fa.fai");
///
/// assert_eq!(job.cmd(), "samtools faidx 'genome.fa'");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Job {
    pub cmd: String,
    /// Files the command is expected to leave behind
    pub writes: Vec<PathBuf>,
}

impl Job {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the command with a tool (and optional subcommand)
    pub fn task(mut self, tool: &str) -> Self {
        if !self.cmd.is_empty() {
            self.cmd.push(' ');
        }
        self.cmd.push_str(tool);
        self
    }

    /// Add a raw argument to the job
    ///
    /// # Example
    ///
    /// ```rust, no_run
    /// use genomeprep::executor::job::Job;
    ///
    /// let job = Job::new().task("STAR").arg("--runMode genomeGenerate");
    ///
    /// assert_eq!(job.cmd(), "STAR --runMode genomeGenerate");
    /// ```
    pub fn arg(mut self, arg: &str) -> Self {
        if arg.is_empty() {
            return self;
        }
        self.cmd.push(' ');
        self.cmd.push_str(arg);
        self
    }

    /// Add multiple raw arguments to the job
    pub fn args(mut self, args: &[&str]) -> Self {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Add a shell-quoted path argument
    pub fn path(self, path: impl AsRef<Path>) -> Self {
        let quoted = quote(path.as_ref());
        self.arg(&quoted)
    }

    /// Add a flag followed by a shell-quoted path
    pub fn opt_path(self, flag: &str, path: impl AsRef<Path>) -> Self {
        self.arg(flag).path(path)
    }

    /// Redirect stdout into `path` and record it as written
    pub fn redirect(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.arg(">").path(path).writes(path)
    }

    /// Pipe stdout into another command
    pub fn pipe(mut self, next: &str) -> Self {
        self.cmd.push_str(" | ");
        self.cmd.push_str(next);
        self
    }

    /// Record a file the command writes without touching the command line
    pub fn writes(mut self, path: impl AsRef<Path>) -> Self {
        self.writes.push(path.as_ref().to_path_buf());
        self
    }

    /// Chain `next` after this job with `&&`
    pub fn then(mut self, next: Job) -> Self {
        if self.cmd.is_empty() {
            return next;
        }
        self.cmd.push_str(" && ");
        self.cmd.push_str(&next.cmd);
        self.writes.extend(next.writes);
        self
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }
}

impl From<String> for Job {
    fn from(cmd: String) -> Self {
        Self {
            cmd,
            writes: Vec::new(),
        }
    }
}

impl From<&str> for Job {
    fn from(cmd: &str) -> Self {
        Self::from(cmd.to_string())
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cmd)
    }
}

/// Single-quote a path for the shell runner
pub fn quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Single-quote an arbitrary string for the shell runner
pub fn quote_str(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}
