//! Child process runner for the dump and restore tools.
//!
//! Output from stdout and stderr is merged into one line stream. Each line is
//! checked for coarse progress markers, scrubbed of secrets and forwarded to
//! the caller's [`LogSink`].

use crate::error::{MigrateError, Result};
use crate::event::{LogEvent, LogSink, MigrationPhase};
use async_trait::async_trait;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Program plus arguments for one tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a flag followed by its value.
    pub fn flag(self, name: &str, value: impl Into<String>) -> Self {
        self.arg(name).arg(value)
    }

    /// Executable name without its directory, for messages.
    pub fn tool_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone())
    }

    /// Value following `name`, if the flag is present.
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == name)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Every value passed for a repeatable flag, in order.
    pub fn flag_values(&self, name: &str) -> Vec<&str> {
        self.args
            .windows(2)
            .filter(|pair| pair[0] == name)
            .map(|pair| pair[1].as_str())
            .collect()
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Replaces secret strings in output lines.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    /// Token substituted for each redacted span.
    pub const MASK: &'static str = "[REDACTED]";

    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut secrets: Vec<String> = secrets
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.is_empty())
            .collect();
        secrets.sort();
        secrets.dedup();
        Self { secrets }
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Mask every occurrence of every secret.
    ///
    /// Occurrences are located on the line, including overlapping ones, and
    /// each covered run collapses into a single mask token. A secret that
    /// reassembles around a mask is masked again. Only when that does not
    /// settle within [`Self::MAX_PASSES`] is the line emptied.
    pub fn redact(&self, line: &str) -> String {
        let mut output = line.to_string();
        for _ in 0..Self::MAX_PASSES {
            match self.mask_pass(&output) {
                Some(masked) => output = masked,
                None => return output,
            }
        }
        if self.leaks(&output) {
            return String::new();
        }
        output
    }

    /// Upper bound on masking passes over one line.
    pub const MAX_PASSES: usize = 8;

    fn leaks(&self, text: &str) -> bool {
        self.secrets.iter().any(|s| text.contains(s.as_str()))
    }

    /// One masking pass; `None` when nothing matched.
    fn mask_pass(&self, line: &str) -> Option<String> {
        if self.secrets.is_empty() {
            return None;
        }

        let mut covered = vec![false; line.len()];
        let mut any = false;
        for secret in &self.secrets {
            let step = secret.chars().next().map(char::len_utf8).unwrap_or(1);
            let mut start = 0;
            while let Some(offset) = line[start..].find(secret.as_str()) {
                let begin = start + offset;
                covered[begin..begin + secret.len()].fill(true);
                any = true;
                start = begin + step;
                if start >= line.len() {
                    break;
                }
            }
        }
        if !any {
            return None;
        }

        let mut output = String::with_capacity(line.len());
        let mut in_mask = false;
        for (i, ch) in line.char_indices() {
            if covered[i] {
                if !in_mask {
                    output.push_str(Self::MASK);
                    in_mask = true;
                }
            } else {
                output.push(ch);
                in_mask = false;
            }
        }

        Some(output)
    }
}

/// Best-effort progress annotation from tool output.
///
/// Markers are free text from the tools themselves, so this never feeds
/// into success or failure.
#[derive(Debug, Default)]
pub struct PhaseClassifier {
    metadata_seen: bool,
    data_seen: bool,
    index_seen: bool,
}

impl PhaseClassifier {
    /// Category of a single line, if it carries a known marker.
    pub fn classify(line: &str) -> Option<MigrationPhase> {
        let lower = line.to_lowercase();
        if lower.contains("writing metadata") || lower.contains("restoring metadata") {
            Some(MigrationPhase::Metadata)
        } else if lower.contains("index")
            && (lower.contains("creating") || lower.contains("building"))
        {
            Some(MigrationPhase::Index)
        } else if lower.contains("restoring") && lower.contains("collection") {
            Some(MigrationPhase::Data)
        } else {
            None
        }
    }

    /// Returns a phase only the first time its category shows up.
    pub fn observe(&mut self, line: &str) -> Option<MigrationPhase> {
        let phase = Self::classify(line)?;
        let seen = match phase {
            MigrationPhase::Metadata => &mut self.metadata_seen,
            MigrationPhase::Data => &mut self.data_seen,
            MigrationPhase::Index => &mut self.index_seen,
            _ => return None,
        };
        if *seen {
            None
        } else {
            *seen = true;
            Some(phase)
        }
    }

    fn describe(phase: MigrationPhase) -> &'static str {
        match phase {
            MigrationPhase::Metadata => "Processing collection metadata...",
            MigrationPhase::Data => "Transferring collection data...",
            MigrationPhase::Index => "Building indexes...",
            _ => "",
        }
    }
}

/// Runs an external tool to completion.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `invocation`, forwarding redacted output to `sink`.
    ///
    /// Returns only after the process has exited and its output has been
    /// fully consumed. Fails on spawn failure, non-zero exit or cancellation.
    async fn run(
        &self,
        invocation: &ToolInvocation,
        redactor: &Redactor,
        sink: &dyn LogSink,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// [`ToolRunner`] backed by real child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn forward(
        segment: Vec<u8>,
        classifier: &mut PhaseClassifier,
        redactor: &Redactor,
        sink: &dyn LogSink,
    ) {
        let line = String::from_utf8_lossy(&segment);
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if let Some(phase) = classifier.observe(line) {
            sink.emit(LogEvent::phase(phase, PhaseClassifier::describe(phase)));
        }
        let redacted = redactor.redact(line);
        if !redacted.is_empty() {
            sink.emit(LogEvent::info(redacted));
        }
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        redactor: &Redactor,
        sink: &dyn LogSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let tool = invocation.tool_name();
        debug!("Running: {}", redactor.redact(&invocation.to_string()));

        let mut child = match Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MigrateError::ToolNotFound { tool });
            }
            Err(e) => return Err(e.into()),
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MigrateError::Io(std::io::Error::other("child stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MigrateError::Io(std::io::Error::other("child stderr not captured")))?;

        let mut stdout = BufReader::new(stdout).split(b'\n');
        let mut stderr = BufReader::new(stderr).split(b'\n');
        let mut stdout_done = false;
        let mut stderr_done = false;
        let mut classifier = PhaseClassifier::default();

        while !(stdout_done && stderr_done) {
            tokio::select! {
                segment = stdout.next_segment(), if !stdout_done => match segment? {
                    Some(segment) => Self::forward(segment, &mut classifier, redactor, sink),
                    None => stdout_done = true,
                },
                segment = stderr.next_segment(), if !stderr_done => match segment? {
                    Some(segment) => Self::forward(segment, &mut classifier, redactor, sink),
                    None => stderr_done = true,
                },
                _ = cancel.cancelled() => {
                    warn!("Cancellation requested, stopping {}", tool);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to stop {}: {}", tool, e);
                    }
                    return Err(MigrateError::Cancelled);
                }
            }
        }

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                warn!("Cancellation requested, stopping {}", tool);
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop {}: {}", tool, e);
                }
                return Err(MigrateError::Cancelled);
            }
        };

        if status.success() {
            debug!("{} exited successfully", tool);
            Ok(())
        } else {
            Err(MigrateError::process_exit(tool, status.code()))
        }
    }
}
