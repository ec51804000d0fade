//! External converter invocation.
//!
//! All three tools (pandoc, the markdown shortcut converter and the office
//! converter) go through [`run_tool`], which:
//!
//! * spawns the executable with stdin closed and stdout discarded,
//! * captures stderr for the failure message,
//! * separates "no such program" ([`ConvertError::ToolNotFound`]) from
//!   "ran and failed" ([`ConvertError::ToolExecutionFailure`]) and from any
//!   other spawn error (propagated as [`ConvertError::Io`]),
//! * kills the process when the optional timeout expires.
//!
//! The simulation path lives here too, since it stands in for an invoker.

use crate::error::ConvertError;
use crate::pipeline::format::{extension_hint, pandoc_format};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// The external executables the service knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Pandoc,
    Shortcut,
    Office,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::Pandoc => "pandoc",
            Tool::Shortcut => "markitdown",
            Tool::Office => "office converter",
        }
    }

    /// Env var that overrides this tool's path.
    pub fn env_var(self) -> &'static str {
        match self {
            Tool::Pandoc => crate::config::PANDOC_ENV,
            Tool::Shortcut => crate::config::SHORTCUT_ENV,
            Tool::Office => crate::config::OFFICE_ENV,
        }
    }
}

/// Convert a `tool_timeout_secs` setting into an optional duration.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Run `program` with `args` and wait for it to exit.
pub async fn run_tool(
    tool: Tool,
    program: &Path,
    args: &[OsString],
    timeout: Option<Duration>,
) -> Result<(), ConvertError> {
    debug!("{} {:?} {:?}", tool.name(), program, args);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConvertError::ToolNotFound {
                    tool: tool.name(),
                    program: program.display().to_string(),
                    env_var: tool.env_var(),
                }
            } else {
                ConvertError::Io(e)
            }
        })?;

    // Dropping the wait future on timeout drops the child, and kill_on_drop
    // terminates it.
    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(res) => res?,
            Err(_) => {
                warn!("{} exceeded {:?}; killing it", tool.name(), limit);
                return Err(ConvertError::ToolTimeout {
                    tool: tool.name(),
                    secs: limit.as_secs(),
                });
            }
        },
        None => child.wait_with_output().await?,
    };

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if !stderr.is_empty() {
        stderr
    } else {
        match output.status.code() {
            Some(code) => format!("{} exited with code {}", tool.name(), code),
            None => format!("{} was terminated by a signal", tool.name()),
        }
    };
    Err(ConvertError::ToolExecutionFailure {
        tool: tool.name(),
        message,
    })
}

// ── Pandoc ───────────────────────────────────────────────────────────────

/// Primary document converter.
#[derive(Debug, Clone)]
pub struct PandocInvoker {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl PandocInvoker {
    pub fn new(program: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// `--from <src> --to <dst> <input> --output <output>`
    pub fn args(
        source_format: &str,
        target_format: &str,
        input: &Path,
        output: &Path,
    ) -> Vec<OsString> {
        vec![
            "--from".into(),
            pandoc_format(source_format).into(),
            "--to".into(),
            pandoc_format(target_format).into(),
            input.as_os_str().to_os_string(),
            "--output".into(),
            output.as_os_str().to_os_string(),
        ]
    }

    pub async fn convert(
        &self,
        input: &Path,
        source_format: &str,
        target_format: &str,
        output: &Path,
    ) -> Result<(), ConvertError> {
        let args = Self::args(source_format, target_format, input, output);
        run_tool(Tool::Pandoc, &self.program, &args, self.timeout).await
    }
}

// ── Markdown shortcut ────────────────────────────────────────────────────

/// Direct-to-markdown converter.
#[derive(Debug, Clone)]
pub struct ShortcutInvoker {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ShortcutInvoker {
    pub fn new(program: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// `<input> -o <output> [--extension <hint>]`
    pub fn args(input: &Path, declared_format: Option<&str>, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            input.as_os_str().to_os_string(),
            "-o".into(),
            output.as_os_str().to_os_string(),
        ];
        if let Some(hint) = extension_hint(declared_format, input) {
            args.push("--extension".into());
            args.push(hint.into());
        }
        args
    }

    pub async fn convert(
        &self,
        input: &Path,
        declared_format: Option<&str>,
        output: &Path,
    ) -> Result<(), ConvertError> {
        let args = Self::args(input, declared_format, output);
        run_tool(Tool::Shortcut, &self.program, &args, self.timeout).await
    }
}

// ── Simulation ───────────────────────────────────────────────────────────

/// Copy `input` to `output` byte-for-byte; on failure retry as a UTF-8
/// read/write round trip.
pub async fn simulate(input: &Path, output: &Path) -> Result<(), ConvertError> {
    match tokio::fs::copy(input, output).await {
        Ok(bytes) => {
            debug!("Simulated conversion copied {} bytes", bytes);
            Ok(())
        }
        Err(e) => {
            warn!(
                "Copy {} → {} failed ({}); retrying as text",
                input.display(),
                output.display(),
                e
            );
            let text = tokio::fs::read_to_string(input).await?;
            tokio::fs::write(output, text).await?;
            Ok(())
        }
    }
}
