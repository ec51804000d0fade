//! Configuration for the conversion service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`] or read once from the process environment
//! with [`ServiceConfig::from_env`]. The config is threaded explicitly into
//! the [`crate::orchestrator::Orchestrator`]; nothing below this module reads
//! environment variables, so tests can run live and simulated pipelines side
//! by side in one process.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Env var holding the primary converter path.
pub const PANDOC_ENV: &str = "PANDOC_PATH";
/// Env var holding the markdown shortcut converter path.
pub const SHORTCUT_ENV: &str = "MARKITDOWN_PATH";
/// Env var holding the office converter path. Empty disables normalisation.
pub const OFFICE_ENV: &str = "SOFFICE_PATH";

const DEFAULT_OFFICE_PATH: &str = r"C:\Program Files\LibreOffice\program\soffice.exe";

/// Configuration for a conversion service instance.
///
/// # Example
/// ```rust
/// use edgequake_docconv::{RunMode, ServiceConfig};
///
/// let config = ServiceConfig::builder()
///     .run_mode(RunMode::Simulate)
///     .output_dir("/tmp/docconv/out")
///     .build()
///     .unwrap();
/// assert_eq!(config.run_mode, RunMode::Simulate);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// `Simulate` copies sources through without touching any external tool.
    pub run_mode: RunMode,

    /// Whether markdown targets may use the shortcut converter. Default: disabled.
    pub shortcut_policy: ShortcutPolicy,

    /// Primary document converter. Default: `pandoc` resolved via `PATH`.
    pub pandoc_path: PathBuf,

    /// Direct-to-markdown converter. Default: `markitdown` resolved via `PATH`.
    pub shortcut_path: PathBuf,

    /// General-purpose office converter used for legacy formats.
    ///
    /// `None` means legacy inputs are passed through untouched.
    pub office_path: Option<PathBuf>,

    /// Where uploaded sources are stored.
    pub upload_dir: PathBuf,

    /// Where converted artifacts, intermediates and scratch dirs live.
    pub output_dir: PathBuf,

    /// Per-process timeout for external tools, in seconds. `0` disables it.
    pub tool_timeout_secs: u64,

    /// Explicit pdfium shared library. `None` binds the system library.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Live,
            shortcut_policy: ShortcutPolicy::Disabled,
            pandoc_path: PathBuf::from("pandoc"),
            shortcut_path: PathBuf::from("markitdown"),
            office_path: Some(PathBuf::from(DEFAULT_OFFICE_PATH)),
            upload_dir: PathBuf::from("storage/uploads"),
            output_dir: PathBuf::from("storage/outputs"),
            tool_timeout_secs: 600,
            pdfium_lib_path: None,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read the configuration from the process environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConvertError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConvertError> {
        let mut b = Self::builder();

        if let Some(v) = lookup("DOCCONV_TEST_MODE") {
            if is_truthy(&v) {
                b = b.run_mode(RunMode::Simulate);
            }
        }
        if let Some(v) = lookup("DOCCONV_SHORTCUT") {
            b = b.shortcut_policy(v.parse()?);
        }
        if let Some(v) = lookup(PANDOC_ENV) {
            b = b.pandoc_path(v);
        }
        if let Some(v) = lookup(SHORTCUT_ENV) {
            b = b.shortcut_path(v);
        }
        if let Some(v) = lookup(OFFICE_ENV) {
            b = if v.trim().is_empty() {
                b.no_office_converter()
            } else {
                b.office_path(v)
            };
        }
        if let Some(v) = lookup("DOCCONV_UPLOAD_DIR") {
            b = b.upload_dir(v);
        }
        if let Some(v) = lookup("DOCCONV_OUTPUT_DIR") {
            b = b.output_dir(v);
        }
        if let Some(v) = lookup("DOCCONV_TOOL_TIMEOUT") {
            let secs = v.trim().parse::<u64>().map_err(|_| {
                ConvertError::InvalidConfig(format!(
                    "DOCCONV_TOOL_TIMEOUT must be a number of seconds, got '{v}'"
                ))
            })?;
            b = b.tool_timeout_secs(secs);
        }
        if let Some(v) = lookup("PDFIUM_LIB_PATH") {
            b = b.pdfium_lib_path(v);
        }

        b.build()
    }
}

fn is_truthy(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn run_mode(mut self, mode: RunMode) -> Self {
        self.config.run_mode = mode;
        self
    }

    pub fn shortcut_policy(mut self, policy: ShortcutPolicy) -> Self {
        self.config.shortcut_policy = policy;
        self
    }

    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = path.into();
        self
    }

    pub fn shortcut_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.shortcut_path = path.into();
        self
    }

    pub fn office_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.office_path = Some(path.into());
        self
    }

    /// Disable legacy-format normalisation entirely.
    pub fn no_office_converter(mut self) -> Self {
        self.config.office_path = None;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ConvertError> {
        let c = &self.config;
        for (name, path) in [
            ("pandoc_path", c.pandoc_path.as_path()),
            ("shortcut_path", c.shortcut_path.as_path()),
            ("upload_dir", c.upload_dir.as_path()),
            ("output_dir", c.output_dir.as_path()),
        ] {
            if is_blank(path) {
                return Err(ConvertError::InvalidConfig(format!(
                    "{name} must not be empty"
                )));
            }
        }
        Ok(self.config)
    }
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().is_empty()
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Whether the service drives real tools or copies sources through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunMode {
    /// Real external converters. (default)
    #[default]
    Live,
    /// Test mode: every task resolves to the simulation strategy.
    Simulate,
}

/// Gate for the direct-to-markdown shortcut converter.
///
/// Off by default, in which case every target resolves to pandoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShortcutPolicy {
    /// Never use the shortcut converter. (default)
    #[default]
    Disabled,
    /// Route markdown targets (`md`, `markdown`) through the shortcut converter.
    MarkdownTargets,
}

impl std::str::FromStr for ShortcutPolicy {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "off" | "disabled" | "false" | "0" => Ok(Self::Disabled),
            "markdown" | "on" | "enabled" | "true" | "1" => Ok(Self::MarkdownTargets),
            other => Err(ConvertError::InvalidConfig(format!(
                "unknown shortcut policy '{other}' (expected 'disabled' or 'markdown')"
            ))),
        }
    }
}
