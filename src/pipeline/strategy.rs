//! Conversion strategy selection.

use crate::config::{RunMode, ShortcutPolicy};
use crate::pipeline::format::output_extension;
use serde::{Deserialize, Serialize};

/// How a task's conversion is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Copy the source through; no external tool.
    Simulate,
    /// Direct-to-markdown converter.
    Shortcut,
    /// pandoc.
    Pandoc,
}

/// Pick the strategy for a task. Pure; never fails.
///
/// With the default [`ShortcutPolicy::Disabled`] every live task resolves to
/// [`Strategy::Pandoc`].
pub fn resolve(mode: RunMode, shortcut: ShortcutPolicy, target_format: &str) -> Strategy {
    match (mode, shortcut) {
        (RunMode::Simulate, _) => Strategy::Simulate,
        (RunMode::Live, ShortcutPolicy::MarkdownTargets)
            if output_extension(target_format) == "md" =>
        {
            Strategy::Shortcut
        }
        (RunMode::Live, _) => Strategy::Pandoc,
    }
}
