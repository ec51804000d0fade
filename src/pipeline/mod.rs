//! Pipeline stages for a single conversion task.
//!
//! Each submodule implements one step and is tested on its own.
//! [`crate::orchestrator`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! legacy ──▶ strategy ──▶ prepare ──▶ invoke
//! (soffice)   (pure)     (pdf→md)    (pandoc / markitdown / copy)
//! ```
//!
//! 1. [`legacy`]: convert `.doc`/`.xls`/`.ppt` to OOXML in a scratch dir
//! 2. [`strategy`]: pick simulate, shortcut or pandoc
//! 3. [`prepare`]: stage PDF sources as intermediate markdown via
//!    [`extract`]
//! 4. [`invoke`]: run the external converter, or copy in test mode
//!
//! [`cleanup`] holds the release guard that stages 1 and 3 hand back, and
//! [`format`] the format-name tables shared by all of them.

pub mod cleanup;
pub mod extract;
pub mod format;
pub mod invoke;
pub mod legacy;
pub mod prepare;
pub mod strategy;
