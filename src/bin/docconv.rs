//! CLI binary for edgequake-docconv.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service,
//! `convert` runs one synchronous conversion from the terminal.

use anyhow::{anyhow, Context, Result};
use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use edgequake_docconv::{
    server, Orchestrator, RunMode, ServiceConfig, ShortcutPolicy, SubmitRequest, TaskStatus,
};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use edgequake_docconv::config::OFFICE_ENV;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on port 8000
  docconv serve --addr 0.0.0.0:8000

  # Convert Word documents to Markdown, two at a time
  docconv convert report.docx minutes.docx --to markdown -j 2

  # Legacy .doc input is normalised through LibreOffice first
  SOFFICE_PATH=/usr/bin/soffice docconv convert old.doc --to html

  # Dry run without any external tools (output = input bytes)
  docconv convert notes.md --to html --simulate

ENVIRONMENT VARIABLES:
  PANDOC_PATH            Primary converter (default: pandoc on PATH)
  MARKITDOWN_PATH        Markdown shortcut converter (default: markitdown on PATH)
  SOFFICE_PATH           Office converter for .doc/.xls/.ppt (empty disables)
  DOCCONV_TEST_MODE      1/true: simulate every conversion
  DOCCONV_SHORTCUT       disabled | markdown
  DOCCONV_UPLOAD_DIR     Upload storage (default: storage/uploads)
  DOCCONV_OUTPUT_DIR     Converted artifacts (default: storage/outputs)
  DOCCONV_TOOL_TIMEOUT   Seconds before an external tool is killed (0 = never)
  PDFIUM_LIB_PATH        Path to libpdfium used for PDF text extraction
"#;

/// Convert documents through pandoc, LibreOffice and markitdown.
#[derive(Parser, Debug)]
#[command(
    name = "docconv",
    version,
    about = "Document conversion service: pandoc orchestration with trackable tasks",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    service: ServiceArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(
        short,
        long,
        global = true,
        env = "DOCCONV_VERBOSE",
        value_parser = FalseyValueParser::new()
    )]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(
        short,
        long,
        global = true,
        env = "DOCCONV_QUIET",
        value_parser = FalseyValueParser::new()
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Socket address to listen on.
        #[arg(long, env = "DOCCONV_ADDR", default_value = "0.0.0.0:8000")]
        addr: String,
    },
    /// Convert one or more files and wait for the results.
    Convert {
        /// Source documents.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Target format (markdown, html, docx, txt, …).
        #[arg(long)]
        to: String,

        /// Source format; inferred from the file extension when omitted.
        #[arg(long)]
        from: Option<String>,

        /// Conversions run at the same time.
        #[arg(short = 'j', long, default_value_t = 4)]
        jobs: usize,
    },
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// Copy sources through instead of running external tools.
    #[arg(
        long,
        global = true,
        env = "DOCCONV_TEST_MODE",
        value_parser = FalseyValueParser::new()
    )]
    simulate: bool,

    /// Markdown shortcut policy: disabled or markdown.
    #[arg(long, global = true, env = "DOCCONV_SHORTCUT")]
    shortcut: Option<ShortcutPolicy>,

    #[arg(long, global = true, env = "PANDOC_PATH")]
    pandoc: Option<PathBuf>,

    #[arg(long, global = true, env = "MARKITDOWN_PATH")]
    markitdown: Option<PathBuf>,

    /// Office converter; an empty value disables legacy normalisation.
    #[arg(long, global = true, env = "SOFFICE_PATH")]
    soffice: Option<String>,

    #[arg(long, global = true, env = "DOCCONV_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "DOCCONV_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Seconds before an external tool is killed (0 = never).
    #[arg(long, global = true, env = "DOCCONV_TOOL_TIMEOUT")]
    tool_timeout: Option<u64>,

    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli.service, std::env::var_os(OFFICE_ENV))?;
    let orchestrator = Orchestrator::new(config);
    orchestrator
        .bootstrap()
        .await
        .context("Failed to create storage directories")?;

    match cli.command {
        Command::Serve { addr } => {
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Could not bind to {addr}"))?;
            info!("Listening on {}", addr);
            server::serve(listener, orchestrator)
                .await
                .context("HTTP server stopped")?;
            Ok(())
        }
        Command::Convert {
            inputs,
            to,
            from,
            jobs,
        } => {
            let failed =
                convert(&orchestrator, inputs, &to, from.as_deref(), jobs, cli.quiet).await;
            if failed > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Map CLI args to `ServiceConfig`.
///
/// clap reads an empty env value as unset, so `office_env` carries the raw
/// `SOFFICE_PATH` to let an empty value disable the office converter.
fn build_config(args: &ServiceArgs, office_env: Option<OsString>) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder();
    if args.simulate {
        builder = builder.run_mode(RunMode::Simulate);
    }
    if let Some(policy) = args.shortcut {
        builder = builder.shortcut_policy(policy);
    }
    if let Some(ref p) = args.pandoc {
        builder = builder.pandoc_path(p);
    }
    if let Some(ref p) = args.markitdown {
        builder = builder.shortcut_path(p);
    }
    match args.soffice.as_deref() {
        Some(p) if !p.trim().is_empty() => builder = builder.office_path(p),
        Some(_) => builder = builder.no_office_converter(),
        None if office_env
            .as_deref()
            .is_some_and(|v| v.to_string_lossy().trim().is_empty()) =>
        {
            builder = builder.no_office_converter();
        }
        None => {}
    }
    if let Some(ref d) = args.upload_dir {
        builder = builder.upload_dir(d);
    }
    if let Some(ref d) = args.output_dir {
        builder = builder.output_dir(d);
    }
    if let Some(secs) = args.tool_timeout {
        builder = builder.tool_timeout_secs(secs);
    }
    if let Some(ref p) = args.pdfium_lib {
        builder = builder.pdfium_lib_path(p);
    }
    builder.build().context("Invalid configuration")
}

/// Run every input through the orchestrator. Returns the number of failures.
async fn convert(
    orchestrator: &Orchestrator,
    inputs: Vec<PathBuf>,
    to: &str,
    from: Option<&str>,
    jobs: usize,
    quiet: bool,
) -> usize {
    let total = inputs.len();
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {pos}/{len}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.set_message(format!("→ {to}"));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    };

    let outcomes: Vec<(PathBuf, Result<PathBuf>)> = stream::iter(inputs.into_iter().map(|input| {
        let spinner = spinner.clone();
        async move {
            let outcome = convert_one(orchestrator, &input, to, from).await;
            spinner.inc(1);
            (input, outcome)
        }
    }))
    .buffer_unordered(jobs.max(1))
    .collect()
    .await;
    spinner.finish_and_clear();

    let mut failed = 0;
    for (input, outcome) in outcomes {
        match outcome {
            Ok(out) => {
                if !quiet {
                    eprintln!("{}  {}", green("✔"), bold(&out.display().to_string()));
                }
                println!("{}", out.display());
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}  {}: {:#}", red("✘"), input.display(), e);
            }
        }
    }
    failed
}

async fn convert_one(
    orchestrator: &Orchestrator,
    input: &Path,
    to: &str,
    from: Option<&str>,
) -> Result<PathBuf> {
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Input path has no file name")?;

    // Stage the input like an upload so the task owns its own copy.
    let upload_dir = &orchestrator.config().upload_dir;
    let stored_name = format!("{}-{}", Uuid::new_v4().simple(), filename);
    let stored = upload_dir.join(&stored_name);
    tokio::fs::copy(input, &stored)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let source_path = tokio::fs::canonicalize(&stored).await.unwrap_or(stored);

    let task = orchestrator
        .submit_and_wait(SubmitRequest {
            source_path,
            source_relative_path: stored_name,
            source_format: from.map(str::to_string),
            target_format: to.to_string(),
            source_filename: filename,
        })
        .await
        .context("Conversion could not be started")?;

    match (task.status, task.output_path) {
        (TaskStatus::Completed, Some(out)) => Ok(out),
        _ => Err(anyhow!(task
            .error
            .unwrap_or_else(|| "unknown error".to_string()))),
    }
}
