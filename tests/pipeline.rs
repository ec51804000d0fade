//! End-to-end tests for the conversion orchestrator.
//!
//! External tools are replaced by small shell scripts (unix only) and PDF
//! extraction by in-process fakes, so these run without pandoc, LibreOffice
//! or pdfium installed.

use edgequake_docconv::{
    ConvertError, DownloadError, Orchestrator, RunMode, ServiceConfig, ShortcutPolicy,
    SubmitRequest, Task, TaskStatus, TextExtractor,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("edgequake_docconv=debug")
            .with_test_writer()
            .try_init();
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn uploads(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    fn outputs(&self) -> PathBuf {
        self.dir.path().join("outputs")
    }

    fn config(&self) -> edgequake_docconv::ServiceConfigBuilder {
        ServiceConfig::builder()
            .upload_dir(self.uploads())
            .output_dir(self.outputs())
            .no_office_converter()
            .tool_timeout_secs(20)
    }

    fn upload(&self, name: &str, content: &[u8]) -> PathBuf {
        std::fs::create_dir_all(self.uploads()).unwrap();
        let p = self.uploads().join(name);
        std::fs::write(&p, content).unwrap();
        p
    }

    fn request(&self, path: &Path, source_format: Option<&str>, target: &str) -> SubmitRequest {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        SubmitRequest {
            source_path: path.to_path_buf(),
            source_relative_path: format!("uploads/{name}"),
            source_format: source_format.map(str::to_string),
            target_format: target.to_string(),
            source_filename: name,
        }
    }

    /// Every entry left in the output directory, by file name.
    fn output_entries(&self) -> Vec<String> {
        match std::fs::read_dir(self.outputs()) {
            Ok(rd) => rd
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => vec![],
        }
    }
}

async fn wait_terminal(orchestrator: &Orchestrator, id: Uuid) -> Task {
    for _ in 0..400 {
        let view = orchestrator.status(id).await.expect("task exists");
        if view.task.status.is_terminal() {
            return view.task;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("task {id} did not finish");
}

struct FakePdf(Vec<&'static str>);

impl TextExtractor for FakePdf {
    fn extract_pages(&self, _pdf: Vec<u8>) -> Result<Vec<String>, String> {
        Ok(self.0.iter().map(|s| s.to_string()).collect())
    }
}

struct CorruptPdf;

impl TextExtractor for CorruptPdf {
    fn extract_pages(&self, _pdf: Vec<u8>) -> Result<Vec<String>, String> {
        Err("trailer not found".into())
    }
}

// ── Simulation mode ──────────────────────────────────────────────────────────

#[tokio::test]
async fn simulated_markdown_to_html_round_trips() {
    let env = Env::new();
    let orchestrator = Orchestrator::new(env.config().run_mode(RunMode::Simulate).build().unwrap());
    orchestrator.bootstrap().await.unwrap();

    let src = env.upload("sample.md", b"# Title");
    let task = orchestrator
        .submit(env.request(&src, Some("markdown"), "html"))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.output_path.is_none() && task.error.is_none());

    let done = wait_terminal(&orchestrator, task.id).await;
    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.error.is_none());

    let download = orchestrator.download(task.id).await.unwrap();
    assert_eq!(download.filename, format!("sample-{}.html", task.id));
    assert_eq!(std::fs::read(&download.path).unwrap(), b"# Title");

    let view = orchestrator.status(task.id).await.unwrap();
    assert_eq!(
        view.download_url,
        Some(format!("/api/v1/tasks/{}/download", task.id))
    );
}

#[tokio::test]
async fn simulated_conversion_copies_any_target() {
    let env = Env::new();
    let orchestrator = Orchestrator::new(env.config().run_mode(RunMode::Simulate).build().unwrap());
    let content = b"\x00binary\xffpayload";
    let src = env.upload("blob.docx", content);

    for (target, ext) in [("md", "md"), ("markdown", "md"), ("text", "txt"), ("pdf", "pdf")] {
        let done = orchestrator
            .submit_and_wait(env.request(&src, None, target))
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed, "{target}");
        let out = done.output_path.unwrap();
        assert_eq!(out.extension().unwrap(), ext);
        assert_eq!(std::fs::read(out).unwrap(), content);
    }
}

#[tokio::test]
async fn simulate_mode_never_touches_tools() {
    let env = Env::new();
    let config = env
        .config()
        .run_mode(RunMode::Simulate)
        .pandoc_path("/nonexistent/pandoc")
        .office_path("/nonexistent/soffice")
        .build()
        .unwrap();
    let orchestrator = Orchestrator::with_extractor(config, Arc::new(CorruptPdf));

    let doc = env.upload("legacy.doc", b"DOC");
    let pdf = env.upload("paper.pdf", b"%PDF");
    for src in [doc, pdf] {
        let done = orchestrator
            .submit_and_wait(env.request(&src, None, "html"))
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
    }
}

#[tokio::test]
async fn concurrent_tasks_get_distinct_outputs() {
    let env = Env::new();
    let orchestrator = Orchestrator::new(env.config().run_mode(RunMode::Simulate).build().unwrap());
    let src = env.upload("same.md", b"shared");

    let runs = (0..8).map(|_| orchestrator.submit_and_wait(env.request(&src, None, "html")));
    let tasks: Vec<Task> = futures::future::join_all(runs)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let mut outputs: Vec<PathBuf> = tasks.iter().filter_map(|t| t.output_path.clone()).collect();
    outputs.sort();
    outputs.dedup();
    assert_eq!(outputs.len(), 8);
    assert_eq!(orchestrator.store().list().await.len(), 8);
}

#[tokio::test]
async fn relative_output_dir_yields_absolute_output_path() {
    let env = Env::new();
    let relative = PathBuf::from(format!("target/docconv-relative-{}", Uuid::new_v4()));
    let config = ServiceConfig::builder()
        .run_mode(RunMode::Simulate)
        .upload_dir(env.uploads())
        .output_dir(&relative)
        .build()
        .unwrap();
    let orchestrator = Orchestrator::new(config);
    let src = env.upload("sample.md", b"# Title");

    let done = orchestrator
        .submit_and_wait(env.request(&src, None, "html"))
        .await
        .unwrap();
    let _ = std::fs::remove_dir_all(&relative);

    assert_eq!(done.status, TaskStatus::Completed, "{:?}", done.error);
    let out = done.output_path.unwrap();
    assert!(out.is_absolute(), "{}", out.display());
    assert!(out.ends_with(format!("sample-{}.html", done.id)));
}

// ── Lookup signals ───────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_task_is_not_found() {
    let env = Env::new();
    let orchestrator = Orchestrator::new(env.config().build().unwrap());
    let id = Uuid::new_v4();

    assert!(matches!(
        orchestrator.status(id).await,
        Err(ConvertError::TaskNotFound { .. })
    ));
    assert_eq!(
        orchestrator.download(id).await,
        Err(DownloadError::NotFound(id))
    );
}

#[tokio::test]
async fn download_before_completion_is_not_ready() {
    let env = Env::new();
    let orchestrator = Orchestrator::new(env.config().build().unwrap());
    let src = env.upload("a.md", b"x");

    // Registered but never run.
    let task = orchestrator
        .store()
        .create(edgequake_docconv::task::NewTask {
            id: Uuid::new_v4(),
            source_path: src,
            source_relative_path: "uploads/a.md".into(),
            source_format: "md".into(),
            target_format: "html".into(),
            source_filename: "a.md".into(),
        })
        .await
        .unwrap();

    assert_eq!(
        orchestrator.download(task.id).await,
        Err(DownloadError::NotReady {
            id: task.id,
            status: TaskStatus::Pending
        })
    );
}

#[tokio::test]
async fn failed_task_is_not_downloadable() {
    let env = Env::new();
    let config = env.config().pandoc_path("/nonexistent/pandoc").build().unwrap();
    let orchestrator = Orchestrator::new(config);
    let src = env.upload("a.md", b"x");

    let done = orchestrator
        .submit_and_wait(env.request(&src, None, "html"))
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Failed);
    assert!(matches!(
        orchestrator.download(done.id).await,
        Err(DownloadError::NotReady {
            status: TaskStatus::Failed,
            ..
        })
    ));
}

// ── Live mode failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn missing_pandoc_fails_task_with_override_hint() {
    let env = Env::new();
    let config = env.config().pandoc_path("/nonexistent/pandoc").build().unwrap();
    let orchestrator = Orchestrator::new(config);
    let src = env.upload("notes.md", b"# Notes");

    let task = orchestrator
        .submit(env.request(&src, Some("md"), "html"))
        .await
        .unwrap();
    let done = wait_terminal(&orchestrator, task.id).await;

    assert_eq!(done.status, TaskStatus::Failed);
    assert!(done.output_path.is_none());
    let msg = done.error.unwrap();
    assert!(msg.contains("PANDOC_PATH"), "got: {msg}");
}

#[tokio::test]
async fn legacy_doc_without_office_converter_passes_through() {
    let env = Env::new();
    // Reaching pandoc proves normalisation did not fail.
    let config = env.config().pandoc_path("/nonexistent/pandoc").build().unwrap();
    let orchestrator = Orchestrator::new(config);
    let src = env.upload("old.doc", b"\xd0\xcf\x11\xe0");

    let done = orchestrator
        .submit_and_wait(env.request(&src, Some("doc"), "markdown"))
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Failed);
    assert!(done.error.unwrap().starts_with("pandoc executable"));
    assert!(env.output_entries().iter().all(|n| !n.starts_with("legacy-")));
}

#[tokio::test]
async fn corrupt_pdf_fails_before_any_tool_runs() {
    let env = Env::new();
    let config = env.config().pandoc_path("/nonexistent/pandoc").build().unwrap();
    let orchestrator = Orchestrator::with_extractor(config, Arc::new(CorruptPdf));
    let src = env.upload("broken.pdf", b"not really");

    let done = orchestrator
        .submit_and_wait(env.request(&src, Some("pdf"), "html"))
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Failed);
    let msg = done.error.unwrap();
    assert!(msg.contains("trailer not found"), "got: {msg}");
    assert!(!msg.contains("PANDOC_PATH"), "pandoc must not be spawned: {msg}");
    assert!(env.output_entries().iter().all(|n| !n.ends_with(".source.md")));
}

// ── Live mode with scripted tools ────────────────────────────────────────────

#[cfg(unix)]
mod scripted {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&p, std::fs::Permissions::from_mode(0o755)).unwrap();
        p
    }

    /// A pandoc stand-in that records its arguments and input, then writes
    /// `converted` to the `--output` path (argument 7).
    fn recording_pandoc(env: &Env) -> (PathBuf, PathBuf) {
        let record = env.dir.path().join("record");
        std::fs::create_dir_all(&record).unwrap();
        let body = format!(
            "echo \"$@\" > '{r}/args'\ncp \"$5\" '{r}/input'\nprintf converted > \"$7\"",
            r = record.display()
        );
        (script(env.dir.path(), "pandoc", &body), record)
    }

    #[tokio::test]
    async fn pdf_is_staged_as_markdown_and_cleaned_up() {
        let env = Env::new();
        let (pandoc, record) = recording_pandoc(&env);
        let config = env.config().pandoc_path(&pandoc).build().unwrap();
        let orchestrator =
            Orchestrator::with_extractor(config, Arc::new(FakePdf(vec!["Page one", "Page two"])));
        let src = env.upload("paper.pdf", b"%PDF-1.7");

        let done = orchestrator
            .submit_and_wait(env.request(&src, Some("PDF"), "docx"))
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed, "{:?}", done.error);

        let args = std::fs::read_to_string(record.join("args")).unwrap();
        let intermediate = env
            .outputs()
            .join(format!("paper-{}.source.md", done.id));
        assert!(args.starts_with("--from markdown --to docx "), "{args}");
        assert!(args.contains(&intermediate.display().to_string()), "{args}");

        // pandoc saw the extracted text, and the intermediate is gone now.
        assert_eq!(
            std::fs::read_to_string(record.join("input")).unwrap(),
            "Page one\n\nPage two"
        );
        assert!(!intermediate.exists());

        let out = done.output_path.unwrap();
        assert_eq!(out, env.outputs().join(format!("paper-{}.docx", done.id)));
        assert_eq!(std::fs::read_to_string(out).unwrap(), "converted");
    }

    #[tokio::test]
    async fn pdf_intermediate_removed_when_pandoc_fails() {
        let env = Env::new();
        let pandoc = script(
            env.dir.path(),
            "pandoc",
            "echo 'pandoc: Unknown writer: nope' >&2\nexit 21",
        );
        let config = env.config().pandoc_path(&pandoc).build().unwrap();
        let orchestrator = Orchestrator::with_extractor(config, Arc::new(FakePdf(vec!["x"])));
        let src = env.upload("paper.pdf", b"%PDF-1.7");

        let done = orchestrator
            .submit_and_wait(env.request(&src, Some("pdf"), "nope"))
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Failed);
        assert_eq!(
            done.error.as_deref(),
            Some("pandoc failed: pandoc: Unknown writer: nope")
        );
        assert!(env.output_entries().iter().all(|n| !n.ends_with(".source.md")));
    }

    #[tokio::test]
    async fn legacy_doc_is_normalised_then_converted() {
        let env = Env::new();
        let (pandoc, record) = recording_pandoc(&env);
        // --headless --convert-to docx --outdir <dir> <src>
        let soffice = script(
            env.dir.path(),
            "soffice",
            "name=$(basename \"$6\" .doc)\nprintf DOCX > \"$5/$name.docx\"",
        );
        let config = env
            .config()
            .pandoc_path(&pandoc)
            .office_path(&soffice)
            .build()
            .unwrap();
        let orchestrator = Orchestrator::new(config);
        let src = env.upload("minutes.doc", b"\xd0\xcf\x11\xe0");

        let done = orchestrator
            .submit_and_wait(env.request(&src, Some("doc"), "md"))
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed, "{:?}", done.error);

        let args = std::fs::read_to_string(record.join("args")).unwrap();
        assert!(args.starts_with("--from docx --to markdown "), "{args}");
        assert!(args.contains("minutes.docx"), "{args}");
        assert_eq!(std::fs::read_to_string(record.join("input")).unwrap(), "DOCX");

        // Scratch directory removed; only the artifact is left.
        assert_eq!(
            env.output_entries(),
            vec![format!("minutes-{}.md", done.id)]
        );
    }

    #[tokio::test]
    async fn office_converter_without_output_fails_and_cleans_up() {
        let env = Env::new();
        let (pandoc, record) = recording_pandoc(&env);
        let soffice = script(env.dir.path(), "soffice", "exit 0");
        let config = env
            .config()
            .pandoc_path(&pandoc)
            .office_path(&soffice)
            .build()
            .unwrap();
        let orchestrator = Orchestrator::new(config);
        let src = env.upload("deck.ppt", b"PPT");

        let done = orchestrator
            .submit_and_wait(env.request(&src, None, "html"))
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Failed);
        assert!(done.error.unwrap().contains(".pptx"));
        assert!(!record.join("args").exists(), "pandoc must not run");
        assert!(env.output_entries().is_empty(), "{:?}", env.output_entries());
    }

    #[tokio::test]
    async fn office_converter_error_is_reported() {
        let env = Env::new();
        let soffice = script(env.dir.path(), "soffice", "echo 'source file could not be loaded' >&2\nexit 1");
        let config = env.config().office_path(&soffice).build().unwrap();
        let orchestrator = Orchestrator::new(config);
        let src = env.upload("sheet.xls", b"XLS");

        let done = orchestrator
            .submit_and_wait(env.request(&src, Some("xls"), "html"))
            .await
            .unwrap();
        assert_eq!(
            done.error.as_deref(),
            Some("office converter failed: source file could not be loaded")
        );
        assert!(env.output_entries().is_empty());
    }

    #[tokio::test]
    async fn shortcut_policy_routes_markdown_targets() {
        let env = Env::new();
        let record = env.dir.path().join("shortcut-args");
        let markitdown = script(
            env.dir.path(),
            "markitdown",
            &format!("echo \"$@\" > '{}'\nprintf '# md' > \"$3\"", record.display()),
        );
        let config = env
            .config()
            .shortcut_policy(ShortcutPolicy::MarkdownTargets)
            .shortcut_path(&markitdown)
            .pandoc_path("/nonexistent/pandoc")
            .build()
            .unwrap();
        let orchestrator = Orchestrator::new(config);
        let src = env.upload("slides.pptx", b"PK");

        let done = orchestrator
            .submit_and_wait(env.request(&src, Some("PPTX"), "markdown"))
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed, "{:?}", done.error);
        let args = std::fs::read_to_string(record).unwrap();
        assert!(args.trim_end().ends_with("--extension pptx"), "{args}");
        assert_eq!(std::fs::read_to_string(done.output_path.unwrap()).unwrap(), "# md");
    }

    #[tokio::test]
    async fn hung_converter_times_out() {
        let env = Env::new();
        let pandoc = script(env.dir.path(), "pandoc", "exec sleep 30");
        let config = env
            .config()
            .pandoc_path(&pandoc)
            .tool_timeout_secs(1)
            .build()
            .unwrap();
        let orchestrator = Orchestrator::new(config);
        let src = env.upload("a.md", b"x");

        let done = orchestrator
            .submit_and_wait(env.request(&src, None, "html"))
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Failed);
        assert!(done.error.unwrap().contains("did not finish within 1s"));
    }
}
