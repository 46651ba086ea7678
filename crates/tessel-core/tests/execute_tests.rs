//! Page executor pipeline with a fake script runtime.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tessel_core::error::RenderError;
use tessel_core::{ExecutionRequest, PageExecutor, ScriptRuntime};
use tempfile::TempDir;

/// Runtime standing in for a browser: it "executes" the page by filling
/// the `#out` element, the way a server script would.
#[derive(Default)]
struct FakeRuntime {
    requests: Mutex<Vec<ExecutionRequest>>,
    throw: bool,
}

#[async_trait]
impl ScriptRuntime for FakeRuntime {
    async fn run(&self, request: ExecutionRequest) -> Result<String, RenderError> {
        self.requests.lock().push(request.clone());
        if self.throw {
            return Err(RenderError::ServerScript("ReferenceError: nope is not defined".into()));
        }
        Ok(request
            .html
            .replace(r#"<div id="out"></div>"#, r#"<div id="out"><li>rendered</li></div>"#))
    }
}

const PAGE: &str = r#"<html><head><script dev-only src="/livereload.js"></script></head><body>
<trans-md># Hi</trans-md>
<trans-inc src="partials/footer.html"></trans-inc>
<div id="out"></div>
<script side="server">document.getElementById("out").innerHTML = "<li>rendered</li>";</script>
<script side="server client" src="shared.js"></script>
<script src="app.js.bundle.js" side="client"></script>
</body></html>"#;

fn output_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("partials")).unwrap();
    std::fs::write(dir.path().join("partials/footer.html"), "<footer>fin</footer>").unwrap();
    dir
}

#[tokio::test]
async fn test_render_runs_every_stage() {
    let dir = output_dir();
    let runtime = Arc::new(FakeRuntime::default());
    let executor = PageExecutor::new().with_runtime(runtime.clone());

    let html = executor.render_page(PAGE, dir.path(), Some("index.html")).await.unwrap();

    assert!(!html.contains("livereload"));
    assert!(html.contains("<h1>Hi</h1>"));
    assert!(html.contains("<footer>fin</footer>"));
    assert!(html.contains(r#"<div id="out"><li>rendered</li></div>"#));
    assert!(!html.contains("getElementById"));
    assert!(html.contains(r#"<script src="shared.js"></script>"#));
    assert!(html.contains(r#"<script src="app.js.bundle.js" side="client"></script>"#));
    assert!(!html.contains("trans-"));
    assert!(!html.contains("data-tessel"));

    let requests = runtime.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].page.as_deref(), Some("index.html"));
    assert_eq!(requests[0].output_dir, dir.path());
    assert!(!requests[0].html.contains("<script"));
}

#[tokio::test]
async fn test_throwing_server_script_aborts_render() {
    let dir = output_dir();
    let runtime = Arc::new(FakeRuntime {
        throw: true,
        ..FakeRuntime::default()
    });
    let executor = PageExecutor::new().with_runtime(runtime);

    let err = executor.render(PAGE, dir.path()).await.unwrap_err();
    assert!(matches!(err, RenderError::ServerScript(message) if message.contains("nope")));
}

#[tokio::test]
async fn test_client_only_page_never_reaches_runtime() {
    let dir = output_dir();
    let runtime = Arc::new(FakeRuntime::default());
    let executor = PageExecutor::new().with_runtime(runtime.clone());

    let html = executor
        .render(r#"<body><script src="a.js"></script><trans-md>*x*</trans-md></body>"#, dir.path())
        .await
        .unwrap();

    assert!(html.contains("<em>x</em>"));
    assert!(html.contains(r#"<script src="a.js"></script>"#));
    assert!(runtime.requests.lock().is_empty());
}

#[tokio::test]
async fn test_missing_include_aborts_before_scripts_run() {
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(FakeRuntime::default());
    let executor = PageExecutor::new().with_runtime(runtime.clone());

    let err = executor.render(PAGE, dir.path()).await.unwrap_err();
    assert!(matches!(err, RenderError::MissingInclude(_)));
    assert!(runtime.requests.lock().is_empty());
}
