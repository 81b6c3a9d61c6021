// src/testutil.rs
// =============================================================================
// Helpers shared by tests: a throwaway HTTP server on 127.0.0.1 and a
// builder for dist/ trees.
// =============================================================================

use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::path::Path;

// Serves `router` on a random local port for the rest of the test
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// /ok answers 200, /get-only refuses HEAD, /missing is a 404
pub fn test_router() -> Router {
    Router::new()
        .route("/ok", get(|| async { "ok" }))
        .route(
            "/get-only",
            get(|| async { "ok" }).head(|| async { StatusCode::METHOD_NOT_ALLOWED }),
        )
}

/// A route that serves a fixed HTML page
pub fn page(html: &'static str) -> axum::routing::MethodRouter {
    get(move || async move { Html(html) })
}

// Writes files into a dist tree
//
// Example: write_tree(dir, &[("index.html", "<a href=\"/about\">")])
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, contents).unwrap();
    }
}
