//! File Streaming Server
//!
//! Serves collection media over HTTP, independently of the message
//! protocol. The leading path segment picks a sandboxed root; the rest is
//! resolved strictly inside it. GET and HEAD emit the same headers, only
//! GET streams a body, and `Range: bytes=start-end` requests get a bounded
//! 206 stream.

use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::warn;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;

use crate::backend::BackState;

/// Run the file server on an already-bound listener.
pub async fn run_file_server(state: Arc<BackState>, listener: TcpListener) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// The namespace routes. Anything outside them is 404.
pub fn router(state: Arc<BackState>) -> Router {
    Router::new()
        .route("/images/*path", get(serve_images))
        .route("/videos/*path", get(serve_videos))
        .route("/themes/*path", get(serve_themes))
        .route("/logos/*path", get(serve_logos))
        .route("/exo/*path", get(serve_exo))
        .with_state(state)
}

async fn serve_images(
    State(state): State<Arc<BackState>>,
    method: Method,
    headers: HeaderMap,
    Path(rest): Path<String>,
) -> Response {
    let root = state.config.read().image_root();
    serve_within(&root, &rest, &method, &headers).await
}

async fn serve_videos(
    State(state): State<Arc<BackState>>,
    method: Method,
    headers: HeaderMap,
    Path(rest): Path<String>,
) -> Response {
    let root = state.config.read().video_root();
    serve_within(&root, &rest, &method, &headers).await
}

async fn serve_themes(
    State(state): State<Arc<BackState>>,
    method: Method,
    headers: HeaderMap,
    Path(rest): Path<String>,
) -> Response {
    let root = state.config.read().theme_root();
    serve_within(&root, &rest, &method, &headers).await
}

async fn serve_logos(
    State(state): State<Arc<BackState>>,
    method: Method,
    headers: HeaderMap,
    Path(rest): Path<String>,
) -> Response {
    let root = state.config.read().logo_root();
    serve_within(&root, &rest, &method, &headers).await
}

/// The `exo/` namespace serves document files straight from the collection
/// root; everything but `.html`, `.htm` and `.txt` is refused.
async fn serve_exo(
    State(state): State<Arc<BackState>>,
    method: Method,
    headers: HeaderMap,
    Path(rest): Path<String>,
) -> Response {
    let extension = FsPath::new(&rest)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !matches!(extension.as_str(), "html" | "htm" | "txt") {
        return not_found();
    }
    let root = state.config.read().collection_path.clone();
    serve_within(&root, &format!("exo/{rest}"), &method, &headers).await
}

async fn serve_within(
    root: &FsPath,
    rest: &str,
    method: &Method,
    headers: &HeaderMap,
) -> Response {
    match resolve_within(root, rest) {
        Some(path) => serve_file(&path, method, headers).await,
        None => not_found(),
    }
}

/// Join a request path onto its root, refusing anything that would step
/// outside it. Only plain components are accepted; the joined result must
/// still begin with the root.
fn resolve_within(root: &FsPath, rest: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in FsPath::new(rest).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if path.starts_with(root) {
        Some(path)
    } else {
        None
    }
}

/// How a `Range` header applies to a file of known size.
#[derive(Debug, PartialEq, Eq)]
enum RangeRequest {
    Satisfiable { start: u64, end: u64 },
    Unsatisfiable,
}

/// Parse `bytes=start-end` (end optional, clamped to the file size).
/// `None` means the header is not a usable range and the request falls back
/// to a full response.
fn parse_range(header: &str, size: u64) -> Option<RangeRequest> {
    let spec = header.strip_prefix("bytes=")?;
    let (start_raw, end_raw) = spec.split_once('-')?;
    let start: u64 = start_raw.trim().parse().ok()?;
    let end: u64 = if end_raw.trim().is_empty() {
        size.saturating_sub(1)
    } else {
        end_raw.trim().parse().ok()?
    };
    let end = end.min(size.saturating_sub(1));
    if size == 0 || start >= size || start > end {
        return Some(RangeRequest::Unsatisfiable);
    }
    Some(RangeRequest::Satisfiable { start, end })
}

async fn serve_file(path: &FsPath, method: &Method, headers: &HeaderMap) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return not_found();
    }
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return not_found(),
    };
    let size = metadata.len();
    let content_type = content_type_for(path);

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_range(value, size));

    match range {
        Some(RangeRequest::Satisfiable { start, end }) => {
            let length = end - start + 1;
            let response_headers = [
                (header::CONTENT_RANGE, format!("bytes {start}-{end}/{size}")),
                (header::ACCEPT_RANGES, "bytes".to_string()),
                (header::CONTENT_LENGTH, length.to_string()),
                (header::CONTENT_TYPE, content_type.to_string()),
            ];
            if method == Method::HEAD {
                return (StatusCode::PARTIAL_CONTENT, response_headers, Body::empty())
                    .into_response();
            }
            let mut file = match tokio::fs::File::open(path).await {
                Ok(file) => file,
                Err(_) => return not_found(),
            };
            if file.seek(std::io::SeekFrom::Start(start)).await.is_err() {
                return not_found();
            }
            // The stream is bounded to [start, end]; a read error mid-way
            // aborts the response body without touching the server.
            let stream = ReaderStream::new(file.take(length));
            (
                StatusCode::PARTIAL_CONTENT,
                response_headers,
                Body::from_stream(stream),
            )
                .into_response()
        }
        Some(RangeRequest::Unsatisfiable) => (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{size}"))],
            Body::empty(),
        )
            .into_response(),
        None => {
            let response_headers = [
                (header::CONTENT_LENGTH, size.to_string()),
                (header::CONTENT_TYPE, content_type.to_string()),
            ];
            if method == Method::HEAD {
                return (StatusCode::OK, response_headers, Body::empty()).into_response();
            }
            let file = match tokio::fs::File::open(path).await {
                Ok(file) => file,
                Err(error) => {
                    warn!("Failed to open {}: {error}", path.display());
                    return not_found();
                }
            };
            (
                StatusCode::OK,
                response_headers,
                Body::from_stream(ReaderStream::new(file)),
            )
                .into_response()
        }
    }
}

fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

fn content_type_for(path: &FsPath) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_header(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, value.parse().unwrap());
        headers
    }

    fn header_str<'a>(response: &'a Response, name: header::HeaderName) -> &'a str {
        response
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }

    async fn body_len(response: Response) -> usize {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .len()
    }

    #[test]
    fn traversal_attempts_are_rejected() {
        let root = FsPath::new("/data/Images");
        assert_eq!(
            resolve_within(root, "Box/doom.png"),
            Some(PathBuf::from("/data/Images/Box/doom.png"))
        );
        assert_eq!(resolve_within(root, "../secret.txt"), None);
        assert_eq!(resolve_within(root, "a/../../secret.txt"), None);
        assert_eq!(resolve_within(root, "/etc/passwd"), None);
        assert_eq!(
            resolve_within(root, "./a/./b.png"),
            Some(PathBuf::from("/data/Images/a/b.png"))
        );
    }

    #[test]
    fn ranges_parse_clamp_and_reject() {
        assert_eq!(
            parse_range("bytes=100-199", 1000),
            Some(RangeRequest::Satisfiable { start: 100, end: 199 })
        );
        // Open-ended ranges run to the last byte.
        assert_eq!(
            parse_range("bytes=100-", 1000),
            Some(RangeRequest::Satisfiable { start: 100, end: 999 })
        );
        // Ends are clamped to the file size.
        assert_eq!(
            parse_range("bytes=0-5000", 1000),
            Some(RangeRequest::Satisfiable { start: 0, end: 999 })
        );
        assert_eq!(parse_range("bytes=1000-", 1000), Some(RangeRequest::Unsatisfiable));
        assert_eq!(parse_range("bytes=5-2", 1000), Some(RangeRequest::Unsatisfiable));
        assert_eq!(parse_range("bytes=0-", 0), Some(RangeRequest::Unsatisfiable));
        // Malformed headers fall back to a full response.
        assert_eq!(parse_range("bytes=abc-", 1000), None);
        assert_eq!(parse_range("items=0-1", 1000), None);
        assert_eq!(parse_range("bytes=-500", 1000), None);
    }

    #[tokio::test]
    async fn range_requests_get_bounded_206_responses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp4");
        std::fs::write(&path, vec![7u8; 1000]).unwrap();

        let response = serve_file(&path, &Method::GET, &range_header("bytes=100-199")).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            header_str(&response, header::CONTENT_RANGE),
            "bytes 100-199/1000"
        );
        assert_eq!(header_str(&response, header::ACCEPT_RANGES), "bytes");
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), "100");
        assert_eq!(header_str(&response, header::CONTENT_TYPE), "video/mp4");
        assert_eq!(body_len(response).await, 100);
    }

    #[tokio::test]
    async fn plain_requests_get_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.png");
        std::fs::write(&path, vec![7u8; 1000]).unwrap();

        let response = serve_file(&path, &Method::GET, &HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), "1000");
        assert_eq!(header_str(&response, header::CONTENT_TYPE), "image/png");
        assert_eq!(body_len(response).await, 1000);
    }

    #[tokio::test]
    async fn head_requests_emit_headers_without_a_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.png");
        std::fs::write(&path, vec![7u8; 1000]).unwrap();

        let response = serve_file(&path, &Method::HEAD, &HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), "1000");
        assert_eq!(body_len(response).await, 0);

        let response = serve_file(&path, &Method::HEAD, &range_header("bytes=0-9")).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), "10");
        assert_eq!(body_len(response).await, 0);
    }

    #[tokio::test]
    async fn unsatisfiable_ranges_get_416() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.png");
        std::fs::write(&path, vec![7u8; 10]).unwrap();

        let response = serve_file(&path, &Method::GET, &range_header("bytes=10-20")).await;
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(header_str(&response, header::CONTENT_RANGE), "bytes */10");
    }

    #[tokio::test]
    async fn missing_files_directories_and_odd_methods_are_404() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.png");
        let response = serve_file(&missing, &Method::GET, &HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // A directory is not a regular file.
        let response = serve_file(dir.path(), &Method::GET, &HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let real = dir.path().join("file.txt");
        std::fs::write(&real, b"hello").unwrap();
        let response = serve_file(&real, &Method::POST, &HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
