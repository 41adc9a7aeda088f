//! End-to-end HTTP tests against the backend router.
//!
//! The hosted OCR provider is replaced by a local axum stub; the Tesseract
//! fallback points at a binary that does not exist.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode},
    routing::post,
    Json, Router,
};
use axum_test::TestServer;
use base64::Engine;
use serde_json::{json, Value};
use tempfile::TempDir;

use textextract_server::{
    blog::BlogStore,
    build_router,
    config::Config,
    ocr::{OcrProviderTrait, OcrService, OcrServiceConfig, OcrSpaceProvider, TesseractProvider, TOTAL_FAILURE_MESSAGE},
    usage::UsageService,
    AppState,
};

#[derive(Clone)]
struct Stub {
    response: Value,
    calls: Arc<AtomicUsize>,
}

async fn stub_parse(State(stub): State<Stub>, _body: Bytes) -> Json<Value> {
    stub.calls.fetch_add(1, Ordering::SeqCst);
    Json(stub.response.clone())
}

/// Local stand-in for the hosted OCR API; returns its endpoint and call counter
async fn spawn_ocr_stub(response: Value) -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/parse/image", post(stub_parse))
        .with_state(Stub {
            response,
            calls: calls.clone(),
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/parse/image", addr), calls)
}

fn ocr_service(endpoint: &str, api_key: Option<&str>) -> OcrService {
    let primary: Arc<dyn OcrProviderTrait> = Arc::new(OcrSpaceProvider::new(
        endpoint,
        api_key.map(str::to_string),
        Duration::from_secs(5),
    ));
    let fallback: Arc<dyn OcrProviderTrait> =
        Arc::new(TesseractProvider::new("/nonexistent/bin/tesseract"));
    OcrService::new(OcrServiceConfig::default(), primary, Some(fallback))
}

async fn server(ocr: OcrService, blog_dir: &Path) -> TestServer {
    let mut config = Config::default();
    config.server.site_url = Some("https://textextract.example".to_string());

    let blog = BlogStore::load(blog_dir).await.unwrap();
    let state = AppState::new(config, ocr, UsageService::in_memory(), blog);
    TestServer::new(build_router(state)).unwrap()
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn png_base64() -> String {
    base64::engine::general_purpose::STANDARD.encode(png_bytes())
}

fn user(id: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-user-id"),
        HeaderValue::from_static(id),
    )
}

fn multipart_body(boundary: &str, field: &str, data: &[u8]) -> Bytes {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.png\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    Bytes::from(body)
}

#[tokio::test]
async fn extract_text_hello_world() {
    let (endpoint, calls) =
        spawn_ocr_stub(json!({ "ParsedResults": [{ "ParsedText": "Hello World" }] })).await;
    let blog_dir = TempDir::new().unwrap();
    let server = server(ocr_service(&endpoint, Some("test-key")), blog_dir.path()).await;

    let (name, value) = user("alice");
    let response = server
        .post("/api/extract-text")
        .add_header(name, value)
        .json(&json!({ "image": format!("data:image/png;base64,{}", png_base64()) }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["text"], "Hello World");
    assert_eq!(body["words"], 2);
    assert_eq!(body["success"], true);
    assert!(body["confidence"].as_f64().unwrap() >= 50.0);
    assert!(body.get("error").is_none());
    assert!(body.get("rawText").is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn free_user_is_blocked_after_three_images() {
    let (endpoint, _calls) =
        spawn_ocr_stub(json!({ "ParsedResults": [{ "ParsedText": "Hello World" }] })).await;
    let blog_dir = TempDir::new().unwrap();
    let server = server(ocr_service(&endpoint, Some("test-key")), blog_dir.path()).await;
    let request = json!({ "image": png_base64() });

    for _ in 0..3 {
        let (name, value) = user("bob");
        let response = server
            .post("/api/extract-text")
            .add_header(name, value)
            .json(&request)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    let (name, value) = user("bob");
    let response = server
        .post("/api/extract-text")
        .add_header(name, value)
        .json(&request)
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["upgradeRequired"], true);
    assert_eq!(body["usage"]["imageCount"], 3);
    assert_eq!(body["usage"]["dailyLimit"], 3);

    let (name, value) = user("bob");
    let usage: Value = server.get("/api/usage").add_header(name, value).await.json();
    assert_eq!(usage["canProcess"], false);

    // Other users keep their own allowance
    let (name, value) = user("carol");
    let usage: Value = server.get("/api/usage").add_header(name, value).await.json();
    assert_eq!(usage["canProcess"], true);
    assert_eq!(usage["imageCount"], 0);
}

#[tokio::test]
async fn invalid_image_is_rejected_before_any_provider_call() {
    let (endpoint, calls) = spawn_ocr_stub(json!({})).await;
    let blog_dir = TempDir::new().unwrap();
    let server = server(ocr_service(&endpoint, Some("test-key")), blog_dir.path()).await;

    let not_an_image = base64::engine::general_purpose::STANDARD.encode(b"plain text, not pixels");
    let response = server
        .post("/api/extract-text")
        .json(&json!({ "image": not_an_image }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["success"], false);

    let response = server.post("/api/extract-text").json(&json!({ "image": "" })).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Nothing was recorded against the anonymous user
    let usage: Value = server.get("/api/usage").await.json();
    assert_eq!(usage["userId"], "anonymous");
    assert_eq!(usage["imageCount"], 0);
}

#[tokio::test]
async fn total_failure_returns_terminal_message() {
    let (endpoint, calls) = spawn_ocr_stub(json!({
        "IsErroredOnProcessing": true,
        "ErrorMessage": ["Unable to recognize the file type"]
    }))
    .await;
    let blog_dir = TempDir::new().unwrap();
    let server = server(ocr_service(&endpoint, Some("test-key")), blog_dir.path()).await;

    let response = server
        .post("/api/extract-text")
        .json(&json!({ "image": png_base64() }))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], TOTAL_FAILURE_MESSAGE);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn multipart_extract_returns_raw_provider_response() {
    let (endpoint, _calls) =
        spawn_ocr_stub(json!({ "ParsedResults": [{ "ParsedText": "Invoice 42" }], "OCRExitCode": 1 })).await;
    let blog_dir = TempDir::new().unwrap();
    let server = server(ocr_service(&endpoint, Some("test-key")), blog_dir.path()).await;
    let boundary = "textextract-boundary";
    let content_type = format!("multipart/form-data; boundary={}", boundary);

    let response = server
        .post("/api/extract")
        .content_type(&content_type)
        .bytes(multipart_body(boundary, "file", &png_bytes()))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["text"], "Invoice 42");
    assert_eq!(body["raw"]["OCRExitCode"], 1);

    let response = server
        .post("/api/extract")
        .content_type(&content_type)
        .bytes(multipart_body(boundary, "other", &png_bytes()))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn multipart_extract_without_api_key_is_500() {
    let (endpoint, calls) = spawn_ocr_stub(json!({})).await;
    let blog_dir = TempDir::new().unwrap();
    let server = server(ocr_service(&endpoint, None), blog_dir.path()).await;
    let boundary = "textextract-boundary";

    let response = server
        .post("/api/extract")
        .content_type(&format!("multipart/form-data; boundary={}", boundary))
        .bytes(multipart_body(boundary, "file", &png_bytes()))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn blog_and_sitemap() {
    let blog_dir = TempDir::new().unwrap();
    std::fs::write(
        blog_dir.path().join("receipts.md"),
        "---\ntitle: Scanning Receipts\nexcerpt: Tips.\npublishedDate: 2024-04-02\ntags: [tips]\n---\n\nKeep the receipt flat.\n",
    )
    .unwrap();
    let server = server(ocr_service("http://127.0.0.1:9/parse/image", None), blog_dir.path()).await;

    let list: Value = server.get("/api/blog").await.json();
    assert_eq!(list["total"], 1);
    assert_eq!(list["articles"][0]["slug"], "receipts");
    assert!(list["articles"][0].get("content").is_none());

    let article: Value = server.get("/api/blog/receipts").await.json();
    assert_eq!(article["title"], "Scanning Receipts");
    assert_eq!(article["content"], "Keep the receipt flat.");
    assert_eq!(article["readingTime"], 1);

    let response = server.get("/api/blog/missing").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let sitemap = server.get("/sitemap.xml").await.text();
    assert_eq!(sitemap.matches("<url>").count(), 7);
    assert!(sitemap.contains(
        "<loc>https://textextract.example/blog/receipts</loc><lastmod>2024-04-02</lastmod>"
    ));

    std::fs::write(
        blog_dir.path().join("tables.md"),
        "---\ntitle: Tables\npublishedDate: 2024-05-01\n---\nRows and columns.\n",
    )
    .unwrap();
    let refreshed: Value = server.post("/api/blog/refresh").await.json();
    assert_eq!(refreshed["articles"], 2);

    let list: Value = server.get("/api/blog").await.json();
    assert_eq!(list["articles"][0]["slug"], "tables");
}
