use std::io::Cursor;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use facestore::blob::LocalBlobStore;
use facestore::config::IngestOptions;
use facestore::encoder::{Encoder, embedding_to_bytes};
use facestore::server::{AppState, create_app};
use facestore::{FaceDB, db};
use rstest::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "facestore-boundary";
const UPLOAD_LIMIT: usize = 1024 * 1024;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    pool: db::Database,
    _media: TempDir,
}

impl TestApp {
    async fn new(encoder: Arc<dyn Encoder>, allow_anonymous: bool, upload_limit: usize) -> Self {
        let media = tempfile::tempdir().unwrap();
        let pool = db::init_memory_db().await.unwrap();
        let db = FaceDB::from_pool(pool.clone());
        let blob = Arc::new(LocalBlobStore::new(media.path()).unwrap());
        let opts = IngestOptions { encode_timeout: 5, workers: Some(2) };
        let state = AppState::new(db, blob, encoder, &opts, allow_anonymous);
        let router = create_app(state.clone(), upload_limit);
        Self { router, state, pool, _media: media }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn upload(&self, field: &str, file_name: &str, contents: &[u8]) -> (StatusCode, Value) {
        self.send(upload_request(field, file_name, contents)).await
    }
}

fn upload_request(field: &str, file_name: &str, contents: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::post("/face-image/")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header(CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

fn png_image() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 180, 160]));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn face_encoder(embedding: Vec<f64>) -> Arc<dyn Encoder> {
    Arc::new(move |_: &[u8]| -> anyhow::Result<Vec<Vec<f64>>> { Ok(vec![embedding.clone()]) })
}

fn no_face_encoder() -> Arc<dyn Encoder> {
    Arc::new(|_: &[u8]| -> anyhow::Result<Vec<Vec<f64>>> { Ok(vec![]) })
}

#[fixture]
fn png() -> Vec<u8> {
    png_image()
}

fn error_of(body: &Value) -> (&str, Option<&str>) {
    assert_eq!(body["result"], Value::Null);
    (body["error"]["message"].as_str().unwrap(), body["error"]["extra"].as_str())
}

#[rstest]
#[tokio::test]
async fn upload_then_fetch(png: Vec<u8>) {
    let app = TestApp::new(face_encoder(vec![0.5, -1.0]), true, UPLOAD_LIMIT).await;

    let (status, body) = app.upload("face_image", "face.png", &png).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["error"], Value::Null);
    assert_eq!(body["result"]["message"], Value::Null);
    let created = &body["result"]["data"][0];
    assert_eq!(created["encoding_status"], "SUCCESS");
    let encoding = BASE64_STANDARD.encode(embedding_to_bytes(&[0.5, -1.0]));
    assert_eq!(created["face_encoding"], encoding);

    let public_id = created["public_id"].as_str().unwrap();
    let (status, body) = app.get(&format!("/face-image/{public_id}/")).await;
    assert_eq!(status, StatusCode::OK);
    let detail = &body["result"]["data"][0];
    assert_eq!(detail["face_encoding"], encoding);
    assert_eq!(detail["encoding_status"], "SUCCESS");
    assert_eq!(detail["created_at"], created["created_at"]);
    assert!(detail.get("public_id").is_none());
}

#[rstest]
#[tokio::test]
async fn upload_without_face(png: Vec<u8>) {
    let app = TestApp::new(no_face_encoder(), true, UPLOAD_LIMIT).await;

    let (status, body) = app.upload("face_image", "empty.png", &png).await;
    assert_eq!(status, StatusCode::CREATED);
    let created = &body["result"]["data"][0];
    assert_eq!(created["encoding_status"], "FAILED");
    assert_eq!(created["face_encoding"], "");
}

#[rstest]
#[tokio::test]
async fn upload_encoder_failure(png: Vec<u8>) {
    let encoder: Arc<dyn Encoder> =
        Arc::new(|_: &[u8]| -> anyhow::Result<Vec<Vec<f64>>> { anyhow::bail!("model crashed") });
    let app = TestApp::new(encoder, true, UPLOAD_LIMIT).await;

    let (status, body) = app.upload("face_image", "face.png", &png).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (message, extra) = error_of(&body);
    assert_eq!(message, "Exception occurred while encoding face image: model crashed");
    assert_eq!(extra, None);
}

#[rstest]
#[case::missing_file("other", b"abc".to_vec(), "No file was submitted.")]
#[case::empty_file("face_image", vec![], "The submitted file is empty.")]
#[case::not_an_image(
    "face_image",
    b"definitely not an image".to_vec(),
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
)]
#[tokio::test]
async fn upload_validation(#[case] field: &str, #[case] contents: Vec<u8>, #[case] expected: &str) {
    let app = TestApp::new(no_face_encoder(), true, UPLOAD_LIMIT).await;

    let (status, body) = app.upload(field, "face.png", &contents).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), (expected, Some("face_image")));
}

#[rstest]
#[tokio::test]
async fn upload_too_large(png: Vec<u8>) {
    let app = TestApp::new(no_face_encoder(), true, 16).await;

    let (status, body) = app.upload("face_image", "face.png", &png).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let (message, _) = error_of(&body);
    assert!(!message.is_empty());
}

#[rstest]
#[case::unknown("/face-image/00000000-0000-4000-8000-000000000000/")]
#[case::malformed("/face-image/not-a-uuid/")]
#[case::unknown_route("/nothing-here/")]
#[tokio::test]
async fn not_found(#[case] uri: &str) {
    let app = TestApp::new(no_face_encoder(), true, UPLOAD_LIMIT).await;

    let (status, body) = app.get(uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_of(&body), ("Not found.", None));
}

#[rstest]
#[tokio::test]
async fn method_not_allowed() {
    let app = TestApp::new(no_face_encoder(), true, UPLOAD_LIMIT).await;

    let req = Request::delete("/health-check/").body(Body::empty()).unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(error_of(&body), ("Method \"DELETE\" not allowed.", None));
}

#[rstest]
#[tokio::test]
async fn status_stats(png: Vec<u8>) {
    let app = TestApp::new(face_encoder(vec![1.0]), true, UPLOAD_LIMIT).await;

    let (status, body) = app.get("/face-image/stats/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!({"message": null, "data": []}));

    app.upload("face_image", "a.png", &png).await;
    app.upload("face_image", "b.png", &png).await;

    let (_, body) = app.get("/face-image/stats/").await;
    assert_eq!(body["result"]["data"], json!([{"encoding_status": "SUCCESS", "count": 2}]));
}

#[rstest]
#[tokio::test]
async fn average_encodings(png: Vec<u8>) {
    let app = TestApp::new(face_encoder(vec![1.0, 3.0]), true, UPLOAD_LIMIT).await;

    let (status, body) = app.get("/face-image/avg-encodings/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), ("No face encodings found.", None));

    app.upload("face_image", "face.png", &png).await;
    let (status, body) = app.get("/face-image/avg-encodings/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), ("Insufficient face encodings to calculate average.", None));

    // 同名文件会被存储为不同的位置
    app.upload("face_image", "face.png", &png).await;
    let (status, body) = app.get("/face-image/avg-encodings/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["result"],
        json!({"message": null, "data": [{"average_face_encoding": [1.0, 3.0]}]})
    );
}

#[rstest]
#[tokio::test]
async fn health_check() {
    let app = TestApp::new(no_face_encoder(), false, UPLOAD_LIMIT).await;

    let (status, body) = app.get("/health-check/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": {"message": "Service is healthy.", "data": []}, "error": null}));
}

#[rstest]
#[tokio::test]
async fn health_check_database_failure() {
    let app = TestApp::new(no_face_encoder(), true, UPLOAD_LIMIT).await;
    app.pool.close().await;

    let (status, body) = app.get("/health-check/").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"result": null, "error": {"message": "Database failure!", "extra": null}}));
}

#[rstest]
#[case::missing(None, "Authentication credentials were not provided.")]
#[case::empty(Some(""), "Authentication credentials were not provided.")]
#[case::no_key(Some("Api-Key"), "Invalid API key.")]
#[case::wrong_key(Some("Api-Key abcdefgh.0000"), "Invalid API key.")]
#[tokio::test]
async fn authentication_required(#[case] header: Option<&str>, #[case] expected: &str) {
    let app = TestApp::new(no_face_encoder(), false, UPLOAD_LIMIT).await;

    let mut req = Request::get("/face-image/stats/");
    if let Some(header) = header {
        req = req.header(AUTHORIZATION, header);
    }
    let (status, body) = app.send(req.body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_of(&body), (expected, None));
}

#[rstest]
#[tokio::test]
async fn empty_authorization_is_anonymous() {
    let app = TestApp::new(no_face_encoder(), true, UPLOAD_LIMIT).await;

    let req = Request::get("/face-image/stats/").header(AUTHORIZATION, "").body(Body::empty()).unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], Value::Null);
}

#[rstest]
#[tokio::test]
async fn authentication_with_key(png: Vec<u8>) {
    let app = TestApp::new(no_face_encoder(), false, UPLOAD_LIMIT).await;
    let (_, key) = app.state.db.create_api_key("test").await.unwrap();

    let req = Request::get("/face-image/stats/")
        .header(AUTHORIZATION, format!("Api-Key {key}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);

    let mut req = upload_request("face_image", "face.png", &png);
    req.headers_mut().insert(AUTHORIZATION, format!("Bearer {key}").parse().unwrap());
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::CREATED);

    let prefix = key.split_once('.').unwrap().0;
    app.state.db.revoke_api_key(prefix).await.unwrap();
    let req = Request::get("/face-image/stats/")
        .header(AUTHORIZATION, format!("Api-Key {key}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
