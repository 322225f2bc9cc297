use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequestParts, Path, State},
    http::{header, request::Parts, Method},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use dlms_shared::error::SessionError;
use dlms_shared::protocol::{
    CreateLicenseRequest, DeleteLicenseRequest, HealthResponse, SuccessResponse,
    UpdateLicenseRequest, VerifyRequest, VerifyResponse, WriteResponse,
};
use dlms_shared::session::SessionToken;
use dlms_shared::types::License;
use dlms_shared::upload::sniff_content_type;
use dlms_store::Database;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::blob_store::BlobStore;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::licenses::{self, Submission};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::sessions::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub blob_store: Arc<BlobStore>,
    pub sessions: SessionManager,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    // Two base64 images plus the form fields.
    let body_limit = state.config.max_image_size * 3 + 1024 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route("/api/admin/verify", post(admin_verify))
        .route("/api/admin/logout", post(admin_logout))
        .route("/api/admin/create-license", post(create_license))
        .route("/api/admin/update-license", post(update_license))
        .route("/api/admin/delete-license", delete(delete_license))
        .route("/api/licenses", get(list_licenses))
        .route("/api/licenses/:id", get(get_license))
        .route("/storage/:bucket/*path", get(storage_object))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A request carrying a live `Authorization: Bearer` admin session.
pub struct AdminSession(pub SessionToken);

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ServerError::Unauthorized(SessionError::Malformed))?;

        let token = state.sessions.check(bearer).await?;
        Ok(AdminSession(token))
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn admin_verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ServerError> {
    let req = json_body(payload)?;

    let token = state
        .sessions
        .login(req.email.as_deref(), &req.password)
        .map_err(|e| {
            warn!("Rejected admin login");
            e
        })?;

    Ok(Json(VerifyResponse {
        success: true,
        token: token.encode(),
        expiry: token.expires_at,
    }))
}

async fn admin_logout(
    State(state): State<AppState>,
    AdminSession(token): AdminSession,
) -> Json<SuccessResponse> {
    state.sessions.revoke(&token).await;
    Json(SuccessResponse { success: true })
}

async fn create_license(
    State(state): State<AppState>,
    payload: Result<Json<CreateLicenseRequest>, JsonRejection>,
) -> Result<Json<WriteResponse>, ServerError> {
    let req = json_body(payload)?;
    state.sessions.check(&req.admin_token).await?;

    let license = licenses::create(
        &state,
        Submission {
            form: req.license_data,
            image_base64: req.image_base64,
            signature_base64: req.signature_base64,
        },
    )
    .await?;

    Ok(Json(WriteResponse {
        success: true,
        id: license.id,
    }))
}

async fn update_license(
    State(state): State<AppState>,
    payload: Result<Json<UpdateLicenseRequest>, JsonRejection>,
) -> Result<Json<WriteResponse>, ServerError> {
    let req = json_body(payload)?;
    state.sessions.check(&req.admin_token).await?;

    let license = licenses::update(
        &state,
        req.id,
        Submission {
            form: req.license_data,
            image_base64: req.image_base64,
            signature_base64: req.signature_base64,
        },
    )
    .await?;

    Ok(Json(WriteResponse {
        success: true,
        id: license.id,
    }))
}

async fn delete_license(
    State(state): State<AppState>,
    payload: Result<Json<DeleteLicenseRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ServerError> {
    let req = json_body(payload)?;
    state.sessions.check(&req.admin_token).await?;

    licenses::delete(&state, req.id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn list_licenses(
    State(state): State<AppState>,
    _session: AdminSession,
) -> Result<Json<Vec<License>>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.list_licenses()?))
}

async fn get_license(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<License>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.get_license(id)?))
}

async fn storage_object(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state.blob_store.get(&bucket, &path).await?;
    let content_type = sniff_content_type(&data);
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            // Object paths are timestamped and never rewritten.
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        data,
    ))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use dlms_shared::constants::PHOTO_BUCKET;
    use dlms_shared::protocol::ErrorResponse;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const SECRET: &str = "hunter22";

    /// Format sniffing only looks at the leading signature.
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR-test-png";
    const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF-test-jpeg";

    async fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut config = ServerConfig::with_credentials(SECRET, "admin@dlms.pk");
        config.blob_storage_path = dir.path().join("storage");
        config.public_base_url = "http://dlms.test".to_string();

        let blob_store = BlobStore::new(config.blob_storage_path.clone(), &config.public_base_url)
            .await
            .unwrap();

        let state = AppState {
            db: Arc::new(Mutex::new(Database::open_in_memory().unwrap())),
            blob_store: Arc::new(blob_store),
            sessions: SessionManager::new(SECRET, "admin@dlms.pk"),
            rate_limiter: RateLimiter::default(),
            config: Arc::new(config),
        };
        (state, dir)
    }

    fn token(state: &AppState) -> String {
        state.sessions.login(None, SECRET).unwrap().encode()
    }

    fn data_url(bytes: &[u8], mime: &str) -> String {
        format!("data:{mime};base64,{}", STANDARD.encode(bytes))
    }

    fn form(license_no: &str) -> Value {
        json!({
            "cnic": "12345-1234567-1",
            "name": "Muhammad Ahmed",
            "father_name": "Khalid Ahmed",
            "address": "123 Main Street, Islamabad, Pakistan",
            "height": "5'10\"",
            "blood_group": "O+",
            "date_of_birth": "1990-05-15",
            "license_no": license_no,
            "license_types": ["mcycle", "carjeep"],
            "issue_city": "Islamabad",
            "valid_from": "2023-01-01",
            "valid_to": "2028-01-01"
        })
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn bearer_get(uri: &str, bearer: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = build_router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn create(state: &AppState, license_no: &str) -> (StatusCode, Value) {
        let body = json!({
            "adminToken": token(state),
            "licenseData": form(license_no),
            "imageBase64": data_url(JPEG, "image/jpeg"),
            "signatureBase64": data_url(PNG, "image/png"),
        });
        let (status, body) = send(state, json_request(Method::POST, "/api/admin/create-license", body)).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn fetch(state: &AppState, id: &str) -> License {
        let (status, body) = send(state, bearer_get(&format!("/api/licenses/{id}"), &token(state))).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    async fn object_count(state: &AppState) -> usize {
        let mut count = 0;
        for bucket in crate::blob_store::BUCKETS {
            let dir = state.config.blob_storage_path.join(bucket).join("12345-1234567-1");
            if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
                while let Some(_) = entries.next_entry().await.unwrap() {
                    count += 1;
                }
            }
        }
        count
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _dir) = test_state().await;
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
    }

    #[tokio::test]
    async fn test_verify() {
        let (state, _dir) = test_state().await;

        let (status, body) = send(
            &state,
            json_request(Method::POST, "/api/admin/verify", json!({ "password": SECRET })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let resp: VerifyResponse = serde_json::from_slice(&body).unwrap();
        assert!(resp.success);
        assert!(state.sessions.check(&resp.token).await.is_ok());

        let (status, body) = send(
            &state,
            json_request(
                Method::POST,
                "/api/admin/verify",
                json!({ "email": "ADMIN@dlms.pk", "password": SECRET }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));

        let (status, body) = send(
            &state,
            json_request(Method::POST, "/api/admin/verify", json!({ "password": "guess" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(!err.success);
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (state, _dir) = test_state().await;

        let (status, body) = create(&state, "ISB-DL-2023-001").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        let id = body["id"].as_str().unwrap().to_string();

        let license = fetch(&state, &id).await;
        assert_eq!(license.data.name, "Muhammad Ahmed");
        assert_eq!(license.data.issue_city, "islamabad");

        let image_url = license.image_url.unwrap();
        let signature_url = license.signature_url.unwrap();
        assert!(image_url.starts_with("http://dlms.test/storage/license-images/12345-1234567-1/photo_"));
        assert!(signature_url.starts_with("http://dlms.test/storage/license-signatures/12345-1234567-1/signature_"));

        // The public URL serves the stored bytes with a sniffed content type.
        let path = image_url.trim_start_matches("http://dlms.test");
        let resp = build_router(state.clone())
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/jpeg");
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], JPEG);
    }

    #[tokio::test]
    async fn test_create_requires_both_images() {
        let (state, _dir) = test_state().await;
        let body = json!({
            "adminToken": token(&state),
            "licenseData": form("ISB-DL-2023-001"),
            "imageBase64": data_url(JPEG, "image/jpeg"),
        });
        let (status, body) = send(&state, json_request(Method::POST, "/api/admin/create-license", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.fields.len(), 1);
        assert_eq!(err.fields[0].field, "signature");
        assert_eq!(object_count(&state).await, 0);
    }

    #[tokio::test]
    async fn test_invalid_form_rejected_before_upload() {
        let (state, _dir) = test_state().await;
        let mut data = form("ISB-DL-2023-001");
        data["cnic"] = json!("12345-123-1");
        data["name"] = json!("Al");
        let body = json!({
            "adminToken": token(&state),
            "licenseData": data,
            "imageBase64": data_url(JPEG, "image/jpeg"),
            "signatureBase64": data_url(JPEG, "image/jpeg"),
        });
        let (status, body) = send(&state, json_request(Method::POST, "/api/admin/create-license", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        let fields: Vec<&str> = err.fields.iter().map(|f| f.field.as_str()).collect();
        assert!(fields.contains(&"cnic"));
        assert!(fields.contains(&"name"));
        // A JPEG is not an accepted signature.
        assert!(fields.contains(&"signature"));

        let (_, list) = send(&state, bearer_get("/api/licenses", &token(&state))).await;
        let list: Vec<License> = serde_json::from_slice(&list).unwrap();
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn test_bad_base64_reported_once() {
        let (state, _dir) = test_state().await;
        let body = json!({
            "adminToken": token(&state),
            "licenseData": form("ISB-DL-2023-001"),
            "imageBase64": "data:image/jpeg;base64,***",
            "signatureBase64": data_url(PNG, "image/png"),
        });
        let (status, body) = send(&state, json_request(Method::POST, "/api/admin/create-license", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.fields.len(), 1);
        assert_eq!(err.fields[0].field, "image");
        assert!(err.fields[0].message.contains("base64"));
    }

    #[tokio::test]
    async fn test_writes_require_valid_token() {
        let (state, _dir) = test_state().await;
        for admin_token in ["", "forged", &"a".repeat(64)] {
            let body = json!({
                "adminToken": admin_token,
                "licenseData": form("ISB-DL-2023-001"),
                "imageBase64": data_url(JPEG, "image/jpeg"),
                "signatureBase64": data_url(PNG, "image/png"),
            });
            let (status, _) = send(&state, json_request(Method::POST, "/api/admin/create-license", body)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        // A token signed with a different secret.
        let other = SessionManager::new("other-secret", "admin@dlms.pk")
            .login(None, "other-secret")
            .unwrap();
        let body = json!({ "id": Uuid::new_v4(), "adminToken": other.encode() });
        let (status, _) = send(&state, json_request(Method::DELETE, "/api/admin/delete-license", body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(object_count(&state).await, 0);
    }

    #[tokio::test]
    async fn test_reads_require_bearer() {
        let (state, _dir) = test_state().await;
        let req = Request::builder().uri("/api/licenses").body(Body::empty()).unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&state, bearer_get("/api/licenses", "nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&state, bearer_get("/api/licenses", &token(&state))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let (state, _dir) = test_state().await;
        let bearer = token(&state);

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/admin/logout")
            .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&state, bearer_get("/api/licenses", &bearer)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_update_without_images_keeps_urls() {
        let (state, _dir) = test_state().await;
        let (_, created) = create(&state, "ISB-DL-2023-001").await;
        let id = created["id"].as_str().unwrap().to_string();
        let before = fetch(&state, &id).await;

        let mut data = form("ISB-DL-2023-001");
        data["address"] = json!("House 7, Street 12, F-8/3, Islamabad");
        let body = json!({
            "id": id,
            "adminToken": token(&state),
            "licenseData": data,
        });
        let (status, body) = send(&state, json_request(Method::POST, "/api/admin/update-license", body)).await;
        assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));

        let after = fetch(&state, &id).await;
        assert_eq!(after.data.address, "House 7, Street 12, F-8/3, Islamabad");
        assert_eq!(after.image_url, before.image_url);
        assert_eq!(after.signature_url, before.signature_url);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let (state, _dir) = test_state().await;
        let body = json!({
            "id": Uuid::new_v4(),
            "adminToken": token(&state),
            "licenseData": form("ISB-DL-2023-001"),
        });
        let (status, _) = send(&state, json_request(Method::POST, "/api/admin/update-license", body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_license_no_removes_new_uploads() {
        let (state, _dir) = test_state().await;
        let (status, _) = create(&state, "ISB-DL-2023-001").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(object_count(&state).await, 2);

        // Make sure the second request gets a different timestamp.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let (status, body) = create(&state, "ISB-DL-2023-001").await;
        assert_eq!(status, StatusCode::CONFLICT, "{body}");
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "A license with this number already exists");

        // Only the first record's two objects remain.
        assert_eq!(object_count(&state).await, 2);
    }

    #[tokio::test]
    async fn test_delete() {
        let (state, _dir) = test_state().await;
        let (_, a) = create(&state, "A-1").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let (_, b) = create(&state, "B-2").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let (_, c) = create(&state, "C-3").await;

        let body = json!({ "id": b["id"], "adminToken": token(&state) });
        let (status, _) = send(&state, json_request(Method::DELETE, "/api/admin/delete-license", body.clone())).await;
        assert_eq!(status, StatusCode::OK);

        let (_, list) = send(&state, bearer_get("/api/licenses", &token(&state))).await;
        let list: Vec<License> = serde_json::from_slice(&list).unwrap();
        let ids: Vec<String> = list.iter().map(|l| l.id.to_string()).collect();
        assert_eq!(ids, vec![c["id"].as_str().unwrap(), a["id"].as_str().unwrap()]);

        let (status, _) = send(&state, json_request(Method::DELETE, "/api/admin/delete-license", body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_unknown_id() {
        let (state, _dir) = test_state().await;
        let (status, body) = send(
            &state,
            bearer_get(&format!("/api/licenses/{}", Uuid::new_v4()), &token(&state)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.error, "Not found: License not found");
    }

    #[tokio::test]
    async fn test_storage_misses() {
        let (state, _dir) = test_state().await;
        let req = Request::builder()
            .uri(format!("/storage/{PHOTO_BUCKET}/nobody/photo_1"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let req = Request::builder()
            .uri("/storage/secrets/x")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
