//! Fixtures and an in-process stand-in for the DLMS server.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use dlms_shared::protocol::{
    CreateLicenseRequest, DeleteLicenseRequest, ErrorResponse, SuccessResponse,
    UpdateLicenseRequest, VerifyRequest, VerifyResponse, WriteResponse,
};
use dlms_shared::types::{License, LicenseForm};
use dlms_shared::validation::validate_license;
use uuid::Uuid;

pub const PASSWORD: &str = "hunter22";
pub const TOKEN: &str = "mock-token";

/// Format sniffing only looks at the leading signature.
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR-test-png";
pub const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF-test-jpeg";

pub fn valid_form(license_no: &str) -> LicenseForm {
    LicenseForm {
        cnic: "12345-1234567-1".into(),
        name: "Muhammad Ahmed".into(),
        father_name: "Khalid Ahmed".into(),
        address: "123 Main Street, Islamabad, Pakistan".into(),
        height: "5'10\"".into(),
        blood_group: "O+".into(),
        date_of_birth: "1990-05-15".into(),
        license_no: license_no.into(),
        license_types: vec!["mcycle".into(), "carjeep".into()],
        issue_city: "Islamabad".into(),
        valid_from: "2023-01-01".into(),
        valid_to: "2028-01-01".into(),
    }
}

pub fn sample_license(license_no: &str) -> License {
    License {
        id: Uuid::new_v4(),
        data: validate_license(&valid_form(license_no)).unwrap(),
        image_url: Some("http://dlms.test/storage/license-images/p.jpg".into()),
        signature_url: Some("http://dlms.test/storage/license-signatures/s.png".into()),
        created_at: Utc::now(),
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    /// Newest first.
    pub records: Vec<License>,
    /// Every request that reached the server.
    pub hits: usize,
    pub logged_out: bool,
    pub last_create: Option<CreateLicenseRequest>,
}

type Shared = Arc<Mutex<MockBackend>>;

fn error(status: StatusCode, message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        error: message.to_string(),
        fields: Vec::new(),
    };
    (status, Json(body)).into_response()
}

fn unauthorized() -> Response {
    error(StatusCode::UNAUTHORIZED, "Unauthorized")
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some(&format!("Bearer {TOKEN}"))
}

async fn verify(State(backend): State<Shared>, Json(req): Json<VerifyRequest>) -> Response {
    backend.lock().unwrap().hits += 1;
    if req.password != PASSWORD {
        return unauthorized();
    }
    Json(VerifyResponse {
        success: true,
        token: TOKEN.to_string(),
        expiry: Utc::now() + Duration::hours(24),
    })
    .into_response()
}

async fn logout(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    let mut backend = backend.lock().unwrap();
    backend.hits += 1;
    if !bearer_ok(&headers) {
        return unauthorized();
    }
    backend.logged_out = true;
    Json(SuccessResponse { success: true }).into_response()
}

async fn create(State(backend): State<Shared>, Json(req): Json<CreateLicenseRequest>) -> Response {
    let mut backend = backend.lock().unwrap();
    backend.hits += 1;
    if req.admin_token != TOKEN {
        return unauthorized();
    }
    let data = match validate_license(&req.license_data) {
        Ok(data) => data,
        Err(errors) => {
            let body = ErrorResponse {
                success: false,
                error: "Invalid license data".into(),
                fields: errors.errors,
            };
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };
    if backend.records.iter().any(|l| l.data.license_no == data.license_no) {
        return error(StatusCode::CONFLICT, "A license with this number already exists");
    }

    let license = License {
        id: Uuid::new_v4(),
        image_url: req
            .image_base64
            .as_ref()
            .map(|_| format!("http://mock/storage/license-images/{}/photo_1", data.cnic)),
        signature_url: req
            .signature_base64
            .as_ref()
            .map(|_| format!("http://mock/storage/license-signatures/{}/signature_1", data.cnic)),
        data,
        created_at: Utc::now(),
    };
    let id = license.id;
    backend.records.insert(0, license);
    backend.last_create = Some(req);
    Json(WriteResponse { success: true, id }).into_response()
}

async fn update(State(backend): State<Shared>, Json(req): Json<UpdateLicenseRequest>) -> Response {
    let mut backend = backend.lock().unwrap();
    backend.hits += 1;
    if req.admin_token != TOKEN {
        return unauthorized();
    }
    let Ok(data) = validate_license(&req.license_data) else {
        return error(StatusCode::BAD_REQUEST, "Invalid license data");
    };
    let Some(license) = backend.records.iter_mut().find(|l| l.id == req.id) else {
        return error(StatusCode::NOT_FOUND, "Not found: License not found");
    };
    if req.image_base64.is_some() {
        license.image_url = Some(format!("http://mock/storage/license-images/{}/photo_2", data.cnic));
    }
    if req.signature_base64.is_some() {
        license.signature_url = Some(format!("http://mock/storage/license-signatures/{}/signature_2", data.cnic));
    }
    license.data = data;
    Json(WriteResponse { success: true, id: req.id }).into_response()
}

async fn remove(State(backend): State<Shared>, Json(req): Json<DeleteLicenseRequest>) -> Response {
    let mut backend = backend.lock().unwrap();
    backend.hits += 1;
    if req.admin_token != TOKEN {
        return unauthorized();
    }
    let before = backend.records.len();
    backend.records.retain(|l| l.id != req.id);
    if backend.records.len() == before {
        return error(StatusCode::NOT_FOUND, "Not found: License not found");
    }
    Json(SuccessResponse { success: true }).into_response()
}

async fn list(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    let mut backend = backend.lock().unwrap();
    backend.hits += 1;
    if !bearer_ok(&headers) {
        return unauthorized();
    }
    Json(backend.records.clone()).into_response()
}

async fn get_one(State(backend): State<Shared>, headers: HeaderMap, Path(id): Path<Uuid>) -> Response {
    let mut backend = backend.lock().unwrap();
    backend.hits += 1;
    if !bearer_ok(&headers) {
        return unauthorized();
    }
    match backend.records.iter().find(|l| l.id == id) {
        Some(license) => Json(license.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "Not found: License not found"),
    }
}

/// Serve the mock API on an ephemeral port. Returns its base URL.
pub async fn spawn_mock(backend: MockBackend) -> (String, Shared) {
    let shared: Shared = Arc::new(Mutex::new(backend));
    let app = Router::new()
        .route("/api/admin/verify", post(verify))
        .route("/api/admin/logout", post(logout))
        .route("/api/admin/create-license", post(create))
        .route("/api/admin/update-license", post(update))
        .route("/api/admin/delete-license", delete(remove))
        .route("/api/licenses", get(list))
        .route("/api/licenses/:id", get(get_one))
        .with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), shared)
}
