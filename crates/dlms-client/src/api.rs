//! Typed client for the DLMS HTTP API.

use std::time::Duration;

use dlms_shared::error::ValidationErrors;
use dlms_shared::protocol::{
    CreateLicenseRequest, DeleteLicenseRequest, ErrorResponse, SuccessResponse,
    UpdateLicenseRequest, VerifyRequest, VerifyResponse, WriteResponse,
};
use dlms_shared::types::{License, LicenseForm};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Photo and signature as data URLs; `None` keeps whatever is stored.
#[derive(Debug, Clone, Default)]
pub struct EncodedImages {
    pub image: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LicensingClient {
    http: reqwest::Client,
    base_url: String,
}

impl LicensingClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn verify(&self, email: Option<&str>, password: &str) -> Result<VerifyResponse, ClientError> {
        let body = VerifyRequest {
            email: email.map(str::to_string),
            password: password.to_string(),
        };
        let resp = self
            .http
            .post(self.url("/api/admin/verify"))
            .json(&body)
            .send()
            .await?;
        parse(resp).await
    }

    pub async fn logout(&self, token: &str) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(self.url("/api/admin/logout"))
            .bearer_auth(token)
            .send()
            .await?;
        parse::<SuccessResponse>(resp).await.map(|_| ())
    }

    pub async fn create_license(
        &self,
        token: &str,
        form: &LicenseForm,
        images: EncodedImages,
    ) -> Result<Uuid, ClientError> {
        let body = CreateLicenseRequest {
            admin_token: token.to_string(),
            license_data: form.clone(),
            image_base64: images.image,
            signature_base64: images.signature,
        };
        let resp = self
            .http
            .post(self.url("/api/admin/create-license"))
            .json(&body)
            .send()
            .await?;
        let written: WriteResponse = parse(resp).await?;
        debug!(id = %written.id, "License created");
        Ok(written.id)
    }

    pub async fn update_license(
        &self,
        token: &str,
        id: Uuid,
        form: &LicenseForm,
        images: EncodedImages,
    ) -> Result<Uuid, ClientError> {
        let body = UpdateLicenseRequest {
            id,
            admin_token: token.to_string(),
            license_data: form.clone(),
            image_base64: images.image,
            signature_base64: images.signature,
        };
        let resp = self
            .http
            .post(self.url("/api/admin/update-license"))
            .json(&body)
            .send()
            .await?;
        let written: WriteResponse = parse(resp).await?;
        debug!(id = %written.id, "License updated");
        Ok(written.id)
    }

    pub async fn delete_license(&self, token: &str, id: Uuid) -> Result<(), ClientError> {
        let body = DeleteLicenseRequest {
            id,
            admin_token: token.to_string(),
        };
        let resp = self
            .http
            .delete(self.url("/api/admin/delete-license"))
            .json(&body)
            .send()
            .await?;
        parse::<SuccessResponse>(resp).await.map(|_| ())
    }

    /// All records, newest first.
    pub async fn list_licenses(&self, token: &str) -> Result<Vec<License>, ClientError> {
        let resp = self
            .http
            .get(self.url("/api/licenses"))
            .bearer_auth(token)
            .send()
            .await?;
        parse(resp).await
    }

    pub async fn get_license(&self, token: &str, id: Uuid) -> Result<License, ClientError> {
        let resp = self
            .http
            .get(self.url(&format!("/api/licenses/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        parse(resp).await
    }
}

/// Decode a success body, or map the error status and body onto
/// [`ClientError`].
async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    let text = resp.text().await.unwrap_or_default();
    let body: Option<ErrorResponse> = serde_json::from_str(&text).ok();
    let message = body
        .as_ref()
        .map(|b| b.error.clone())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());

    debug!(status = status.as_u16(), error = %message, "API request failed");

    Err(match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::NOT_FOUND => ClientError::NotFound,
        StatusCode::CONFLICT => ClientError::Conflict(message),
        StatusCode::BAD_REQUEST => match body {
            Some(b) if !b.fields.is_empty() => {
                ClientError::Validation(ValidationErrors { errors: b.fields })
            }
            _ => ClientError::Upstream {
                status: status.as_u16(),
                message,
            },
        },
        _ => ClientError::Upstream {
            status: status.as_u16(),
            message,
        },
    })
}
