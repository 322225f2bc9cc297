//! Create / Edit / Delete / View flows and login.
//!
//! Every flow checks the session first and validates input with the shared
//! schema before any request leaves the client. Failures come back as an
//! [`Outcome`] instead of an error so the caller only has to render them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dlms_shared::constants::MAX_IMAGE_SIZE;
use dlms_shared::error::ValidationErrors;
use dlms_shared::stats::DashboardSummary;
use dlms_shared::types::{License, LicenseForm};
use dlms_shared::upload::to_data_url;
use dlms_shared::validation::{validate_submission, ImagePolicy};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{EncodedImages, LicensingClient};
use crate::error::ClientError;
use crate::guard::{
    admin_cookie_header, admin_flag, edge_route, EdgeDecision, Redirect, SessionGuard, ENTRY_PAGE,
};
use crate::list::LicenseList;
use crate::session::SessionStore;
use crate::view::{LicenseView, PrintCard};

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    /// Field errors to show next to the form inputs.
    Invalid(ValidationErrors),
    /// Render the not-found state with a way back.
    NotFound,
    Redirect(&'static str),
    /// Show as a notification.
    Failed(String),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::Invalid(errors) => Outcome::Invalid(errors),
            Outcome::NotFound => Outcome::NotFound,
            Outcome::Redirect(to) => Outcome::Redirect(to),
            Outcome::Failed(message) => Outcome::Failed(message),
        }
    }
}

impl<T> From<Redirect> for Outcome<T> {
    fn from(Redirect(to): Redirect) -> Self {
        Outcome::Redirect(to)
    }
}

/// A license ready for the edit form.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub license: License,
    pub form: LicenseForm,
}

/// Proof that the user was asked before deleting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirmation {
    id: Uuid,
    pub prompt: String,
}

impl DeleteConfirmation {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Files picked in the form, as raw bytes.
#[derive(Debug, Clone, Default)]
pub struct ChosenImages {
    pub photo: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
}

pub struct Console {
    api: LicensingClient,
    session: Arc<SessionStore>,
}

impl Console {
    pub fn new(api: LicensingClient, session: Arc<SessionStore>) -> Self {
        Self { api, session }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Edge decision for `path` given the current `isAdmin` flag.
    pub fn route(&self, path: &str) -> EdgeDecision {
        edge_route(path, admin_flag(self.session.admin_cookie()))
    }

    /// `Set-Cookie` value to send after login or logout.
    pub fn admin_cookie(&self) -> String {
        admin_cookie_header(self.session.admin_cookie())
    }

    fn token(&self) -> Result<String, Redirect> {
        SessionGuard::new(&self.session).require()
    }

    fn fail<T>(&self, action: &str, e: ClientError) -> Outcome<T> {
        match e {
            ClientError::Unauthorized => {
                warn!(action, "Session rejected by server");
                self.session.clear();
                Outcome::Redirect(ENTRY_PAGE)
            }
            ClientError::Validation(errors) => Outcome::Invalid(errors),
            ClientError::NotFound => Outcome::NotFound,
            other => {
                warn!(action, error = %other, "Request failed");
                Outcome::Failed(other.notification())
            }
        }
    }

    /// Check the credential and keep the token; `remember` selects the
    /// durable tier. Returns the token expiry.
    pub async fn login(&self, email: Option<&str>, password: &str, remember: bool) -> Outcome<DateTime<Utc>> {
        let resp = match self.api.verify(email, password).await {
            Ok(resp) => resp,
            Err(ClientError::Unauthorized) => {
                warn!("Login rejected");
                return Outcome::Failed("Invalid credentials".to_string());
            }
            Err(e) => return self.fail("login", e),
        };

        if let Err(e) = self.session.store(&resp.token, resp.expiry, remember) {
            return Outcome::Failed(e.notification());
        }
        info!(remember, "Logged in");
        Outcome::Done(resp.expiry)
    }

    /// Revoke the token server-side where possible and forget it locally.
    pub async fn logout(&self) -> Outcome<()> {
        if let Some(token) = self.session.token() {
            if let Err(e) = self.api.logout(&token).await {
                warn!(error = %e, "Server-side logout failed");
            }
        }
        self.session.clear();
        info!("Logged out");
        Outcome::Redirect(ENTRY_PAGE)
    }

    fn prepare(
        form: &LicenseForm,
        images: ChosenImages,
        policy: ImagePolicy,
    ) -> Result<EncodedImages, ValidationErrors> {
        let checked = validate_submission(form, images.photo, images.signature, policy, MAX_IMAGE_SIZE)?;
        Ok(EncodedImages {
            image: checked.photo.map(|img| to_data_url(&img.bytes)),
            signature: checked.signature.map(|img| to_data_url(&img.bytes)),
        })
    }

    /// Both images are required.
    pub async fn create(&self, form: &LicenseForm, images: ChosenImages) -> Outcome<Uuid> {
        let token = match self.token() {
            Ok(token) => token,
            Err(redirect) => return redirect.into(),
        };
        let encoded = match Self::prepare(form, images, ImagePolicy::Required) {
            Ok(encoded) => encoded,
            Err(errors) => return Outcome::Invalid(errors),
        };

        match self.api.create_license(&token, form, encoded).await {
            Ok(id) => {
                info!(id = %id, "License created");
                Outcome::Done(id)
            }
            Err(e) => self.fail("create", e),
        }
    }

    pub async fn load_for_edit(&self, id: Uuid) -> Outcome<EditSession> {
        let token = match self.token() {
            Ok(token) => token,
            Err(redirect) => return redirect.into(),
        };
        match self.api.get_license(&token, id).await {
            Ok(license) => Outcome::Done(EditSession {
                form: LicenseForm::from(&license),
                license,
            }),
            Err(e) => self.fail("load", e),
        }
    }

    /// Images left unset keep their stored URLs.
    pub async fn update(&self, id: Uuid, form: &LicenseForm, images: ChosenImages) -> Outcome<Uuid> {
        let token = match self.token() {
            Ok(token) => token,
            Err(redirect) => return redirect.into(),
        };
        let encoded = match Self::prepare(form, images, ImagePolicy::Optional) {
            Ok(encoded) => encoded,
            Err(errors) => return Outcome::Invalid(errors),
        };

        match self.api.update_license(&token, id, form, encoded).await {
            Ok(id) => {
                info!(id = %id, "License updated");
                Outcome::Done(id)
            }
            Err(e) => self.fail("update", e),
        }
    }

    pub fn request_delete(&self, license: &License) -> DeleteConfirmation {
        DeleteConfirmation {
            id: license.id,
            prompt: format!(
                "Delete license {} for {}? This cannot be undone.",
                license.data.license_no, license.data.name
            ),
        }
    }

    /// Delete the confirmed record and drop it from `list`.
    pub async fn confirm_delete(&self, confirmation: DeleteConfirmation, list: &mut LicenseList) -> Outcome<()> {
        let token = match self.token() {
            Ok(token) => token,
            Err(redirect) => return redirect.into(),
        };
        match self.api.delete_license(&token, confirmation.id).await {
            Ok(()) => {
                list.remove(confirmation.id);
                info!(id = %confirmation.id, "License deleted");
                Outcome::Done(())
            }
            Err(e) => self.fail("delete", e),
        }
    }

    async fn fetch(&self, id: Uuid) -> Outcome<License> {
        let token = match self.token() {
            Ok(token) => token,
            Err(redirect) => return redirect.into(),
        };
        match self.api.get_license(&token, id).await {
            Ok(license) => Outcome::Done(license),
            Err(e) => self.fail("view", e),
        }
    }

    pub async fn view(&self, id: Uuid) -> Outcome<LicenseView> {
        self.fetch(id).await.map(|license| LicenseView::new(&license))
    }

    pub async fn print_card(&self, id: Uuid) -> Outcome<PrintCard> {
        self.fetch(id).await.map(|license| PrintCard::new(&license))
    }

    /// Reload `list` from the server. Returns the record count.
    pub async fn refresh(&self, list: &mut LicenseList) -> Outcome<usize> {
        let token = match self.token() {
            Ok(token) => token,
            Err(redirect) => return redirect.into(),
        };
        match self.api.list_licenses(&token).await {
            Ok(records) => {
                list.replace(records);
                Outcome::Done(list.len())
            }
            Err(e) => self.fail("list", e),
        }
    }

    pub async fn dashboard(&self) -> Outcome<DashboardSummary> {
        let mut list = LicenseList::default();
        self.refresh(&mut list)
            .await
            .map(|_| DashboardSummary::compute(list.records(), Utc::now()))
    }
}
