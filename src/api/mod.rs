//! Access to the Ajali REST API.
//!
//! [`IncidentApi`] is the seam the rest of the crate is written against;
//! [`ApiClient`] is the reqwest implementation used by the CLI.

mod client;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::ApiClient;
pub use types::{
    AuthData, AuthEnvelope, AuthUser, CreateReportRequest, LoginRequest, MediaRef, Report,
    ReportId, ReportStatus, SignupOutcome, SignupRequest, StatusTone, StatusUpdateRequest,
    UploadReceipt,
};

use async_trait::async_trait;

use crate::error::ClientError;
use crate::report::MediaFile;

/// Calls the client makes against the backend.
///
/// Only report creation and media upload carry a bearer token; the other
/// calls are sent without credentials.
#[async_trait]
pub trait IncidentApi: Send + Sync {
    /// `POST /login`
    async fn login(&self, req: &LoginRequest) -> Result<AuthData, ClientError>;

    /// `POST /users`
    async fn signup(&self, req: &SignupRequest) -> Result<SignupOutcome, ClientError>;

    /// `GET /admin/reports`
    async fn list_reports(&self) -> Result<Vec<Report>, ClientError>;

    /// `PATCH /admin/reports/{id}/status`
    async fn update_status(
        &self,
        id: ReportId,
        status: ReportStatus,
    ) -> Result<serde_json::Value, ClientError>;

    /// `POST /reports`
    async fn create_report(
        &self,
        access_token: &str,
        req: &CreateReportRequest,
    ) -> Result<Report, ClientError>;

    /// `POST /reports/{id}/media`, one multipart `media` part per file
    async fn upload_media(
        &self,
        access_token: &str,
        id: ReportId,
        files: &[MediaFile],
    ) -> Result<UploadReceipt, ClientError>;
}
