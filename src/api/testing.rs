//! Recording fake of [`IncidentApi`] for unit tests.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{
    AuthData, AuthUser, CreateReportRequest, IncidentApi, LoginRequest, Report, ReportId,
    ReportStatus, SignupOutcome, SignupRequest, UploadReceipt,
};
use crate::error::ClientError;
use crate::report::MediaFile;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Login(LoginRequest),
    Signup(SignupRequest),
    ListReports,
    UpdateStatus(ReportId, ReportStatus),
    CreateReport {
        token: String,
        req: CreateReportRequest,
    },
    UploadMedia {
        token: String,
        report_id: ReportId,
        file_names: Vec<String>,
    },
}

#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    pub next_report_id: ReportId,
    pub fail_create: Option<u16>,
    pub fail_upload: Option<u16>,
    pub fail_update: Option<u16>,
    pub reports: Vec<Report>,
    pub auth: Option<AuthData>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            next_report_id: 101,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn creates(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateReport { .. }))
    }

    pub fn uploads(&self) -> usize {
        self.count(|c| matches!(c, Call::UploadMedia { .. }))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn sample_auth(id: &str, role: &str) -> AuthData {
    AuthData {
        user: AuthUser {
            id: id.to_string(),
            email: "jane@example.com".to_string(),
            name: Some("Jane Doe".to_string()),
            first_name: None,
            last_name: None,
            role: Some(role.to_string()),
        },
        access_token: Some("token-123".to_string()),
        refresh_token: Some("refresh-456".to_string()),
    }
}

pub fn sample_report(id: ReportId, status: &str) -> Report {
    Report {
        id,
        user_id: Some("42".to_string()),
        incident: "Fire".to_string(),
        details: "Warehouse blaze".to_string(),
        latitude: Some(1.23),
        longitude: Some(36.8),
        status: Some(status.to_string()),
        media: Vec::new(),
    }
}

#[async_trait]
impl IncidentApi for FakeApi {
    async fn login(&self, req: &LoginRequest) -> Result<AuthData, ClientError> {
        self.record(Call::Login(req.clone()));
        self.auth
            .clone()
            .ok_or_else(|| ClientError::api(Some(401), "Invalid email or password"))
    }

    async fn signup(&self, req: &SignupRequest) -> Result<SignupOutcome, ClientError> {
        self.record(Call::Signup(req.clone()));
        Ok(SignupOutcome {
            auth: self.auth.clone(),
            message: Some("Signup successful".to_string()),
        })
    }

    async fn list_reports(&self) -> Result<Vec<Report>, ClientError> {
        self.record(Call::ListReports);
        Ok(self.reports.clone())
    }

    async fn update_status(
        &self,
        id: ReportId,
        status: ReportStatus,
    ) -> Result<serde_json::Value, ClientError> {
        self.record(Call::UpdateStatus(id, status));
        match self.fail_update {
            Some(code) => Err(ClientError::api(Some(code), "Report not found")),
            None => Ok(serde_json::json!({"id": id, "status": status.as_str()})),
        }
    }

    async fn create_report(
        &self,
        access_token: &str,
        req: &CreateReportRequest,
    ) -> Result<Report, ClientError> {
        self.record(Call::CreateReport {
            token: access_token.to_string(),
            req: req.clone(),
        });
        if let Some(code) = self.fail_create {
            return Err(ClientError::api(Some(code), "Could not create report"));
        }
        Ok(Report {
            id: self.next_report_id,
            user_id: Some(req.user_id.clone()),
            incident: req.incident.clone(),
            details: req.details.clone(),
            latitude: req.latitude.as_deref().and_then(|v| v.parse().ok()),
            longitude: req.longitude.as_deref().and_then(|v| v.parse().ok()),
            status: Some("pending".to_string()),
            media: Vec::new(),
        })
    }

    async fn upload_media(
        &self,
        access_token: &str,
        id: ReportId,
        files: &[MediaFile],
    ) -> Result<UploadReceipt, ClientError> {
        self.record(Call::UploadMedia {
            token: access_token.to_string(),
            report_id: id,
            file_names: files.iter().map(|f| f.file_name.clone()).collect(),
        });
        if let Some(code) = self.fail_upload {
            return Err(ClientError::api(Some(code), "Upload rejected"));
        }
        Ok(UploadReceipt {
            message: Some(format!("{} files uploaded", files.len())),
            media: Vec::new(),
        })
    }
}
