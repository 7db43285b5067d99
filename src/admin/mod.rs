//! Admin view over every report: list, and change one report's status.

use tracing::{debug, info};

use crate::api::{IncidentApi, Report, ReportId, ReportStatus};
use crate::error::ClientError;
use crate::validation::FieldErrors;

/// The report list as last fetched, patched locally after status updates.
#[derive(Debug, Default)]
pub struct ReportBoard {
    reports: Vec<Report>,
}

impl ReportBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn get(&self, id: ReportId) -> Option<&Report> {
        self.reports.iter().find(|r| r.id == id)
    }

    /// Replace the local list with the server's.
    pub async fn refresh(&mut self, api: &dyn IncidentApi) -> Result<&[Report], ClientError> {
        self.reports = api.list_reports().await?;
        debug!(count = self.reports.len(), "Report board refreshed");
        Ok(&self.reports)
    }

    /// Change a report's status on the server, then patch only the matching
    /// local entry. Nothing is changed locally when the call fails.
    pub async fn update_status(
        &mut self,
        api: &dyn IncidentApi,
        id: Option<ReportId>,
        status: Option<&str>,
    ) -> Result<ReportStatus, ClientError> {
        let (id, status) = validate_selection(id, status)?;

        api.update_status(id, status).await?;
        info!(report_id = id, status = %status, "Report status updated");

        if let Some(report) = self.reports.iter_mut().find(|r| r.id == id) {
            report.status = Some(status.as_str().to_string());
        }
        Ok(status)
    }
}

fn validate_selection(
    id: Option<ReportId>,
    status: Option<&str>,
) -> Result<(ReportId, ReportStatus), ClientError> {
    let mut errors = FieldErrors::new();

    if id.is_none() {
        errors.add("report_id", "Please select a report");
    }

    let status = match status.map(str::trim).filter(|s| !s.is_empty()) {
        None => {
            errors.add("status", "Please select a status");
            None
        }
        Some(raw) => match raw.parse::<ReportStatus>() {
            Ok(status) => Some(status),
            Err(e) => {
                errors.add("status", e);
                None
            }
        },
    };

    match (id, status) {
        (Some(id), Some(status)) if errors.is_empty() => Ok((id, status)),
        _ => Err(ClientError::Validation(errors)),
    }
}
