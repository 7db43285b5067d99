//! Emergency report submission.
//!
//! A submission is two writes: create the report, then attach any staged
//! media to the id the server returned. The second write cannot undo the
//! first, so a failed upload leaves a report without its media. That case is
//! reported as [`ClientError::PartialFailure`], never as success.
//!
//! ```text
//! Idle -> Submitting -> CreateFailed
//!                    -> Created (no media)
//!                    -> Created -> MediaUploading -> MediaUploaded
//!                                                 -> MediaUploadFailed
//! ```
//!
//! End states are kept for the caller to inspect. The next submit, or
//! `reset()`, moves the flow back to `Idle` first. Nothing is retried on its
//! own.
//!
//! After `MediaUploadFailed` the staged files still belong to the report that
//! was created. A new submit is refused until they are attached with
//! `retry_media()` or dropped with `discard_pending_media()`.

mod media;

pub use media::{MediaFile, StagedMedia};

use reqwest::Url;
use tracing::{debug, info, warn};

use crate::api::{CreateReportRequest, IncidentApi, Report, ReportId, UploadReceipt};
use crate::error::ClientError;
use crate::session::SessionStore;
use crate::validation::{self, FieldErrors};

/// Incident types offered by the report form
pub const INCIDENT_TYPES: [&str; 4] = [
    "Fire",
    "Traffic accident",
    "Infrastructure accident",
    "Workplace",
];

/// Text fields of the report form. Coordinates are free text until submit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportForm {
    pub incident: String,
    pub details: String,
    pub latitude: String,
    pub longitude: String,
}

impl ReportForm {
    pub fn new(incident: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            incident: incident.into(),
            details: details.into(),
            ..Self::default()
        }
    }

    pub fn with_location(
        mut self,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
    ) -> Self {
        self.latitude = latitude.into();
        self.longitude = longitude.into();
        self
    }

    /// Pre-fill coordinates from a `lat=..&lng=..` query string (with or
    /// without a leading `?`, or a full URL). Both must be present.
    pub fn prefill_from_query(&mut self, query: &str) -> bool {
        let query = query.trim();
        let url = if query.contains("://") {
            Url::parse(query)
        } else {
            Url::parse(&format!("http://localhost/?{}", query.trim_start_matches('?')))
        };
        let Ok(url) = url else {
            return false;
        };

        let mut lat = None;
        let mut lng = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "lat" if !value.is_empty() => lat = Some(value.into_owned()),
                "lng" if !value.is_empty() => lng = Some(value.into_owned()),
                _ => {}
            }
        }

        match (lat, lng) {
            (Some(lat), Some(lng)) => {
                self.latitude = lat;
                self.longitude = lng;
                true
            }
            _ => false,
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let mut errors = FieldErrors::new();
        errors
            .check("incident", validation::validate_required(&self.incident, "Incident type"))
            .check("details", validation::validate_required(&self.details, "Details"))
            .check("latitude", validation::validate_latitude(&self.latitude))
            .check("longitude", validation::validate_longitude(&self.longitude));
        errors.finish()
    }

    fn to_request(&self, user_id: &str) -> CreateReportRequest {
        CreateReportRequest {
            user_id: user_id.to_string(),
            incident: self.incident.trim().to_string(),
            details: self.details.trim().to_string(),
            latitude: validation::coordinate_text(&self.latitude),
            longitude: validation::coordinate_text(&self.longitude),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    Created,
    CreateFailed,
    MediaUploading,
    MediaUploaded,
    MediaUploadFailed,
}

impl SubmissionState {
    /// A request is outstanding; the submit control must be disabled.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Submitting | Self::MediaUploading)
    }
}

/// A report that was created, with every staged file attached.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    pub report: Report,
    pub media_count: usize,
    pub receipt: Option<UploadReceipt>,
}

/// The report form plus the state of its submission.
#[derive(Debug, Default)]
pub struct SubmissionFlow {
    pub form: ReportForm,
    pub media: StagedMedia,
    state: SubmissionState,
    last_report: Option<Report>,
    awaiting_media: Option<ReportId>,
}

impl SubmissionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form(form: ReportForm) -> Self {
        Self {
            form,
            ..Self::default()
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Whether the submit control is enabled.
    pub fn can_submit(&self) -> bool {
        !self.state.is_in_flight()
    }

    /// The most recently created report, for the status view.
    pub fn last_report(&self) -> Option<&Report> {
        self.last_report.as_ref()
    }

    /// Report created by the last submit whose media still needs attaching.
    pub fn awaiting_media(&self) -> Option<ReportId> {
        self.awaiting_media
    }

    /// Dismiss the result of the last submit.
    pub fn reset(&mut self) {
        if !self.state.is_in_flight() && self.state != SubmissionState::Idle {
            self.transition(SubmissionState::Idle);
        }
    }

    /// A flow whose only job is attaching `media` to a report created
    /// earlier, e.g. in a previous run of the client.
    pub fn for_pending_media(report_id: ReportId, media: StagedMedia) -> Self {
        Self {
            media,
            state: SubmissionState::MediaUploadFailed,
            awaiting_media: Some(report_id),
            ..Self::default()
        }
    }

    /// Give up on attaching the staged files to the report awaiting them.
    /// Returns the id of that report, if there was one.
    pub fn discard_pending_media(&mut self) -> Option<ReportId> {
        if self.state.is_in_flight() {
            return None;
        }
        let report_id = self.awaiting_media.take()?;
        info!(report_id, files = self.media.len(), "Discarding unattached media");
        self.media.clear();
        self.reset();
        Some(report_id)
    }

    fn transition(&mut self, next: SubmissionState) {
        debug!(from = ?self.state, to = ?next, "Submission state change");
        self.state = next;
    }

    /// Create the report and attach any staged media.
    ///
    /// On a create failure the form is left as entered. Once the report
    /// exists the text and coordinate fields are cleared whatever happens to
    /// the media; staged files are cleared only after they upload.
    pub async fn submit(
        &mut self,
        sessions: &SessionStore,
        api: &dyn IncidentApi,
    ) -> Result<SubmissionOutcome, ClientError> {
        if self.state.is_in_flight() {
            return Err(ClientError::SubmissionInProgress);
        }

        if let Some(report_id) = self.awaiting_media {
            let mut errors = FieldErrors::new();
            errors.add(
                "media",
                format!(
                    "Media is still pending for report #{}. Retry the upload or discard it",
                    report_id
                ),
            );
            return Err(ClientError::Validation(errors));
        }

        self.reset();
        self.form.validate()?;

        let (user_id, access_token) = match (sessions.user_id(), sessions.access_token()) {
            (Some(user_id), Some(token)) => (user_id.to_string(), token.to_string()),
            _ => return Err(ClientError::AuthenticationRequired),
        };

        let request = self.form.to_request(&user_id);
        self.transition(SubmissionState::Submitting);

        let report = match api.create_report(&access_token, &request).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Report creation failed");
                self.transition(SubmissionState::CreateFailed);
                return Err(e);
            }
        };

        info!(report_id = report.id, incident = %request.incident, "Report created");
        self.transition(SubmissionState::Created);
        self.form.clear();
        self.last_report = Some(report.clone());

        if self.media.is_empty() {
            return Ok(SubmissionOutcome {
                report,
                media_count: 0,
                receipt: None,
            });
        }

        let media_count = self.media.len();
        match self.upload_staged(&access_token, api, report.id).await {
            Ok(receipt) => Ok(SubmissionOutcome {
                report,
                media_count,
                receipt: Some(receipt),
            }),
            Err(e) => Err(ClientError::PartialFailure {
                report_id: report.id,
                message: e.banner(),
            }),
        }
    }

    /// Attach the staged media to the report whose upload failed last time.
    pub async fn retry_media(
        &mut self,
        sessions: &SessionStore,
        api: &dyn IncidentApi,
    ) -> Result<UploadReceipt, ClientError> {
        if self.state.is_in_flight() {
            return Err(ClientError::SubmissionInProgress);
        }

        let report_id = self.awaiting_media.ok_or_else(|| {
            let mut errors = FieldErrors::new();
            errors.add("media", "There is no report waiting for media");
            ClientError::Validation(errors)
        })?;

        if self.media.is_empty() {
            let mut errors = FieldErrors::new();
            errors.add("media", "No media files are staged");
            return Err(ClientError::Validation(errors));
        }

        let access_token = sessions
            .access_token()
            .ok_or(ClientError::AuthenticationRequired)?
            .to_string();

        self.upload_staged(&access_token, api, report_id).await
    }

    async fn upload_staged(
        &mut self,
        access_token: &str,
        api: &dyn IncidentApi,
        report_id: ReportId,
    ) -> Result<UploadReceipt, ClientError> {
        self.transition(SubmissionState::MediaUploading);

        match api
            .upload_media(access_token, report_id, self.media.files())
            .await
        {
            Ok(receipt) => {
                info!(report_id, files = self.media.len(), "Media attached");
                self.transition(SubmissionState::MediaUploaded);
                self.media.clear();
                self.awaiting_media = None;
                Ok(receipt)
            }
            Err(e) => {
                warn!(report_id, error = %e, "Media upload failed");
                self.transition(SubmissionState::MediaUploadFailed);
                self.awaiting_media = Some(report_id);
                Err(e)
            }
        }
    }
}
