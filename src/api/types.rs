//! Request and response bodies for the Ajali REST API.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server-assigned report identifier
pub type ReportId = i64;

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
    pub role: String,
}

/// `{success, data, message}` wrapper used by `/login` and `/users`
#[derive(Debug, Deserialize)]
pub struct AuthEnvelope {
    #[serde(default)]
    pub success: bool,
    pub data: Option<AuthData>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthData {
    pub user: AuthUser,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
}

impl AuthUser {
    /// `name` when the server sends one, else "first last".
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        let first = self.first_name.as_deref().unwrap_or("").trim();
        let last = self.last_name.as_deref().unwrap_or("").trim();
        format!("{} {}", first, last).trim().to_string()
    }
}

/// Result of a signup: the server may or may not log the new user in.
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub auth: Option<AuthData>,
    pub message: Option<String>,
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "under investigation", alias = "under_investigation")]
    UnderInvestigation,
    #[serde(rename = "rejected")]
    Rejected,
    #[serde(rename = "resolved")]
    Resolved,
    #[serde(rename = "completed")]
    Completed,
}

/// How a status badge should be coloured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Negative,
    Positive,
    Neutral,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 5] = [
        ReportStatus::Pending,
        ReportStatus::UnderInvestigation,
        ReportStatus::Rejected,
        ReportStatus::Resolved,
        ReportStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::UnderInvestigation => "under investigation",
            Self::Rejected => "rejected",
            Self::Resolved => "resolved",
            Self::Completed => "completed",
        }
    }

    pub fn tone(&self) -> StatusTone {
        match self {
            Self::Rejected => StatusTone::Negative,
            Self::Resolved | Self::Completed => StatusTone::Positive,
            Self::Pending | Self::UnderInvestigation => StatusTone::Neutral,
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("Unknown report status: {}", s.trim()))
    }
}

/// Coordinates are sent as the text the user entered, `null` when blank.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateReportRequest {
    pub user_id: String,
    pub incident: String,
    pub details: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusUpdateRequest {
    pub status: ReportStatus,
}

/// A media attachment as listed on a report.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MediaRef {
    Url(String),
    Detailed {
        id: Option<i64>,
        #[serde(alias = "media_url", alias = "file_url")]
        url: Option<String>,
        #[serde(alias = "type")]
        media_type: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Report {
    pub id: ReportId,
    #[serde(default, deserialize_with = "opaque_id_opt")]
    pub user_id: Option<String>,
    #[serde(default, alias = "incident_type")]
    pub incident: String,
    #[serde(default)]
    pub details: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "media_refs")]
    pub media: Vec<MediaRef>,
}

impl Report {
    pub fn status_enum(&self) -> Option<ReportStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    /// "lat, lng" to four decimal places, or "-" when unknown
    pub fn location_label(&self) -> String {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => format!("{:.4}, {:.4}", lat, lng),
            _ => "-".to_string(),
        }
    }
}

/// Confirmation returned by the media upload endpoint.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UploadReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaRef>,
}

/// Error body shape: `{message}` or `{error}`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl MessageBody {
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.error).filter(|m| !m.trim().is_empty())
    }
}

// ============================================================================
// Lenient field decoding
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Str(String),
}

impl From<IdRepr> for String {
    fn from(repr: IdRepr) -> Self {
        match repr {
            IdRepr::Int(n) => n.to_string(),
            IdRepr::Str(s) => s,
        }
    }
}

/// Accept ids sent as either numbers or strings
fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    IdRepr::deserialize(deserializer).map(String::from)
}

fn opaque_id_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<IdRepr>::deserialize(deserializer).map(|id| id.map(String::from))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumRepr {
    Num(f64),
    Str(String),
}

/// Accept coordinates as numbers or numeric strings; junk becomes `None`
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumRepr>::deserialize(deserializer)? {
        Some(NumRepr::Num(n)) => Some(n),
        Some(NumRepr::Str(s)) => s.trim().parse().ok(),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_status_wire_names() {
        assert_eq!(
            serde_json::to_value(ReportStatus::UnderInvestigation).unwrap(),
            json!("under investigation")
        );
        let parsed: ReportStatus = serde_json::from_value(json!("under_investigation")).unwrap();
        assert_eq!(parsed, ReportStatus::UnderInvestigation);
    }

    #[test]
    fn test_report_status_from_str() {
        assert_eq!(
            "Under-Investigation".parse::<ReportStatus>().unwrap(),
            ReportStatus::UnderInvestigation
        );
        assert_eq!("resolved".parse::<ReportStatus>().unwrap(), ReportStatus::Resolved);
        assert!("closed".parse::<ReportStatus>().is_err());
    }

    #[test]
    fn test_report_status_tone() {
        assert_eq!(ReportStatus::Rejected.tone(), StatusTone::Negative);
        assert_eq!(ReportStatus::Resolved.tone(), StatusTone::Positive);
        assert_eq!(ReportStatus::Completed.tone(), StatusTone::Positive);
        assert_eq!(ReportStatus::Pending.tone(), StatusTone::Neutral);
    }

    #[test]
    fn test_report_decodes_loose_shapes() {
        let report: Report = serde_json::from_value(json!({
            "id": 12,
            "user_id": 42,
            "incident": "Fire",
            "details": "Warehouse blaze",
            "latitude": "1.23",
            "longitude": 36.8,
            "status": "pending",
            "media": ["https://cdn.example.com/a.jpg", {"id": 3, "media_url": "b.mp4"}]
        }))
        .unwrap();

        assert_eq!(report.id, 12);
        assert_eq!(report.user_id.as_deref(), Some("42"));
        assert_eq!(report.latitude, Some(1.23));
        assert_eq!(report.status_enum(), Some(ReportStatus::Pending));
        assert_eq!(report.media.len(), 2);
        assert_eq!(report.location_label(), "1.2300, 36.8000");
    }

    #[test]
    fn test_report_minimal() {
        let report: Report = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(report.status_enum(), None);
        assert_eq!(report.location_label(), "-");
        assert!(report.media.is_empty());
    }

    #[test]
    fn test_auth_envelope_decodes() {
        let envelope: AuthEnvelope = serde_json::from_value(json!({
            "success": true,
            "message": "Login successful",
            "data": {
                "user": {
                    "id": 42,
                    "email": "jane@example.com",
                    "first_name": "Jane",
                    "last_name": "Doe",
                    "role": "user"
                },
                "access_token": "a",
                "refresh_token": "r"
            }
        }))
        .unwrap();

        let data = envelope.data.unwrap();
        assert_eq!(data.user.id, "42");
        assert_eq!(data.user.display_name(), "Jane Doe");
        assert_eq!(data.access_token.as_deref(), Some("a"));
    }

    #[test]
    fn test_create_report_request_shape() {
        let req = CreateReportRequest {
            user_id: "42".to_string(),
            incident: "Fire".to_string(),
            details: "Warehouse blaze".to_string(),
            latitude: Some("1.2300".to_string()),
            longitude: None,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "user_id": "42",
                "incident": "Fire",
                "details": "Warehouse blaze",
                "latitude": "1.2300",
                "longitude": null
            })
        );
    }
}
