use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

use super::types::{
    AuthData, AuthEnvelope, CreateReportRequest, LoginRequest, MessageBody, Report, ReportId,
    ReportStatus, SignupOutcome, SignupRequest, StatusUpdateRequest, UploadReceipt,
};
use super::IncidentApi;
use crate::error::ClientError;
use crate::report::MediaFile;

/// Longest slice of a non-JSON body echoed back in an error
const ERROR_BODY_PREVIEW: usize = 100;

/// HTTP client bound to one API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl IncidentApi for ApiClient {
    async fn login(&self, req: &LoginRequest) -> Result<AuthData, ClientError> {
        let response = self
            .client
            .post(self.url("/login"))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(req)
            .send()
            .await?;

        let (status, envelope) = read_envelope(response).await?;
        let message = envelope.message.clone();
        let data = envelope.data.ok_or_else(|| {
            ClientError::api(
                Some(status.as_u16()),
                message.unwrap_or_else(|| "Login response was missing user data".to_string()),
            )
        })?;

        if data.access_token.as_deref().map_or(true, str::is_empty) {
            return Err(ClientError::api(
                Some(status.as_u16()),
                "Login response was missing an access token",
            ));
        }

        info!(user_id = %data.user.id, "Login accepted");
        Ok(data)
    }

    async fn signup(&self, req: &SignupRequest) -> Result<SignupOutcome, ClientError> {
        let response = self
            .client
            .post(self.url("/users"))
            .json(req)
            .send()
            .await?;

        let (_, envelope) = read_envelope(response).await?;
        Ok(SignupOutcome {
            auth: envelope.data,
            message: envelope.message,
        })
    }

    async fn list_reports(&self) -> Result<Vec<Report>, ClientError> {
        let response = self.client.get(self.url("/admin/reports")).send().await?;
        let reports: Vec<Report> = read_json(response).await?;
        debug!(count = reports.len(), "Fetched reports");
        Ok(reports)
    }

    async fn update_status(
        &self,
        id: ReportId,
        status: ReportStatus,
    ) -> Result<serde_json::Value, ClientError> {
        let response = self
            .client
            .patch(self.url(&format!("/admin/reports/{}/status", id)))
            .json(&StatusUpdateRequest { status })
            .send()
            .await?;

        read_ack(response).await
    }

    async fn create_report(
        &self,
        access_token: &str,
        req: &CreateReportRequest,
    ) -> Result<Report, ClientError> {
        let response = self
            .client
            .post(self.url("/reports"))
            .bearer_auth(access_token)
            .json(req)
            .send()
            .await?;

        read_json(response).await
    }

    async fn upload_media(
        &self,
        access_token: &str,
        id: ReportId,
        files: &[MediaFile],
    ) -> Result<UploadReceipt, ClientError> {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.data.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)
                .map_err(|e| {
                    ClientError::Network(format!(
                        "Invalid content type for {}: {}",
                        file.file_name, e
                    ))
                })?;
            form = form.part("media", part);
        }

        debug!(report_id = id, files = files.len(), "Uploading media");

        let response = self
            .client
            .post(self.url(&format!("/reports/{}/media", id)))
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await?;

        read_ack(response).await
    }
}

/// Status and body of a response, read once.
struct RawResponse {
    status: StatusCode,
    body: String,
}

impl RawResponse {
    async fn read(response: Response) -> Result<Self, ClientError> {
        let status = response.status();
        let body = response.text().await?;
        Ok(Self { status, body })
    }

    /// The body as JSON, or `None` when it is empty or not JSON.
    fn json(&self) -> Option<serde_json::Value> {
        if self.body.trim().is_empty() {
            return None;
        }
        serde_json::from_str(&self.body).ok()
    }

    fn error(&self) -> ClientError {
        match self.json() {
            Some(value) => api_error(self.status, &value),
            None if self.body.trim().is_empty() => ClientError::api(
                Some(self.status.as_u16()),
                format!("Request failed ({})", self.status.as_u16()),
            ),
            None => ClientError::api(
                Some(self.status.as_u16()),
                format!("Server error: {}", preview(&self.body)),
            ),
        }
    }

    fn not_json(&self) -> ClientError {
        ClientError::Network(format!("Server error: {}", preview(&self.body)))
    }
}

/// Decode a JSON response, turning non-2xx statuses into `ClientError::Api`
/// and non-JSON 2xx bodies into `ClientError::Network`.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let raw = RawResponse::read(response).await?;

    if !raw.status.is_success() {
        return Err(raw.error());
    }

    let value = raw.json().ok_or_else(|| raw.not_json())?;
    serde_json::from_value(value)
        .map_err(|e| ClientError::Network(format!("Unexpected response shape: {}", e)))
}

/// Any 2xx is success. The body is decoded when it is JSON of the expected
/// shape and ignored otherwise.
async fn read_ack<T: DeserializeOwned + Default>(response: Response) -> Result<T, ClientError> {
    let raw = RawResponse::read(response).await?;

    if !raw.status.is_success() {
        return Err(raw.error());
    }

    Ok(raw
        .json()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default())
}

/// Decode a `{success, data, message}` envelope. The body must be JSON
/// whatever the status, and a false `success` is a failure even on a 2xx.
async fn read_envelope(response: Response) -> Result<(StatusCode, AuthEnvelope), ClientError> {
    let raw = RawResponse::read(response).await?;
    let status = raw.status;
    let value = raw.json().ok_or_else(|| raw.not_json())?;

    if !status.is_success() {
        return Err(api_error(status, &value));
    }

    let envelope: AuthEnvelope = serde_json::from_value(value)
        .map_err(|e| ClientError::Network(format!("Unexpected response shape: {}", e)))?;

    if !envelope.success {
        let message = envelope
            .message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Request failed ({})", status.as_u16()));
        return Err(ClientError::api(Some(status.as_u16()), message));
    }

    Ok((status, envelope))
}

fn api_error(status: StatusCode, body: &serde_json::Value) -> ClientError {
    let message = serde_json::from_value::<MessageBody>(body.clone())
        .ok()
        .and_then(MessageBody::into_message)
        .unwrap_or_else(|| format!("Request failed ({})", status.as_u16()));
    ClientError::api(Some(status.as_u16()), message)
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Answer one request with a canned response and return the raw request.
    async fn serve_once(
        status: &'static str,
        content_type: &'static str,
        body: String,
    ) -> (ApiClient, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\
                 Connection: close\r\n\r\n{}",
                status,
                content_type,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });

        let client = ApiClient::new(&base_url, Duration::from_secs(5)).unwrap();
        (client, handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        while !request_complete(&buf) {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let head = text[..header_end].to_ascii_lowercase();
        if head.contains("transfer-encoding: chunked") {
            return text.ends_with("0\r\n\r\n");
        }
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        buf.len() - (header_end + 4) >= content_length
    }

    fn fire_request() -> CreateReportRequest {
        CreateReportRequest {
            user_id: "42".to_string(),
            incident: "Fire".to_string(),
            details: "Warehouse blaze".to_string(),
            latitude: Some("1.23".to_string()),
            longitude: Some("36.8".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_report_sends_bearer_and_body() {
        let (client, server) = serve_once(
            "201 Created",
            "application/json",
            json!({
                "id": 555,
                "incident": "Fire",
                "details": "Warehouse blaze",
                "status": "pending"
            })
            .to_string(),
        )
        .await;

        let report = client.create_report("token-123", &fire_request()).await.unwrap();
        assert_eq!(report.id, 555);

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(lower.starts_with("post /reports http/1.1"));
        assert!(lower.contains("authorization: bearer token-123"));
        assert!(request.contains(r#""user_id":"42""#));
        assert!(request.contains(r#""latitude":"1.23""#));
    }

    #[tokio::test]
    async fn test_upload_media_sends_one_part_per_file() {
        let (client, server) =
            serve_once("201 Created", "text/plain", "Media uploaded".to_string()).await;
        let files = vec![
            MediaFile::new("front.jpg", "image/jpeg", b"jpegdata".to_vec()),
            MediaFile::new("clip.mp4", "video/mp4", b"mp4data".to_vec()),
        ];

        let receipt = client.upload_media("token-123", 555, &files).await.unwrap();
        assert_eq!(receipt, UploadReceipt::default());

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(lower.starts_with("post /reports/555/media http/1.1"));
        assert!(lower.contains("authorization: bearer token-123"));
        assert!(lower.contains("content-type: multipart/form-data; boundary="));
        assert_eq!(lower.matches(r#"name="media""#).count(), 2);
        assert!(lower.contains(r#"name="media"; filename="front.jpg""#));
        assert!(lower.contains("content-type: image/jpeg"));
        assert!(lower.contains(r#"name="media"; filename="clip.mp4""#));
        assert!(lower.contains("content-type: video/mp4"));
        assert!(request.contains("jpegdata"));
    }

    #[tokio::test]
    async fn test_upload_media_decodes_json_receipt() {
        let (client, server) = serve_once(
            "201 Created",
            "application/json",
            json!({
                "message": "1 file uploaded",
                "media": ["https://cdn.example/a.jpg"]
            })
            .to_string(),
        )
        .await;
        let files = vec![MediaFile::new("a.jpg", "image/jpeg", vec![1])];

        let receipt = client.upload_media("token-123", 9, &files).await.unwrap();
        assert_eq!(receipt.message.as_deref(), Some("1 file uploaded"));
        assert_eq!(receipt.media.len(), 1);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_media_rejection_is_api_error() {
        let (client, server) = serve_once(
            "413 Payload Too Large",
            "application/json",
            json!({"error": "File too large"}).to_string(),
        )
        .await;
        let files = vec![MediaFile::new("a.jpg", "image/jpeg", vec![1])];

        let err = client.upload_media("token-123", 9, &files).await.unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, Some(413));
                assert_eq!(message, "File too large");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_list_reports_sends_no_credentials() {
        let (client, server) = serve_once(
            "200 OK",
            "application/json",
            json!([{"id": 1, "incident": "Fire", "details": "Smoke", "status": "pending"}])
                .to_string(),
        )
        .await;

        let reports = client.list_reports().await.unwrap();
        assert_eq!(reports.len(), 1);

        let lower = server.await.unwrap().to_ascii_lowercase();
        assert!(lower.starts_with("get /admin/reports http/1.1"));
        assert!(!lower.contains("authorization:"));
    }

    #[tokio::test]
    async fn test_update_status_accepts_empty_success_body() {
        let (client, server) = serve_once("200 OK", "text/plain", String::new()).await;

        let value = client
            .update_status(7, ReportStatus::Resolved)
            .await
            .unwrap();
        assert_eq!(value, serde_json::Value::Null);

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(lower.starts_with("patch /admin/reports/7/status http/1.1"));
        assert!(!lower.contains("authorization:"));
        assert!(request.contains(r#""status":"resolved""#));
    }

    #[tokio::test]
    async fn test_login_success_false_is_api_error() {
        let (client, server) = serve_once(
            "200 OK",
            "application/json",
            json!({"success": false, "message": "Invalid credentials"}).to_string(),
        )
        .await;
        let req = LoginRequest {
            email: "jane@example.com".to_string(),
            password: "pw".to_string(),
        };

        let err = client.login(&req).await.unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, Some(200));
                assert_eq!(message, "Invalid credentials");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let lower = server.await.unwrap().to_ascii_lowercase();
        assert!(lower.starts_with("post /login http/1.1"));
    }

    #[tokio::test]
    async fn test_login_non_json_body_is_network_error() {
        let page = format!("<html>{}</html>", "x".repeat(200));
        let (client, server) = serve_once("502 Bad Gateway", "text/html", page.clone()).await;
        let req = LoginRequest {
            email: "jane@example.com".to_string(),
            password: "pw".to_string(),
        };

        let err = client.login(&req).await.unwrap_err();
        match err {
            ClientError::Network(message) => {
                let expected: String = page.chars().take(ERROR_BODY_PREVIEW).collect();
                assert_eq!(message, format!("Server error: {}", expected));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_login_returns_tokens() {
        let (client, server) = serve_once(
            "200 OK",
            "application/json",
            json!({
                "success": true,
                "data": {
                    "user": {"id": 42, "email": "jane@example.com", "role": "admin"},
                    "access_token": "a",
                    "refresh_token": "r"
                }
            })
            .to_string(),
        )
        .await;
        let req = LoginRequest {
            email: "jane@example.com".to_string(),
            password: "pw".to_string(),
        };

        let auth = client.login(&req).await.unwrap();
        assert_eq!(auth.user.id, "42");
        assert_eq!(auth.access_token.as_deref(), Some("a"));

        let request = server.await.unwrap();
        assert!(request.contains(r#""email":"jane@example.com""#));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new("http://localhost:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.url("/reports"), "http://localhost:5000/reports");
    }

    #[test]
    fn test_api_error_uses_message_field() {
        let err = api_error(StatusCode::BAD_REQUEST, &json!({"message": "Email taken"}));
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, Some(400));
                assert_eq!(message, "Email taken");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_api_error_falls_back_to_error_field_then_status() {
        let err = api_error(StatusCode::FORBIDDEN, &json!({"error": "Forbidden"}));
        assert_eq!(err.banner(), "Forbidden");

        let err = api_error(StatusCode::BAD_GATEWAY, &json!(["not", "an", "object"]));
        assert_eq!(err.banner(), "Request failed (502)");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let body = "é".repeat(150);
        assert_eq!(preview(&body).chars().count(), ERROR_BODY_PREVIEW);
    }
}
