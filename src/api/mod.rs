//! HTTP client for the inference backend.
//!
//! `process-frame` never fails from the caller's point of view: any transport,
//! status or decode problem turns into [`FrameResult::degraded`]. Every other
//! endpoint hands its [`ApiError`] back to the caller.

mod error;
pub mod types;

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::Serialize;

pub use error::ApiError;
pub use types::{
    ActivityStatus, AttendanceRecord, FrameResult, PostureReading, PostureStatus, SessionId,
    UNKNOWN_FACE,
};
use types::{ErrorBody, SessionResponse};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api/";

const PROCESS_FRAME: &str = "process-frame";
const GET_ATTENDANCE: &str = "get-attendance";
const DOWNLOAD_ATTENDANCE: &str = "download-attendance";
const RESET_SESSION: &str = "reset-session";
const CURRENT_SESSION: &str = "current-session";

/// Remote analysis of one encoded frame.
pub trait FrameAnalyzer: Send + Sync + 'static {
    fn analyze_frame(&self, frame: String) -> impl Future<Output = FrameResult> + Send;
}

/// Session and attendance operations used by the teacher dashboard.
pub trait AttendanceBackend: Send + Sync + 'static {
    fn fetch_current_session(&self) -> impl Future<Output = Result<SessionId, ApiError>> + Send;

    fn start_new_session(&self) -> impl Future<Output = Result<SessionId, ApiError>> + Send;

    fn fetch_attendance(
        &self,
        session: Option<SessionId>,
    ) -> impl Future<Output = Result<Vec<AttendanceRecord>, ApiError>> + Send;

    fn fetch_report(&self) -> impl Future<Output = Result<Vec<u8>, ApiError>> + Send;
}

#[derive(Serialize)]
struct FrameRequest<'a> {
    frame: &'a str,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }

        let base = Url::parse(&normalized).map_err(|err| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                endpoint: "client",
                source,
            })?;

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &'static str) -> Result<Url, ApiError> {
        self.base.join(path).map_err(|err| ApiError::InvalidBaseUrl {
            url: self.base.to_string(),
            reason: err.to_string(),
        })
    }

    /// Submit a data-URL encoded frame. Falls back to a degraded result
    /// instead of failing.
    pub async fn process_frame(&self, frame: &str) -> FrameResult {
        match self.try_process_frame(frame).await {
            Ok(result) => result,
            Err(err) => {
                log_error!("Error processing frame: {err}");
                FrameResult::degraded(err.to_string())
            }
        }
    }

    async fn try_process_frame(&self, frame: &str) -> Result<FrameResult, ApiError> {
        let url = self.endpoint(PROCESS_FRAME)?;
        log_debug!("POST {url} ({} byte frame)", frame.len());

        let response = self
            .http
            .post(url)
            .json(&FrameRequest { frame })
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: PROCESS_FRAME,
                source,
            })?;

        decode(PROCESS_FRAME, check(PROCESS_FRAME, response).await?).await
    }

    pub async fn get_attendance(
        &self,
        session: Option<&SessionId>,
    ) -> Result<Vec<AttendanceRecord>, ApiError> {
        let url = self.endpoint(GET_ATTENDANCE)?;
        let mut request = self.http.get(url);
        if let Some(session) = session {
            request = request.query(&[("session_id", session.as_str())]);
        }

        let response = request.send().await.map_err(|source| ApiError::Transport {
            endpoint: GET_ATTENDANCE,
            source,
        })?;

        decode(GET_ATTENDANCE, check(GET_ATTENDANCE, response).await?).await
    }

    pub async fn download_attendance(&self) -> Result<Vec<u8>, ApiError> {
        let url = self.endpoint(DOWNLOAD_ATTENDANCE)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: DOWNLOAD_ATTENDANCE,
                source,
            })?;

        let bytes = check(DOWNLOAD_ATTENDANCE, response)
            .await?
            .bytes()
            .await
            .map_err(|source| ApiError::Decode {
                endpoint: DOWNLOAD_ATTENDANCE,
                source,
            })?;

        Ok(bytes.to_vec())
    }

    pub async fn reset_session(&self) -> Result<SessionId, ApiError> {
        let url = self.endpoint(RESET_SESSION)?;
        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: RESET_SESSION,
                source,
            })?;

        let body: SessionResponse = decode(RESET_SESSION, check(RESET_SESSION, response).await?).await?;
        Ok(SessionId::new(body.session_id))
    }

    pub async fn current_session(&self) -> Result<SessionId, ApiError> {
        let url = self.endpoint(CURRENT_SESSION)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: CURRENT_SESSION,
                source,
            })?;

        let body: SessionResponse =
            decode(CURRENT_SESSION, check(CURRENT_SESSION, response).await?).await?;
        Ok(SessionId::new(body.session_id))
    }
}

async fn check(endpoint: &'static str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error);

    Err(ApiError::Status {
        endpoint,
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(
    endpoint: &'static str,
    response: Response,
) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|source| ApiError::Decode { endpoint, source })
}

impl FrameAnalyzer for ApiClient {
    fn analyze_frame(&self, frame: String) -> impl Future<Output = FrameResult> + Send {
        async move { self.process_frame(&frame).await }
    }
}

impl AttendanceBackend for ApiClient {
    fn fetch_current_session(&self) -> impl Future<Output = Result<SessionId, ApiError>> + Send {
        self.current_session()
    }

    fn start_new_session(&self) -> impl Future<Output = Result<SessionId, ApiError>> + Send {
        self.reset_session()
    }

    fn fetch_attendance(
        &self,
        session: Option<SessionId>,
    ) -> impl Future<Output = Result<Vec<AttendanceRecord>, ApiError>> + Send {
        async move { self.get_attendance(session.as_ref()).await }
    }

    fn fetch_report(&self) -> impl Future<Output = Result<Vec<u8>, ApiError>> + Send {
        self.download_attendance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    /// Accepts one connection, answers it with `status` and `body`, and
    /// hands back the raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            let _ = tx.send(request);
        });

        (format!("http://{addr}/api/"), rx)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn base_url_without_trailing_slash_keeps_api_prefix() {
        let client = client("http://localhost:5000/api");
        assert_eq!(
            client.endpoint(PROCESS_FRAME).unwrap().as_str(),
            "http://localhost:5000/api/process-frame"
        );
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let err = ApiClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ApiError::InvalidBaseUrl { .. }));
    }

    #[tokio::test]
    async fn process_frame_posts_data_url() {
        let (base, request) = serve_once(
            "200 OK",
            r#"{"faces":["alice"],"engagement":90,"remarks":"Actively participating","gaze_status":"center","posture_status":"Good Posture","neck_angle":70,"left_bend":10,"right_bend":12,"posture_score":100,"activity_status":"Active"}"#,
        )
        .await;

        let result = client(&base).process_frame("data:image/jpeg;base64,AAAA").await;
        assert_eq!(result.faces, vec!["alice".to_string()]);
        assert_eq!(result.engagement, Some(90.0));
        assert!(!result.is_degraded());

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /api/process-frame"));
        assert!(request.contains(r#""frame":"data:image/jpeg;base64,AAAA""#));
    }

    #[tokio::test]
    async fn process_frame_degrades_on_server_error() {
        let (base, _request) = serve_once("500 Internal Server Error", r#"{"error":"list index out of range"}"#).await;

        let result = client(&base).process_frame("data:image/jpeg;base64,AAAA").await;
        assert!(result.is_degraded());
        let reason = result.error.unwrap();
        assert!(reason.contains("500"));
        assert!(reason.contains("list index out of range"));
    }

    #[tokio::test]
    async fn process_frame_degrades_when_backend_is_down() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = client(&format!("http://127.0.0.1:{port}/api/"))
            .process_frame("data:image/jpeg;base64,AAAA")
            .await;
        assert!(result.is_degraded());
        assert!(result.faces.is_empty());
    }

    #[tokio::test]
    async fn get_attendance_scopes_by_session() {
        let (base, request) = serve_once(
            "200 OK",
            r#"[{"date":"2024-03-01","session":"20240301093015","name":"alice","status":"Present","engagement":85,"remarks":"Actively participating","posture":"Good Posture"}]"#,
        )
        .await;

        let session = SessionId::new("20240301093015");
        let records = client(&base).get_attendance(Some(&session)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "alice");

        let request = request.await.unwrap();
        assert!(request.starts_with("GET /api/get-attendance?session_id=20240301093015 "));
    }

    #[tokio::test]
    async fn reset_session_surfaces_http_errors() {
        let (base, _request) = serve_once("503 Service Unavailable", r#"{"error":"busy"}"#).await;

        let err = client(&base).reset_session().await.unwrap_err();
        assert!(
            matches!(&err, ApiError::Status { status: 503, message: Some(m), .. } if m == "busy"),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn current_session_reads_session_id() {
        let (base, request) = serve_once("200 OK", r#"{"session_id":"20240301093015"}"#).await;

        let session = client(&base).current_session().await.unwrap();
        assert_eq!(session.as_str(), "20240301093015");
        assert!(request.await.unwrap().starts_with("GET /api/current-session"));
    }

    #[tokio::test]
    async fn download_returns_raw_bytes() {
        let (base, _request) = serve_once("200 OK", "PK-spreadsheet").await;

        let bytes = client(&base).download_attendance().await.unwrap();
        assert_eq!(bytes, b"PK-spreadsheet");
    }
}
