use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::{AttendanceBackend, AttendanceRecord, SessionId};
use crate::events::{emit, EventSink};
use crate::indicators::AttendanceCard;

use super::notification::Notification;
use super::{ATTENDANCE_EVENT, NOTIFICATION_EVENT, SESSION_EVENT};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: SessionId,
    pub label: String,
}

impl SessionView {
    fn new(id: &SessionId) -> Self {
        Self {
            id: id.clone(),
            label: id.display_label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceView {
    pub session: Option<SessionView>,
    pub cards: Vec<AttendanceCard>,
}

impl AttendanceView {
    fn new(session: Option<&SessionId>, records: &[AttendanceRecord], threshold: f64) -> Self {
        Self {
            session: session.map(SessionView::new),
            cards: records
                .iter()
                .map(|record| AttendanceCard::from_record(record, threshold))
                .collect(),
        }
    }
}

struct TeacherShared<B> {
    backend: Arc<B>,
    session: Mutex<Option<SessionId>>,
    records: Mutex<Vec<AttendanceRecord>>,
    alert_threshold: Mutex<f64>,
    sink: Arc<dyn EventSink>,
}

impl<B: AttendanceBackend> TeacherShared<B> {
    async fn load_current_session(&self) -> Option<SessionId> {
        match self.backend.fetch_current_session().await {
            Ok(session) => {
                log_info!("Current session {session}");
                self.set_session(session.clone()).await;
                Some(session)
            }
            Err(err) => {
                log_warn!("Error fetching current session: {err}");
                None
            }
        }
    }

    async fn set_session(&self, session: SessionId) {
        *self.session.lock().await = Some(session.clone());
        emit(self.sink.as_ref(), SESSION_EVENT, &SessionView::new(&session));
    }

    async fn refresh(&self) -> Result<AttendanceView> {
        let session = self.session.lock().await.clone();
        let records = self
            .backend
            .fetch_attendance(session.clone())
            .await
            .context("Error fetching attendance")?;

        log_debug!("Fetched {} attendance records", records.len());
        let threshold = *self.alert_threshold.lock().await;
        let view = AttendanceView::new(session.as_ref(), &records, threshold);
        *self.records.lock().await = records;
        emit(self.sink.as_ref(), ATTENDANCE_EVENT, &view);
        Ok(view)
    }

    async fn cached_view(&self) -> AttendanceView {
        let session = self.session.lock().await.clone();
        let threshold = *self.alert_threshold.lock().await;
        let records = self.records.lock().await;
        AttendanceView::new(session.as_ref(), &records, threshold)
    }

    fn notify(&self, notification: Notification) {
        emit(self.sink.as_ref(), NOTIFICATION_EVENT, &notification);
    }
}

/// Teacher view: polls the attendance list for the current session and
/// runs the session-reset and report-download actions.
pub struct TeacherDashboard<B> {
    shared: Arc<TeacherShared<B>>,
    refresh: Arc<Notify>,
    poll_interval: Duration,
    poller: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl<B: AttendanceBackend> TeacherDashboard<B> {
    pub fn new(
        backend: Arc<B>,
        sink: Arc<dyn EventSink>,
        poll_interval: Duration,
        alert_threshold: f64,
    ) -> Self {
        Self {
            shared: Arc::new(TeacherShared {
                backend,
                session: Mutex::new(None),
                records: Mutex::new(Vec::new()),
                alert_threshold: Mutex::new(alert_threshold),
                sink,
            }),
            refresh: Arc::new(Notify::new()),
            poll_interval,
            poller: None,
            cancel_token: None,
        }
    }

    /// Spawn the poller. Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.poller.is_some() {
            return;
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(poll_attendance(
            Arc::clone(&self.shared),
            Arc::clone(&self.refresh),
            self.poll_interval,
            cancel_token.clone(),
        ));

        self.poller = Some(handle);
        self.cancel_token = Some(cancel_token);
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.poller.take() {
            handle.await.context("attendance poller failed to join")
        } else {
            Ok(())
        }
    }

    /// Applies from the next attendance fetch.
    pub async fn set_threshold(&self, threshold: f64) {
        *self.shared.alert_threshold.lock().await = threshold;
    }

    pub async fn current_session(&self) -> Option<SessionId> {
        let known = self.shared.session.lock().await.clone();
        match known {
            Some(session) => Some(session),
            None => self.shared.load_current_session().await,
        }
    }

    /// Fetch now; falls back to the last fetched list when the backend fails.
    pub async fn attendance(&self) -> Result<AttendanceView> {
        match self.shared.refresh().await {
            Ok(view) => Ok(view),
            Err(err) => {
                let cached = self.shared.cached_view().await;
                if cached.cards.is_empty() {
                    Err(err)
                } else {
                    log_warn!("{err:#}; serving cached attendance");
                    Ok(cached)
                }
            }
        }
    }

    pub async fn reset_session(&self) -> Result<SessionId> {
        match self.shared.backend.start_new_session().await {
            Ok(session) => {
                log_info!("Started new session {session}");
                self.shared.set_session(session.clone()).await;
                self.shared.records.lock().await.clear();
                self.refresh.notify_one();
                self.shared.notify(Notification::info(
                    "New Session Started",
                    "Previous attendance records have been archived and a new session has begun.",
                ));
                Ok(session)
            }
            Err(err) => {
                log_warn!("Error resetting session: {err}");
                self.shared.notify(Notification::destructive(
                    "Error",
                    "Failed to start a new session. Please try again.",
                ));
                Err(err).context("failed to reset session")
            }
        }
    }

    /// Save the backend's spreadsheet into `dir` as
    /// `attendance_YYYY-MM-DD.xlsx`.
    pub async fn download_report(&self, dir: &Path) -> Result<PathBuf> {
        match self.save_report(dir).await {
            Ok(path) => {
                log_info!("Attendance report saved to {}", path.display());
                self.shared.notify(Notification::info(
                    "Success",
                    "Attendance report downloaded successfully",
                ));
                Ok(path)
            }
            Err(err) => {
                log_warn!("Error downloading attendance: {err:#}");
                self.shared.notify(Notification::destructive(
                    "Error",
                    "Failed to download attendance report",
                ));
                Err(err)
            }
        }
    }

    async fn save_report(&self, dir: &Path) -> Result<PathBuf> {
        let bytes = self
            .shared
            .backend
            .fetch_report()
            .await
            .context("Error downloading attendance")?;

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("cannot create {}", dir.display()))?;

        let path = dir.join(report_file_name());
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("cannot write {}", path.display()))?;
        Ok(path)
    }
}

pub fn report_file_name() -> String {
    format!("attendance_{}.xlsx", Local::now().format("%Y-%m-%d"))
}

async fn poll_attendance<B: AttendanceBackend>(
    shared: Arc<TeacherShared<B>>,
    refresh: Arc<Notify>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) {
    shared.load_current_session().await;

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = refresh.notified() => {}
            _ = cancel_token.cancelled() => {
                log_info!("attendance poller shutting down");
                break;
            }
        }

        if let Err(err) = shared.refresh().await {
            log_warn!("{err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::events::testing::RecordingSink;
    use std::future::{ready, Future};
    use std::sync::Mutex as StdMutex;

    struct FakeBackend {
        session: StdMutex<String>,
        fetches: StdMutex<Vec<Option<SessionId>>>,
        fail_reset: bool,
        fail_attendance: StdMutex<bool>,
    }

    impl FakeBackend {
        fn new(session: &str) -> Self {
            Self {
                session: StdMutex::new(session.to_string()),
                fetches: StdMutex::new(Vec::new()),
                fail_reset: false,
                fail_attendance: StdMutex::new(false),
            }
        }

        fn fetches(&self) -> Vec<Option<SessionId>> {
            self.fetches.lock().unwrap().clone()
        }
    }

    fn server_error(endpoint: &'static str) -> ApiError {
        ApiError::Status {
            endpoint,
            status: 500,
            message: None,
        }
    }

    impl AttendanceBackend for FakeBackend {
        fn fetch_current_session(&self) -> impl Future<Output = Result<SessionId, ApiError>> + Send {
            ready(Ok(SessionId::new(self.session.lock().unwrap().clone())))
        }

        fn start_new_session(&self) -> impl Future<Output = Result<SessionId, ApiError>> + Send {
            let result = if self.fail_reset {
                Err(server_error("reset-session"))
            } else {
                let mut session = self.session.lock().unwrap();
                *session = "20240302080000".to_string();
                Ok(SessionId::new(session.clone()))
            };
            ready(result)
        }

        fn fetch_attendance(
            &self,
            session: Option<SessionId>,
        ) -> impl Future<Output = Result<Vec<AttendanceRecord>, ApiError>> + Send {
            self.fetches.lock().unwrap().push(session.clone());
            let result = if *self.fail_attendance.lock().unwrap() {
                Err(server_error("get-attendance"))
            } else {
                Ok(vec![AttendanceRecord {
                    date: "2024-03-01".into(),
                    session: session.map(|s| s.to_string()).unwrap_or_default(),
                    name: "alice".into(),
                    status: "Present".into(),
                    engagement: 85.0,
                    remarks: "Actively participating".into(),
                    posture: "Good Posture".into(),
                }])
            };
            ready(result)
        }

        fn fetch_report(&self) -> impl Future<Output = Result<Vec<u8>, ApiError>> + Send {
            ready(Ok(b"PK-sheet".to_vec()))
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn dashboard(backend: &Arc<FakeBackend>, sink: &Arc<RecordingSink>, every: Duration) -> TeacherDashboard<FakeBackend> {
        TeacherDashboard::new(Arc::clone(backend), sink.clone(), every, 70.0)
    }

    #[tokio::test]
    async fn poller_scopes_attendance_to_current_session() {
        let backend = Arc::new(FakeBackend::new("20240301093015"));
        let sink = Arc::new(RecordingSink::default());
        let mut teacher = dashboard(&backend, &sink, Duration::from_millis(30));

        teacher.start();
        wait_for(|| backend.fetches().len() >= 3).await;
        teacher.stop().await.unwrap();

        assert!(backend
            .fetches()
            .iter()
            .all(|session| session.as_ref().map(SessionId::as_str) == Some("20240301093015")));

        let updates = sink.named(ATTENDANCE_EVENT);
        assert!(!updates.is_empty());
        assert_eq!(updates[0]["session"]["label"], "2024-03-01 09:30:15");
        assert_eq!(updates[0]["cards"][0]["name"], "alice");
    }

    #[tokio::test]
    async fn reset_switches_session_and_refreshes_immediately() {
        let backend = Arc::new(FakeBackend::new("20240301093015"));
        let sink = Arc::new(RecordingSink::default());
        let mut teacher = dashboard(&backend, &sink, Duration::from_secs(3600));

        teacher.start();
        wait_for(|| backend.fetches().len() == 1).await;

        let session = teacher.reset_session().await.unwrap();
        assert_eq!(session.as_str(), "20240302080000");

        wait_for(|| backend.fetches().len() == 2).await;
        teacher.stop().await.unwrap();

        assert_eq!(backend.fetches()[1], Some(session.clone()));
        assert_eq!(teacher.current_session().await, Some(session));

        let notifications = sink.named(NOTIFICATION_EVENT);
        assert_eq!(notifications[0]["title"], "New Session Started");
        assert_eq!(sink.named(SESSION_EVENT).len(), 2);
    }

    #[tokio::test]
    async fn failed_reset_keeps_session_and_notifies() {
        let mut fake = FakeBackend::new("20240301093015");
        fake.fail_reset = true;
        let backend = Arc::new(fake);
        let sink = Arc::new(RecordingSink::default());
        let teacher = dashboard(&backend, &sink, Duration::from_secs(3600));

        assert_eq!(teacher.current_session().await.unwrap().as_str(), "20240301093015");
        assert!(teacher.reset_session().await.is_err());
        assert_eq!(teacher.current_session().await.unwrap().as_str(), "20240301093015");

        let notifications = sink.named(NOTIFICATION_EVENT);
        assert_eq!(notifications[0]["variant"], "destructive");
        assert_eq!(
            notifications[0]["description"],
            "Failed to start a new session. Please try again."
        );
    }

    #[tokio::test]
    async fn attendance_falls_back_to_cached_list() {
        let backend = Arc::new(FakeBackend::new("20240301093015"));
        let sink = Arc::new(RecordingSink::default());
        let teacher = dashboard(&backend, &sink, Duration::from_secs(3600));

        assert!(teacher.attendance().await.is_ok());
        *backend.fail_attendance.lock().unwrap() = true;

        let cached = teacher.attendance().await.unwrap();
        assert_eq!(cached.cards.len(), 1);
    }

    #[tokio::test]
    async fn cards_follow_updated_threshold() {
        let backend = Arc::new(FakeBackend::new("20240301093015"));
        let sink = Arc::new(RecordingSink::default());
        let teacher = dashboard(&backend, &sink, Duration::from_secs(3600));

        assert!(!teacher.attendance().await.unwrap().cards[0].needs_attention);

        teacher.set_threshold(90.0).await;
        assert!(teacher.attendance().await.unwrap().cards[0].needs_attention);
    }

    #[tokio::test]
    async fn attendance_error_without_cache_propagates() {
        let backend = Arc::new(FakeBackend::new("20240301093015"));
        *backend.fail_attendance.lock().unwrap() = true;
        let sink = Arc::new(RecordingSink::default());
        let teacher = dashboard(&backend, &sink, Duration::from_secs(3600));

        assert!(teacher.attendance().await.is_err());
    }

    #[tokio::test]
    async fn download_saves_dated_spreadsheet() {
        let backend = Arc::new(FakeBackend::new("20240301093015"));
        let sink = Arc::new(RecordingSink::default());
        let teacher = dashboard(&backend, &sink, Duration::from_secs(3600));
        let dir = tempfile::tempdir().unwrap();

        let path = teacher.download_report(&dir.path().join("reports")).await.unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), report_file_name());
        assert_eq!(std::fs::read(&path).unwrap(), b"PK-sheet");
        assert_eq!(sink.named(NOTIFICATION_EVENT)[0]["title"], "Success");
    }

    #[tokio::test]
    async fn stop_halts_polling() {
        let backend = Arc::new(FakeBackend::new("20240301093015"));
        let sink = Arc::new(RecordingSink::default());
        let mut teacher = dashboard(&backend, &sink, Duration::from_millis(20));

        teacher.start();
        wait_for(|| !backend.fetches().is_empty()).await;
        teacher.stop().await.unwrap();

        let after_stop = backend.fetches().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.fetches().len(), after_stop);
    }
}
