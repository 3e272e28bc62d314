use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;

use crate::api::{ActivityStatus, PostureReading, PostureStatus};
use crate::capture::{CameraFeedState, CaptureStatus, FeedEvent};
use crate::events::{emit, EventSink};
use crate::indicators::{EngagementIndicator, PostureIndicator};

use super::notification::Notification;
use super::{NOTIFICATION_EVENT, STUDENT_DASHBOARD_EVENT};

const LOW_ENGAGEMENT_FALLBACK: &str = "Please stay focused on the class";
const LOW_ENGAGEMENT_BANNER: &str = "Your engagement level is low. Please focus on the class.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSnapshot {
    pub engagement: EngagementIndicator,
    pub posture: PostureIndicator,
    pub activity_status: ActivityStatus,
    pub attendance_marked: bool,
    pub low_engagement_banner: Option<String>,
}

/// Student view state, driven by feed events.
///
/// Alerts fire on transitions: one low-engagement alert per drop below the
/// threshold and one posture alert per switch into bad posture. Neither fires
/// while no person is in frame.
pub struct StudentDashboard {
    threshold: f64,
    engagement: f64,
    remarks: String,
    posture: PostureReading,
    activity: ActivityStatus,
    attendance_marked: bool,
    low_engagement_alerted: bool,
    bad_posture_alerted: bool,
}

impl StudentDashboard {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            engagement: 100.0,
            remarks: String::new(),
            posture: PostureReading::default(),
            activity: ActivityStatus::Inactive,
            attendance_marked: false,
            low_engagement_alerted: false,
            bad_posture_alerted: false,
        }
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn reset_attendance(&mut self) {
        self.attendance_marked = false;
    }

    pub fn handle_event(&mut self, event: &FeedEvent) -> Vec<Notification> {
        let notification = match event {
            FeedEvent::Status {
                status: CaptureStatus::Active,
            } => Some(
                Notification::info("Camera activated", "Your camera feed is now active").lasting(3000),
            ),
            FeedEvent::Status { .. } | FeedEvent::Frame(_) => None,
            FeedEvent::CameraError { message } => {
                Some(Notification::destructive("Camera Error", message.clone()))
            }
            FeedEvent::Activity { status } => {
                self.activity = status.clone();
                None
            }
            FeedEvent::FaceDetected { faces } => self.on_face_detected(faces),
            FeedEvent::Engagement { score, remarks } => self.on_engagement(*score, remarks),
            FeedEvent::Posture(reading) => self.on_posture(reading),
        };

        notification.into_iter().collect()
    }

    fn on_face_detected(&mut self, faces: &[String]) -> Option<Notification> {
        let name = faces.first()?;
        if self.attendance_marked {
            return None;
        }
        self.attendance_marked = true;
        Some(
            Notification::info(
                "Attendance Marked Successfully",
                format!("Welcome {name}! Your attendance has been recorded."),
            )
            .lasting(5000),
        )
    }

    fn on_engagement(&mut self, score: f64, remarks: &str) -> Option<Notification> {
        self.engagement = score;
        self.remarks = remarks.to_string();

        if score >= self.threshold {
            self.low_engagement_alerted = false;
            return None;
        }
        // A zero score is what the backend reports with nobody to score.
        if score <= 0.0 || self.activity.is_idle() || self.low_engagement_alerted {
            return None;
        }

        self.low_engagement_alerted = true;
        let description = if remarks.is_empty() {
            LOW_ENGAGEMENT_FALLBACK.to_string()
        } else {
            remarks.to_string()
        };
        Some(Notification::destructive("Low Engagement Alert", description).lasting(5000))
    }

    fn on_posture(&mut self, reading: &PostureReading) -> Option<Notification> {
        self.posture = reading.clone();
        self.activity = reading.activity_status.clone();

        if reading.status() != PostureStatus::Bad {
            self.bad_posture_alerted = false;
            return None;
        }
        if self.activity.is_idle() || self.bad_posture_alerted {
            return None;
        }

        self.bad_posture_alerted = true;
        Some(
            Notification::destructive(
                "Poor Posture Detected",
                "Please sit up straight to improve your posture",
            )
            .lasting(5000),
        )
    }

    pub fn snapshot(&self) -> StudentSnapshot {
        let low_engagement_banner = (self.engagement < self.threshold).then(|| {
            if self.remarks.is_empty() {
                LOW_ENGAGEMENT_BANNER.to_string()
            } else {
                self.remarks.clone()
            }
        });

        StudentSnapshot {
            engagement: EngagementIndicator::new(self.engagement, &self.remarks, self.threshold),
            posture: PostureIndicator::from_reading(&self.posture),
            activity_status: self.activity.clone(),
            attendance_marked: self.attendance_marked,
            low_engagement_banner,
        }
    }
}

/// Forward feed events to the webview and fold them into the student
/// dashboard. Ends when every sender of the feed bus is gone.
///
/// After falling behind on the bus the dashboard is re-synced from
/// `feed_state`, so a dropped `FaceDetected` still raises its toast.
pub async fn run_feed_listener(
    mut rx: broadcast::Receiver<FeedEvent>,
    feed_state: Arc<Mutex<CameraFeedState>>,
    dashboard: Arc<Mutex<StudentDashboard>>,
    sink: Arc<dyn EventSink>,
) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("feed listener lagged, skipped {skipped} events; re-syncing");
                for event in resync_events(&feed_state).await {
                    deliver(&event, &dashboard, sink.as_ref()).await;
                }
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        deliver(&event, &dashboard, sink.as_ref()).await;
    }
    log::info!("feed listener stopped");
}

async fn resync_events(feed_state: &Mutex<CameraFeedState>) -> Vec<FeedEvent> {
    let state = feed_state.lock().await;
    let mut events = vec![FeedEvent::Activity {
        status: state.activity_status.clone(),
    }];
    events.extend(state.attendance_event());
    events
}

async fn deliver(event: &FeedEvent, dashboard: &Mutex<StudentDashboard>, sink: &dyn EventSink) {
    emit(sink, event.name(), event);

    if matches!(event, FeedEvent::Frame(_)) {
        return;
    }

    let (notifications, snapshot) = {
        let mut guard = dashboard.lock().await;
        let notifications = guard.handle_event(event);
        (notifications, guard.snapshot())
    };

    for notification in &notifications {
        emit(sink, NOTIFICATION_EVENT, notification);
    }
    emit(sink, STUDENT_DASHBOARD_EVENT, &snapshot);
}
