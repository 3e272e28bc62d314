//! Camera capture loop: samples frames on a fixed interval, ships them to
//! the backend and turns the answers into [`FeedEvent`]s.

#[cfg(feature = "camera")]
mod camera;
pub mod commands;
mod controller;
mod loop_worker;
pub mod overlay;
mod source;
mod state;

use serde::Serialize;

use crate::api::{ActivityStatus, PostureReading};

pub use controller::{CaptureController, FeedSnapshot};
pub use loop_worker::LoopConfig;
pub use overlay::Annotation;
pub use state::{CameraFeedState, CaptureStatus, FeedBadge};

/// Annotated preview of the frame a result belongs to.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FramePreview {
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub badge: FeedBadge,
    pub badge_text: String,
    pub annotation: Option<Annotation>,
}

/// Everything the capture loop reports to its subscribers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeedEvent {
    Status { status: CaptureStatus },
    CameraError { message: String },
    Activity { status: ActivityStatus },
    FaceDetected { faces: Vec<String> },
    Engagement { score: f64, remarks: String },
    Posture(PostureReading),
    Frame(FramePreview),
}

impl FeedEvent {
    /// Event name used when forwarding to the webview.
    pub fn name(&self) -> &'static str {
        match self {
            FeedEvent::Status { .. } => "feed-status",
            FeedEvent::CameraError { .. } => "feed-camera-error",
            FeedEvent::Activity { .. } => "feed-activity",
            FeedEvent::FaceDetected { .. } => "feed-face-detected",
            FeedEvent::Engagement { .. } => "feed-engagement",
            FeedEvent::Posture(_) => "feed-posture",
            FeedEvent::Frame(_) => "feed-frame",
        }
    }
}
