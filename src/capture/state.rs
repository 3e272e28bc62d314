use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::api::{ActivityStatus, FrameResult, UNKNOWN_FACE};

use super::overlay::Annotation;
use super::FeedEvent;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CaptureStatus {
    #[default]
    Inactive,
    Starting,
    Active,
}

/// Status pill shown over the camera preview.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum FeedBadge {
    Marked(String),
    UnknownPerson,
    FaceDetected,
    NoActivity,
    Scanning,
}

impl FeedBadge {
    pub fn text(&self) -> String {
        match self {
            FeedBadge::Marked(name) => format!("Marked: {name}"),
            FeedBadge::UnknownPerson => "Unknown Person".to_string(),
            FeedBadge::FaceDetected => "Face Detected".to_string(),
            FeedBadge::NoActivity => "No Activity".to_string(),
            FeedBadge::Scanning => "Scanning".to_string(),
        }
    }
}

/// What applying one analysis result produced.
#[derive(Debug, Default, PartialEq)]
pub struct TickOutcome {
    pub events: Vec<FeedEvent>,
    pub annotation: Option<Annotation>,
}

/// Camera card state. Every mutation goes through one of the transition
/// methods below.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CameraFeedState {
    pub status: CaptureStatus,
    pub attendance_marked: bool,
    pub face_detected: bool,
    pub current_name: String,
    pub activity_status: ActivityStatus,
    /// Faces of the result that marked attendance.
    pub marked_faces: Vec<String>,
}

impl Default for CameraFeedState {
    fn default() -> Self {
        Self {
            status: CaptureStatus::Inactive,
            attendance_marked: false,
            face_detected: false,
            current_name: String::new(),
            activity_status: ActivityStatus::Inactive,
            marked_faces: Vec::new(),
        }
    }
}

impl CameraFeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_start(&mut self) -> Result<()> {
        match self.status {
            CaptureStatus::Inactive => {
                self.status = CaptureStatus::Starting;
                Ok(())
            }
            CaptureStatus::Starting => bail!("camera is already starting"),
            CaptureStatus::Active => bail!("camera already active"),
        }
    }

    pub fn mark_active(&mut self) {
        self.status = CaptureStatus::Active;
    }

    pub fn mark_inactive(&mut self) {
        self.status = CaptureStatus::Inactive;
    }

    pub fn is_active(&self) -> bool {
        self.status == CaptureStatus::Active
    }

    /// Allow the next recognised face to mark attendance again.
    pub fn reset_attendance(&mut self) {
        self.attendance_marked = false;
        self.marked_faces.clear();
    }

    /// The `FaceDetected` event that marked attendance, for subscribers that
    /// may have missed it.
    pub fn attendance_event(&self) -> Option<FeedEvent> {
        (self.attendance_marked && !self.marked_faces.is_empty()).then(|| FeedEvent::FaceDetected {
            faces: self.marked_faces.clone(),
        })
    }

    /// Fold one analysis result into the state. Degraded results leave the
    /// state untouched and yield `None`.
    pub fn apply_result(&mut self, result: &FrameResult, width: u32, height: u32) -> Option<TickOutcome> {
        if result.is_degraded() {
            return None;
        }

        let mut outcome = TickOutcome::default();

        self.activity_status = result.activity_status.clone();
        outcome.events.push(FeedEvent::Activity {
            status: self.activity_status.clone(),
        });

        match result.first_face() {
            Some(name) => {
                self.face_detected = true;
                self.current_name = name.to_string();

                if name == UNKNOWN_FACE {
                    outcome.annotation = Some(Annotation::unknown_face(width, height));
                } else if !self.attendance_marked {
                    self.attendance_marked = true;
                    self.marked_faces = result.faces.clone();
                    outcome.events.push(FeedEvent::FaceDetected {
                        faces: result.faces.clone(),
                    });
                    outcome.annotation = Some(Annotation::known_face(name, width, height));
                }
            }
            None => {
                self.face_detected = false;
                self.current_name.clear();
            }
        }

        if let Some(score) = result.engagement {
            outcome.events.push(FeedEvent::Engagement {
                score,
                remarks: result.remarks.clone(),
            });
        }

        if let Some(posture) = result.posture() {
            outcome.events.push(FeedEvent::Posture(posture));
        }

        Some(outcome)
    }

    pub fn badge(&self) -> FeedBadge {
        if self.attendance_marked {
            FeedBadge::Marked(self.current_name.clone())
        } else if self.face_detected {
            if self.current_name == UNKNOWN_FACE {
                FeedBadge::UnknownPerson
            } else {
                FeedBadge::FaceDetected
            }
        } else if self.activity_status.is_idle() {
            FeedBadge::NoActivity
        } else {
            FeedBadge::Scanning
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PostureReading;

    fn result(faces: &[&str]) -> FrameResult {
        FrameResult {
            faces: faces.iter().map(|f| f.to_string()).collect(),
            engagement: Some(85.0),
            remarks: "Actively participating".into(),
            gaze_status: Some("center".into()),
            posture_status: Some("Good Posture".into()),
            neck_angle: 70.0,
            left_bend: 15.0,
            right_bend: 18.0,
            posture_score: 100.0,
            activity_status: ActivityStatus::Active,
            error: None,
        }
    }

    fn face_events(outcome: &TickOutcome) -> usize {
        outcome
            .events
            .iter()
            .filter(|event| matches!(event, FeedEvent::FaceDetected { .. }))
            .count()
    }

    #[test]
    fn start_only_from_inactive() {
        let mut state = CameraFeedState::new();
        state.begin_start().unwrap();
        assert_eq!(state.status, CaptureStatus::Starting);
        assert!(state.begin_start().is_err());

        state.mark_active();
        assert!(state.begin_start().is_err());

        state.mark_inactive();
        assert!(state.begin_start().is_ok());
    }

    #[test]
    fn unknown_face_never_marks_attendance() {
        let mut state = CameraFeedState::new();
        for _ in 0..5 {
            let outcome = state.apply_result(&result(&["Unknown", "alice"]), 640, 480).unwrap();
            assert_eq!(face_events(&outcome), 0);
            assert_eq!(
                outcome.annotation.as_ref().map(|a| a.label.as_str()),
                Some("Unknown Person")
            );
        }
        assert!(!state.attendance_marked);
        assert_eq!(state.badge(), FeedBadge::UnknownPerson);
    }

    #[test]
    fn known_face_marks_attendance_exactly_once() {
        let mut state = CameraFeedState::new();

        let first = state.apply_result(&result(&["alice"]), 640, 480).unwrap();
        assert_eq!(face_events(&first), 1);
        assert!(first.annotation.is_some());

        let mut later = 0;
        for faces in [["alice"], ["bob"], ["alice"]] {
            let outcome = state.apply_result(&result(&faces), 640, 480).unwrap();
            later += face_events(&outcome);
            assert!(outcome.annotation.is_none());
        }
        assert_eq!(later, 0);
        assert_eq!(state.badge(), FeedBadge::Marked("alice".into()));
    }

    #[test]
    fn reset_rearms_attendance() {
        let mut state = CameraFeedState::new();
        state.apply_result(&result(&["alice"]), 640, 480).unwrap();
        state.reset_attendance();

        let outcome = state.apply_result(&result(&["bob"]), 640, 480).unwrap();
        assert_eq!(
            outcome.events.iter().find(|e| matches!(e, FeedEvent::FaceDetected { .. })),
            Some(&FeedEvent::FaceDetected { faces: vec!["bob".into()] })
        );
    }

    #[test]
    fn attendance_event_is_replayable_until_reset() {
        let mut state = CameraFeedState::new();
        assert!(state.attendance_event().is_none());

        state.apply_result(&result(&["alice"]), 640, 480).unwrap();
        state.apply_result(&result(&[]), 640, 480).unwrap();
        assert_eq!(
            state.attendance_event(),
            Some(FeedEvent::FaceDetected { faces: vec!["alice".into()] })
        );

        state.reset_attendance();
        assert!(state.attendance_event().is_none());
    }

    #[test]
    fn empty_faces_clear_detection() {
        let mut state = CameraFeedState::new();
        state.apply_result(&result(&["Unknown"]), 640, 480).unwrap();
        assert!(state.face_detected);

        let mut empty = result(&[]);
        empty.activity_status = ActivityStatus::Inactive;
        state.apply_result(&empty, 640, 480).unwrap();
        assert!(!state.face_detected);
        assert!(state.current_name.is_empty());
        assert_eq!(state.badge(), FeedBadge::NoActivity);
    }

    #[test]
    fn forwards_engagement_and_posture() {
        let mut state = CameraFeedState::new();
        let outcome = state.apply_result(&result(&[]), 640, 480).unwrap();

        assert!(outcome.events.contains(&FeedEvent::Engagement {
            score: 85.0,
            remarks: "Actively participating".into()
        }));
        assert!(outcome.events.contains(&FeedEvent::Posture(PostureReading {
            posture_status: "Good Posture".into(),
            neck_angle: 70.0,
            left_bend: 15.0,
            right_bend: 18.0,
            posture_score: 100.0,
            activity_status: ActivityStatus::Active,
        })));
        assert_eq!(
            outcome.events.first(),
            Some(&FeedEvent::Activity { status: ActivityStatus::Active })
        );
        assert_eq!(state.badge(), FeedBadge::Scanning);
    }

    #[test]
    fn missing_engagement_and_posture_emit_nothing() {
        let mut state = CameraFeedState::new();
        let mut bare = result(&[]);
        bare.engagement = None;
        bare.posture_status = None;

        let outcome = state.apply_result(&bare, 640, 480).unwrap();
        assert_eq!(outcome.events.len(), 1);
    }

    #[test]
    fn degraded_result_leaves_state_unchanged() {
        let mut state = CameraFeedState::new();
        state.mark_active();
        state.apply_result(&result(&["alice"]), 640, 480).unwrap();
        let before = state.clone();

        assert!(state
            .apply_result(&FrameResult::degraded("timeout"), 640, 480)
            .is_none());
        assert_eq!(state, before);
    }
}
