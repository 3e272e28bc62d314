use std::ops::RangeInclusive;

use serde::Serialize;

use crate::api::{PostureReading, PostureStatus};

pub const NECK_IDEAL: RangeInclusive<f64> = 50.0..=90.0;
pub const BEND_IDEAL: RangeInclusive<f64> = 0.0..=40.0;

const IMPROVE_WARNING: &str = "Please improve your sitting posture";
const NO_PERSON: &str = "No person detected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PostureTone {
    Good,
    Bad,
    Neutral,
}

impl PostureTone {
    pub fn color(self) -> &'static str {
        match self {
            PostureTone::Good => "#22c55e",
            PostureTone::Bad => "#ef4444",
            PostureTone::Neutral => "#9ca3af",
        }
    }

    pub fn bar_class(self) -> &'static str {
        match self {
            PostureTone::Good => "bg-green-500",
            PostureTone::Bad => "bg-red-500",
            PostureTone::Neutral => "bg-gray-400",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            PostureTone::Good => "check-circle",
            PostureTone::Bad => "alert-triangle",
            PostureTone::Neutral => "scan-line",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AngleChip {
    pub label: &'static str,
    pub degrees: f64,
    pub ideal: bool,
}

impl AngleChip {
    fn new(label: &'static str, degrees: f64, ideal: &RangeInclusive<f64>) -> Self {
        Self {
            label,
            degrees,
            ideal: ideal.contains(&degrees),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureIndicator {
    pub tone: PostureTone,
    pub color: &'static str,
    pub bar_class: &'static str,
    pub icon: &'static str,
    pub status_label: String,
    pub score_percent: f64,
    pub angles: Vec<AngleChip>,
    pub warning: Option<&'static str>,
    pub message: Option<&'static str>,
}

impl PostureIndicator {
    pub fn from_reading(reading: &PostureReading) -> Self {
        if reading.activity_status.is_idle() {
            let tone = PostureTone::Neutral;
            return Self {
                tone,
                color: tone.color(),
                bar_class: tone.bar_class(),
                icon: tone.icon(),
                status_label: reading.posture_status.clone(),
                score_percent: 0.0,
                angles: Vec::new(),
                warning: None,
                message: Some(NO_PERSON),
            };
        }

        let tone = match reading.status() {
            PostureStatus::Good => PostureTone::Good,
            PostureStatus::Bad => PostureTone::Bad,
            PostureStatus::NotDetected => PostureTone::Neutral,
        };

        Self {
            tone,
            color: tone.color(),
            bar_class: tone.bar_class(),
            icon: tone.icon(),
            status_label: reading.posture_status.clone(),
            score_percent: reading.posture_score.clamp(0.0, 100.0),
            angles: vec![
                AngleChip::new("Neck Angle", reading.neck_angle, &NECK_IDEAL),
                AngleChip::new("Left Bend", reading.left_bend, &BEND_IDEAL),
                AngleChip::new("Right Bend", reading.right_bend, &BEND_IDEAL),
            ],
            warning: (tone == PostureTone::Bad).then_some(IMPROVE_WARNING),
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ActivityStatus;

    fn reading(status: &str, score: f64, activity: ActivityStatus) -> PostureReading {
        PostureReading {
            posture_status: status.into(),
            neck_angle: 95.0,
            left_bend: 12.0,
            right_bend: 40.0,
            posture_score: score,
            activity_status: activity,
        }
    }

    #[test]
    fn bad_posture_renders_warning() {
        let indicator = PostureIndicator::from_reading(&reading("Bad Posture", 65.0, ActivityStatus::Active));
        assert_eq!(indicator.tone, PostureTone::Bad);
        assert_eq!(indicator.color, "#ef4444");
        assert_eq!(indicator.warning, Some("Please improve your sitting posture"));
        assert_eq!(indicator.score_percent, 65.0);
    }

    #[test]
    fn good_posture_has_no_warning() {
        let indicator = PostureIndicator::from_reading(&reading("Good Posture", 95.0, ActivityStatus::Active));
        assert_eq!(indicator.tone, PostureTone::Good);
        assert_eq!(indicator.bar_class, "bg-green-500");
        assert!(indicator.warning.is_none());
        assert!(indicator.message.is_none());
    }

    #[test]
    fn angle_ranges_are_inclusive() {
        let indicator = PostureIndicator::from_reading(&reading("Bad Posture", 65.0, ActivityStatus::Active));
        let ideal: Vec<bool> = indicator.angles.iter().map(|chip| chip.ideal).collect();
        assert_eq!(ideal, vec![false, true, true]);
    }

    #[test]
    fn inactive_hides_details_regardless_of_status() {
        let indicator = PostureIndicator::from_reading(&reading("Bad Posture", 65.0, ActivityStatus::Inactive));
        assert!(indicator.angles.is_empty());
        assert!(indicator.warning.is_none());
        assert_eq!(indicator.message, Some("No person detected"));
        assert_eq!(indicator.tone, PostureTone::Neutral);
    }

    #[test]
    fn unknown_status_is_neutral_and_score_is_clamped() {
        let indicator = PostureIndicator::from_reading(&reading("Not detected", 140.0, ActivityStatus::PartiallyActive));
        assert_eq!(indicator.tone, PostureTone::Neutral);
        assert_eq!(indicator.icon, "scan-line");
        assert_eq!(indicator.score_percent, 100.0);
        assert_eq!(indicator.angles.len(), 3);
    }
}
