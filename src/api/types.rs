//! Wire types for the inference backend's JSON contract.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// Name the backend reports for a face it could not match.
pub const UNKNOWN_FACE: &str = "Unknown";

const DEGRADED_REMARKS: &str = "Error processing image";
const DEGRADED_ENGAGEMENT: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActivityStatus {
    #[default]
    Active,
    PartiallyActive,
    Inactive,
    Other(String),
}

impl ActivityStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityStatus::Active => "Active",
            ActivityStatus::PartiallyActive => "Partially Active",
            ActivityStatus::Inactive => "Inactive",
            ActivityStatus::Other(value) => value,
        }
    }

    /// No person in frame.
    pub fn is_idle(&self) -> bool {
        matches!(self, ActivityStatus::Inactive)
    }
}

impl From<String> for ActivityStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Active" => ActivityStatus::Active,
            "Partially Active" => ActivityStatus::PartiallyActive,
            "Inactive" => ActivityStatus::Inactive,
            // An empty status is what a missing field looked like to the dashboard.
            "" => ActivityStatus::Active,
            _ => ActivityStatus::Other(value),
        }
    }
}

impl From<ActivityStatus> for String {
    fn from(value: ActivityStatus) -> Self {
        value.as_str().to_string()
    }
}

impl Serialize for ActivityStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.map(ActivityStatus::from).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PostureStatus {
    Good,
    Bad,
    NotDetected,
}

impl PostureStatus {
    pub fn from_label(label: &str) -> Self {
        match label {
            "Good Posture" => PostureStatus::Good,
            "Bad Posture" => PostureStatus::Bad,
            _ => PostureStatus::NotDetected,
        }
    }
}

/// Result of one `process-frame` round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    #[serde(default)]
    pub faces: Vec<String>,
    #[serde(default)]
    pub engagement: Option<f64>,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub gaze_status: Option<String>,
    #[serde(default)]
    pub posture_status: Option<String>,
    #[serde(default)]
    pub neck_angle: f64,
    #[serde(default)]
    pub left_bend: f64,
    #[serde(default)]
    pub right_bend: f64,
    #[serde(default)]
    pub posture_score: f64,
    #[serde(default)]
    pub activity_status: ActivityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameResult {
    /// Neutral result substituted when the backend could not be reached or
    /// answered with an error.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            faces: Vec::new(),
            engagement: Some(DEGRADED_ENGAGEMENT),
            remarks: DEGRADED_REMARKS.to_string(),
            gaze_status: Some("unknown".to_string()),
            posture_status: None,
            neck_angle: 0.0,
            left_bend: 0.0,
            right_bend: 0.0,
            posture_score: 0.0,
            activity_status: ActivityStatus::default(),
            error: Some(reason.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn first_face(&self) -> Option<&str> {
        self.faces.first().map(String::as_str)
    }

    /// Posture tuple, present only when the backend ran posture analysis.
    pub fn posture(&self) -> Option<PostureReading> {
        let status = self.posture_status.as_ref()?;
        Some(PostureReading {
            posture_status: status.clone(),
            neck_angle: self.neck_angle,
            left_bend: self.left_bend,
            right_bend: self.right_bend,
            posture_score: self.posture_score,
            activity_status: self.activity_status.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureReading {
    pub posture_status: String,
    pub neck_angle: f64,
    pub left_bend: f64,
    pub right_bend: f64,
    pub posture_score: f64,
    pub activity_status: ActivityStatus,
}

impl PostureReading {
    pub fn status(&self) -> PostureStatus {
        PostureStatus::from_label(&self.posture_status)
    }
}

impl Default for PostureReading {
    fn default() -> Self {
        Self {
            posture_status: "Not detected".to_string(),
            neck_angle: 0.0,
            left_bend: 0.0,
            right_bend: 0.0,
            posture_score: 100.0,
            activity_status: ActivityStatus::Active,
        }
    }
}

const NOT_RECORDED: &str = "Not recorded";

fn not_recorded() -> String {
    NOT_RECORDED.to_string()
}

/// Spreadsheet cells left empty arrive as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn null_as_not_recorded<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let posture = Option::<String>::deserialize(deserializer)?;
    Ok(posture
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(not_recorded))
}

/// Row of the backend's attendance sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub session: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub engagement: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remarks: String,
    #[serde(default = "not_recorded", deserialize_with = "null_as_not_recorded")]
    pub posture: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
}

/// Backend-minted session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Start time encoded in ids of the form `YYYYMMDDHHMMSS...`.
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        let stamp = self.0.get(..14)?;
        NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S").ok()
    }

    pub fn display_label(&self) -> String {
        match self.started_at() {
            Some(started) => started.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => self.0.clone(),
        }
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
