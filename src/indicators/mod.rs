//! View models for the dashboard cards. Pure functions of their inputs.

mod attendance;
pub mod engagement;
pub mod posture;

pub use attendance::AttendanceCard;
pub use engagement::EngagementIndicator;
pub use posture::PostureIndicator;
