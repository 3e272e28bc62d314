//! Student and teacher dashboard state plus the notifications they raise.

pub mod commands;
mod notification;
pub mod student;
pub mod teacher;

pub use student::{run_feed_listener, StudentDashboard, StudentSnapshot};
pub use teacher::{AttendanceView, TeacherDashboard};

pub const NOTIFICATION_EVENT: &str = "notification";
pub const STUDENT_DASHBOARD_EVENT: &str = "student-dashboard-updated";
pub const ATTENDANCE_EVENT: &str = "attendance-updated";
pub const SESSION_EVENT: &str = "session-changed";
