use std::path::PathBuf;

use tauri::{AppHandle, Manager, State};
use tauri_plugin_opener::OpenerExt;

use crate::api::SessionId;
use crate::AppState;

use super::{AttendanceView, StudentSnapshot};

#[tauri::command]
pub async fn get_student_dashboard(state: State<'_, AppState>) -> Result<StudentSnapshot, String> {
    Ok(state.student.lock().await.snapshot())
}

#[tauri::command]
pub async fn get_current_session(state: State<'_, AppState>) -> Result<Option<SessionId>, String> {
    Ok(state.teacher.lock().await.current_session().await)
}

#[tauri::command]
pub async fn get_attendance(state: State<'_, AppState>) -> Result<AttendanceView, String> {
    state
        .teacher
        .lock()
        .await
        .attendance()
        .await
        .map_err(|e| format!("{e:#}"))
}

#[tauri::command]
pub async fn reset_session(state: State<'_, AppState>) -> Result<SessionId, String> {
    state
        .teacher
        .lock()
        .await
        .reset_session()
        .await
        .map_err(|e| format!("{e:#}"))
}

/// Save the attendance spreadsheet, by default into the user's download
/// directory, and optionally reveal it in the file manager.
#[tauri::command]
pub async fn download_attendance(
    app_handle: AppHandle,
    state: State<'_, AppState>,
    dir: Option<PathBuf>,
    reveal: Option<bool>,
) -> Result<PathBuf, String> {
    let dir = match dir {
        Some(dir) => dir,
        None => app_handle.path().download_dir().map_err(|e| e.to_string())?,
    };

    let path = state
        .teacher
        .lock()
        .await
        .download_report(&dir)
        .await
        .map_err(|e| format!("{e:#}"))?;

    if reveal.unwrap_or(false) {
        if let Err(err) = app_handle.opener().reveal_item_in_dir(&path) {
            log::warn!("Could not reveal {}: {err}", path.display());
        }
    }

    Ok(path)
}
