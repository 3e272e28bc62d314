use std::sync::Arc;

use tauri::State;

use crate::AppState;

use super::{FeedSnapshot, LoopConfig};

#[tauri::command]
pub async fn start_camera(state: State<'_, AppState>) -> Result<FeedSnapshot, String> {
    let settings = state.settings.effective();
    let mut controller = state.capture.lock().await;
    controller
        .start_configured(
            &settings.frame_source,
            Arc::clone(&state.api),
            LoopConfig::from(&settings),
        )
        .await
        .map_err(|e| e.to_string())?;
    Ok(controller.snapshot().await)
}

#[tauri::command]
pub async fn stop_camera(state: State<'_, AppState>) -> Result<FeedSnapshot, String> {
    let mut controller = state.capture.lock().await;
    controller.stop_camera().await.map_err(|e| e.to_string())?;
    Ok(controller.snapshot().await)
}

/// Lets the next recognised face mark attendance again.
#[tauri::command]
pub async fn reset_attendance(state: State<'_, AppState>) -> Result<(), String> {
    state.capture.lock().await.reset_attendance().await;
    state.student.lock().await.reset_attendance();
    Ok(())
}

#[tauri::command]
pub async fn get_feed_state(state: State<'_, AppState>) -> Result<FeedSnapshot, String> {
    Ok(state.capture.lock().await.snapshot().await)
}
