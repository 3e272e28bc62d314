mod api;
mod capture;
mod dashboard;
mod events;
mod indicators;
mod settings;
mod utils;

use std::sync::Arc;

use api::ApiClient;
use capture::{
    commands::{get_feed_state, reset_attendance, start_camera, stop_camera},
    CaptureController,
};
use dashboard::{
    commands::{
        download_attendance, get_attendance, get_current_session, get_student_dashboard,
        reset_session,
    },
    run_feed_listener, StudentDashboard, TeacherDashboard,
};
use events::EventSink;
use settings::{Settings, SettingsStore};
use tauri::{Manager, RunEvent, State};
use tokio::sync::{broadcast, Mutex};

const FEED_BUS_CAPACITY: usize = 64;

pub(crate) struct AppState {
    pub(crate) api: Arc<ApiClient>,
    pub(crate) capture: Mutex<CaptureController>,
    pub(crate) student: Arc<Mutex<StudentDashboard>>,
    pub(crate) teacher: Mutex<TeacherDashboard<ApiClient>>,
    pub(crate) settings: SettingsStore,
}

#[tauri::command]
fn get_settings(state: State<AppState>) -> Result<Settings, String> {
    Ok(state.settings.stored())
}

/// Persist new settings. The alert threshold applies at once to both
/// dashboards. Capture settings apply from the next camera start, and the
/// backend URL and poll interval after a restart.
#[tauri::command]
async fn update_settings(settings: Settings, state: State<'_, AppState>) -> Result<Settings, String> {
    state
        .settings
        .update(settings.clone())
        .map_err(|e| e.to_string())?;

    state
        .student
        .lock()
        .await
        .set_threshold(settings.engagement_alert_threshold);
    state
        .teacher
        .lock()
        .await
        .set_threshold(settings.engagement_alert_threshold)
        .await;

    Ok(settings)
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Classwatch starting up...");

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let settings_store = SettingsStore::new(app_data_dir.join("settings.json"))?;
                let settings = settings_store.effective();
                let api = Arc::new(ApiClient::new(
                    &settings.api_base_url,
                    settings.request_timeout(),
                )?);
                log::info!("Using backend {}", api.base_url());
                let sink: Arc<dyn EventSink> = Arc::new(app.handle().clone());

                let (bus, feed_rx) = broadcast::channel(FEED_BUS_CAPACITY);
                let capture = CaptureController::new(bus);

                let student = Arc::new(Mutex::new(StudentDashboard::new(
                    settings.engagement_alert_threshold,
                )));
                tauri::async_runtime::spawn(run_feed_listener(
                    feed_rx,
                    capture.feed_state(),
                    Arc::clone(&student),
                    Arc::clone(&sink),
                ));

                let mut teacher = TeacherDashboard::new(
                    Arc::clone(&api),
                    sink,
                    settings.poll_interval(),
                    settings.engagement_alert_threshold,
                );
                // The poller is spawned onto the runtime entered here.
                tauri::async_runtime::block_on(async { teacher.start() });

                app.manage(AppState {
                    api,
                    capture: Mutex::new(capture),
                    student,
                    teacher: Mutex::new(teacher),
                    settings: settings_store,
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            start_camera,
            stop_camera,
            reset_attendance,
            get_feed_state,
            get_student_dashboard,
            get_current_session,
            get_attendance,
            reset_session,
            download_attendance,
            get_settings,
            update_settings,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let RunEvent::Exit = event {
            let state = app_handle.state::<AppState>();
            tauri::async_runtime::block_on(async {
                if let Err(err) = state.capture.lock().await.stop_camera().await {
                    log::warn!("Error stopping camera on exit: {err:#}");
                }
                if let Err(err) = state.teacher.lock().await.stop().await {
                    log::warn!("Error stopping attendance poller on exit: {err:#}");
                }
            });
        }
    });
}
