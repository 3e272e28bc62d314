use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{Context, Result};
use log::{error, info};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::FrameAnalyzer;
use crate::settings::FrameSourceConfig;

use super::loop_worker::{capture_loop, LoopConfig};
use super::source::{build_source, FrameSource};
use super::state::{CameraFeedState, CaptureStatus, FeedBadge};
use super::FeedEvent;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    pub state: CameraFeedState,
    pub badge: FeedBadge,
}

pub struct CaptureController {
    state: Arc<Mutex<CameraFeedState>>,
    bus: broadcast::Sender<FeedEvent>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl CaptureController {
    pub fn new(bus: broadcast::Sender<FeedEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CameraFeedState::new())),
            bus,
            handle: None,
            cancel_token: None,
        }
    }

    fn publish(&self, event: FeedEvent) {
        let _ = self.bus.send(event);
    }

    /// Open `source` and start ticking. A source that fails to open leaves
    /// the feed inactive and publishes a camera error; there is no retry.
    pub async fn start_camera<A: FrameAnalyzer>(
        &mut self,
        source: Box<dyn FrameSource>,
        analyzer: Arc<A>,
        config: LoopConfig,
    ) -> Result<()> {
        self.state.lock().await.begin_start()?;
        self.publish(FeedEvent::Status {
            status: CaptureStatus::Starting,
        });

        let description = source.describe();
        info!("Opening frame source {description}");

        let opened = tokio::task::spawn_blocking(move || -> Result<Box<dyn FrameSource>> {
            let mut source = source;
            source.open()?;
            Ok(source)
        })
        .await
        .context("frame source open worker failed to join")
        .and_then(|opened| opened);

        let source = match opened {
            Ok(source) => source,
            Err(err) => {
                error!("Error accessing camera {description}: {err:?}");
                self.state.lock().await.mark_inactive();
                self.publish(FeedEvent::CameraError {
                    message: format!("Unable to access camera. Please check permissions. ({err})"),
                });
                self.publish(FeedEvent::Status {
                    status: CaptureStatus::Inactive,
                });
                return Err(err.context(format!("failed to open {description}")));
            }
        };

        self.state.lock().await.mark_active();
        self.publish(FeedEvent::Status {
            status: CaptureStatus::Active,
        });

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(capture_loop(
            Arc::new(StdMutex::new(source)),
            analyzer,
            Arc::clone(&self.state),
            self.bus.clone(),
            config,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("Camera feed active ({description}, every {:?})", config.interval);
        Ok(())
    }

    /// Build the configured source and start it. A source that cannot be
    /// built is reported the same way as one that fails to open.
    pub async fn start_configured<A: FrameAnalyzer>(
        &mut self,
        source: &FrameSourceConfig,
        analyzer: Arc<A>,
        config: LoopConfig,
    ) -> Result<()> {
        match build_source(source) {
            Ok(source) => self.start_camera(source, analyzer, config).await,
            Err(err) => {
                if self.state.lock().await.status != CaptureStatus::Inactive {
                    return Err(err);
                }
                error!("Error accessing camera: {err:?}");
                self.publish(FeedEvent::CameraError {
                    message: format!("Unable to access camera. Please check permissions. ({err})"),
                });
                Err(err)
            }
        }
    }

    /// Stop ticking and release the source. No-op when already stopped.
    pub async fn stop_camera(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        let joined = match self.handle.take() {
            Some(handle) => handle.await.context("capture loop task failed to join"),
            None => return Ok(()),
        };

        self.state.lock().await.mark_inactive();
        self.publish(FeedEvent::Status {
            status: CaptureStatus::Inactive,
        });
        info!("Camera feed stopped");
        joined
    }

    pub async fn reset_attendance(&self) {
        self.state.lock().await.reset_attendance();
    }

    /// Shared handle to the live feed state.
    pub fn feed_state(&self) -> Arc<Mutex<CameraFeedState>> {
        Arc::clone(&self.state)
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.lock().await.clone();
        FeedSnapshot {
            badge: state.badge(),
            state,
        }
    }
}
