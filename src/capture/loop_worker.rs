use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use anyhow::{Context, Result};
use image::RgbImage;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::{FrameAnalyzer, FrameResult};
use crate::settings::Settings;

use super::overlay;
use super::source::{encode_data_url, FrameSource};
use super::state::CameraFeedState;
use super::{FeedEvent, FramePreview};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    pub interval: Duration,
    pub jpeg_quality: u8,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            jpeg_quality: 80,
        }
    }
}

impl From<&Settings> for LoopConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            interval: Duration::from_millis(settings.capture_interval_ms),
            jpeg_quality: settings.jpeg_quality,
        }
    }
}

pub(crate) type SharedSource = Arc<StdMutex<Box<dyn FrameSource>>>;

struct Analysed {
    tick: u64,
    frame: RgbImage,
    result: FrameResult,
    elapsed_ms: u128,
}

fn lock_source(source: &SharedSource) -> MutexGuard<'_, Box<dyn FrameSource>> {
    match source.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Runs until `cancel_token` fires, then closes the source.
///
/// Analysis calls are spawned and never awaited by the loop; their results
/// come back over a channel and are applied in arrival order.
pub async fn capture_loop<A: FrameAnalyzer>(
    source: SharedSource,
    analyzer: Arc<A>,
    state: Arc<Mutex<CameraFeedState>>,
    bus: broadcast::Sender<FeedEvent>,
    config: LoopConfig,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Analysed>();
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick = tick.wrapping_add(1);
                if !state.lock().await.is_active() {
                    continue;
                }

                match capture_frame(&source, config.jpeg_quality).await {
                    Ok((frame, data_url)) => {
                        let analyzer = Arc::clone(&analyzer);
                        let done_tx = done_tx.clone();
                        tokio::spawn(async move {
                            let started = Instant::now();
                            let result = analyzer.analyze_frame(data_url).await;
                            // The loop may already be gone; late results are dropped.
                            let _ = done_tx.send(Analysed {
                                tick,
                                frame,
                                result,
                                elapsed_ms: started.elapsed().as_millis(),
                            });
                        });
                    }
                    Err(err) => log_warn!("frame capture failed on tick {tick}: {err:?}"),
                }
            }
            Some(analysed) = done_rx.recv() => {
                apply_analysis(analysed, &state, &bus, config.jpeg_quality).await;
            }
            _ = cancel_token.cancelled() => {
                log_info!("capture loop shutting down after {tick} ticks");
                break;
            }
        }
    }

    let closing = Arc::clone(&source);
    if let Err(err) = tokio::task::spawn_blocking(move || lock_source(&closing).close()).await {
        log_warn!("failed to close frame source: {err}");
    }
}

async fn capture_frame(source: &SharedSource, quality: u8) -> Result<(RgbImage, String)> {
    let source = Arc::clone(source);
    tokio::task::spawn_blocking(move || -> Result<(RgbImage, String)> {
        let frame = lock_source(&source).snapshot()?;
        let data_url = encode_data_url(&frame, quality)?;
        Ok((frame, data_url))
    })
    .await
    .context("capture worker join failed")?
}

async fn apply_analysis(
    analysed: Analysed,
    state: &Mutex<CameraFeedState>,
    bus: &broadcast::Sender<FeedEvent>,
    quality: u8,
) {
    let Analysed {
        tick,
        mut frame,
        result,
        elapsed_ms,
    } = analysed;

    if let Some(reason) = &result.error {
        log_warn!("analysis for tick {tick} failed after {elapsed_ms}ms: {reason}");
        return;
    }

    let (width, height) = frame.dimensions();
    let (outcome, badge) = {
        let mut guard = state.lock().await;
        if !guard.is_active() {
            log_debug!("dropping result for tick {tick}: camera stopped");
            return;
        }
        let Some(outcome) = guard.apply_result(&result, width, height) else {
            return;
        };
        (outcome, guard.badge())
    };

    log_debug!(
        "tick {tick} analysed in {elapsed_ms}ms: faces={:?} engagement={:?}",
        result.faces,
        result.engagement
    );

    if let Some(annotation) = &outcome.annotation {
        overlay::draw(&mut frame, annotation);
    }

    for event in outcome.events {
        let _ = bus.send(event);
    }

    match encode_data_url(&frame, quality) {
        Ok(image) => {
            let _ = bus.send(FeedEvent::Frame(FramePreview {
                image,
                width,
                height,
                badge_text: badge.text(),
                badge,
                annotation: outcome.annotation,
            }));
        }
        Err(err) => log_warn!("failed to encode preview for tick {tick}: {err:?}"),
    }
}
