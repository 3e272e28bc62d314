//! Seam between the Rust core and the webview.

use serde::Serialize;
use serde_json::Value;
use tauri::{AppHandle, Emitter};

/// Receives named JSON events destined for the webview.
pub trait EventSink: Send + Sync + 'static {
    fn emit_json(&self, event: &'static str, payload: Value);
}

/// Serialise `payload` and hand it to `sink`.
pub fn emit<T: Serialize>(sink: &dyn EventSink, event: &'static str, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(value) => sink.emit_json(event, value),
        Err(err) => log::error!("failed to serialise {event} payload: {err}"),
    }
}

impl EventSink for AppHandle {
    fn emit_json(&self, event: &'static str, payload: Value) {
        if let Err(err) = self.emit(event, payload) {
            log::warn!("failed to emit {event}: {err}");
        }
    }
}
