use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::api::DEFAULT_BASE_URL;
use crate::indicators::engagement::LOW_ENGAGEMENT_THRESHOLD;

pub const API_URL_ENV: &str = "CLASSWATCH_API_URL";
pub const REPLAY_DIR_ENV: &str = "CLASSWATCH_REPLAY_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FrameSourceConfig {
    Camera { device_id: i32 },
    Replay { dir: PathBuf },
}

impl Default for FrameSourceConfig {
    fn default() -> Self {
        FrameSourceConfig::Camera { device_id: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub api_base_url: String,
    pub capture_interval_ms: u64,
    pub attendance_poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub jpeg_quality: u8,
    pub engagement_alert_threshold: f64,
    pub frame_source: FrameSourceConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            capture_interval_ms: 1000,
            attendance_poll_interval_ms: 10_000,
            request_timeout_ms: 5000,
            jpeg_quality: 80,
            engagement_alert_threshold: LOW_ENGAGEMENT_THRESHOLD,
            frame_source: FrameSourceConfig::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            bail!("apiBaseUrl must not be empty");
        }
        if self.capture_interval_ms < 100 {
            bail!("captureIntervalMs must be at least 100");
        }
        if self.request_timeout_ms < 100 {
            bail!("requestTimeoutMs must be at least 100");
        }
        if self.attendance_poll_interval_ms < 1000 {
            bail!("attendancePollIntervalMs must be at least 1000");
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!("jpegQuality must be between 1 and 100");
        }
        if !(0.0..=100.0).contains(&self.engagement_alert_threshold) {
            bail!("engagementAlertThreshold must be between 0 and 100");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.attendance_poll_interval_ms)
    }

    /// Apply environment overrides; `lookup` is `std::env::var` outside tests.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(dir) = lookup(REPLAY_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.frame_source = FrameSourceConfig::Replay { dir: dir.into() };
        }
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<Settings>(&contents) {
                Ok(settings) if settings.validate().is_ok() => settings,
                Ok(_) | Err(_) => {
                    log::warn!("Ignoring invalid settings file {}", path.display());
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Settings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Settings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stored settings before environment overrides.
    pub fn stored(&self) -> Settings {
        self.read().clone()
    }

    /// Settings in effect: stored values with environment overrides applied.
    pub fn effective(&self) -> Settings {
        self.stored().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
