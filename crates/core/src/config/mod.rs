use std::{ops::Deref, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{matrix::MatrixLayout, matrix::Rgb, Result};

/// Top-level configuration structure for the clock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub matrix: MatrixConfig,
    pub render: RenderConfig,
    pub liveview: LiveviewConfig,
    pub audio: AudioConfig,
    pub pages: PagesConfig,
}

/// Physical matrix geometry and wiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub width: usize,
    pub height: usize,
    pub layout: MatrixLayout,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 8,
            layout: MatrixLayout::TiledRows,
        }
    }
}

/// Page rotation and frame pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub target_fps: u8,
    /// Default page dwell time; pages may override it individually.
    pub time_per_page_ms: u16,
    pub time_per_transition_ms: u16,
    pub auto_transition: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            time_per_page_ms: 5_000,
            time_per_transition_ms: 500,
            auto_transition: true,
        }
    }
}

/// Liveview sampling settings. An interval of zero disables capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveviewConfig {
    pub interval_ms: u16,
}

impl Default for LiveviewConfig {
    fn default() -> Self {
        Self { interval_ms: 250 }
    }
}

/// Configuration for the audio spectrum worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    /// Magnitude that maps to a full-scale band value.
    pub amplitude: f32,
    /// Magnitudes below this are treated as silence.
    pub noise_floor: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 40_000,
            block_size: 1024,
            amplitude: 1_000.0,
            noise_floor: 500.0,
        }
    }
}

/// Colors and toggles consumed by the built-in pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagesConfig {
    pub text_color: Rgb,
    pub weekday_active_color: Rgb,
    pub weekday_inactive_color: Rgb,
    pub show_weekday: bool,
    pub start_on_monday: bool,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            text_color: Rgb::new(255, 255, 255),
            weekday_active_color: Rgb::new(255, 160, 0),
            weekday_inactive_color: Rgb::new(40, 40, 40),
            show_weekday: true,
            start_on_monday: true,
        }
    }
}

impl AppConfig {
    /// Applies a partial settings update from the control boundary. Only
    /// the keys present in the JSON object are touched; everything else
    /// keeps its current value. Returns the updated configuration.
    pub fn with_settings_json(&self, json: &str) -> Result<AppConfig> {
        let doc: serde_json::Value = serde_json::from_str(json)?;
        let mut next = self.clone();

        if let Some(ms) = doc.get("appTime").and_then(|v| v.as_u64()) {
            next.render.time_per_page_ms = ms.min(u16::MAX as u64) as u16;
        }
        if let Some(ms) = doc.get("transition").and_then(|v| v.as_u64()) {
            next.render.time_per_transition_ms = ms.min(u16::MAX as u64) as u16;
        }
        if let Some(fps) = doc.get("fps").and_then(|v| v.as_u64()) {
            next.render.target_fps = fps.clamp(1, u8::MAX as u64) as u8;
        }
        if let Some(auto) = doc.get("autoTransition").and_then(|v| v.as_bool()) {
            next.render.auto_transition = auto;
        }
        if let Some(ms) = doc.get("liveviewInterval").and_then(|v| v.as_u64()) {
            next.liveview.interval_ms = ms.min(u16::MAX as u64) as u16;
        }

        Ok(next)
    }
}

/// Immutable, versioned view of the configuration handed to draw calls.
///
/// Reconfiguration builds a fresh snapshot and swaps the handle; a draw
/// call therefore always sees one consistent configuration version and
/// never a torn mix of old and new values.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    version: u64,
    inner: Arc<AppConfig>,
}

impl ConfigSnapshot {
    pub fn new(config: AppConfig) -> Self {
        Self {
            version: 0,
            inner: Arc::new(config),
        }
    }

    /// Produces the successor snapshot carrying `config`.
    pub fn updated(&self, config: AppConfig) -> Self {
        Self {
            version: self.version + 1,
            inner: Arc::new(config),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

impl Deref for ConfigSnapshot {
    type Target = AppConfig;

    fn deref(&self) -> &AppConfig {
        &self.inner
    }
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hardware() {
        let config = AppConfig::default();
        assert_eq!(config.matrix.width, 32);
        assert_eq!(config.matrix.height, 8);
        assert_eq!(config.render.target_fps, 30);
        assert_eq!(config.liveview.interval_ms, 250);
        assert_eq!(config.audio.block_size, 1024);
    }

    #[test]
    fn settings_json_touches_only_named_keys() {
        let config = AppConfig::default();
        let next = config
            .with_settings_json(r#"{"appTime": 7000, "autoTransition": false}"#)
            .unwrap();

        assert_eq!(next.render.time_per_page_ms, 7_000);
        assert!(!next.render.auto_transition);
        assert_eq!(next.render.target_fps, config.render.target_fps);
        assert_eq!(next.liveview.interval_ms, config.liveview.interval_ms);
    }

    #[test]
    fn settings_json_rejects_garbage() {
        let config = AppConfig::default();
        assert!(config.with_settings_json("not json").is_err());
    }

    #[test]
    fn snapshots_advance_version() {
        let snapshot = ConfigSnapshot::default();
        let mut config = snapshot.inner.as_ref().clone();
        config.render.target_fps = 25;
        let next = snapshot.updated(config);

        assert_eq!(snapshot.version(), 0);
        assert_eq!(next.version(), 1);
        assert_eq!(next.render.target_fps, 25);
        assert_eq!(snapshot.render.target_fps, 30);
    }
}
