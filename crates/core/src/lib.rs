//! Core library for the Matrix Clock.
//!
//! The crate contains the real-time render-and-telemetry pipeline of the
//! LED matrix clock: the page rotation scheduler with animated
//! transitions, the two-phase liveview frame streamer, and the
//! audio-spectrum worker that feeds the spectrum overlay. Each module
//! owns one subsystem; the host loop in the application crate wires them
//! together in a fixed per-iteration order (render, sample, sensors,
//! flush).

pub mod audio;
pub mod config;
pub mod error;
pub mod liveview;
pub mod matrix;
pub mod pages;
pub mod player;
pub mod scheduler;
pub mod sensors;

pub use audio::{
    spawn_spectrum_worker, AudioSource, SpectrumAnalyzer, SpectrumRead, SpectrumSlot,
    SPECTRUM_BANDS,
};
pub use config::{AppConfig, AudioConfig, ConfigSnapshot, LiveviewConfig, RenderConfig};
pub use error::{MatrixClockError, Result};
pub use liveview::{Liveview, LiveviewSink, LIVEVIEW_PREFIX};
pub use matrix::{FrameBuffer, MatrixLayout, Rgb};
pub use pages::{native_pages, DrawContext, PageDescriptor, PageRegistry};
pub use player::{Animation, AnimationLibrary, FramePlayer};
pub use scheduler::{PageMode, RenderEnv, RenderScheduler, UiState};
pub use sensors::{ClockReading, EnvReadings, WeatherReading};
