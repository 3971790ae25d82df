//! Host-side state shared by every import.
//!
//! One [`HostState`] is built at startup and moved into the wasmtime `Store`; imports reach it
//! through `Caller::data_mut`. Nothing here is global.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use wasmtime::Memory;

use crate::assets::{ImageLoader, ResourceCache, SoundLoader};
use crate::audio::AudioAdapter;
use crate::canvas::{CanvasError, SkiaCanvas, Surface};
use crate::config::HostConfig;
use crate::input::InputQueue;
use crate::storage::{StorageError, StoreAdapter};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to create canvas: {0}")]
    Canvas(#[from] CanvasError),
    #[error("failed to read font '{path}': {source}")]
    Font {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open storage: {0}")]
    Storage(#[from] StorageError),
}

/// Source of `milliTimestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Wall clock, milliseconds since the Unix epoch.
    System,
    /// Fixed value, moved forward by the runtime each frame.
    Manual(i64),
}

impl Clock {
    pub fn now_millis(&self) -> i64 {
        match *self {
            Clock::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
                .unwrap_or(0),
            Clock::Manual(millis) => millis,
        }
    }

    /// Set a manual clock to `millis`. The system clock ignores this.
    pub fn advance_to(&mut self, millis: i64) {
        if let Clock::Manual(now) = self {
            *now = millis;
        }
    }
}

/// Everything the imports touch.
pub struct HostState {
    pub surface: Surface<SkiaCanvas>,
    pub images: ResourceCache<ImageLoader>,
    pub audio: AudioAdapter<SoundLoader>,
    pub store: StoreAdapter,
    pub input: InputQueue,
    /// Guest `memory` export, set once the module is instantiated.
    pub memory: Option<Memory>,
    pub clock: Clock,
    pub fps: u32,
}

impl HostState {
    pub fn new(config: &HostConfig) -> Result<Self, StateError> {
        let mut canvas = SkiaCanvas::new(config.canvas.width, config.canvas.height)?;
        if let Some(path) = &config.canvas.font {
            let bytes = std::fs::read(path).map_err(|source| StateError::Font {
                path: path.clone(),
                source,
            })?;
            canvas = canvas.with_font(&bytes)?;
        }

        let mut surface = Surface::new(canvas);
        surface.clear(&config.canvas.background);
        surface.fill_style("#000000");

        let root = &config.assets.root;
        tracing::debug!(
            width = config.canvas.width,
            height = config.canvas.height,
            assets = %root.display(),
            "host state ready"
        );

        Ok(Self {
            surface,
            images: ResourceCache::new(ImageLoader::new(root)),
            audio: AudioAdapter::new(SoundLoader::new(root), config.audio.sample_rate),
            store: StoreAdapter::from_config(&config.storage)?,
            input: InputQueue::new(),
            memory: None,
            clock: Clock::System,
            fps: config.audio.fps,
        })
    }

    /// Cursor style last requested by the guest, in CSS form.
    pub fn cursor(&self) -> &str {
        self.surface.cursor()
    }

    /// Interleaved stereo samples per frame.
    pub fn samples_per_frame(&self) -> usize {
        self.audio.frame_len(self.fps) * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;

    fn memory_config() -> HostConfig {
        let mut config = HostConfig::default();
        config.canvas.width = 8;
        config.canvas.height = 4;
        config.storage.backend = StorageBackend::Memory;
        config
    }

    #[test]
    fn starts_cleared_to_background() {
        let mut config = memory_config();
        config.canvas.background = "#ff0000".into();
        let state = HostState::new(&config).unwrap();
        let px = state.surface.canvas().pixel(3, 2).unwrap();
        assert_eq!((px.r, px.g, px.b, px.a), (255, 0, 0, 255));
        assert_eq!(state.cursor(), "default");
    }

    #[test]
    fn missing_font_is_an_error() {
        let mut config = memory_config();
        config.canvas.font = Some(PathBuf::from("/definitely/not/here.ttf"));
        assert!(matches!(
            HostState::new(&config),
            Err(StateError::Font { .. })
        ));
    }

    #[test]
    fn manual_clock_only_moves_when_told() {
        let mut clock = Clock::Manual(5);
        assert_eq!(clock.now_millis(), 5);
        clock.advance_to(21);
        assert_eq!(clock.now_millis(), 21);

        let mut system = Clock::System;
        system.advance_to(0);
        assert!(system.now_millis() > 0);
    }

    #[test]
    fn samples_per_frame_is_stereo() {
        let state = HostState::new(&memory_config()).unwrap();
        assert_eq!(state.samples_per_frame(), 44_100 / 60 * 2);
    }
}
