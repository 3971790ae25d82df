//! Per-path sound voices and the mixer that renders them.
//!
//! Every sound path owns at most one voice, so a sound never overlaps itself; games that want
//! overlapping copies load the same file under different paths.

use std::collections::HashMap;
use std::sync::Arc;

use crate::assets::{Asset, AssetLoader, ResourceCache, SoundClip, SoundLoader};

/// Playback state for one sound path.
#[derive(Debug)]
pub struct Voice {
    clip: Arc<Asset<SoundClip>>,
    playing: bool,
    /// Position in clip frames. Fractional when the clip rate differs from the output rate.
    cursor: f64,
    volume: f32,
    looping: bool,
}

impl Voice {
    fn new(clip: Arc<Asset<SoundClip>>, looping: bool) -> Self {
        Self {
            clip,
            playing: false,
            cursor: 0.0,
            volume: 1.0,
            looping,
        }
    }

    pub fn clip(&self) -> &Arc<Asset<SoundClip>> {
        &self.clip
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Current position in whole clip frames.
    pub fn position(&self) -> usize {
        self.cursor as usize
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Add this voice into `out` (interleaved stereo), advancing its cursor.
    fn render(&mut self, out: &mut [i16], output_rate: u32) {
        if !self.playing {
            return;
        }
        let Some(clip) = self.clip.ready() else {
            return;
        };
        let frames = clip.frames();
        if frames == 0 {
            self.playing = false;
            return;
        }

        let step = clip.sample_rate as f64 / output_rate as f64;
        for dst in out.chunks_exact_mut(2) {
            let idx = self.cursor as usize;
            let (l, r) = (clip.samples[idx * 2], clip.samples[idx * 2 + 1]);
            dst[0] = dst[0].saturating_add((l as f32 * self.volume) as i16);
            dst[1] = dst[1].saturating_add((r as f32 * self.volume) as i16);

            self.cursor += step;
            if self.cursor >= frames as f64 {
                if self.looping {
                    self.cursor %= frames as f64;
                } else {
                    self.cursor = frames as f64;
                    self.playing = false;
                    return;
                }
            }
        }
    }
}

/// Audio commands from the guest, plus the host-side mixer.
pub struct AudioAdapter<L = SoundLoader>
where
    L: AssetLoader<Output = SoundClip>,
{
    sounds: ResourceCache<L>,
    voices: HashMap<String, Voice>,
    sample_rate: u32,
}

impl<L: AssetLoader<Output = SoundClip>> AudioAdapter<L> {
    pub fn new(loader: L, sample_rate: u32) -> Self {
        Self {
            sounds: ResourceCache::new(loader),
            voices: HashMap::new(),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Stereo frames in one video frame at `fps`.
    pub fn frame_len(&self, fps: u32) -> usize {
        (self.sample_rate / fps.max(1)) as usize
    }

    /// Create (or reset) the voice for `path`, starting the decode if the path is new.
    pub fn load(&mut self, path: &str, looping: bool) {
        let clip = self.sounds.resolve(path);
        tracing::debug!(path, looping, "sound loaded");
        self.voices
            .insert(path.to_owned(), Voice::new(clip, looping));
    }

    /// Start `path` from the beginning unless it is already playing and `restart` is false.
    pub fn play(&mut self, path: &str, restart: bool) {
        let Some(voice) = self.voice_mut(path, "play") else {
            return;
        };
        if !voice.playing || restart {
            voice.cursor = 0.0;
            voice.playing = true;
        }
    }

    pub fn pause(&mut self, path: &str) {
        if let Some(voice) = self.voice_mut(path, "pause") {
            voice.playing = false;
        }
    }

    /// Set the voice volume, clamped to `0.0..=1.0`.
    pub fn set_volume(&mut self, path: &str, volume: f32) {
        if volume.is_nan() {
            tracing::warn!(path, "ignoring NaN volume");
            return;
        }
        if let Some(voice) = self.voice_mut(path, "set_volume") {
            voice.volume = volume.clamp(0.0, 1.0);
        }
    }

    pub fn voice(&self, path: &str) -> Option<&Voice> {
        self.voices.get(path)
    }

    fn voice_mut(&mut self, path: &str, op: &'static str) -> Option<&mut Voice> {
        let voice = self.voices.get_mut(path);
        if voice.is_none() {
            tracing::warn!(path, op, "sound was never loaded; ignoring");
        }
        voice
    }

    /// Render the next `out.len() / 2` stereo frames of every playing voice into `out`.
    pub fn mix(&mut self, out: &mut [i16]) {
        out.fill(0);
        for voice in self.voices.values_mut() {
            voice.render(out, self.sample_rate);
        }
    }
}
