use std::path::{Path, PathBuf};

use super::{AssetError, AssetLoader, resolve_under};

/// A fully decoded sound: interleaved stereo i16 frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundClip {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl SoundClip {
    /// Number of stereo frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }
}

/// Decodes WAV files under an asset root.
#[derive(Debug, Clone)]
pub struct SoundLoader {
    root: PathBuf,
}

impl SoundLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetLoader for SoundLoader {
    type Output = SoundClip;

    fn load(&self, path: &str) -> Result<SoundClip, AssetError> {
        let full = resolve_under(&self.root, path)?;
        let is_wav = full
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if !is_wav {
            return Err(AssetError::Unsupported(full));
        }
        decode_wav(&full)
    }
}

fn decode_wav(path: &Path) -> Result<SoundClip, AssetError> {
    let mut reader = hound::WavReader::open(path).map_err(|e| match e {
        hound::Error::IoError(source) => AssetError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => AssetError::decode(path, other),
    })?;
    let spec = reader.spec();

    let samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let shift = spec.bits_per_sample.saturating_sub(16) as u32;
            let widen = 16u32.saturating_sub(spec.bits_per_sample as u32);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| ((v >> shift) << widen) as i16))
                .collect::<Result<_, _>>()
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<_, _>>(),
    }
    .map_err(|e| AssetError::decode(path, e))?;

    let samples = match spec.channels {
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples,
        n => samples
            .chunks_exact(n as usize)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    };

    Ok(SoundClip {
        sample_rate: spec.sample_rate,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, bits: u16, samples: &[i32]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 22_050,
            bits_per_sample: bits,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn mono_is_duplicated_to_stereo() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("beep.wav"), 1, 16, &[100, -200, 300]);

        let clip = SoundLoader::new(dir.path()).load("/beep.wav").unwrap();
        assert_eq!(clip.sample_rate, 22_050);
        assert_eq!(clip.samples, vec![100, 100, -200, -200, 300, 300]);
        assert_eq!(clip.frames(), 3);
    }

    #[test]
    fn eight_bit_is_widened() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("lo.wav"), 2, 8, &[1, -1]);

        let clip = SoundLoader::new(dir.path()).load("lo.wav").unwrap();
        assert_eq!(clip.samples, vec![256, -256]);
    }

    #[test]
    fn non_wav_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let err = SoundLoader::new(dir.path()).load("song.ogg").unwrap_err();
        assert!(matches!(err, AssetError::Unsupported(_)));
    }

    #[test]
    fn missing_wav_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SoundLoader::new(dir.path()).load("gone.wav").unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }
}
