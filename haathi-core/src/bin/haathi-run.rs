//! haathi-run: headless runner
//!
//! Loads a guest module, steps it for a fixed number of frames on a synthetic clock, and writes
//! out what it drew and played.
//!
//! # Usage
//!
//! ```bash
//! haathi-run game.wasm --frames 120 --snapshot out.png
//! haathi-run game.wat --config haathi.toml --audio out.wav
//! haathi-run game.wasm --frames 30 --key 10:ArrowUp:down --key 20:ArrowUp:up
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;

use haathi_core::{Clock, HaathiRuntime, HostConfig, InputEvent, logging};

#[derive(Parser)]
#[command(name = "haathi-run")]
#[command(author, version, about = "Run a haathi guest module headless")]
struct Args {
    /// Guest module (.wasm or .wat)
    module: PathBuf,

    /// Host configuration (TOML)
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of frames to run
    #[arg(long, short = 'n', default_value = "60")]
    frames: u32,

    /// Write the final surface as PNG
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Write the mixed audio as 16-bit stereo WAV
    #[arg(long, value_name = "FILE")]
    audio: Option<PathBuf>,

    /// Scripted key event, FRAME:NAME:down|up (repeatable)
    #[arg(long = "key", value_name = "EVENT")]
    keys: Vec<KeyScript>,
}

/// A key event delivered at the start of a given frame.
#[derive(Debug, Clone)]
struct KeyScript {
    frame: u32,
    name: String,
    down: bool,
}

impl FromStr for KeyScript {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (frame, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("expected FRAME:NAME:down|up, got `{s}`"))?;
        let (name, direction) = rest
            .rsplit_once(':')
            .ok_or_else(|| format!("expected FRAME:NAME:down|up, got `{s}`"))?;
        let frame = frame
            .parse()
            .map_err(|_| format!("bad frame number `{frame}`"))?;
        let down = match direction {
            "down" => true,
            "up" => false,
            other => return Err(format!("expected `down` or `up`, got `{other}`")),
        };
        Ok(Self {
            frame,
            name: name.to_owned(),
            down,
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => HostConfig::from_file(path)?,
        None => HostConfig::default(),
    };
    logging::init(&config.logging.filter);

    let bytes = std::fs::read(&args.module)
        .with_context(|| format!("failed to read module {}", args.module.display()))?;

    let mut runtime = HaathiRuntime::new(&config)?;
    runtime.state_mut().clock = Clock::Manual(0);
    runtime.load(&bytes)?;

    let fps = i64::from(config.audio.fps);
    let mut audio = Vec::new();
    for frame in 0..args.frames {
        for key in args.keys.iter().filter(|k| k.frame == frame) {
            runtime.push_input(if key.down {
                InputEvent::KeyDown(key.name.clone())
            } else {
                InputEvent::KeyUp(key.name.clone())
            });
        }
        let millis = i64::from(frame) * 1000 / fps;
        audio.extend(runtime.frame(millis)?);
    }
    tracing::info!(frames = args.frames, "run complete");

    if let Some(path) = &args.snapshot {
        runtime.state().surface.canvas().save_png(path)?;
        tracing::info!(path = %path.display(), "snapshot written");
    }

    if let Some(path) = &args.audio {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: config.audio.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for sample in audio {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        tracing::info!(path = %path.display(), "audio written");
    }

    Ok(())
}
