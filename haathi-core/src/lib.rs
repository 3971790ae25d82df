//! haathi-core: host bindings for a sandboxed wasm guest.
//!
//! The guest draws on a 2D surface, plays sounds, and persists records by calling host imports
//! with numbers and offsets into its own linear memory. This crate implements the host side:
//! - decoding strings and byte ranges out of guest memory (`memory`),
//! - a y-up drawing surface over a raster 2D context (`canvas`),
//! - background-loaded image and sound caches (`assets`) and a mixer (`audio`),
//! - a key-value record store (`storage`),
//! - key name normalisation and input delivery (`keys`, `input`),
//! - the Wasmtime runtime that wires it together (`runtime`).
//!
//! Required guest exports:
//! - `memory`
//! - `render()`
//!
//! Optional guest exports:
//! - `init()`, `update(millis)`
//! - `keyDown(code)`, `keyUp(code)`, `mouseDown(button)`, `mouseUp(button)`, `mouseMove(x, y)`
//!
//! The ABI surface is defined in `crate::abi` and mirrored by `haathi-sdk`.

pub mod abi;
pub mod assets;
pub mod audio;
pub mod canvas;
pub mod config;
pub mod input;
pub mod keys;
pub mod loader;
pub mod logging;
pub mod memory;
pub mod runtime;
pub mod state;
pub mod storage;

pub use config::HostConfig;
pub use input::InputEvent;
pub use runtime::HaathiRuntime;
pub use state::{Clock, HostState};
