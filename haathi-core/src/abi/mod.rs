//! haathi ABI
//!
//! The contract between the host (`haathi-core`) and the guest (a wasm module built against
//! `haathi-sdk`).
//!
//! ## Model
//! The guest owns a single linear memory and exports it as `memory`. Everything it sends the host
//! is a number: coordinates are `f32`, flags are `i32` (0 = false), and strings/byte strings are
//! `i32` offsets into that memory. Strings are null-terminated unless a length accompanies them.
//!
//! Coordinates are y-up: `(0, 0)` is the bottom-left corner of the surface.
//!
//! ## Imports (guest -> host)
//! Imported from module `"env"`.
//!
//! ### Drawing
//! - `clearCanvas(color: ptr)`
//! - `fillRect(x, y, w, h: f32)`
//! - `roundRect(x, y, w, h, radius: f32)`: adds a rounded rectangle to the current path
//! - `fillStyle(color: ptr)`, `strokeStyle(color: ptr)`, `lineWidth(px: f32)`
//! - `beginPath()`, `closePath()`, `moveTo(x, y: f32)`, `lineTo(x, y: f32)`, `fill()`, `stroke()`
//! - `ellipse(x, y, radius_x, radius_y, rotation, start_angle, end_angle: f32, ccw: i32)`
//! - `font(css: ptr)`, `textAlign(alignment: ptr)`
//! - `fillText(text: ptr, x, y, max_width: f32)`
//! - `setCursor(style: ptr)`
//! - `drawImage(path: ptr, sx, sy, sw, sh, dx, dy, dw, dh: f32, x_flipped, y_flipped: i32,
//!   rotation_deg: f32)`
//!
//! ### Audio
//! - `loadSound(path: ptr, loop: i32)`
//! - `playSound(path: ptr, restart: i32)`
//! - `pauseSound(path: ptr)`
//! - `setSoundVolume(path: ptr, volume: f32)`
//!
//! ### Storage
//! - `webSave(key: ptr, key_len: i32, data: ptr, data_len: i32)`
//! - `webLoadLen(key: ptr, key_len: i32) -> i32`
//! - `webLoad(key: ptr, key_len: i32, dest: ptr, dest_len: i32)`
//!
//! ### Misc
//! - `debugPrint(text: ptr)`
//! - `milliTimestamp() -> i64`
//!
//! ## Exports (host -> guest)
//! Required: `memory`, `render()`.
//!
//! Optional: `init()`, `update(millis: i64)`, `keyDown(code: i32)`, `keyUp(code: i32)`,
//! `mouseDown(button: i32)`, `mouseUp(button: i32)`, `mouseMove(x: i32, y: i32)`.
//!
//! Imports never trap and never return errors; a call the host can't make sense of is logged and
//! dropped.

use thiserror::Error;
use wasmtime::{AsContextMut, Instance, Memory, TypedFunc, WasmParams, WasmResults};

/// Import module name used by the guest.
pub const IMPORT_MODULE: &str = "env";

/// Guest export names.
pub mod guest_exports {
    /// Linear memory (required).
    pub const MEMORY: &str = "memory";
    /// Called once per frame after `update` (required).
    pub const RENDER: &str = "render";
    /// Called once after instantiation (optional).
    pub const INIT: &str = "init";
    /// Called once per frame with the frame timestamp in milliseconds (optional).
    pub const UPDATE: &str = "update";
    pub const KEY_DOWN: &str = "keyDown";
    pub const KEY_UP: &str = "keyUp";
    pub const MOUSE_DOWN: &str = "mouseDown";
    pub const MOUSE_UP: &str = "mouseUp";
    pub const MOUSE_MOVE: &str = "mouseMove";
}

/// Host import names.
pub mod host_imports {
    // Drawing
    pub const CLEAR_CANVAS: &str = "clearCanvas";
    pub const FILL_RECT: &str = "fillRect";
    pub const ROUND_RECT: &str = "roundRect";
    pub const FILL_STYLE: &str = "fillStyle";
    pub const STROKE_STYLE: &str = "strokeStyle";
    pub const LINE_WIDTH: &str = "lineWidth";
    pub const BEGIN_PATH: &str = "beginPath";
    pub const CLOSE_PATH: &str = "closePath";
    pub const MOVE_TO: &str = "moveTo";
    pub const LINE_TO: &str = "lineTo";
    pub const FILL: &str = "fill";
    pub const STROKE: &str = "stroke";
    pub const ELLIPSE: &str = "ellipse";
    pub const FONT: &str = "font";
    pub const TEXT_ALIGN: &str = "textAlign";
    pub const FILL_TEXT: &str = "fillText";
    pub const SET_CURSOR: &str = "setCursor";
    pub const DRAW_IMAGE: &str = "drawImage";

    // Audio
    pub const LOAD_SOUND: &str = "loadSound";
    pub const PLAY_SOUND: &str = "playSound";
    pub const PAUSE_SOUND: &str = "pauseSound";
    pub const SET_SOUND_VOLUME: &str = "setSoundVolume";

    // Storage
    pub const WEB_SAVE: &str = "webSave";
    pub const WEB_LOAD_LEN: &str = "webLoadLen";
    pub const WEB_LOAD: &str = "webLoad";

    // Misc
    pub const DEBUG_PRINT: &str = "debugPrint";
    pub const MILLI_TIMESTAMP: &str = "milliTimestamp";
}

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("guest is missing required export `{0}`")]
    MissingExport(&'static str),
    #[error("guest export `{name}` has the wrong type: {reason}")]
    BadSignature { name: &'static str, reason: String },
}

/// A guest's entrypoints, resolved once after instantiation.
#[derive(Clone)]
pub struct GuestEntrypoints {
    pub memory: Memory,
    pub render: TypedFunc<(), ()>,
    pub init: Option<TypedFunc<(), ()>>,
    pub update: Option<TypedFunc<i64, ()>>,
    pub key_down: Option<TypedFunc<i32, ()>>,
    pub key_up: Option<TypedFunc<i32, ()>>,
    pub mouse_down: Option<TypedFunc<i32, ()>>,
    pub mouse_up: Option<TypedFunc<i32, ()>>,
    pub mouse_move: Option<TypedFunc<(i32, i32), ()>>,
}

impl GuestEntrypoints {
    /// Resolve entrypoint exports from an instance.
    pub fn resolve(instance: &Instance, mut store: impl AsContextMut) -> Result<Self, AbiError> {
        let memory = instance
            .get_memory(&mut store, guest_exports::MEMORY)
            .ok_or(AbiError::MissingExport(guest_exports::MEMORY))?;
        let render = optional(instance, &mut store, guest_exports::RENDER)?
            .ok_or(AbiError::MissingExport(guest_exports::RENDER))?;

        Ok(Self {
            memory,
            render,
            init: optional(instance, &mut store, guest_exports::INIT)?,
            update: optional(instance, &mut store, guest_exports::UPDATE)?,
            key_down: optional(instance, &mut store, guest_exports::KEY_DOWN)?,
            key_up: optional(instance, &mut store, guest_exports::KEY_UP)?,
            mouse_down: optional(instance, &mut store, guest_exports::MOUSE_DOWN)?,
            mouse_up: optional(instance, &mut store, guest_exports::MOUSE_UP)?,
            mouse_move: optional(instance, &mut store, guest_exports::MOUSE_MOVE)?,
        })
    }
}

/// A typed export if present. Present with the wrong signature is an error.
fn optional<P, R>(
    instance: &Instance,
    mut store: impl AsContextMut,
    name: &'static str,
) -> Result<Option<TypedFunc<P, R>>, AbiError>
where
    P: WasmParams,
    R: WasmResults,
{
    if instance.get_func(&mut store, name).is_none() {
        return Ok(None);
    }
    instance
        .get_typed_func::<P, R>(&mut store, name)
        .map(Some)
        .map_err(|e| AbiError::BadSignature {
            name,
            reason: format!("{e:#}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::{Engine, Module, Store};

    fn instantiate(wat: &str) -> (Store<()>, Instance) {
        let engine = Engine::default();
        let module = Module::new(&engine, wat).unwrap();
        let mut store = Store::new(&engine, ());
        let instance = Instance::new(&mut store, &module, &[]).unwrap();
        (store, instance)
    }

    #[test]
    fn resolves_required_and_optional() {
        let (mut store, instance) = instantiate(
            r#"(module
                 (memory (export "memory") 1)
                 (func (export "render"))
                 (func (export "update") (param i64))
                 (func (export "mouseMove") (param i32 i32)))"#,
        );
        let guest = GuestEntrypoints::resolve(&instance, &mut store).unwrap();
        assert!(guest.update.is_some());
        assert!(guest.mouse_move.is_some());
        assert!(guest.init.is_none());
        assert!(guest.key_down.is_none());
    }

    #[test]
    fn render_is_required() {
        let (mut store, instance) = instantiate(r#"(module (memory (export "memory") 1))"#);
        assert!(matches!(
            GuestEntrypoints::resolve(&instance, &mut store),
            Err(AbiError::MissingExport("render"))
        ));
    }

    #[test]
    fn memory_is_required() {
        let (mut store, instance) = instantiate(r#"(module (func (export "render")))"#);
        assert!(matches!(
            GuestEntrypoints::resolve(&instance, &mut store),
            Err(AbiError::MissingExport("memory"))
        ));
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let (mut store, instance) = instantiate(
            r#"(module
                 (memory (export "memory") 1)
                 (func (export "render"))
                 (func (export "keyDown") (param f32)))"#,
        );
        assert!(matches!(
            GuestEntrypoints::resolve(&instance, &mut store),
            Err(AbiError::BadSignature { name: "keyDown", .. })
        ));
    }
}
