//! Host import definitions for the Wasmtime runtime.
//!
//! This module defines all the host functions imported by guest modules under the "env" module.
//! Pointer and length arguments arrive as `u32` (wasm `i32`), flags as `i32`.

use crate::{
    abi::{IMPORT_MODULE, host_imports},
    canvas::ImageBlit,
    logging::GUEST_TARGET,
    memory::{self, DecodeError},
    state::HostState,
};

use wasmtime::{Caller, Linker};

/// Run `f` over guest memory and host state borrowed together.
///
/// Returns `None` (after logging) when the guest has no memory yet or `f` fails to decode its
/// arguments; the import then does nothing.
fn with_args<R>(
    caller: &mut Caller<'_, HostState>,
    import: &'static str,
    f: impl FnOnce(&mut [u8], &mut HostState) -> Result<R, DecodeError>,
) -> Option<R> {
    let Some(guest_memory) = caller.data().memory else {
        tracing::warn!(import, "guest memory not available; call dropped");
        return None;
    };
    let (data, state) = guest_memory.data_and_store_mut(&mut *caller);
    f(data, state)
        .map_err(|e| tracing::warn!(import, error = %e, "bad guest argument; call dropped"))
        .ok()
}

/// Decode a null-terminated string argument.
fn cstr_arg(caller: &mut Caller<'_, HostState>, import: &'static str, ptr: u32) -> Option<String> {
    with_args(caller, import, |data, _| memory::read_cstr(data, ptr))
}

/// Define all host imports expected by guests under module `"env"`.
///
/// Must be called before instantiating the module.
pub fn define_imports(linker: &mut Linker<HostState>) -> Result<(), anyhow::Error> {
    // --- Drawing ---
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::CLEAR_CANVAS,
        |mut caller: Caller<'_, HostState>, color: u32| {
            if let Some(color) = cstr_arg(&mut caller, host_imports::CLEAR_CANVAS, color) {
                caller.data_mut().surface.clear(&color);
            }
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::FILL_RECT,
        |mut caller: Caller<'_, HostState>, x: f32, y: f32, w: f32, h: f32| {
            caller.data_mut().surface.fill_rect(x, y, w, h);
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::ROUND_RECT,
        |mut caller: Caller<'_, HostState>, x: f32, y: f32, w: f32, h: f32, radius: f32| {
            caller.data_mut().surface.round_rect(x, y, w, h, radius);
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::FILL_STYLE,
        |mut caller: Caller<'_, HostState>, style: u32| {
            if let Some(style) = cstr_arg(&mut caller, host_imports::FILL_STYLE, style) {
                caller.data_mut().surface.fill_style(&style);
            }
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::STROKE_STYLE,
        |mut caller: Caller<'_, HostState>, style: u32| {
            if let Some(style) = cstr_arg(&mut caller, host_imports::STROKE_STYLE, style) {
                caller.data_mut().surface.stroke_style(&style);
            }
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::LINE_WIDTH,
        |mut caller: Caller<'_, HostState>, width: f32| {
            caller.data_mut().surface.line_width(width);
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::BEGIN_PATH,
        |mut caller: Caller<'_, HostState>| {
            caller.data_mut().surface.begin_path();
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::CLOSE_PATH,
        |mut caller: Caller<'_, HostState>| {
            caller.data_mut().surface.close_path();
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::MOVE_TO,
        |mut caller: Caller<'_, HostState>, x: f32, y: f32| {
            caller.data_mut().surface.move_to(x, y);
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::LINE_TO,
        |mut caller: Caller<'_, HostState>, x: f32, y: f32| {
            caller.data_mut().surface.line_to(x, y);
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::FILL,
        |mut caller: Caller<'_, HostState>| {
            caller.data_mut().surface.fill();
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::STROKE,
        |mut caller: Caller<'_, HostState>| {
            caller.data_mut().surface.stroke();
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::ELLIPSE,
        |mut caller: Caller<'_, HostState>,
         x: f32,
         y: f32,
         radius_x: f32,
         radius_y: f32,
         rotation: f32,
         start_angle: f32,
         end_angle: f32,
         counter_clockwise: i32| {
            caller.data_mut().surface.ellipse(
                x,
                y,
                radius_x,
                radius_y,
                rotation,
                start_angle,
                end_angle,
                counter_clockwise != 0,
            );
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::FONT,
        |mut caller: Caller<'_, HostState>, font: u32| {
            if let Some(font) = cstr_arg(&mut caller, host_imports::FONT, font) {
                caller.data_mut().surface.font(&font);
            }
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::TEXT_ALIGN,
        |mut caller: Caller<'_, HostState>, align: u32| {
            if let Some(align) = cstr_arg(&mut caller, host_imports::TEXT_ALIGN, align) {
                caller.data_mut().surface.text_align(&align);
            }
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::FILL_TEXT,
        |mut caller: Caller<'_, HostState>, text: u32, x: f32, y: f32, max_width: f32| {
            if let Some(text) = cstr_arg(&mut caller, host_imports::FILL_TEXT, text) {
                caller.data_mut().surface.fill_text(&text, x, y, max_width);
            }
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::SET_CURSOR,
        |mut caller: Caller<'_, HostState>, style: u32| {
            if let Some(style) = cstr_arg(&mut caller, host_imports::SET_CURSOR, style) {
                caller.data_mut().surface.set_cursor(&style);
            }
        },
    )?;

    // Draws nothing until the image has finished decoding.
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::DRAW_IMAGE,
        |mut caller: Caller<'_, HostState>,
         path: u32,
         sx: f32,
         sy: f32,
         sw: f32,
         sh: f32,
         dx: f32,
         dy: f32,
         dw: f32,
         dh: f32,
         x_flipped: i32,
         y_flipped: i32,
         rotation_deg: f32| {
            let Some(path) = cstr_arg(&mut caller, host_imports::DRAW_IMAGE, path) else {
                return;
            };
            let state = caller.data_mut();
            let Some(image) = state.images.resolve(&path).ready() else {
                return;
            };
            state.surface.draw_image(
                &image,
                ImageBlit {
                    sx,
                    sy,
                    sw,
                    sh,
                    dx,
                    dy,
                    dw,
                    dh,
                    x_flipped: x_flipped != 0,
                    y_flipped: y_flipped != 0,
                    rotation_deg,
                },
            );
        },
    )?;

    // --- Audio ---
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::LOAD_SOUND,
        |mut caller: Caller<'_, HostState>, path: u32, looping: i32| {
            if let Some(path) = cstr_arg(&mut caller, host_imports::LOAD_SOUND, path) {
                caller.data_mut().audio.load(&path, looping != 0);
            }
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::PLAY_SOUND,
        |mut caller: Caller<'_, HostState>, path: u32, restart: i32| {
            if let Some(path) = cstr_arg(&mut caller, host_imports::PLAY_SOUND, path) {
                caller.data_mut().audio.play(&path, restart != 0);
            }
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::PAUSE_SOUND,
        |mut caller: Caller<'_, HostState>, path: u32| {
            if let Some(path) = cstr_arg(&mut caller, host_imports::PAUSE_SOUND, path) {
                caller.data_mut().audio.pause(&path);
            }
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::SET_SOUND_VOLUME,
        |mut caller: Caller<'_, HostState>, path: u32, volume: f32| {
            if let Some(path) = cstr_arg(&mut caller, host_imports::SET_SOUND_VOLUME, path) {
                caller.data_mut().audio.set_volume(&path, volume);
            }
        },
    )?;

    // --- Storage ---
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::WEB_SAVE,
        |mut caller: Caller<'_, HostState>, key: u32, key_len: u32, data: u32, data_len: u32| {
            with_args(&mut caller, host_imports::WEB_SAVE, |mem, state| {
                let key_bytes = memory::read_bytes(mem, key, key_len)?;
                let value = memory::read_bytes(mem, data, data_len)?;
                let name = memory::read_str(mem, key, key_len)?;
                tracing::trace!(key = %name.escape_debug(), "webSave");
                state.store.write(key_bytes, value);
                Ok(())
            });
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::WEB_LOAD_LEN,
        |mut caller: Caller<'_, HostState>, key: u32, key_len: u32| -> u32 {
            with_args(&mut caller, host_imports::WEB_LOAD_LEN, |mem, state| {
                Ok(state.store.query_len(memory::read_bytes(mem, key, key_len)?))
            })
            .unwrap_or(0)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::WEB_LOAD,
        |mut caller: Caller<'_, HostState>, key: u32, key_len: u32, dest: u32, dest_len: u32| {
            with_args(&mut caller, host_imports::WEB_LOAD, |mem, state| {
                let key = memory::read_bytes(mem, key, key_len)?.to_vec();
                let dest = memory::read_bytes_mut(mem, dest, dest_len)?;
                state.store.read(&key, dest);
                Ok(())
            });
        },
    )?;

    // --- Misc ---
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::DEBUG_PRINT,
        |mut caller: Caller<'_, HostState>, text: u32| {
            if let Some(text) = cstr_arg(&mut caller, host_imports::DEBUG_PRINT, text) {
                tracing::info!(target: GUEST_TARGET, "{text}");
            }
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::MILLI_TIMESTAMP,
        |caller: Caller<'_, HostState>| -> i64 { caller.data().clock.now_millis() },
    )?;

    Ok(())
}
