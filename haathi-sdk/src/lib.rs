#![cfg_attr(not(feature = "std"), no_std)]

//! haathi-sdk
//!
//! This crate is used by **guest** wasm modules that run inside the `haathi` host.
//!
//! ABI model:
//! - The host owns the drawing surface, the sound voices and the record store.
//! - The guest issues commands with numbers and pointers into its own memory.
//! - Strings are null-terminated (`&CStr`); record keys and values are byte slices.
//! - Coordinates are y-up: `(0, 0)` is the bottom-left corner.
//! - The guest exports `render` (required) and optionally `init`, `update`, `keyDown`, `keyUp`,
//!   `mouseDown`, `mouseUp`, `mouseMove`.

#[cfg(not(feature = "std"))]
extern crate alloc;

use core::ffi::CStr;

/// Low-level raw ABI imports.
pub mod sys {
    #[link(wasm_import_module = "env")]
    unsafe extern "C" {
        // Drawing
        #[link_name = "clearCanvas"]
        pub fn clear_canvas(color: u32);
        #[link_name = "fillRect"]
        pub fn fill_rect(x: f32, y: f32, w: f32, h: f32);
        #[link_name = "roundRect"]
        pub fn round_rect(x: f32, y: f32, w: f32, h: f32, radius: f32);
        #[link_name = "fillStyle"]
        pub fn fill_style(color: u32);
        #[link_name = "strokeStyle"]
        pub fn stroke_style(color: u32);
        #[link_name = "lineWidth"]
        pub fn line_width(width: f32);
        #[link_name = "beginPath"]
        pub fn begin_path();
        #[link_name = "closePath"]
        pub fn close_path();
        #[link_name = "moveTo"]
        pub fn move_to(x: f32, y: f32);
        #[link_name = "lineTo"]
        pub fn line_to(x: f32, y: f32);
        #[link_name = "fill"]
        pub fn fill();
        #[link_name = "stroke"]
        pub fn stroke();
        #[link_name = "ellipse"]
        pub fn ellipse(
            x: f32,
            y: f32,
            radius_x: f32,
            radius_y: f32,
            rotation: f32,
            start_angle: f32,
            end_angle: f32,
            counter_clockwise: i32,
        );
        #[link_name = "font"]
        pub fn font(style: u32);
        #[link_name = "textAlign"]
        pub fn text_align(alignment: u32);
        #[link_name = "fillText"]
        pub fn fill_text(text: u32, x: f32, y: f32, max_width: f32);
        #[link_name = "setCursor"]
        pub fn set_cursor(style: u32);
        #[link_name = "drawImage"]
        pub fn draw_image(
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
            rotation: f32,
        );

        // Audio
        #[link_name = "loadSound"]
        pub fn load_sound(path: u32, looping: i32);
        #[link_name = "playSound"]
        pub fn play_sound(path: u32, restart: i32);
        #[link_name = "pauseSound"]
        pub fn pause_sound(path: u32);
        #[link_name = "setSoundVolume"]
        pub fn set_sound_volume(path: u32, volume: f32);

        // Storage
        #[link_name = "webSave"]
        pub fn web_save(key: u32, key_len: u32, data: u32, data_len: u32);
        #[link_name = "webLoadLen"]
        pub fn web_load_len(key: u32, key_len: u32) -> u32;
        #[link_name = "webLoad"]
        pub fn web_load(key: u32, key_len: u32, dest: u32, dest_len: u32);

        // System
        #[link_name = "debugPrint"]
        pub fn debug_print(text: u32);
        #[link_name = "milliTimestamp"]
        pub fn milli_timestamp() -> i64;
    }
}

fn ptr(s: &CStr) -> u32 {
    s.as_ptr() as u32
}

/// Drawing API. All coordinates are y-up.
pub mod canvas {
    use super::{CStr, ptr, sys};

    /// Fill the whole surface with a CSS colour. The colour stays the fill style.
    pub fn clear(color: &CStr) {
        unsafe { sys::clear_canvas(ptr(color)) }
    }

    pub fn fill_rect(x: f32, y: f32, w: f32, h: f32) {
        unsafe { sys::fill_rect(x, y, w, h) }
    }

    /// Add a rounded rectangle to the current path.
    pub fn round_rect(x: f32, y: f32, w: f32, h: f32, radius: f32) {
        unsafe { sys::round_rect(x, y, w, h, radius) }
    }

    pub fn fill_style(color: &CStr) {
        unsafe { sys::fill_style(ptr(color)) }
    }

    pub fn stroke_style(color: &CStr) {
        unsafe { sys::stroke_style(ptr(color)) }
    }

    pub fn line_width(width: f32) {
        unsafe { sys::line_width(width) }
    }

    pub fn begin_path() {
        unsafe { sys::begin_path() }
    }

    pub fn close_path() {
        unsafe { sys::close_path() }
    }

    pub fn move_to(x: f32, y: f32) {
        unsafe { sys::move_to(x, y) }
    }

    pub fn line_to(x: f32, y: f32) {
        unsafe { sys::line_to(x, y) }
    }

    pub fn fill() {
        unsafe { sys::fill() }
    }

    pub fn stroke() {
        unsafe { sys::stroke() }
    }

    /// Add an elliptical arc to the current path. Angles are in radians.
    #[allow(clippy::too_many_arguments)]
    pub fn ellipse(
        x: f32,
        y: f32,
        radius_x: f32,
        radius_y: f32,
        rotation: f32,
        start_angle: f32,
        end_angle: f32,
        counter_clockwise: bool,
    ) {
        unsafe {
            sys::ellipse(
                x,
                y,
                radius_x,
                radius_y,
                rotation,
                start_angle,
                end_angle,
                counter_clockwise as i32,
            )
        }
    }

    /// Full ellipse, the common case.
    pub fn oval(x: f32, y: f32, radius_x: f32, radius_y: f32) {
        ellipse(x, y, radius_x, radius_y, 0.0, 0.0, core::f32::consts::TAU, false);
    }

    /// Set the font with a CSS font string, e.g. `c"16px sans-serif"`.
    pub fn font(style: &CStr) {
        unsafe { sys::font(ptr(style)) }
    }

    /// `left`, `right`, `center`, `start` or `end`.
    pub fn text_align(alignment: &CStr) {
        unsafe { sys::text_align(ptr(alignment)) }
    }

    /// Draw text with its baseline at `(x, y)`, squeezed to fit `max_width`.
    pub fn fill_text(text: &CStr, x: f32, y: f32, max_width: f32) {
        unsafe { sys::fill_text(ptr(text), x, y, max_width) }
    }

    /// CSS cursor name; `_` stands in for the first `-` (`c"not_allowed"`).
    pub fn set_cursor(style: &CStr) {
        unsafe { sys::set_cursor(ptr(style)) }
    }

    /// Where and how to draw an image region.
    #[derive(Copy, Clone, Debug, PartialEq)]
    pub struct Blit {
        /// Source rectangle in image pixels.
        pub src: [f32; 4],
        /// Destination rectangle, y-up.
        pub dest: [f32; 4],
        pub x_flipped: bool,
        pub y_flipped: bool,
        /// Degrees, around the destination centre.
        pub rotation: f32,
    }

    impl Blit {
        /// The whole `width` x `height` image into `dest`, unflipped and unrotated.
        pub fn whole(width: f32, height: f32, dest: [f32; 4]) -> Self {
            Self {
                src: [0.0, 0.0, width, height],
                dest,
                x_flipped: false,
                y_flipped: false,
                rotation: 0.0,
            }
        }
    }

    /// Draw an image by path. Nothing is drawn until the host has finished loading it.
    pub fn draw_image(path: &CStr, blit: Blit) {
        let [sx, sy, sw, sh] = blit.src;
        let [dx, dy, dw, dh] = blit.dest;
        unsafe {
            sys::draw_image(
                ptr(path),
                sx,
                sy,
                sw,
                sh,
                dx,
                dy,
                dw,
                dh,
                blit.x_flipped as i32,
                blit.y_flipped as i32,
                blit.rotation,
            )
        }
    }
}

/// Audio API. Each path has one voice.
pub mod audio {
    use super::{CStr, ptr, sys};

    /// Start loading `path` and (re)create its voice, paused.
    pub fn load(path: &CStr, looping: bool) {
        unsafe { sys::load_sound(ptr(path), looping as i32) }
    }

    /// Play from the start, or keep playing if already playing and `restart` is false.
    pub fn play(path: &CStr, restart: bool) {
        unsafe { sys::play_sound(ptr(path), restart as i32) }
    }

    pub fn pause(path: &CStr) {
        unsafe { sys::pause_sound(ptr(path)) }
    }

    /// `0.0..=1.0`.
    pub fn set_volume(path: &CStr, volume: f32) {
        unsafe { sys::set_sound_volume(ptr(path), volume) }
    }
}

/// Persistent records keyed by byte strings.
pub mod storage {
    use super::sys;

    #[cfg(not(feature = "std"))]
    use alloc::vec::Vec;

    pub fn save(key: &[u8], data: &[u8]) {
        unsafe {
            sys::web_save(
                key.as_ptr() as u32,
                key.len() as u32,
                data.as_ptr() as u32,
                data.len() as u32,
            )
        }
    }

    /// Length of the record under `key`; 0 if there is none.
    pub fn load_len(key: &[u8]) -> usize {
        unsafe { sys::web_load_len(key.as_ptr() as u32, key.len() as u32) as usize }
    }

    /// Copy the record under `key` into `dest`, truncated to `dest.len()`.
    pub fn load_into(key: &[u8], dest: &mut [u8]) {
        unsafe {
            sys::web_load(
                key.as_ptr() as u32,
                key.len() as u32,
                dest.as_mut_ptr() as u32,
                dest.len() as u32,
            )
        }
    }

    /// The record under `key`, or `None` if it is absent or empty.
    pub fn load(key: &[u8]) -> Option<Vec<u8>> {
        let len = load_len(key);
        if len == 0 {
            return None;
        }
        let mut buf: Vec<u8> = core::iter::repeat_n(0, len).collect();
        load_into(key, &mut buf);
        Some(buf)
    }
}

/// System API.
pub mod system {
    use super::{CStr, ptr, sys};

    /// Log a message to the host console.
    pub fn debug_print(message: &CStr) {
        unsafe { sys::debug_print(ptr(message)) }
    }

    /// Host time in milliseconds.
    pub fn millis() -> i64 {
        unsafe { sys::milli_timestamp() }
    }
}

/// Key codes delivered to `keyDown`/`keyUp`. A code is the key's position in the host table.
pub mod keys {
    pub const SPACE: i32 = 0;
    pub const ALT: i32 = 1;
    pub const CONTROL: i32 = 2;
    pub const SHIFT: i32 = 3;
    pub const ENTER: i32 = 4;
    pub const TAB: i32 = 5;
    pub const ARROW_DOWN: i32 = 6;
    pub const ARROW_UP: i32 = 7;
    pub const ARROW_LEFT: i32 = 8;
    pub const ARROW_RIGHT: i32 = 9;
    pub const BACKSPACE: i32 = 10;
    pub const DELETE: i32 = 11;
    pub const ESCAPE: i32 = 12;
    pub const META: i32 = 13;

    /// `a`; letters run contiguously to `z`.
    pub const A: i32 = 14;
    pub const D: i32 = A + 3;
    pub const S: i32 = A + 18;
    pub const W: i32 = A + 22;
    pub const Z: i32 = A + 25;

    /// `1`; digits run `1..=9` then `0`.
    pub const DIGIT_1: i32 = 40;
    pub const DIGIT_0: i32 = 49;

    pub const BRACKET_LEFT: i32 = 50;
    pub const BRACKET_RIGHT: i32 = 51;
    pub const SEMICOLON: i32 = 52;
    pub const QUOTE: i32 = 53;
    pub const BACKSLASH: i32 = 54;
    pub const SLASH: i32 = 55;
    pub const PERIOD: i32 = 56;
    pub const COMMA: i32 = 57;
    pub const BACKQUOTE: i32 = 58;

    /// Any key the host table doesn't know.
    pub const UNKNOWN: i32 = 79;

    /// Lowercase ASCII letter for a letter code.
    pub fn letter(code: i32) -> Option<char> {
        (A..=Z)
            .contains(&code)
            .then(|| (b'a' + (code - A) as u8) as char)
    }

    /// Digit for a digit code.
    pub fn digit(code: i32) -> Option<u8> {
        match code {
            DIGIT_1..=48 => Some((code - DIGIT_1 + 1) as u8),
            DIGIT_0 => Some(0),
            _ => None,
        }
    }
}

/// Convenience prelude for guest modules.
pub mod prelude {
    pub use crate::audio;
    pub use crate::canvas::{self, Blit};
    pub use crate::keys;
    pub use crate::storage;
    pub use crate::system;
}

#[cfg(test)]
mod tests {
    use super::keys;

    #[test]
    fn letters_and_digits() {
        assert_eq!(keys::letter(keys::A), Some('a'));
        assert_eq!(keys::letter(keys::W), Some('w'));
        assert_eq!(keys::letter(keys::Z), Some('z'));
        assert_eq!(keys::letter(keys::DIGIT_1), None);
        assert_eq!(keys::digit(keys::DIGIT_1), Some(1));
        assert_eq!(keys::digit(48), Some(9));
        assert_eq!(keys::digit(keys::DIGIT_0), Some(0));
        assert_eq!(keys::digit(keys::A), None);
    }
}
