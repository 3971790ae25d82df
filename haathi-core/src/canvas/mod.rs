//! Drawing surface.
//!
//! [`Canvas2d`] is the 2D context the host draws into, with the usual y-down pixel coordinates and
//! a save/restore stack. [`Surface`] sits between the guest and that context: it flips the context
//! once at construction so the guest works y-up, and it counter-flips around text and image draws
//! so those don't come out mirrored.

mod color;
mod skia;


pub use color::{Rgba, parse_color};
pub use skia::{CanvasError, SkiaCanvas};

use std::ops::{Deref, DerefMut};

use resvg::tiny_skia::Pixmap;

/// A 2D drawing context.
///
/// Style setters take the raw strings the guest sent; implementations ignore values they can't
/// interpret and keep the previous style.
pub trait Canvas2d {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn save(&mut self);
    fn restore(&mut self);

    /// Multiply the current transform by the matrix `[a c e; b d f; 0 0 1]`.
    fn transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32);
    fn translate(&mut self, x: f32, y: f32);
    fn scale(&mut self, x: f32, y: f32);
    fn rotate(&mut self, radians: f32);

    fn set_fill_style(&mut self, style: &str);
    fn set_stroke_style(&mut self, style: &str);
    fn set_line_width(&mut self, width: f32);
    fn set_font(&mut self, font: &str);
    fn set_text_align(&mut self, align: &str);

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32);

    fn begin_path(&mut self);
    fn close_path(&mut self);
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn round_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32);
    #[allow(clippy::too_many_arguments)]
    fn ellipse(
        &mut self,
        x: f32,
        y: f32,
        radius_x: f32,
        radius_y: f32,
        rotation: f32,
        start_angle: f32,
        end_angle: f32,
        counter_clockwise: bool,
    );
    fn fill(&mut self);
    fn stroke(&mut self);

    fn fill_text(&mut self, text: &str, x: f32, y: f32, max_width: Option<f32>);

    /// Draw the `(sx, sy, sw, sh)` region of `image` into `(dx, dy, dw, dh)`.
    #[allow(clippy::too_many_arguments)]
    fn draw_image(
        &mut self,
        image: &Pixmap,
        sx: f32,
        sy: f32,
        sw: f32,
        sh: f32,
        dx: f32,
        dy: f32,
        dw: f32,
        dh: f32,
    );
}

/// Scoped transform: `save()` on creation, `restore()` on drop.
pub struct TransformGuard<'a, C: Canvas2d> {
    canvas: &'a mut C,
}

impl<'a, C: Canvas2d> TransformGuard<'a, C> {
    pub fn new(canvas: &'a mut C) -> Self {
        canvas.save();
        Self { canvas }
    }
}

impl<C: Canvas2d> Deref for TransformGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.canvas
    }
}

impl<C: Canvas2d> DerefMut for TransformGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.canvas
    }
}

impl<C: Canvas2d> Drop for TransformGuard<'_, C> {
    fn drop(&mut self) {
        self.canvas.restore();
    }
}

/// Parameters of a guest image draw, in y-up guest coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageBlit {
    pub sx: f32,
    pub sy: f32,
    pub sw: f32,
    pub sh: f32,
    pub dx: f32,
    pub dy: f32,
    pub dw: f32,
    pub dh: f32,
    pub x_flipped: bool,
    pub y_flipped: bool,
    pub rotation_deg: f32,
}

/// The guest-facing drawing surface.
pub struct Surface<C: Canvas2d> {
    canvas: C,
    cursor: String,
}

impl<C: Canvas2d> Surface<C> {
    /// Wrap `canvas` and flip it so y grows upwards from the bottom edge.
    pub fn new(mut canvas: C) -> Self {
        let height = canvas.height() as f32;
        canvas.transform(1.0, 0.0, 0.0, -1.0, 0.0, height);
        Self {
            canvas,
            cursor: String::from("default"),
        }
    }

    fn height(&self) -> f32 {
        self.canvas.height() as f32
    }

    /// Undo the base flip for the lifetime of the returned guard.
    fn counter_flip(&mut self) -> TransformGuard<'_, C> {
        let height = self.height();
        let mut guard = TransformGuard::new(&mut self.canvas);
        guard.transform(1.0, 0.0, 0.0, -1.0, 0.0, height);
        guard
    }

    /// Fill the whole surface. `color` stays the fill style afterwards.
    pub fn clear(&mut self, color: &str) {
        let (w, h) = (self.canvas.width() as f32, self.height());
        self.canvas.set_fill_style(color);
        self.canvas.fill_rect(0.0, 0.0, w, h);
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.canvas.fill_rect(x, y, w, h);
    }

    pub fn round_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32) {
        self.canvas.round_rect(x, y, w, h, radius);
    }

    pub fn fill_style(&mut self, style: &str) {
        self.canvas.set_fill_style(style);
    }

    pub fn stroke_style(&mut self, style: &str) {
        self.canvas.set_stroke_style(style);
    }

    pub fn line_width(&mut self, width: f32) {
        self.canvas.set_line_width(width);
    }

    pub fn begin_path(&mut self) {
        self.canvas.begin_path();
    }

    pub fn close_path(&mut self) {
        self.canvas.close_path();
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.canvas.move_to(x, y);
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.canvas.line_to(x, y);
    }

    pub fn fill(&mut self) {
        self.canvas.fill();
    }

    pub fn stroke(&mut self) {
        self.canvas.stroke();
    }

    #[allow(clippy::too_many_arguments)]
    pub fn ellipse(
        &mut self,
        x: f32,
        y: f32,
        radius_x: f32,
        radius_y: f32,
        rotation: f32,
        start_angle: f32,
        end_angle: f32,
        counter_clockwise: bool,
    ) {
        self.canvas.ellipse(
            x,
            y,
            radius_x,
            radius_y,
            rotation,
            start_angle,
            end_angle,
            counter_clockwise,
        );
    }

    pub fn font(&mut self, font: &str) {
        self.canvas.set_font(font);
    }

    pub fn text_align(&mut self, align: &str) {
        self.canvas.set_text_align(align);
    }

    /// Draw text upright with its baseline at guest `(x, y)`.
    pub fn fill_text(&mut self, text: &str, x: f32, y: f32, max_width: f32) {
        let height = self.height();
        let mut canvas = self.counter_flip();
        canvas.fill_text(text, x, height - y, Some(max_width));
    }

    /// Draw `image` centred in the guest rectangle `(dx, dy, dw, dh)`.
    pub fn draw_image(&mut self, image: &Pixmap, blit: ImageBlit) {
        let height = self.height();
        let mut canvas = self.counter_flip();
        canvas.translate(
            blit.dx + blit.dw / 2.0,
            height - blit.dy - blit.dh / 2.0,
        );
        if blit.x_flipped {
            canvas.scale(-1.0, 1.0);
        }
        if blit.y_flipped {
            canvas.scale(1.0, -1.0);
        }
        canvas.rotate(blit.rotation_deg.to_radians());
        canvas.draw_image(
            image,
            blit.sx,
            blit.sy,
            blit.sw,
            blit.sh,
            -blit.dw / 2.0,
            -blit.dh / 2.0,
            blit.dw,
            blit.dh,
        );
    }

    /// Record the pointer style. The first `_` becomes `-`, so `not_allowed` maps to the CSS
    /// `not-allowed`.
    pub fn set_cursor(&mut self, style: &str) {
        self.cursor = style.replacen('_', "-", 1);
    }

    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn into_inner(self) -> C {
        self.canvas
    }
}
