use std::path::Path as FsPath;

use resvg::tiny_skia::{
    ColorU8, FillRule, FilterQuality, Paint, Path, PathBuilder, Pattern, Pixmap, PixmapPaint,
    Point, Rect, SpreadMode, Stroke, Transform,
};
use thiserror::Error;

use super::{Canvas2d, Rgba, parse_color};

/// Segments used for a full turn of an ellipse.
const SEGMENTS_PER_TURN: f32 = 64.0;
/// Segments used for each rounded corner.
const CORNER_SEGMENTS: usize = 8;
/// CSS default: `10px sans-serif`.
const DEFAULT_FONT_PX: f32 = 10.0;

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("invalid canvas size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("invalid font: {0}")]
    Font(&'static str),
    #[error("failed to encode png: {0}")]
    Png(#[from] png::EncodingError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextAlign {
    Start,
    End,
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone)]
struct DrawState {
    transform: Transform,
    fill: Rgba,
    stroke: Rgba,
    line_width: f32,
    font_px: f32,
    align: TextAlign,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            fill: Rgba::BLACK,
            stroke: Rgba::BLACK,
            line_width: 1.0,
            font_px: DEFAULT_FONT_PX,
            align: TextAlign::Start,
        }
    }
}

/// Points are stored already transformed, as a browser context does when building a path.
#[derive(Debug, Clone)]
struct Subpath {
    points: Vec<Point>,
    closed: bool,
}

/// Software 2D context over a `tiny_skia` pixmap.
pub struct SkiaCanvas {
    pixmap: Pixmap,
    state: DrawState,
    stack: Vec<DrawState>,
    path: Vec<Subpath>,
    font: Option<fontdue::Font>,
}

impl SkiaCanvas {
    pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
        let pixmap = Pixmap::new(width, height).ok_or(CanvasError::InvalidSize { width, height })?;
        Ok(Self {
            pixmap,
            state: DrawState::default(),
            stack: Vec::new(),
            path: Vec::new(),
            font: None,
        })
    }

    /// Use the TTF/OTF in `bytes` for `fill_text`. Without a font, text draws are skipped.
    pub fn with_font(mut self, bytes: &[u8]) -> Result<Self, CanvasError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(CanvasError::Font)?;
        self.font = Some(font);
        Ok(self)
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Straight-alpha colour at device pixel `(x, y)`, y-down.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some(Rgba {
            r: c.red(),
            g: c.green(),
            b: c.blue(),
            a: c.alpha(),
        })
    }

    /// The surface as straight RGBA8 rows, top row first.
    pub fn snapshot_rgba(&self) -> Vec<u8> {
        self.pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect()
    }

    pub fn save_png(&self, path: impl AsRef<FsPath>) -> Result<(), CanvasError> {
        let file = std::fs::File::create(path)?;
        let mut encoder = png::Encoder::new(
            std::io::BufWriter::new(file),
            self.pixmap.width(),
            self.pixmap.height(),
        );
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.snapshot_rgba())?;
        writer.finish()?;
        Ok(())
    }

    fn paint(color: Rgba) -> Paint<'static> {
        let mut paint = Paint {
            anti_alias: true,
            ..Default::default()
        };
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        paint
    }

    fn device_point(&self, x: f32, y: f32) -> Point {
        let mut p = Point::from_xy(x, y);
        self.state.transform.map_point(&mut p);
        p
    }

    fn line_to_device(&mut self, p: Point) {
        if let Some(sub) = self.path.last_mut().filter(|sub| !sub.closed) {
            sub.points.push(p);
            return;
        }
        // After a close the next segment starts from the closed subpath's first point.
        let points = match self.path.last() {
            Some(closed) => vec![closed.points[0], p],
            None => vec![p],
        };
        self.path.push(Subpath {
            points,
            closed: false,
        });
    }

    fn build_path(&self) -> Option<Path> {
        let mut pb = PathBuilder::new();
        for sub in &self.path {
            let Some((first, rest)) = sub.points.split_first() else {
                continue;
            };
            pb.move_to(first.x, first.y);
            for p in rest {
                pb.line_to(p.x, p.y);
            }
            if sub.closed {
                pb.close();
            }
        }
        pb.finish()
    }

    /// Uniform scale of the current transform, used to scale stroke widths.
    fn transform_scale(&self) -> f32 {
        let t = &self.state.transform;
        (t.sx * t.sy - t.kx * t.ky).abs().sqrt()
    }
}

fn parse_font_px(font: &str) -> Option<f32> {
    font.split_whitespace().find_map(|token| {
        let size = token.split('/').next()?;
        if let Some(px) = size.strip_suffix("px") {
            px.parse::<f32>().ok()
        } else if let Some(pt) = size.strip_suffix("pt") {
            pt.parse::<f32>().ok().map(|pt| pt * 4.0 / 3.0)
        } else {
            None
        }
    })
}

/// Sweep in radians for an arc from `start` to `end`, following canvas rules.
fn arc_sweep(start: f32, end: f32, counter_clockwise: bool) -> f32 {
    use std::f32::consts::TAU;
    if !counter_clockwise && end - start >= TAU {
        TAU
    } else if counter_clockwise && start - end >= TAU {
        -TAU
    } else if counter_clockwise {
        -(start - end).rem_euclid(TAU)
    } else {
        (end - start).rem_euclid(TAU)
    }
}

/// Size glyphs are rasterized at. A font larger than the surface is rasterized at the surface
/// size and its bitmaps are scaled up when drawn.
fn raster_px(font_px: f32, width: u32, height: u32) -> f32 {
    font_px.min(width.max(height) as f32)
}

fn glyph_pixmap(width: usize, height: usize, coverage: &[u8], color: Rgba) -> Option<Pixmap> {
    let mut glyph = Pixmap::new(width as u32, height as u32)?;
    for (dst, &cov) in glyph.pixels_mut().iter_mut().zip(coverage) {
        let a = (cov as u16 * color.a as u16 / 255) as u8;
        *dst = ColorU8::from_rgba(color.r, color.g, color.b, a).premultiply();
    }
    Some(glyph)
}

impl Canvas2d for SkiaCanvas {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn transform(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        self.state.transform = self
            .state
            .transform
            .pre_concat(Transform::from_row(a, b, c, d, e, f));
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.state.transform = self.state.transform.pre_translate(x, y);
    }

    fn scale(&mut self, x: f32, y: f32) {
        self.state.transform = self.state.transform.pre_scale(x, y);
    }

    fn rotate(&mut self, radians: f32) {
        self.state.transform = self
            .state
            .transform
            .pre_concat(Transform::from_rotate(radians.to_degrees()));
    }

    fn set_fill_style(&mut self, style: &str) {
        match parse_color(style) {
            Some(c) => self.state.fill = c,
            None => tracing::debug!(style, "ignoring unparseable fill style"),
        }
    }

    fn set_stroke_style(&mut self, style: &str) {
        match parse_color(style) {
            Some(c) => self.state.stroke = c,
            None => tracing::debug!(style, "ignoring unparseable stroke style"),
        }
    }

    fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.state.line_width = width;
        }
    }

    fn set_font(&mut self, font: &str) {
        match parse_font_px(font) {
            Some(px) if px.is_finite() && px > 0.0 => self.state.font_px = px,
            _ => tracing::debug!(font, "ignoring font without a size"),
        }
    }

    fn set_text_align(&mut self, align: &str) {
        self.state.align = match align.trim() {
            "start" => TextAlign::Start,
            "end" => TextAlign::End,
            "left" => TextAlign::Left,
            "right" => TextAlign::Right,
            "center" => TextAlign::Center,
            other => {
                tracing::debug!(align = other, "ignoring unknown text alignment");
                return;
            }
        };
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let rect = Rect::from_ltrb(x.min(x + w), y.min(y + h), x.max(x + w), y.max(y + h));
        if let Some(rect) = rect {
            let paint = Self::paint(self.state.fill);
            self.pixmap
                .fill_rect(rect, &paint, self.state.transform, None);
        }
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn close_path(&mut self) {
        if let Some(sub) = self.path.last_mut() {
            sub.closed = true;
        }
    }

    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.device_point(x, y);
        self.path.push(Subpath {
            points: vec![p],
            closed: false,
        });
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.device_point(x, y);
        self.line_to_device(p);
    }

    fn round_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32) {
        let (x0, x1) = (x.min(x + w), x.max(x + w));
        let (y0, y1) = (y.min(y + h), y.max(y + h));
        let r = radius.max(0.0).min((x1 - x0) / 2.0).min((y1 - y0) / 2.0);

        // Corner centres, clockwise from top-left in y-down space.
        let corners = [
            (x0 + r, y0 + r, std::f32::consts::PI),
            (x1 - r, y0 + r, -std::f32::consts::FRAC_PI_2),
            (x1 - r, y1 - r, 0.0),
            (x0 + r, y1 - r, std::f32::consts::FRAC_PI_2),
        ];
        let mut points = Vec::with_capacity(4 * (CORNER_SEGMENTS + 1));
        for (cx, cy, from) in corners {
            for i in 0..=CORNER_SEGMENTS {
                let theta = from + std::f32::consts::FRAC_PI_2 * i as f32 / CORNER_SEGMENTS as f32;
                points.push(self.device_point(cx + r * theta.cos(), cy + r * theta.sin()));
            }
        }

        self.path.push(Subpath {
            points,
            closed: true,
        });
        let start = self.device_point(x, y);
        self.path.push(Subpath {
            points: vec![start],
            closed: false,
        });
    }

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
    ) {
        if radius_x < 0.0 || radius_y < 0.0 {
            tracing::debug!(radius_x, radius_y, "ignoring ellipse with negative radius");
            return;
        }
        let sweep = arc_sweep(start_angle, end_angle, counter_clockwise);
        let steps = ((sweep.abs() / std::f32::consts::TAU) * SEGMENTS_PER_TURN)
            .ceil()
            .max(1.0) as usize;
        let (sin_r, cos_r) = rotation.sin_cos();

        for i in 0..=steps {
            let theta = start_angle + sweep * i as f32 / steps as f32;
            let (ex, ey) = (radius_x * theta.cos(), radius_y * theta.sin());
            let p = self.device_point(x + ex * cos_r - ey * sin_r, y + ex * sin_r + ey * cos_r);
            self.line_to_device(p);
        }
    }

    fn fill(&mut self) {
        if let Some(path) = self.build_path() {
            let paint = Self::paint(self.state.fill);
            self.pixmap
                .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    fn stroke(&mut self) {
        if let Some(path) = self.build_path() {
            let paint = Self::paint(self.state.stroke);
            let stroke = Stroke {
                width: self.state.line_width * self.transform_scale(),
                ..Default::default()
            };
            self.pixmap
                .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, max_width: Option<f32>) {
        if max_width.is_some_and(|w| !(w > 0.0)) {
            return;
        }
        let Some(font) = &self.font else {
            tracing::trace!(text, "no font configured, skipping text");
            return;
        };

        let px = self.state.font_px;
        let raster = raster_px(px, self.pixmap.width(), self.pixmap.height());
        let glyph_scale = px / raster;
        let width: f32 = text
            .chars()
            .map(|c| font.metrics(c, raster).advance_width * glyph_scale)
            .sum();
        let squeeze = match max_width {
            Some(limit) if width > limit => limit / width,
            _ => 1.0,
        };
        let drawn = width * squeeze;
        let start = match self.state.align {
            TextAlign::Start | TextAlign::Left => x,
            TextAlign::End | TextAlign::Right => x - drawn,
            TextAlign::Center => x - drawn / 2.0,
        };

        let base = self.state.transform.pre_translate(start, y).pre_scale(squeeze, 1.0);
        let mut pen = 0.0;
        for c in text.chars() {
            let (metrics, coverage) = font.rasterize(c, raster);
            if let Some(glyph) =
                glyph_pixmap(metrics.width, metrics.height, &coverage, self.state.fill)
            {
                let gx = (pen + metrics.xmin as f32 * glyph_scale).round();
                let gy = ((-(metrics.ymin as f32) - metrics.height as f32) * glyph_scale).round();
                self.pixmap.draw_pixmap(
                    0,
                    0,
                    glyph.as_ref(),
                    &PixmapPaint::default(),
                    base.pre_translate(gx, gy).pre_scale(glyph_scale, glyph_scale),
                    None,
                );
            }
            pen += metrics.advance_width * glyph_scale;
        }
    }

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
    ) {
        let (sx, sw) = if sw < 0.0 { (sx + sw, -sw) } else { (sx, sw) };
        let (sy, sh) = if sh < 0.0 { (sy + sh, -sh) } else { (sy, sh) };
        let (dx, dw) = if dw < 0.0 { (dx + dw, -dw) } else { (dx, dw) };
        let (dy, dh) = if dh < 0.0 { (dy + dh, -dh) } else { (dy, dh) };
        if sw == 0.0 || sh == 0.0 || dw == 0.0 || dh == 0.0 {
            return;
        }

        let (kx, ky) = (dw / sw, dh / sh);
        let pattern = Transform::from_translate(dx, dy)
            .pre_scale(kx, ky)
            .pre_translate(-sx, -sy);

        // Only the part of the source rectangle inside the image is drawn.
        let cx0 = sx.max(0.0);
        let cy0 = sy.max(0.0);
        let cx1 = (sx + sw).min(image.width() as f32);
        let cy1 = (sy + sh).min(image.height() as f32);
        let Some(rect) = Rect::from_ltrb(
            dx + (cx0 - sx) * kx,
            dy + (cy0 - sy) * ky,
            dx + (cx1 - sx) * kx,
            dy + (cy1 - sy) * ky,
        ) else {
            return;
        };

        let paint = Paint {
            shader: Pattern::new(
                image.as_ref(),
                SpreadMode::Pad,
                FilterQuality::Nearest,
                1.0,
                pattern,
            ),
            anti_alias: false,
            ..Default::default()
        };
        self.pixmap
            .fill_rect(rect, &paint, self.state.transform, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = Rgba::opaque(255, 0, 0);
    const BLUE: Rgba = Rgba::opaque(0, 0, 255);

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(
            SkiaCanvas::new(0, 10),
            Err(CanvasError::InvalidSize { width: 0, height: 10 })
        ));
    }

    #[test]
    fn fill_rect_uses_fill_style() {
        let mut c = SkiaCanvas::new(8, 8).unwrap();
        c.set_fill_style("#ff0000");
        c.fill_rect(2.0, 2.0, 4.0, 4.0);
        assert_eq!(c.pixel(3, 3), Some(RED));
        assert_eq!(c.pixel(0, 0).map(|p| p.a), Some(0));
    }

    #[test]
    fn bad_style_keeps_previous() {
        let mut c = SkiaCanvas::new(4, 4).unwrap();
        c.set_fill_style("blue");
        c.set_fill_style("not a colour");
        c.fill_rect(0.0, 0.0, 4.0, 4.0);
        assert_eq!(c.pixel(1, 1), Some(BLUE));
    }

    #[test]
    fn restore_pops_transform_and_style() {
        let mut c = SkiaCanvas::new(8, 8).unwrap();
        c.set_fill_style("red");
        c.save();
        c.translate(4.0, 4.0);
        c.set_fill_style("blue");
        c.restore();
        c.fill_rect(0.0, 0.0, 2.0, 2.0);
        assert_eq!(c.pixel(1, 1), Some(RED));
        assert_eq!(c.pixel(5, 5).map(|p| p.a), Some(0));
    }

    #[test]
    fn unbalanced_restore_is_ignored() {
        let mut c = SkiaCanvas::new(4, 4).unwrap();
        c.restore();
        c.fill_rect(0.0, 0.0, 4.0, 4.0);
        assert_eq!(c.pixel(0, 0), Some(Rgba::BLACK));
    }

    #[test]
    fn path_fill_and_begin_path_reset() {
        let mut c = SkiaCanvas::new(10, 10).unwrap();
        c.set_fill_style("red");
        c.begin_path();
        c.move_to(0.0, 0.0);
        c.line_to(10.0, 0.0);
        c.line_to(10.0, 10.0);
        c.line_to(0.0, 10.0);
        c.close_path();
        c.fill();
        assert_eq!(c.pixel(5, 5), Some(RED));

        c.begin_path();
        c.set_fill_style("blue");
        c.fill();
        assert_eq!(c.pixel(5, 5), Some(RED));
    }

    #[test]
    fn full_ellipse_covers_centre_not_corner() {
        let mut c = SkiaCanvas::new(20, 20).unwrap();
        c.set_fill_style("blue");
        c.begin_path();
        c.ellipse(10.0, 10.0, 8.0, 5.0, 0.0, 0.0, std::f32::consts::TAU, false);
        c.fill();
        assert_eq!(c.pixel(10, 10), Some(BLUE));
        assert_eq!(c.pixel(10, 3).map(|p| p.a), Some(0));
        assert_eq!(c.pixel(0, 0).map(|p| p.a), Some(0));
    }

    #[test]
    fn arc_sweep_follows_direction() {
        use std::f32::consts::{FRAC_PI_2, PI, TAU};
        assert!((arc_sweep(0.0, FRAC_PI_2, false) - FRAC_PI_2).abs() < 1e-5);
        assert!((arc_sweep(0.0, FRAC_PI_2, true) + 3.0 * FRAC_PI_2).abs() < 1e-5);
        assert_eq!(arc_sweep(0.0, 3.0 * PI, false), TAU);
        assert_eq!(arc_sweep(3.0 * PI, 0.0, true), -TAU);
        assert_eq!(arc_sweep(1.0, 1.0, false), 0.0);
    }

    #[test]
    fn round_rect_leaves_corners_empty() {
        let mut c = SkiaCanvas::new(20, 20).unwrap();
        c.set_fill_style("red");
        c.begin_path();
        c.round_rect(0.0, 0.0, 20.0, 20.0, 8.0);
        c.fill();
        assert_eq!(c.pixel(10, 10), Some(RED));
        assert_eq!(c.pixel(0, 0).map(|p| p.a), Some(0));
    }

    #[test]
    fn font_size_parsing() {
        assert_eq!(parse_font_px("16px monospace"), Some(16.0));
        assert_eq!(parse_font_px("bold 20px/24px Arial"), Some(20.0));
        assert_eq!(parse_font_px("12pt serif"), Some(16.0));
        assert_eq!(parse_font_px("serif"), None);
    }

    #[test]
    fn oversized_fonts_rasterize_at_surface_size() {
        assert_eq!(raster_px(16.0, 320, 240), 16.0);
        assert_eq!(raster_px(100_000.0, 320, 240), 320.0);
        assert_eq!(raster_px(100_000.0, 64, 480), 480.0);
    }

    #[test]
    fn non_finite_font_sizes_are_ignored() {
        let mut c = SkiaCanvas::new(8, 8).unwrap();
        c.set_font("100000px sans");
        assert_eq!(c.state.font_px, 100_000.0);
        c.set_font("infpx sans");
        c.set_font("NaNpx sans");
        assert_eq!(c.state.font_px, 100_000.0);
    }

    #[test]
    fn text_without_font_is_a_no_op() {
        let mut c = SkiaCanvas::new(8, 8).unwrap();
        c.fill_text("hello", 0.0, 8.0, None);
        assert!(c.snapshot_rgba().iter().all(|&b| b == 0));
    }

    #[test]
    fn draw_image_scales_source_region() {
        let mut img = Pixmap::new(2, 1).unwrap();
        img.pixels_mut()[0] = ColorU8::from_rgba(255, 0, 0, 255).premultiply();
        img.pixels_mut()[1] = ColorU8::from_rgba(0, 0, 255, 255).premultiply();

        let mut c = SkiaCanvas::new(8, 4).unwrap();
        c.draw_image(&img, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 8.0, 4.0);
        assert_eq!(c.pixel(0, 0), Some(BLUE));
        assert_eq!(c.pixel(7, 3), Some(BLUE));

        c.draw_image(&img, 0.0, 0.0, 2.0, 1.0, 0.0, 0.0, 8.0, 4.0);
        assert_eq!(c.pixel(1, 1), Some(RED));
        assert_eq!(c.pixel(6, 1), Some(BLUE));
    }

    #[test]
    fn draw_image_clips_source_to_image() {
        let mut img = Pixmap::new(1, 1).unwrap();
        img.fill(resvg::tiny_skia::Color::from_rgba8(255, 0, 0, 255));

        let mut c = SkiaCanvas::new(4, 4).unwrap();
        // Source is twice as wide as the image: only the left half of the destination is drawn.
        c.draw_image(&img, 0.0, 0.0, 2.0, 1.0, 0.0, 0.0, 4.0, 4.0);
        assert_eq!(c.pixel(1, 1), Some(RED));
        assert_eq!(c.pixel(3, 1).map(|p| p.a), Some(0));
    }

    #[test]
    fn snapshot_and_png_round_trip_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = SkiaCanvas::new(3, 2).unwrap();
        c.set_fill_style("#00ff00");
        c.fill_rect(0.0, 0.0, 3.0, 2.0);
        assert_eq!(c.snapshot_rgba().len(), 3 * 2 * 4);

        let out = dir.path().join("frame.png");
        c.save_png(&out).unwrap();
        let decoder = png::Decoder::new(std::fs::File::open(&out).unwrap());
        let reader = decoder.read_info().unwrap();
        assert_eq!((reader.info().width, reader.info().height), (3, 2));
    }
}
