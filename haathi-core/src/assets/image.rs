use std::io::Cursor;
use std::path::{Path, PathBuf};

use resvg::tiny_skia::{self, IntSize, Pixmap};
use resvg::usvg;

use super::{AssetError, AssetLoader, resolve_under};

/// Decodes images from files under an asset root into premultiplied pixmaps.
///
/// Format follows the file extension: `png`, `gif` (first frame) and `svg` (rasterized at its
/// intrinsic size).
#[derive(Debug, Clone)]
pub struct ImageLoader {
    root: PathBuf,
}

impl ImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetLoader for ImageLoader {
    type Output = Pixmap;

    fn load(&self, path: &str) -> Result<Pixmap, AssetError> {
        let full = resolve_under(&self.root, path)?;
        let bytes = std::fs::read(&full).map_err(|source| AssetError::Io {
            path: full.clone(),
            source,
        })?;

        let ext = full
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("png") => decode_png(&full, &bytes),
            Some("gif") => decode_gif(&full, &bytes),
            Some("svg") => render_svg(&full, &bytes),
            _ => Err(AssetError::Unsupported(full)),
        }
    }
}

/// Build a pixmap from straight (non-premultiplied) RGBA8 rows.
pub fn pixmap_from_rgba(width: u32, height: u32, mut rgba: Vec<u8>) -> Option<Pixmap> {
    let size = IntSize::from_wh(width, height)?;
    if rgba.len() != width as usize * height as usize * 4 {
        return None;
    }
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a != 255 {
            for c in &mut px[..3] {
                *c = ((*c as u16 * a + 127) / 255) as u8;
            }
        }
    }
    Pixmap::from_vec(rgba, size)
}

fn decode_png(path: &Path, bytes: &[u8]) -> Result<Pixmap, AssetError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder
        .read_info()
        .map_err(|e| AssetError::decode(path, e))?;

    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| AssetError::decode(path, e))?;
    let bytes = &buf[..info.buffer_size()];

    let rgba: Vec<u8> = match info.color_type {
        png::ColorType::Rgba => bytes.to_vec(),
        png::ColorType::Rgb => bytes
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        png::ColorType::Grayscale => bytes.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        png::ColorType::GrayscaleAlpha => bytes
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        png::ColorType::Indexed => {
            return Err(AssetError::decode(path, "indexed color was not expanded"));
        }
    };

    pixmap_from_rgba(info.width, info.height, rgba)
        .ok_or_else(|| AssetError::decode(path, "empty image"))
}

fn decode_gif(path: &Path, bytes: &[u8]) -> Result<Pixmap, AssetError> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options
        .read_info(Cursor::new(bytes))
        .map_err(|e| AssetError::decode(path, e))?;

    let width = decoder.width() as usize;
    let height = decoder.height() as usize;
    let mut canvas = vec![0u8; width * height * 4];

    let frame = decoder
        .read_next_frame()
        .map_err(|e| AssetError::decode(path, e))?
        .ok_or_else(|| AssetError::decode(path, "no frames"))?;

    let (fl, ft) = (frame.left as usize, frame.top as usize);
    let fw = frame.width as usize;
    if fw == 0 || frame.height == 0 {
        return Err(AssetError::decode(path, "empty first frame"));
    }
    for (row, src) in frame.buffer.chunks_exact(fw * 4).enumerate() {
        let y = ft + row;
        if y >= height {
            break;
        }
        for (col, px) in src.chunks_exact(4).enumerate() {
            let x = fl + col;
            if x >= width {
                break;
            }
            let idx = (y * width + x) * 4;
            canvas[idx..idx + 4].copy_from_slice(px);
        }
    }

    pixmap_from_rgba(width as u32, height as u32, canvas)
        .ok_or_else(|| AssetError::decode(path, "empty image"))
}

fn render_svg(path: &Path, bytes: &[u8]) -> Result<Pixmap, AssetError> {
    let tree = usvg::Tree::from_data(bytes, &usvg::Options::default())
        .map_err(|e| AssetError::decode(path, e))?;

    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| AssetError::decode(path, "empty image"))?;
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());
    Ok(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetState, ResourceCache};
    use std::time::Duration;

    fn write_png(path: &Path, width: u32, height: u32, rgba: &[u8]) {
        let file = std::fs::File::create(path).unwrap();
        let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(rgba).unwrap();
    }

    #[test]
    fn premultiplies_alpha() {
        let pixmap = pixmap_from_rgba(1, 1, vec![255, 0, 0, 128]).unwrap();
        assert_eq!(pixmap.data(), &[128, 0, 0, 128]);
    }

    #[test]
    fn rejects_mismatched_buffers() {
        assert!(pixmap_from_rgba(2, 2, vec![0; 4]).is_none());
        assert!(pixmap_from_rgba(0, 1, vec![]).is_none());
    }

    #[test]
    fn loads_png_through_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("img")).unwrap();
        write_png(
            &dir.path().join("img/dot.png"),
            2,
            1,
            &[0, 255, 0, 255, 0, 0, 255, 255],
        );

        let mut cache = ResourceCache::new(ImageLoader::new(dir.path()));
        let asset = cache.resolve("/img/dot.png");
        assert!(asset.wait(Duration::from_secs(5)));

        let pixmap = asset.ready().unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (2, 1));
        assert_eq!(&pixmap.data()[..4], &[0, 255, 0, 255]);
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ResourceCache::new(ImageLoader::new(dir.path()));
        let asset = cache.resolve("nope.png");
        assert!(asset.wait(Duration::from_secs(5)));
        assert!(matches!(asset.state(), AssetState::Failed(_)));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bmp"), b"BM").unwrap();
        let err = ImageLoader::new(dir.path()).load("a.bmp").unwrap_err();
        assert!(matches!(err, AssetError::Unsupported(_)));
    }

    #[test]
    fn renders_svg_at_intrinsic_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("box.svg"),
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="3">
                 <rect width="4" height="3" fill="#0000ff"/>
               </svg>"##,
        )
        .unwrap();
        let pixmap = ImageLoader::new(dir.path()).load("box.svg").unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (4, 3));
        assert_eq!(&pixmap.data()[..4], &[0, 0, 255, 255]);
    }
}
