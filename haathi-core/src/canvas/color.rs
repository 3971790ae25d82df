//! CSS colour strings.

/// Straight (non-premultiplied) RGBA8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

const NAMED: &[(&str, Rgba)] = &[
    ("black", Rgba::opaque(0, 0, 0)),
    ("silver", Rgba::opaque(192, 192, 192)),
    ("gray", Rgba::opaque(128, 128, 128)),
    ("grey", Rgba::opaque(128, 128, 128)),
    ("white", Rgba::opaque(255, 255, 255)),
    ("maroon", Rgba::opaque(128, 0, 0)),
    ("red", Rgba::opaque(255, 0, 0)),
    ("purple", Rgba::opaque(128, 0, 128)),
    ("fuchsia", Rgba::opaque(255, 0, 255)),
    ("magenta", Rgba::opaque(255, 0, 255)),
    ("green", Rgba::opaque(0, 128, 0)),
    ("lime", Rgba::opaque(0, 255, 0)),
    ("olive", Rgba::opaque(128, 128, 0)),
    ("yellow", Rgba::opaque(255, 255, 0)),
    ("navy", Rgba::opaque(0, 0, 128)),
    ("blue", Rgba::opaque(0, 0, 255)),
    ("teal", Rgba::opaque(0, 128, 128)),
    ("aqua", Rgba::opaque(0, 255, 255)),
    ("cyan", Rgba::opaque(0, 255, 255)),
    ("orange", Rgba::opaque(255, 165, 0)),
    ("pink", Rgba::opaque(255, 192, 203)),
    ("brown", Rgba::opaque(165, 42, 42)),
    ("gold", Rgba::opaque(255, 215, 0)),
    ("indigo", Rgba::opaque(75, 0, 130)),
    ("violet", Rgba::opaque(238, 130, 238)),
    ("darkgray", Rgba::opaque(169, 169, 169)),
    ("darkgrey", Rgba::opaque(169, 169, 169)),
    ("lightgray", Rgba::opaque(211, 211, 211)),
    ("lightgrey", Rgba::opaque(211, 211, 211)),
    ("transparent", Rgba { r: 0, g: 0, b: 0, a: 0 }),
];

/// Parse a CSS colour. Returns `None` for anything unrecognised; callers keep their previous
/// colour in that case, as a browser context does.
pub fn parse_color(input: &str) -> Option<Rgba> {
    let s = input.trim().to_ascii_lowercase();

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = s
        .strip_prefix("rgba(")
        .or_else(|| s.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_args(args);
    }

    NAMED
        .iter()
        .find(|(name, _)| *name == s)
        .map(|(_, color)| *color)
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 | 4 => Some(Rgba {
            r: nibble(0)?,
            g: nibble(1)?,
            b: nibble(2)?,
            a: if hex.len() == 4 { nibble(3)? } else { 255 },
        }),
        6 | 8 => Some(Rgba {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
            a: if hex.len() == 8 { byte(6)? } else { 255 },
        }),
        _ => None,
    }
}

fn parse_rgb_args(args: &str) -> Option<Rgba> {
    let parts: Vec<&str> = args
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let channel = |p: &str| -> Option<u8> {
        let v = match p.strip_suffix('%') {
            Some(pct) => pct.parse::<f32>().ok()? * 2.55,
            None => p.parse::<f32>().ok()?,
        };
        Some(v.round().clamp(0.0, 255.0) as u8)
    };
    let alpha = |p: &str| -> Option<u8> {
        let v = match p.strip_suffix('%') {
            Some(pct) => pct.parse::<f32>().ok()? / 100.0,
            None => p.parse::<f32>().ok()?,
        };
        Some((v.clamp(0.0, 1.0) * 255.0).round() as u8)
    };

    Some(Rgba {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
        a: match parts.get(3) {
            Some(a) => alpha(a)?,
            None => 255,
        },
    })
}
