use std::path::{Path, PathBuf};

use fontdue::layout::{
    CoordinateSystem, HorizontalAlign, Layout, LayoutSettings, TextStyle, WrapStyle,
};
use fontdue::{Font, FontSettings};

use crate::config::SubtitleConfig;
use crate::error::CaptionError;

/// Fonts tried, in order, when no font path is configured.
const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

/// White-on-transparent RGBA caption image, rows top to bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct CaptionBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl CaptionBitmap {
    /// Fully transparent bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.pixels[((y * self.width + x) * 4 + 3) as usize]
    }

    /// Accumulate glyph coverage at (`x`, `y`); out-of-bounds pixels are dropped.
    fn cover(&mut self, x: i32, y: i32, coverage: u8) {
        if coverage == 0 || x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = ((y as u32 * self.width + x as u32) * 4) as usize;
        let px = &mut self.pixels[idx..idx + 4];
        px[0] = 255;
        px[1] = 255;
        px[2] = 255;
        px[3] = px[3].max(coverage);
    }
}

impl std::fmt::Debug for CaptionBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CaptionBitmap({}x{})", self.width, self.height)
    }
}

/// Turns caption text into a bitmap.
pub trait CaptionRasterizer: Send {
    /// `None` when the text lays out to nothing visible.
    fn rasterize(&mut self, text: &str) -> Option<CaptionBitmap>;
}

/// Word-wrapped, center-aligned single-font layout via `fontdue`.
pub struct FontRasterizer {
    font: Font,
    layout: Layout,
    text_size_px: f32,
    max_width_px: u32,
}

impl FontRasterizer {
    pub fn new(font: Font, text_size_px: f32, max_width_px: u32) -> Self {
        Self {
            font,
            layout: Layout::new(CoordinateSystem::PositiveYDown),
            text_size_px,
            max_width_px: max_width_px.max(1),
        }
    }

    pub fn from_bytes(
        bytes: &[u8],
        text_size_px: f32,
        max_width_px: u32,
    ) -> Result<Self, CaptionError> {
        let settings = FontSettings {
            scale: text_size_px,
            ..FontSettings::default()
        };
        let font = Font::from_bytes(bytes, settings).map_err(|e| CaptionError::Font(e.to_string()))?;
        Ok(Self::new(font, text_size_px, max_width_px))
    }

    pub fn from_file(
        path: &Path,
        text_size_px: f32,
        max_width_px: u32,
    ) -> Result<Self, CaptionError> {
        let bytes = std::fs::read(path).map_err(|source| CaptionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, text_size_px, max_width_px)
    }

    /// Configured font if set, otherwise the first readable well-known system font.
    pub fn from_config(config: &SubtitleConfig) -> Result<Self, CaptionError> {
        if let Some(path) = &config.font_path {
            return Self::from_file(path, config.text_size_px, config.max_width_px);
        }
        for candidate in FALLBACK_FONTS.iter().map(PathBuf::from) {
            if !candidate.exists() {
                continue;
            }
            match Self::from_file(&candidate, config.text_size_px, config.max_width_px) {
                Ok(rasterizer) => {
                    log::info!("Caption font: {}", candidate.display());
                    return Ok(rasterizer);
                }
                Err(e) => log::warn!("Skipping caption font: {e}"),
            }
        }
        Err(CaptionError::NoFont)
    }
}

impl CaptionRasterizer for FontRasterizer {
    fn rasterize(&mut self, text: &str) -> Option<CaptionBitmap> {
        self.layout.reset(&LayoutSettings {
            max_width: Some(self.max_width_px as f32),
            horizontal_align: HorizontalAlign::Center,
            wrap_style: WrapStyle::Word,
            ..LayoutSettings::default()
        });
        self.layout
            .append(&[&self.font], &TextStyle::new(text, self.text_size_px, 0));

        let height = self.layout.height().ceil() as u32;
        if height == 0 || self.layout.glyphs().is_empty() {
            return None;
        }

        let mut bitmap = CaptionBitmap::new(self.max_width_px, height);
        for glyph in self.layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (metrics, coverage) = self.font.rasterize_config(glyph.key);
            let origin_x = glyph.x.round() as i32;
            let origin_y = glyph.y.round() as i32;
            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    bitmap.cover(
                        origin_x + gx as i32,
                        origin_y + gy as i32,
                        coverage[gy * metrics.width + gx],
                    );
                }
            }
        }
        Some(bitmap)
    }
}

/// Drop markup tags and decode the common character entities.
pub fn strip_markup(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => plain.push(ch),
            _ => {}
        }
    }
    decode_entities(&plain)
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').and_then(|semi| {
            let entity = &tail[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|ch| (ch, semi + 1))
        });
        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_entities() {
        assert_eq!(strip_markup("<i>Hello</i> <b>world</b>"), "Hello world");
        assert_eq!(strip_markup("Tom &amp; Jerry &lt;3"), "Tom & Jerry <3");
        assert_eq!(strip_markup("it&#39;s &#x41;"), "it's A");
        assert_eq!(strip_markup("a & b"), "a & b");
        assert_eq!(strip_markup("<c.yellow>line</c>\nnext"), "line\nnext");
    }

    #[test]
    fn bitmap_coverage_is_clamped_to_bounds() {
        let mut bitmap = CaptionBitmap::new(4, 2);
        bitmap.cover(1, 1, 200);
        bitmap.cover(1, 1, 100);
        bitmap.cover(-1, 0, 255);
        bitmap.cover(4, 0, 255);
        assert_eq!(bitmap.alpha_at(1, 1), 200);
        assert_eq!(bitmap.pixels[20], 255);
        assert_eq!(bitmap.alpha_at(0, 0), 0);
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        assert!(matches!(
            FontRasterizer::from_bytes(b"not a font", 28.0, 600),
            Err(CaptionError::Font(_))
        ));
    }

    #[test]
    fn missing_font_file_reports_path() {
        let err = FontRasterizer::from_file(Path::new("/nonexistent/font.ttf"), 28.0, 600)
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/font.ttf"));
    }

    #[test]
    fn rasterizes_with_system_font_when_available() {
        let Ok(mut rasterizer) = FontRasterizer::from_config(&SubtitleConfig::default()) else {
            return;
        };
        let bitmap = rasterizer.rasterize("Hello captions").unwrap();
        assert_eq!(bitmap.width, 600);
        assert!(bitmap.height > 0);
        assert!(bitmap.pixels.chunks(4).any(|px| px[3] > 0));

        let wrapped = rasterizer
            .rasterize("a fairly long caption that has to wrap onto several lines of output text")
            .unwrap();
        assert!(wrapped.height > bitmap.height);
    }
}
