//! Text rasterization.
//!
//! Font discovery plus glyph measurement, caption-style word wrapping and
//! alpha-blended painting into rgb24 frame buffers. Rasterized glyphs are
//! cached per (glyph, size) so repeated frames reuse their bitmaps.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};

use super::compositor::FrameBuffer;
use crate::core::{PipelineError, PipelineResult, Rgb};

/// Environment variable overriding the font file path
pub const FONT_ENV: &str = "SUBREEL_FONT";

// =============================================================================
// Font Discovery
// =============================================================================

/// Common font file locations per platform, tried in order.
fn get_common_font_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\Windows\Fonts\arial.ttf"));
        paths.push(PathBuf::from(r"C:\Windows\Fonts\segoeui.ttf"));
        paths.push(PathBuf::from(r"C:\Windows\Fonts\calibri.ttf"));
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/System/Library/Fonts/Supplemental/Arial.ttf"));
        paths.push(PathBuf::from("/Library/Fonts/Arial.ttf"));
        paths.push(PathBuf::from("/System/Library/Fonts/Supplemental/Helvetica.ttf"));
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from(
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        ));
        paths.push(PathBuf::from("/usr/share/fonts/dejavu/DejaVuSans.ttf"));
        paths.push(PathBuf::from("/usr/share/fonts/TTF/DejaVuSans.ttf"));
        paths.push(PathBuf::from(
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        ));
        paths.push(PathBuf::from(
            "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        ));
        paths.push(PathBuf::from(
            "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        ));
    }

    paths
}

/// Find a usable system font file.
pub fn detect_system_font() -> Option<PathBuf> {
    if let Ok(overridden) = std::env::var(FONT_ENV) {
        let path = PathBuf::from(overridden);
        if path.exists() {
            return Some(path);
        }
    }

    get_common_font_paths().into_iter().find(|p| p.exists())
}

// =============================================================================
// Text Painter
// =============================================================================

struct GlyphBitmap {
    width: usize,
    height: usize,
    bitmap: Vec<u8>,
}

/// Rasterizes text into rgb24 frame buffers with a glyph cache.
pub struct TextPainter {
    font: Font,
    glyph_cache: HashMap<fontdue::layout::GlyphRasterConfig, GlyphBitmap>,
}

impl TextPainter {
    /// Load a font file.
    pub fn new(font_path: &Path) -> PipelineResult<Self> {
        let font_bytes = std::fs::read(font_path)
            .map_err(|e| PipelineError::FontNotFound(format!("{}: {}", font_path.display(), e)))?;
        let font = Font::from_bytes(font_bytes, FontSettings::default())
            .map_err(|e| PipelineError::FontNotFound(format!("{}: {}", font_path.display(), e)))?;

        Ok(Self {
            font,
            glyph_cache: HashMap::new(),
        })
    }

    /// Load the configured font, falling back to env override then system
    /// discovery.
    pub fn resolve(explicit: Option<&Path>) -> PipelineResult<Self> {
        if let Some(path) = explicit {
            return Self::new(path);
        }
        let path = detect_system_font().ok_or_else(|| {
            PipelineError::FontNotFound(format!(
                "no usable system font found; set {FONT_ENV} or pass an explicit font path"
            ))
        })?;
        Self::new(&path)
    }

    /// Height of one text line at `px`, in pixels.
    pub fn line_height(&self, px: f32) -> u32 {
        self.font
            .horizontal_line_metrics(px)
            .map(|m| m.new_line_size.ceil() as u32)
            .unwrap_or_else(|| px.ceil() as u32)
    }

    /// Advance width of `text` at `px`, in pixels.
    pub fn measure(&self, text: &str, px: f32) -> f32 {
        text.chars()
            .map(|c| self.font.metrics(c, px).advance_width)
            .sum()
    }

    /// Greedy word wrap of `text` to `max_width` pixels at `px`.
    ///
    /// A single word wider than the limit is kept on its own line rather
    /// than split mid-word; the encoder tolerates the overdraw clipping at
    /// the frame edge.
    pub fn wrap(&self, text: &str, px: f32, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();

        for word in text.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };

            if current.is_empty() || self.measure(&candidate, px) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }

        lines
    }

    /// Draw a single line of text with its top-left corner at (x, y).
    pub fn draw(&mut self, frame: &mut FrameBuffer, x: i32, y: i32, text: &str, px: f32, color: Rgb) {
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: x as f32,
            y: y as f32,
            max_width: None,
            max_height: None,
            horizontal_align: fontdue::layout::HorizontalAlign::Left,
            vertical_align: fontdue::layout::VerticalAlign::Top,
            line_height: 1.0,
            wrap_style: fontdue::layout::WrapStyle::Letter,
            wrap_hard_breaks: false,
        });
        layout.append(&[&self.font], &TextStyle::new(text, px, 0));

        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let glyph_bitmap = self.glyph_cache.entry(glyph.key).or_insert_with(|| {
                let (_, bitmap) = self.font.rasterize_config(glyph.key);
                GlyphBitmap {
                    width: glyph.width,
                    height: glyph.height,
                    bitmap,
                }
            });
            blend_glyph(
                frame,
                glyph.x.round() as i32,
                glyph.y.round() as i32,
                glyph_bitmap,
                color,
            );
        }
    }
}

/// Blend a coverage-mask glyph bitmap into the frame.
fn blend_glyph(frame: &mut FrameBuffer, x: i32, y: i32, glyph: &GlyphBitmap, color: Rgb) {
    let frame_width = frame.width as i32;
    let frame_height = frame.height as i32;

    for row in 0..glyph.height {
        let py = y + row as i32;
        if py < 0 || py >= frame_height {
            continue;
        }
        for col in 0..glyph.width {
            let px = x + col as i32;
            if px < 0 || px >= frame_width {
                continue;
            }
            let coverage = glyph.bitmap[row * glyph.width + col];
            if coverage == 0 {
                continue;
            }
            frame.blend_pixel(px as u32, py as u32, color, coverage);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_painter() -> Option<TextPainter> {
        // Skips rendering assertions on hosts without a system font.
        detect_system_font().and_then(|p| TextPainter::new(&p).ok())
    }

    #[test]
    fn test_measure_monotonic_in_length() {
        let Some(painter) = test_painter() else {
            println!("No system font found; skipping");
            return;
        };
        let short = painter.measure("hi", 32.0);
        let long = painter.measure("hello there", 32.0);
        assert!(long > short);
        assert!(short > 0.0);
    }

    #[test]
    fn test_wrap_respects_max_width() {
        let Some(painter) = test_painter() else {
            println!("No system font found; skipping");
            return;
        };
        let text = "the quick brown fox jumps over the lazy dog again and again";
        let max_width = painter.measure("the quick brown", 24.0) + 1.0;
        let lines = painter.wrap(text, 24.0, max_width);

        assert!(lines.len() > 1);
        for line in &lines {
            assert!(painter.measure(line, 24.0) <= max_width);
        }
        // No words lost or reordered.
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_wrap_short_text_single_line() {
        let Some(painter) = test_painter() else {
            println!("No system font found; skipping");
            return;
        };
        let lines = painter.wrap("short", 24.0, 10_000.0);
        assert_eq!(lines, vec!["short"]);
    }

    #[test]
    fn test_resolve_missing_font_is_fatal() {
        let result = TextPainter::new(Path::new("/nonexistent/font.ttf"));
        assert!(result.is_err());
    }
}
