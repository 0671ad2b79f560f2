//! Frame Compositor
//!
//! Renders one rgb24 raster per output frame index: background fill, then
//! the optional title and byline (shown for the whole video), then the cue
//! active at the frame's timestamp, word-wrapped and centered.
//!
//! Frame content is a pure function of the frame timestamp, which is what
//! makes chunked rendering equivalent to whole-timeline rendering.

use super::text::TextPainter;
use super::RenderSpec;
use crate::core::captions::{Cue, Transcript};
use crate::core::{Resolution, Rgb, TimeSec};

// =============================================================================
// Frame Buffer
// =============================================================================

/// A single rgb24 raster, reused across frames.
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            width: resolution.width,
            height: resolution.height,
            data: vec![0; resolution.frame_bytes()],
        }
    }

    /// Raw rgb24 bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn fill(&mut self, color: Rgb) {
        for pixel in self.data.chunks_exact_mut(3) {
            pixel[0] = color.r;
            pixel[1] = color.g;
            pixel[2] = color.b;
        }
    }

    /// Blend `color` into the pixel at (x, y) with the given coverage alpha.
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Rgb, alpha: u8) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        let alpha = u16::from(alpha);
        let inv_alpha = 255 - alpha;
        for (channel, src) in [color.r, color.g, color.b].into_iter().enumerate() {
            let dst = u16::from(self.data[idx + channel]);
            self.data[idx + channel] = ((u16::from(src) * alpha + dst * inv_alpha) / 255) as u8;
        }
    }

    /// Pixel value at (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        let idx = ((y * self.width + x) * 3) as usize;
        Rgb::new(self.data[idx], self.data[idx + 1], self.data[idx + 2])
    }
}

// =============================================================================
// Compositor
// =============================================================================

/// Fraction of the frame width available to wrapped subtitle text.
const CAPTION_WIDTH_FRAC: f32 = 0.9;

/// Composites overlay layers onto frames for one render run.
pub struct FrameCompositor {
    resolution: Resolution,
    background: Rgb,
    foreground: Rgb,
    title: Option<String>,
    byline: Option<String>,
    transcript: Transcript,
    painter: TextPainter,
    /// Wrapped display lines per cue, precomputed once.
    cue_lines: Vec<Vec<String>>,
    title_px: f32,
    byline_px: f32,
    caption_px: f32,
}

impl FrameCompositor {
    pub fn new(spec: &RenderSpec, transcript: Transcript, painter: TextPainter) -> Self {
        let resolution = spec.resolution.even();
        let height = resolution.height as f32;

        let title_px = height / 12.0;
        let byline_px = height / 28.0;
        let caption_px = height / 18.0;

        let max_caption_width = resolution.width as f32 * CAPTION_WIDTH_FRAC;
        let cue_lines = transcript
            .cues()
            .iter()
            .map(|cue| painter.wrap(&cue.text, caption_px, max_caption_width))
            .collect();

        Self {
            resolution,
            background: spec.background,
            foreground: spec.foreground,
            title: spec.title.clone(),
            byline: spec.byline.clone(),
            transcript,
            painter,
            cue_lines,
            title_px,
            byline_px,
            caption_px,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Cue active at time `t`, if any.
    pub fn active_cue(&self, t: TimeSec) -> Option<&Cue> {
        self.transcript.cue_at(t)
    }

    /// Render the frame for time `t` into `frame`.
    pub fn compose_into(&mut self, t: TimeSec, frame: &mut FrameBuffer) {
        frame.fill(self.background);

        if let Some(title) = self.title.take() {
            let y = (self.resolution.height / 10) as i32;
            self.draw_centered_line(frame, &title, self.title_px, y);
            self.title = Some(title);
        }

        if let Some(byline) = self.byline.take() {
            let margin = (self.resolution.height / 24) as i32;
            let width = self.painter.measure(&byline, self.byline_px);
            let x = self.resolution.width as i32 - width.ceil() as i32 - margin;
            let y = self.resolution.height as i32
                - self.painter.line_height(self.byline_px) as i32
                - margin;
            let color = self.foreground;
            self.painter.draw(frame, x.max(0), y, &byline, self.byline_px, color);
            self.byline = Some(byline);
        }

        let active = self
            .transcript
            .cues()
            .iter()
            .position(|c| c.is_active_at(t));
        if let Some(index) = active {
            let lines = std::mem::take(&mut self.cue_lines[index]);
            let line_height = self.painter.line_height(self.caption_px) as i32;
            let block_height = line_height * lines.len() as i32;
            let mut y = (self.resolution.height as i32 - block_height) / 2;

            for line in &lines {
                self.draw_centered_line(frame, line, self.caption_px, y);
                y += line_height;
            }
            self.cue_lines[index] = lines;
        }
    }

    /// Draw one unwrapped line horizontally centered at vertical offset `y`.
    fn draw_centered_line(&mut self, frame: &mut FrameBuffer, text: &str, px: f32, y: i32) {
        let text_width = self.painter.measure(text, px);
        let x = ((self.resolution.width as f32 - text_width) / 2.0) as i32;
        let color = self.foreground;
        self.painter.draw(frame, x.max(0), y, text, px, color);
    }
}

// =============================================================================
// Tests
// =============================================================================
