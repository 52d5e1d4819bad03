//! Caption, title and watermark text rasterized through small generated SVG documents.

use crate::foundation::core::Rgba8;
use crate::foundation::error::{SyncError, SyncResult};
use resvg::tiny_skia::{Pixmap, Transform};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

/// Horizontal alignment of text inside its box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextAlign {
    /// Flush left.
    Start,
    /// Centered.
    #[default]
    Middle,
    /// Flush right.
    End,
}

impl TextAlign {
    fn svg_anchor(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Middle => "middle",
            Self::End => "end",
        }
    }
}

/// A box of text lines to rasterize.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    /// Lines, top to bottom.
    pub lines: Vec<String>,
    /// Box width in pixels.
    pub width: u32,
    /// Box height in pixels.
    pub height: u32,
    /// CSS font family list.
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: f32,
    /// Bold weight.
    pub bold: bool,
    /// Text color.
    pub color: Rgba8,
    /// Optional rounded band behind the text.
    pub background: Option<Rgba8>,
    /// Horizontal alignment.
    pub align: TextAlign,
}

impl TextBlock {
    /// Line advance used for layout.
    pub fn line_height(&self) -> f32 {
        self.font_size * 1.3
    }

    /// Render the block as an SVG document.
    pub fn to_svg(&self) -> String {
        let (w, h) = (self.width, self.height);
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
        );
        if let Some(bg) = self.background {
            let (fill, opacity) = bg.to_svg_fill();
            let radius = (self.font_size * 0.25).round();
            let _ = write!(
                svg,
                r#"<rect x="0" y="0" width="{w}" height="{h}" rx="{radius}" fill="{fill}" fill-opacity="{opacity}"/>"#
            );
        }

        let (fill, opacity) = self.color.to_svg_fill();
        let pad = self.font_size * 0.5;
        let x = match self.align {
            TextAlign::Start => pad,
            TextAlign::Middle => w as f32 / 2.0,
            TextAlign::End => w as f32 - pad,
        };
        let lh = self.line_height();
        let top = (h as f32 - lh * self.lines.len() as f32) / 2.0;
        let _ = write!(
            svg,
            r#"<text font-family="{}" font-size="{}" font-weight="{}" fill="{fill}" fill-opacity="{opacity}" text-anchor="{}">"#,
            xml_escape(&self.font_family),
            self.font_size,
            if self.bold { "bold" } else { "normal" },
            self.align.svg_anchor(),
        );
        for (i, line) in self.lines.iter().enumerate() {
            // Baseline sits at roughly 75% of the line box.
            let y = top + lh * i as f32 + lh * 0.75;
            let _ = write!(
                svg,
                r#"<tspan x="{x}" y="{y:.1}">{}</tspan>"#,
                xml_escape(line)
            );
        }
        svg.push_str("</text></svg>");
        svg
    }
}

/// Escape text for XML character data and attribute values.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn char_em(c: char) -> f32 {
    // CJK, fullwidth forms and similar occupy a full em.
    if c >= '\u{2E80}' { 1.0 } else { 0.55 }
}

/// Greedily wrap `text` to lines no wider than `max_width` pixels at `font_size`.
///
/// Existing newlines are kept. Latin text breaks at spaces where possible; CJK text breaks
/// between any two characters.
pub fn wrap_text(text: &str, font_size: f32, max_width: f32) -> Vec<String> {
    let max_em = (max_width / font_size.max(1.0)).max(1.0);
    let mut lines = Vec::new();
    for para in text.lines() {
        let mut line = String::new();
        let mut width = 0.0f32;
        for c in para.trim().chars() {
            let em = char_em(c);
            if width + em > max_em && !line.is_empty() {
                match line.rfind(' ') {
                    Some(cut) if c != ' ' && c < '\u{2E80}' => {
                        let rest = line[cut + 1..].to_owned();
                        line.truncate(cut);
                        lines.push(std::mem::take(&mut line).trim_end().to_owned());
                        width = rest.chars().map(char_em).sum();
                        line = rest;
                    }
                    _ => {
                        lines.push(std::mem::take(&mut line).trim_end().to_owned());
                        width = 0.0;
                    }
                }
                if c == ' ' {
                    continue;
                }
            }
            line.push(c);
            width += em;
        }
        if !line.trim().is_empty() {
            lines.push(line.trim_end().to_owned());
        }
    }
    lines
}

/// Rasterizer sharing one font database across all text it renders.
#[derive(Clone)]
pub struct TextRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl std::fmt::Debug for TextRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRasterizer")
            .field("faces", &self.fontdb.len())
            .finish()
    }
}

impl TextRasterizer {
    /// System fonts plus any `.ttf`/`.otf`/`.ttc` files found in `extra_font_dirs`.
    pub fn new(extra_font_dirs: &[&Path]) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        for dir in extra_font_dirs {
            load_fonts_from_dir(&mut db, dir);
        }
        tracing::debug!(faces = db.len(), "font database ready");
        Self {
            fontdb: Arc::new(db),
        }
    }

    /// Number of loaded font faces.
    pub fn face_count(&self) -> usize {
        self.fontdb.len()
    }

    /// Rasterize a text block into a premultiplied pixmap of the block size.
    pub fn render(&self, block: &TextBlock) -> SyncResult<Pixmap> {
        let opts = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&block.to_svg(), &opts)
            .map_err(|e| SyncError::validation(format!("text svg: {e}")))?;
        let mut pixmap = Pixmap::new(block.width, block.height).ok_or_else(|| {
            SyncError::validation(format!(
                "cannot allocate {}x{} text pixmap",
                block.width, block.height
            ))
        })?;
        resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
        Ok(pixmap)
    }
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in rd.flatten() {
        let path = entry.path();
        let is_font = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"));
        if is_font && db.load_font_file(&path).is_err() {
            tracing::warn!(path = %path.display(), "failed to load font file");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/text.rs"]
mod tests;
