use crate::foundation::core::{Canvas, Rgba8};
use crate::foundation::error::{SyncError, SyncResult};
use crate::foundation::math::premultiply_rgba8_in_place;
use resvg::tiny_skia::{IntSize, Pixmap};
use std::path::Path;

/// One composited output frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Take ownership of a (premultiplied) pixmap.
    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        Self {
            width: pixmap.width(),
            height: pixmap.height(),
            data: pixmap.take(),
            premultiplied: true,
        }
    }

    /// Wrap straight-alpha RGBA8 bytes, premultiplying them.
    pub fn from_straight_rgba8(width: u32, height: u32, mut data: Vec<u8>) -> SyncResult<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(SyncError::validation(format!(
                "rgba buffer of {} bytes does not match {width}x{height}",
                data.len()
            )));
        }
        premultiply_rgba8_in_place(&mut data);
        Ok(Self {
            width,
            height,
            data,
            premultiplied: true,
        })
    }

    /// A frame filled with one color.
    pub fn solid(canvas: Canvas, color: Rgba8) -> Self {
        let [r, g, b, a] = color.0;
        let mut px = [r, g, b, a];
        premultiply_rgba8_in_place(&mut px);
        Self {
            width: canvas.width,
            height: canvas.height,
            data: px.repeat(canvas.width as usize * canvas.height as usize),
            premultiplied: true,
        }
    }

    /// Return `true` when the frame has the canvas size.
    pub fn matches(&self, canvas: Canvas) -> bool {
        self.width == canvas.width && self.height == canvas.height && self.data.len() == canvas.rgba_len()
    }

    /// Pixel at `(x, y)` as stored.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Convert into a pixmap for further drawing.
    pub fn into_pixmap(self) -> SyncResult<Pixmap> {
        let size = IntSize::from_wh(self.width, self.height)
            .ok_or_else(|| SyncError::validation("frame has zero width or height"))?;
        let data = if self.premultiplied {
            self.data
        } else {
            let mut d = self.data;
            premultiply_rgba8_in_place(&mut d);
            d
        };
        Pixmap::from_vec(data, size)
            .ok_or_else(|| SyncError::validation("frame buffer does not match its dimensions"))
    }

    /// Straight-alpha copy of the pixel data.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        if !self.premultiplied {
            return out;
        }
        for px in out.chunks_exact_mut(4) {
            let a = u32::from(px[3]);
            if a == 0 || a == 255 {
                continue;
            }
            for c in &mut px[..3] {
                *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        out
    }

    /// Write the frame as a PNG.
    pub fn save_png(&self, path: &Path) -> SyncResult<()> {
        use anyhow::Context as _;
        crate::encode::process::ensure_parent_dir(path)?;
        image::save_buffer_with_format(
            path,
            &self.to_straight_rgba8(),
            self.width,
            self.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/frame.rs"]
mod tests;
