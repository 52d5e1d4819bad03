//! Per-frame composition: background, bars, title, chart, caption, speaker overlay, watermark.

use crate::audio::media::{decode_video_frames_rgba8, probe_video_size};
use crate::foundation::config::{CaptionConfig, VideoConfig};
use crate::foundation::core::{Canvas, FrameIndex, Rgba8};
use crate::foundation::error::{SyncError, SyncResult};
use crate::foundation::math::{fnv1a64, premultiply_rgba8_in_place};
use crate::render::frame::FrameRGBA;
use crate::render::text::{TextAlign, TextBlock, TextRasterizer, wrap_text};
use crate::timeline::model::CaptionStyle;
use crate::timeline::store::TimelineDocument;
use resvg::tiny_skia::{Color, IntSize, Paint, Pixmap, PixmapPaint, Rect, Transform};
use std::path::{Path, PathBuf};

/// Color of the fixed placeholder frame.
pub const ERROR_FRAME_COLOR: Rgba8 = Rgba8::rgb(64, 0, 0);

/// Produces the frame for one output index.
pub trait FrameComposer: Send {
    /// Output canvas every composed frame must match.
    fn canvas(&self) -> Canvas;

    /// Compose the frame for `idx` at presentation time `t` seconds.
    fn compose(&mut self, idx: FrameIndex, t: f64) -> SyncResult<FrameRGBA>;

    /// The fixed frame emitted in place of frames that could not be composed.
    fn error_frame(&self) -> FrameRGBA {
        FrameRGBA::solid(self.canvas(), ERROR_FRAME_COLOR)
    }
}

/// Supplies encoded chart image bytes (PNG, JPEG, ...) for a progress fraction in `[0, 1]`.
pub trait ChartSource: Send {
    /// Image bytes for `progress`.
    fn chart_image(&mut self, progress: f64) -> SyncResult<Vec<u8>>;
}

impl<F> ChartSource for F
where
    F: FnMut(f64) -> SyncResult<Vec<u8>> + Send,
{
    fn chart_image(&mut self, progress: f64) -> SyncResult<Vec<u8>> {
        self(progress)
    }
}

/// A chart that does not change with progress.
#[derive(Clone, Debug)]
pub struct StaticChart {
    bytes: Vec<u8>,
}

impl StaticChart {
    /// Chart from in-memory image bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Chart read from an image file.
    pub fn from_path(path: &Path) -> SyncResult<Self> {
        use anyhow::Context as _;
        let bytes =
            std::fs::read(path).with_context(|| format!("read chart image '{}'", path.display()))?;
        Ok(Self { bytes })
    }
}

impl ChartSource for StaticChart {
    fn chart_image(&mut self, _progress: f64) -> SyncResult<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// Canvas corner an overlay is anchored to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    /// Top left.
    TopLeft,
    /// Top right.
    TopRight,
    /// Bottom left.
    BottomLeft,
    /// Bottom right.
    #[default]
    BottomRight,
}

impl std::str::FromStr for Corner {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top-left" => Ok(Self::TopLeft),
            "top-right" => Ok(Self::TopRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-right" => Ok(Self::BottomRight),
            other => Err(SyncError::validation(format!("unknown corner '{other}'"))),
        }
    }
}

/// Looping secondary-speaker footage drawn in a corner of the content area.
#[derive(Clone, Debug)]
pub struct SpeakerOverlay {
    frames: Vec<Pixmap>,
    fps: f64,
    corner: Corner,
}

impl SpeakerOverlay {
    /// Overlay from already decoded frames of equal size.
    pub fn from_frames(frames: Vec<FrameRGBA>, fps: f64, corner: Corner) -> SyncResult<Self> {
        if frames.is_empty() {
            return Err(SyncError::validation("speaker overlay needs at least one frame"));
        }
        if !(fps.is_finite() && fps > 0.0) {
            return Err(SyncError::validation("speaker overlay fps must be > 0"));
        }
        let frames = frames
            .into_iter()
            .map(FrameRGBA::into_pixmap)
            .collect::<SyncResult<Vec<_>>>()?;
        Ok(Self {
            frames,
            fps,
            corner,
        })
    }

    /// Decode up to `max_frames` frames of `path`, scaled to `width`x`height`.
    pub fn load_video(
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
        max_frames: u32,
        corner: Corner,
    ) -> SyncResult<Self> {
        let raw = decode_video_frames_rgba8(path, width, height, fps, max_frames)?;
        tracing::info!(path = %path.display(), frames = raw.len(), "loaded speaker overlay");
        let frames = raw
            .into_iter()
            .map(|data| FrameRGBA::from_straight_rgba8(width, height, data))
            .collect::<SyncResult<Vec<_>>>()?;
        Self::from_frames(frames, fps, corner)
    }

    /// Number of frames in the loop.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always `false`; an overlay holds at least one frame.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Loop position for time `t`: `floor(t * fps) mod len`.
    pub fn frame_index_at(&self, t: f64) -> usize {
        let n = (t.max(0.0) * self.fps).floor() as usize;
        n % self.frames.len()
    }

    fn frame_at(&self, t: f64) -> &Pixmap {
        &self.frames[self.frame_index_at(t)]
    }
}

/// Pixel rectangles derived from the canvas size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Layout {
    /// Header bar height.
    pub header: u32,
    /// Footer bar height.
    pub footer: u32,
    /// Margin around the content area.
    pub margin: u32,
}

impl Layout {
    /// Bars scaled to the canvas height (90/60 px at 1080p).
    pub fn for_canvas(canvas: Canvas) -> Self {
        Self {
            header: (canvas.height / 12).max(1),
            footer: (canvas.height / 18).max(1),
            margin: (canvas.height / 27).max(1),
        }
    }

    /// `(x, y, w, h)` of the region between the bars, inset by the margin.
    pub fn content(&self, canvas: Canvas) -> (u32, u32, u32, u32) {
        let y = self.header + self.margin;
        let h = canvas
            .height
            .saturating_sub(self.header + self.footer + 2 * self.margin)
            .max(1);
        let w = canvas.width.saturating_sub(2 * self.margin).max(1);
        (self.margin, y, w, h)
    }
}

fn fill_rect(pm: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, color: Rgba8) {
    let Some(rect) = Rect::from_xywh(x, y, w, h) else {
        return;
    };
    let mut paint = Paint::default();
    let [r, g, b, a] = color.0;
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = false;
    pm.fill_rect(rect, &paint, Transform::identity(), None);
}

fn draw(pm: &mut Pixmap, src: &Pixmap, x: i32, y: i32) {
    pm.draw_pixmap(
        x,
        y,
        src.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

#[derive(Clone, Debug)]
struct CachedChart {
    hash: u64,
    pixmap: Pixmap,
}

#[derive(Clone, Debug)]
struct CachedCaption {
    key: (String, String),
    pixmap: Pixmap,
    y: i32,
}

/// Composer that draws a timeline document over a fixed frame design.
pub struct TimelineComposer {
    canvas: Canvas,
    layout: Layout,
    doc: TimelineDocument,
    video: VideoConfig,
    captions: CaptionConfig,
    text: TextRasterizer,
    chart: Option<Box<dyn ChartSource>>,
    overlay: Option<SpeakerOverlay>,
    base: Option<Pixmap>,
    watermark: Option<(Pixmap, i32, i32)>,
    chart_cache: Option<CachedChart>,
    caption_cache: Option<CachedCaption>,
}

impl std::fmt::Debug for TimelineComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineComposer")
            .field("canvas", &self.canvas)
            .field("subtitles", &self.doc.subtitles().len())
            .field("chart", &self.chart.is_some())
            .field("overlay", &self.overlay.as_ref().map(SpeakerOverlay::len))
            .finish()
    }
}

impl TimelineComposer {
    /// Composer for `doc` with the given design settings.
    pub fn new(
        canvas: Canvas,
        doc: TimelineDocument,
        video: VideoConfig,
        captions: CaptionConfig,
        text: TextRasterizer,
    ) -> Self {
        Self {
            canvas,
            layout: Layout::for_canvas(canvas),
            doc,
            video,
            captions,
            text,
            chart: None,
            overlay: None,
            base: None,
            watermark: None,
            chart_cache: None,
            caption_cache: None,
        }
    }

    /// Draw a chart from `source` in the content area.
    pub fn with_chart(mut self, source: impl ChartSource + 'static) -> Self {
        self.chart = Some(Box::new(source));
        self
    }

    /// Draw a looping speaker overlay.
    pub fn with_overlay(mut self, overlay: SpeakerOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Chart progress at time `t`: `min(1, t / rampSeconds)`.
    pub fn chart_progress(&self, t: f64) -> f64 {
        (t.max(0.0) / self.video.chart_ramp_secs.max(f64::EPSILON)).min(1.0)
    }

    fn base_layer(&mut self) -> SyncResult<&Pixmap> {
        if self.base.is_none() {
            let c = self.canvas;
            let mut pm = Pixmap::new(c.width, c.height)
                .ok_or_else(|| SyncError::validation("cannot allocate frame pixmap"))?;
            let [r, g, b, a] = self.video.background.0;
            pm.fill(Color::from_rgba8(r, g, b, a));
            let (w, header, footer) = (c.width as f32, self.layout.header, self.layout.footer);
            fill_rect(&mut pm, 0.0, 0.0, w, header as f32, self.video.bar_color);
            fill_rect(
                &mut pm,
                0.0,
                (c.height - footer) as f32,
                w,
                footer as f32,
                self.video.bar_color,
            );
            if let Some(title) = self.video.title.as_deref().filter(|t| !t.is_empty()) {
                let block = TextBlock {
                    lines: vec![title.to_owned()],
                    width: c.width,
                    height: header,
                    font_family: self.captions.font_family.clone(),
                    font_size: header as f32 * 0.45,
                    bold: true,
                    color: self.captions.color,
                    background: None,
                    align: TextAlign::Middle,
                };
                let title_pm = self.text.render(&block)?;
                draw(&mut pm, &title_pm, 0, 0);
            }
            self.base = Some(pm);
        }
        self.base
            .as_ref()
            .ok_or_else(|| SyncError::validation("base layer unavailable"))
    }

    fn watermark_layer(&mut self) -> SyncResult<Option<&(Pixmap, i32, i32)>> {
        let Some(text) = self.video.watermark.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        if self.watermark.is_none() {
            let footer = self.layout.footer;
            let width = (self.canvas.width / 3).max(1);
            let block = TextBlock {
                lines: vec![text.to_owned()],
                width,
                height: footer,
                font_family: self.captions.font_family.clone(),
                font_size: footer as f32 * 0.4,
                bold: false,
                color: Rgba8([255, 255, 255, 150]),
                background: None,
                align: TextAlign::End,
            };
            let pm = self.text.render(&block)?;
            let x = (self.canvas.width - width) as i32;
            let y = (self.canvas.height - footer) as i32;
            self.watermark = Some((pm, x, y));
        }
        Ok(self.watermark.as_ref())
    }

    fn chart_layer(&mut self, t: f64) -> SyncResult<Option<(&Pixmap, i32, i32)>> {
        let progress = self.chart_progress(t);
        let Some(source) = self.chart.as_mut() else {
            return Ok(None);
        };
        let bytes = source.chart_image(progress)?;
        let hash = fnv1a64(&bytes);
        let (cx, cy, cw, ch) = self.layout.content(self.canvas);

        if self.chart_cache.as_ref().is_none_or(|c| c.hash != hash) {
            let img = image::load_from_memory(&bytes)
                .map_err(|e| SyncError::validation(format!("decode chart image: {e}")))?
                .to_rgba8();
            let (iw, ih) = img.dimensions();
            let scale = (f64::from(cw) / f64::from(iw.max(1))).min(f64::from(ch) / f64::from(ih.max(1)));
            let tw = ((f64::from(iw) * scale).round() as u32).clamp(1, cw);
            let th = ((f64::from(ih) * scale).round() as u32).clamp(1, ch);
            let resized = if (tw, th) == (iw, ih) {
                img
            } else {
                image::imageops::resize(&img, tw, th, image::imageops::FilterType::Triangle)
            };
            let mut data = resized.into_raw();
            premultiply_rgba8_in_place(&mut data);
            let size = IntSize::from_wh(tw, th)
                .ok_or_else(|| SyncError::validation("chart image has zero size"))?;
            let pixmap = Pixmap::from_vec(data, size)
                .ok_or_else(|| SyncError::validation("chart pixmap size mismatch"))?;
            self.chart_cache = Some(CachedChart { hash, pixmap });
        }

        let Some(cached) = self.chart_cache.as_ref() else {
            return Ok(None);
        };
        let x = cx + (cw - cached.pixmap.width()) / 2;
        let y = cy + (ch - cached.pixmap.height()) / 2;
        Ok(Some((&cached.pixmap, x as i32, y as i32)))
    }

    fn caption_layer(&mut self, t: f64) -> SyncResult<Option<(&Pixmap, i32, i32)>> {
        let Some(sub) = self.doc.active_subtitle(t) else {
            return Ok(None);
        };
        let key = (sub.id.clone(), sub.text.clone());
        if self.caption_cache.as_ref().is_none_or(|c| c.key != key) {
            let cfg = &self.captions;
            let (font_size, bold, color) = match sub.style {
                CaptionStyle::Default => (cfg.font_size, false, cfg.color),
                CaptionStyle::Emphasis => (cfg.font_size, true, Rgba8::rgb(255, 215, 0)),
                CaptionStyle::Title => (cfg.font_size * 1.4, true, cfg.color),
            };
            let margin = self.layout.margin;
            let max_w = self.canvas.width.saturating_sub(4 * margin).max(1);
            let lines = wrap_text(&sub.text, font_size, max_w as f32 - font_size);
            let mut block = TextBlock {
                lines,
                width: max_w,
                height: 1,
                font_family: cfg.font_family.clone(),
                font_size,
                bold,
                color,
                background: Some(cfg.band_color),
                align: TextAlign::Middle,
            };
            block.height = (block.line_height() * block.lines.len().max(1) as f32 + font_size * 0.6)
                .ceil() as u32;
            let pixmap = self.text.render(&block)?;
            let y = self
                .canvas
                .height
                .saturating_sub(self.layout.footer + margin + block.height);
            self.caption_cache = Some(CachedCaption {
                key,
                pixmap,
                y: y as i32,
            });
        }
        let x = (2 * self.layout.margin) as i32;
        Ok(self.caption_cache.as_ref().map(|c| (&c.pixmap, x, c.y)))
    }

    fn overlay_position(&self, w: u32, h: u32) -> (i32, i32) {
        let (cx, cy, cw, ch) = self.layout.content(self.canvas);
        let right = (cx + cw).saturating_sub(w);
        let bottom = (cy + ch).saturating_sub(h);
        let corner = self.overlay.as_ref().map(|o| o.corner).unwrap_or_default();
        let (x, y) = match corner {
            Corner::TopLeft => (cx, cy),
            Corner::TopRight => (right, cy),
            Corner::BottomLeft => (cx, bottom),
            Corner::BottomRight => (right, bottom),
        };
        (x as i32, y as i32)
    }
}

impl FrameComposer for TimelineComposer {
    fn canvas(&self) -> Canvas {
        self.canvas
    }

    fn compose(&mut self, _idx: FrameIndex, t: f64) -> SyncResult<FrameRGBA> {
        let mut pm = self.base_layer()?.clone();

        if let Some((chart, x, y)) = self.chart_layer(t)? {
            draw(&mut pm, chart, x, y);
        }
        if let Some((caption, x, y)) = self.caption_layer(t)? {
            draw(&mut pm, caption, x, y);
        }
        if let Some(overlay) = self.overlay.as_ref() {
            let frame = overlay.frame_at(t);
            let (x, y) = self.overlay_position(frame.width(), frame.height());
            draw(&mut pm, frame, x, y);
        }
        if let Some((mark, x, y)) = self.watermark_layer()? {
            draw(&mut pm, mark, *x, *y);
        }
        Ok(FrameRGBA::from_pixmap(pm))
    }

    fn error_frame(&self) -> FrameRGBA {
        let mut frame = FrameRGBA::solid(self.canvas, ERROR_FRAME_COLOR);
        let block = TextBlock {
            lines: vec!["Frame unavailable".to_owned()],
            width: self.canvas.width,
            height: self.canvas.height,
            font_family: self.captions.font_family.clone(),
            font_size: self.captions.font_size,
            bold: true,
            color: Rgba8::rgb(255, 255, 255),
            background: None,
            align: TextAlign::Middle,
        };
        if let Ok(text) = self.text.render(&block)
            && let Ok(mut pm) = frame.clone().into_pixmap()
        {
            draw(&mut pm, &text, 0, 0);
            frame = FrameRGBA::from_pixmap(pm);
        }
        frame
    }
}

/// Paths of optional composition inputs, as given on the command line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComposeInputs {
    /// Static chart image.
    pub chart: Option<PathBuf>,
    /// Speaker overlay video.
    pub overlay: Option<PathBuf>,
    /// Corner for the overlay.
    pub overlay_corner: Corner,
}

/// Overlay size for `canvas`: a quarter of its width, keeping the source aspect ratio.
pub fn overlay_size(canvas: Canvas, source: (u32, u32)) -> (u32, u32) {
    let w = ((canvas.width / 4) & !1).max(2);
    let (sw, sh) = source;
    let h = if sw == 0 || sh == 0 {
        w * 9 / 16
    } else {
        (u64::from(w) * u64::from(sh) / u64::from(sw)).min(u64::from(canvas.height)) as u32
    };
    (w, (h & !1).max(2))
}

impl ComposeInputs {
    /// Attach the inputs to `composer`; the overlay is scaled to a quarter of the canvas width.
    pub fn apply(&self, mut composer: TimelineComposer, fps: f64) -> SyncResult<TimelineComposer> {
        if let Some(chart) = &self.chart {
            composer = composer.with_chart(StaticChart::from_path(chart)?);
        }
        if let Some(path) = &self.overlay {
            let source = match probe_video_size(path) {
                Ok(size) => size,
                Err(err @ SyncError::DocumentNotFound { .. }) => return Err(err),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "overlay size unknown; assuming 16:9");
                    (16, 9)
                }
            };
            let (w, h) = overlay_size(composer.canvas, source);
            let overlay = SpeakerOverlay::load_video(path, w, h, fps, 300, self.overlay_corner)?;
            composer = composer.with_overlay(overlay);
        }
        Ok(composer)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compose.rs"]
mod tests;
