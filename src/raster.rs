//! PDF page rasterization via Google PDFium.
//!
//! Renders individual contract pages to PNG images for the recognition
//! engine. Transparent regions are flattened onto an opaque white background
//! before encoding, since some recognition backends misread unfilled alpha as
//! content.
//!
//! `PdfiumRasterizer` is stateless (`Send + Sync`). Each operation creates a
//! fresh `Pdfium` instance because the upstream type is `!Send`. The OS
//! caches `dlopen`/`LoadLibrary` calls, so repeat loads are near-free.

use std::io::Cursor;
use std::time::Duration;

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use crate::error::PipelineError;

/// Default rasterization DPI. 200 DPI keeps letter-size pages under the
/// dimension cap while giving the engine enough pixels per glyph.
pub const DEFAULT_RENDER_DPI: u32 = 200;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages or absurd DPI settings.
const MAX_DIMENSION_PX: u32 = 4096;

/// PDF points per inch (standard PDF unit).
const POINTS_PER_INCH: f32 = 72.0;

/// Channel value treated as background when probing for blank rasters.
const BACKGROUND_THRESHOLD: u8 = 250;

/// Renders one page of a PDF byte buffer to an encoded raster.
///
/// Page numbers are 1-based. Implementations guarantee that no partial
/// raster is handed upstream: the caller receives a complete PNG or an
/// error.
pub trait PageRasterizer: Send + Sync {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, PipelineError>;

    fn rasterize(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, PipelineError>;
}

/// PDFium-backed rasterizer.
pub struct PdfiumRasterizer;

impl PdfiumRasterizer {
    /// Create a new rasterizer, verifying the PDFium library is loadable.
    ///
    /// Fail-fast: library discovery problems surface here, not mid-run.
    pub fn new() -> Result<Self, PipelineError> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to the library file)
/// 2. Alongside the running executable
/// 3. System library search paths
fn load_pdfium() -> Result<Pdfium, PipelineError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            PipelineError::DocumentParseError(format!("Failed to load PDFium from {path}: {e}"))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                debug!(dir = %exe_dir.display(), "Loaded PDFium from executable directory");
                return Ok(Pdfium::new(bindings));
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        PipelineError::DocumentParseError(format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Compute pixel dimensions for rendering, applying the dimension guard.
///
/// Returns (width_px, height_px), both clamped to [1, MAX_DIMENSION_PX].
/// Preserves aspect ratio when capping.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).max(1).min(MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).max(1).min(MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, PipelineError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(|e| PipelineError::DocumentParseError(format!("Failed to load PDF: {e}")))?;
        Ok(document.pages().len() as usize)
    }

    fn rasterize(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, PipelineError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(|e| PipelineError::DocumentParseError(format!("Failed to load PDF: {e}")))?;

        let pages = document.pages();
        let total = pages.len() as usize;

        let page_index = page_number
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or(PipelineError::PageNotFound {
                page: page_number,
                pages: total,
            })?;

        let page = pages.get(page_index).map_err(|_| PipelineError::PageNotFound {
            page: page_number,
            pages: total,
        })?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = compute_render_dimensions(width_points, height_points, dpi);

        let uncapped_w = (width_points * dpi as f32 / POINTS_PER_INCH) as u32;
        let uncapped_h = (height_points * dpi as f32 / POINTS_PER_INCH) as u32;
        if target_w != uncapped_w || target_h != uncapped_h {
            warn!(
                page = page_number,
                raw_width = uncapped_w,
                raw_height = uncapped_h,
                capped_width = target_w,
                capped_height = target_h,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PipelineError::SurfaceUnavailable {
                page: page_number,
                reason: format!("rendering failed: {e}"),
            })?;

        let flattened = flatten_onto_white(&bitmap.as_image());
        let png_bytes = encode_png(&flattened)?;

        debug!(
            page = page_number,
            width = target_w,
            height = target_h,
            png_size = png_bytes.len(),
            "Rasterized PDF page to PNG"
        );

        Ok(png_bytes)
    }
}

/// Flatten any transparency onto an opaque white background.
///
/// Alpha-blends each pixel against white so the engine never sees
/// uninitialized transparent regions.
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut out = RgbImage::from_pixel(w, h, Rgb([255, 255, 255]));

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel.0[3] as u32;
        if alpha == 0 {
            continue;
        }
        let blend = |c: u8| -> u8 { ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8 };
        out.put_pixel(
            x,
            y,
            Rgb([blend(pixel.0[0]), blend(pixel.0[1]), blend(pixel.0[2])]),
        );
    }

    out
}

/// Diagnostic predicate: is this raster entirely background?
///
/// Samples every 4th pixel per axis and checks all channels sit at the
/// background value. An all-background raster means the renderer silently
/// produced nothing; the page must not be handed to recognition as valid
/// content.
pub fn is_blank_raster(img: &RgbImage) -> bool {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return true;
    }

    let mut y = 0;
    while y < h {
        let mut x = 0;
        while x < w {
            let p = img.get_pixel(x, y);
            if p.0.iter().any(|&c| c < BACKGROUND_THRESHOLD) {
                return false;
            }
            x += 4;
        }
        y += 4;
    }
    true
}

/// Encode an RGB image as PNG bytes.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, PipelineError> {
    let dynamic = DynamicImage::ImageRgb8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| PipelineError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

// ── Mock for testing ──────────────────────────────────────

/// Mock rasterizer producing synthetic pages without PDFium.
///
/// Pages render as a mid-gray block (never blank) unless listed in
/// `blank_on`; pages listed in `failing_on` error instead. An optional
/// per-page delay exercises the render timeout path.
pub struct MockPageRasterizer {
    page_count: usize,
    failing: Vec<usize>,
    blank: Vec<usize>,
    delay: Option<Duration>,
}

impl MockPageRasterizer {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            failing: Vec::new(),
            blank: Vec::new(),
            delay: None,
        }
    }

    /// 1-based pages that fail with `SurfaceUnavailable`.
    pub fn failing_on(mut self, pages: Vec<usize>) -> Self {
        self.failing = pages;
        self
    }

    /// 1-based pages that render entirely white.
    pub fn blank_on(mut self, pages: Vec<usize>) -> Self {
        self.blank = pages;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl PageRasterizer for MockPageRasterizer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, PipelineError> {
        Ok(self.page_count)
    }

    fn rasterize(
        &self,
        _pdf_bytes: &[u8],
        page_number: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, PipelineError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if page_number == 0 || page_number > self.page_count {
            return Err(PipelineError::PageNotFound {
                page: page_number,
                pages: self.page_count,
            });
        }
        if self.failing.contains(&page_number) {
            return Err(PipelineError::SurfaceUnavailable {
                page: page_number,
                reason: "mock rendering failure".into(),
            });
        }
        let shade = if self.blank.contains(&page_number) {
            255
        } else {
            120
        };
        let img = RgbImage::from_pixel(32, 32, Rgb([shade, shade, shade]));
        encode_png(&img)
    }
}
