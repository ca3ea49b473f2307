//! Page assembly: panel bitmaps cropped into their slots, outlined, saved.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use tracing::{info, warn};

use crate::constants::{BORDER_WIDTH, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::error::MangaError;
use crate::layout::Slot;

const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// A page that has been written to disk.
#[derive(Debug)]
pub struct ComposedPage {
    /// Page number the file is named after
    pub page_number: u32,
    /// Where the PNG went
    pub path: PathBuf,
    /// The page itself
    pub canvas: RgbImage,
}

/// `Page_01.png`, `Page_12.png`, `Page_123.png`.
pub fn page_file_name(page_number: u32) -> String {
    format!("Page_{page_number:02}.png")
}

/// Writes composed pages into one directory.
#[derive(Clone, Debug)]
pub struct Typesetter {
    output_dir: PathBuf,
}

impl Typesetter {
    /// Typesetter saving into `output_dir`, created on first use.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory pages are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where page `page_number` lives.
    pub fn page_path(&self, page_number: u32) -> PathBuf {
        self.output_dir.join(page_file_name(page_number))
    }

    /// Composes the page and saves it as PNG.
    pub fn assemble_page(
        &self,
        slots: &[Slot],
        panel_images: &BTreeMap<u32, RgbImage>,
        page_number: u32,
    ) -> Result<ComposedPage, MangaError> {
        let canvas = compose(slots, panel_images);

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.page_path(page_number);
        canvas.save_with_format(&path, ImageFormat::Png)?;
        info!("Saved: {}", path.display());

        Ok(ComposedPage {
            page_number,
            path,
            canvas,
        })
    }
}

/// Lays `panel_images` into `slots` on a blank page.
///
/// A slot without an image is left blank, border included.
pub fn compose(slots: &[Slot], panel_images: &BTreeMap<u32, RgbImage>) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, PAPER);

    for slot in slots {
        let Some(image) = panel_images.get(&slot.id) else {
            warn!("Image for panel {} missing", slot.id);
            continue;
        };
        if slot.width == 0 || slot.height == 0 {
            continue;
        }

        let fitted = fit(image, slot.width, slot.height);
        imageops::replace(&mut canvas, &fitted, i64::from(slot.x), i64::from(slot.y));
        draw_outline(&mut canvas, slot, BORDER_WIDTH);
    }

    canvas
}

/// Scales and center-crops `image` so it covers exactly `width` x `height`.
pub fn fit(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
        return RgbImage::from_pixel(width, height, PAPER);
    }

    let target_ratio = f64::from(width) / f64::from(height);
    let src_ratio = f64::from(src_w) / f64::from(src_h);
    let (crop_w, crop_h) = if src_ratio > target_ratio {
        // too wide, trim the sides
        let crop_w = (f64::from(src_h) * target_ratio).round() as u32;
        (crop_w.clamp(1, src_w), src_h)
    } else {
        let crop_h = (f64::from(src_w) / target_ratio).round() as u32;
        (src_w, crop_h.clamp(1, src_h))
    };
    let left = (src_w - crop_w) / 2;
    let top = (src_h - crop_h) / 2;

    let cropped = imageops::crop_imm(image, left, top, crop_w, crop_h).to_image();
    imageops::resize(&cropped, width, height, FilterType::Lanczos3)
}

/// Draws a `thickness` pixel outline over the slot edges.
///
/// Corners are inclusive: the outline also inks column `right()` and row
/// `bottom()`, one pixel past the pasted bitmap.
fn draw_outline(canvas: &mut RgbImage, slot: &Slot, thickness: u32) {
    let band_w = thickness.min(slot.width + 1);
    let band_h = thickness.min(slot.height + 1);
    let outer_w = slot.width + 1;
    let outer_h = slot.height + 1;
    fill_rect(canvas, slot.x, slot.y, outer_w, band_h);
    fill_rect(canvas, slot.x, slot.bottom() + 1 - band_h, outer_w, band_h);
    fill_rect(canvas, slot.x, slot.y, band_w, outer_h);
    fill_rect(canvas, slot.right() + 1 - band_w, slot.y, band_w, outer_h);
}

fn fill_rect(canvas: &mut RgbImage, x: u32, y: u32, width: u32, height: u32) {
    let x_end = (x + width).min(canvas.width());
    let y_end = (y + height).min(canvas.height());
    for py in y..y_end {
        for px in x..x_end {
            canvas.put_pixel(px, py, INK);
        }
    }
}

/// PNG-encodes a bitmap in memory.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, MangaError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
