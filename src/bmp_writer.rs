use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::FormatError;
use crate::parser::{ColorTable, Rgb};

use anyhow::{Context, Result};
use log::debug;

use std::fs::File;
use std::io::{self, prelude::*, BufWriter};
use std::path::Path;

const MAGIC_NUMBER: &[u8] = b"BM";
const FILE_HEADER_LEN: usize = 14;
const DIB_HEADER_LEN: usize = 40;
const PIXEL_DATA_OFFSET: usize = FILE_HEADER_LEN + DIB_HEADER_LEN;
const BITS_PER_PIXEL: u16 = 24;
// 72 DPI
const PIXELS_PER_METER: u32 = 2835;

/// Bytes per pixel row, padded to a multiple of four.
pub fn row_stride(width: usize) -> usize {
    (width * 3 + 3) & !3
}

/// Size of the BMP file for a `width`x`height` image, or `None` when the
/// header's 32-bit size fields cannot hold it.
pub fn file_size_for(width: u16, height: u16) -> Option<u32> {
    let image_size = row_stride(usize::from(width)).checked_mul(usize::from(height))?;
    u32::try_from(image_size.checked_add(PIXEL_DATA_OFFSET)?).ok()
}

/// A 24-bit bottom-up raster ready to be written as a BMP file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u16,
    height: u16,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Padded BGR rows, last image row first.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Size of the complete file: both headers plus pixel data.
    pub fn file_size(&self) -> usize {
        PIXEL_DATA_OFFSET + self.pixels.len()
    }

    fn headers(&self) -> Vec<u8> {
        // compose only builds bitmaps whose file size fits in u32
        let mut out = Vec::with_capacity(PIXEL_DATA_OFFSET);

        // file header
        out.extend_from_slice(MAGIC_NUMBER);
        out.extend_from_slice(&(self.file_size() as u32).to_le_bytes());
        out.extend_from_slice(&[0u8; 4]); // reserved
        out.extend_from_slice(&(PIXEL_DATA_OFFSET as u32).to_le_bytes());

        // BITMAPINFOHEADER
        out.extend_from_slice(&(DIB_HEADER_LEN as u32).to_le_bytes());
        out.extend_from_slice(&i32::from(self.width).to_le_bytes());
        out.extend_from_slice(&i32::from(self.height).to_le_bytes()); // positive = bottom-up
        out.extend_from_slice(&1u16.to_le_bytes()); // planes
        out.extend_from_slice(&BITS_PER_PIXEL.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // no compression
        out.extend_from_slice(&(self.pixels.len() as u32).to_le_bytes());
        out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // colors in palette
        out.extend_from_slice(&0u32.to_le_bytes()); // important colors

        out
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.headers())?;
        writer.write_all(&self.pixels)?;
        writer.flush()
    }
}

/// Looks every index up in `color_table` and lays the colors out as BMP rows.
///
/// Indices outside the table and pixels the index stream does not reach
/// are painted black. Fails without allocating when the BMP header could not
/// describe an image this large.
pub fn compose(
    indexes: &[u8],
    color_table: &ColorTable,
    width: u16,
    height: u16,
    diagnostics: &mut Diagnostics,
) -> Result<Bitmap, FormatError> {
    file_size_for(width, height).ok_or(FormatError::ImageTooLarge { width, height })?;

    let w = usize::from(width);
    let h = usize::from(height);
    let stride = row_stride(w);

    let mut pixels = Vec::with_capacity(stride * h);
    let mut out_of_range = 0;
    let mut first_out_of_range = None;
    let mut missing = 0;

    for row in (0..h).rev() {
        for col in 0..w {
            let color = match indexes.get(row * w + col) {
                Some(&index) => color_table.get(index).unwrap_or_else(|| {
                    out_of_range += 1;
                    first_out_of_range.get_or_insert(index);
                    Rgb::default()
                }),
                None => {
                    missing += 1;
                    Rgb::default()
                },
            };
            pixels.extend_from_slice(&[color.blue, color.green, color.red]);
        }
        pixels.resize(pixels.len() + stride - w * 3, 0);
    }

    if let Some(index) = first_out_of_range {
        diagnostics.record(
            DiagnosticKind::PaletteIndexOutOfRange,
            format!(
                "{out_of_range} pixels index past the {} entry color table (first: {index}), using black",
                color_table.len()
            ),
        );
    }
    if missing > 0 {
        diagnostics.record(
            DiagnosticKind::ShortIndexStream,
            format!("image data ended {missing} pixels short of {width}x{height}, using black"),
        );
    }
    if indexes.len() > w * h {
        debug!("ignoring {} indices past the end of the image", indexes.len() - w * h);
    }

    Ok(Bitmap {
        width,
        height,
        pixels,
    })
}

pub fn write_bmp(filename: &Path, bitmap: &Bitmap) -> Result<()> {
    let file = File::create(filename)
        .with_context(|| format!("failed to create {}", filename.display()))?;
    debug!("writing {}", filename.display());

    let mut writer = BufWriter::new(file);
    bitmap
        .write_to(&mut writer)
        .with_context(|| format!("failed to write {}", filename.display()))
}
