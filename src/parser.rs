mod decoder;
mod bit_reader;
pub mod lzw;

pub use decoder::Decoder;

use crate::diagnostics::Diagnostics;
use crate::error::FormatError;

/// Number of entries in a color table whose size exponent sits in the low
/// three bits of `packed`.
pub fn color_table_len(packed: u8) -> usize {
    1 << ((packed & 0b00000111) + 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    entries: Vec<Rgb>,
}

impl ColorTable {
    /// Builds a table from packed RGB triples; a trailing partial triple is ignored.
    pub fn from_rgb_bytes(bytes: &[u8]) -> Self {
        let entries = bytes
            .chunks_exact(3)
            .map(|rgb| Rgb {
                red: rgb[0],
                green: rgb[1],
                blue: rgb[2],
            })
            .collect();

        Self { entries }
    }

    pub fn get(&self, index: u8) -> Option<Rgb> {
        self.entries.get(usize::from(index)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// GIF header and logical screen descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub screen_width: u16,
    pub screen_height: u16,
    pub packed: u8,
    pub background_color_index: u8,
    pub pixel_aspect_ratio: u8,
}

impl Header {
    pub fn has_global_color_table(&self) -> bool {
        self.packed & 0b10000000 != 0
    }

    pub fn color_resolution(&self) -> u8 {
        (self.packed >> 4) & 0b00000111
    }

    pub fn is_sorted(&self) -> bool {
        self.packed & 0b00001000 != 0
    }

    pub fn global_color_table_len(&self) -> usize {
        color_table_len(self.packed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub packed: u8,
}

impl ImageDescriptor {
    pub fn has_local_color_table(&self) -> bool {
        self.packed & 0b10000000 != 0
    }

    pub fn is_interlaced(&self) -> bool {
        self.packed & 0b01000000 != 0
    }

    pub fn is_sorted(&self) -> bool {
        self.packed & 0b00100000 != 0
    }

    pub fn local_color_table_len(&self) -> usize {
        color_table_len(self.packed)
    }
}

/// One table-based image as it appears in the stream, still compressed.
#[derive(Debug, Clone)]
pub struct Frame {
    pub descriptor: ImageDescriptor,
    pub local_color_table: Option<ColorTable>,
    // minimum code size byte followed by the concatenated sub-block payloads
    data: Vec<u8>,
}

impl Frame {
    pub(crate) fn new(
        descriptor: ImageDescriptor,
        local_color_table: Option<ColorTable>,
        min_code_size: u8,
        compressed: Vec<u8>,
    ) -> Self {
        let mut data = Vec::with_capacity(compressed.len() + 1);
        data.push(min_code_size);
        data.extend(compressed);

        Self {
            descriptor,
            local_color_table,
            data,
        }
    }

    pub fn min_code_size(&self) -> u8 {
        self.data[0]
    }

    /// LZW payload without the minimum code size byte.
    pub fn compressed(&self) -> &[u8] {
        &self.data[1..]
    }

    /// The whole image data buffer, minimum code size byte first.
    pub fn raw(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u16 {
        self.descriptor.width
    }

    pub fn height(&self) -> u16 {
        self.descriptor.height
    }

    /// Local table if the frame has one, otherwise `global`.
    pub fn palette<'a>(&'a self, global: Option<&'a ColorTable>) -> Option<&'a ColorTable> {
        self.local_color_table.as_ref().or(global)
    }

    /// Runs the LZW decoder over this frame with a dictionary seeded from `palette_len` entries.
    pub fn decode_indices(
        &self,
        palette_len: usize,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<u8>, FormatError> {
        lzw::decode(self.min_code_size(), self.compressed(), palette_len, diagnostics)
    }
}

/// A fully parsed GIF stream.
#[derive(Debug, Clone)]
pub struct Document {
    pub header: Header,
    pub global_color_table: Option<ColorTable>,
    pub frames: Vec<Frame>,
    /// Bytes consumed from the input, trailer included.
    pub bytes_read: usize,
}

impl Document {
    /// Color table frame `index` is drawn with.
    pub fn palette_for(&self, index: usize) -> Result<&ColorTable, FormatError> {
        self.frames
            .get(index)
            .and_then(|frame| frame.palette(self.global_color_table.as_ref()))
            .ok_or(FormatError::NoColorTable(index))
    }
}
