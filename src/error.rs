use thiserror::Error;

/// Fatal problems with the GIF container or one of its frames.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("signature {0:?} is invalid, expected \"GIF\"")]
    BadMagic(String),

    #[error("version {0:?} in the header is unsupported, expected \"89a\"")]
    UnsupportedVersion(String),

    #[error("unexpected end of stream while reading {0}")]
    Truncated(&'static str),

    #[error("encountered extension with label 0x{0:02x}, this label is not supported")]
    UnknownExtension(u8),

    #[error("encountered unexpected block label 0x{0:02x}, extension, image or trailer expected")]
    UnknownBlock(u8),

    #[error("trailer is not the last byte of the stream")]
    TrailingData,

    #[error("LZW stream ended before the end-of-information code")]
    TruncatedLzw,

    #[error("LZW code {code} has no preceding phrase to extend")]
    InvalidLzwCode { code: u16 },

    #[error("frame {0} has neither a local nor a global color table")]
    NoColorTable(usize),

    #[error("{width}x{height} image does not fit in a BMP file")]
    ImageTooLarge { width: u16, height: u16 },

    #[error("stream contains no image frames")]
    NoFrames,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
