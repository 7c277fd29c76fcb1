use super::{ColorTable, Document, Frame, Header, ImageDescriptor};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::FormatError;

use log::debug;

use std::io::{self, prelude::*};

type Result<T> = std::result::Result<T, FormatError>;

const SIGNATURE: &[u8] = b"GIF";
const VERSION: &[u8] = b"89a";

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_DESCRIPTOR_LABEL: u8 = 0x2c;
const TRAILER_LABEL: u8 = 0x3b;

// Extension labels
const APPLICATION_EXTENSION: u8 = 0xff;
const COMMENT_EXTENSION: u8 = 0xfe;
const GRAPHIC_CONTROL_EXTENSION: u8 = 0xf9;
const PLAIN_TEXT_EXTENSION: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtensionKind {
    Application,
    Comment,
    GraphicControl,
    PlainText,
}

impl TryFrom<u8> for ExtensionKind {
    type Error = FormatError;

    fn try_from(value: u8) -> Result<Self> {
        use ExtensionKind::*;

        match value {
            APPLICATION_EXTENSION => Ok(Application),
            COMMENT_EXTENSION => Ok(Comment),
            GRAPHIC_CONTROL_EXTENSION => Ok(GraphicControl),
            PLAIN_TEXT_EXTENSION => Ok(PlainText),

            _ => Err(FormatError::UnknownExtension(value))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Extension(ExtensionKind),
    Image,
    Trailer,
}

#[derive(Debug)]
enum ParserState {
    ProcessMagic,
    ProcessLogicalScreenDescriptor,
    ProcessGlobalColorTable,

    DetermineNextBlock,
    ProcessBlock(Block),
    ProcessLocalColorTable(ImageDescriptor),
    ProcessImageData(ImageDescriptor, Option<ColorTable>),
    ProcessImageDataTrailer,
    ProcessTrailer,
    ProcessMissingTrailer,

    Done,
}

/// Walks a GIF stream block by block and collects its frames.
#[derive(Debug)]
pub struct Decoder<'a, T: Read> {
    inner: &'a mut T,
    bytes_read: usize,
    header: Option<Header>,
    global_color_table: Option<ColorTable>,
    frames: Vec<Frame>,
}

impl<'a, T: Read> Decoder<'a, T> {
    pub fn new(inner: &'a mut T) -> Self {
        Self {
            inner,
            bytes_read: 0,
            header: None,
            global_color_table: None,
            frames: Vec::new(),
        }
    }

    /// Reads the whole stream. Extension text and recoverable problems go to
    /// `diagnostics`; anything else malformed aborts the parse.
    pub fn parse(mut self, diagnostics: &mut Diagnostics) -> Result<Document> {
        let mut state = ParserState::ProcessMagic;

        loop {
            debug!("begin parsing state {:?}", state);

            state = self.process_next_state(state, diagnostics)?;
            if let ParserState::Done = state {
                break;
            }
        }

        // the first state always stores a header before reaching `Done`
        let header = self.header.ok_or(FormatError::Truncated("header"))?;

        Ok(Document {
            header,
            global_color_table: self.global_color_table,
            frames: self.frames,
            bytes_read: self.bytes_read,
        })
    }

    fn process_next_state(
        &mut self,
        next_state: ParserState,
        diagnostics: &mut Diagnostics,
    ) -> Result<ParserState> {
        use ParserState::*;

        match next_state {
            ProcessMagic => {
                let signature = self.read_bytes(3, "signature")?;
                if signature != SIGNATURE {
                    return Err(FormatError::BadMagic(String::from_utf8_lossy(&signature).into()));
                }

                let version = self.read_bytes(3, "version")?;
                if version != VERSION {
                    return Err(FormatError::UnsupportedVersion(String::from_utf8_lossy(&version).into()));
                }
                debug!("processed signature and version, got GIF89a");

                Ok(ProcessLogicalScreenDescriptor)
            },
            ProcessLogicalScreenDescriptor => {
                let what = "logical screen descriptor";
                let header = Header {
                    screen_width: self.read_u16(what)?,
                    screen_height: self.read_u16(what)?,
                    packed: self.read_byte(what)?,
                    background_color_index: self.read_byte(what)?,
                    pixel_aspect_ratio: self.read_byte(what)?,
                };
                debug!("processed logical screen descriptor, got: {:#?}", header);

                self.header = Some(header);
                if header.has_global_color_table() {
                    Ok(ProcessGlobalColorTable)
                } else {
                    Ok(DetermineNextBlock)
                }
            },
            ProcessGlobalColorTable => {
                let len = self.header.map_or(0, |header| header.global_color_table_len());
                let table = self.read_color_table(len, "global color table")?;
                debug!("processed global color table with {} entries", table.len());

                self.global_color_table = Some(table);
                Ok(DetermineNextBlock)
            },
            DetermineNextBlock => match self.read_optional_byte()? {
                Some(label) => self.classify_block(label),
                None => Ok(ProcessMissingTrailer),
            },
            ProcessBlock(Block::Extension(kind)) => self.process_extension(kind, diagnostics),
            ProcessBlock(Block::Image) => {
                let what = "image descriptor";
                let descriptor = ImageDescriptor {
                    left: self.read_u16(what)?,
                    top: self.read_u16(what)?,
                    width: self.read_u16(what)?,
                    height: self.read_u16(what)?,
                    packed: self.read_byte(what)?,
                };
                debug!("processed image descriptor, got: {:#?}", descriptor);

                diagnostics.enter_frame(self.frames.len());
                if descriptor.is_interlaced() {
                    debug!("frame {} is interlaced, rows are kept in stream order", self.frames.len());
                }

                if descriptor.has_local_color_table() {
                    Ok(ProcessLocalColorTable(descriptor))
                } else {
                    Ok(ProcessImageData(descriptor, None))
                }
            },
            ProcessBlock(Block::Trailer) => Ok(ProcessTrailer),
            ProcessLocalColorTable(descriptor) => {
                let table = self.read_color_table(descriptor.local_color_table_len(), "local color table")?;

                Ok(ProcessImageData(descriptor, Some(table)))
            },
            ProcessImageData(descriptor, local_color_table) => {
                let lzw_code_size = self.read_byte("LZW minimum code size")?;

                let mut compressed = Vec::new();
                self.scan_sub_blocks("image data", |_, payload| compressed.extend_from_slice(payload))?;
                debug!("processed image data, {} compressed bytes", compressed.len());

                self.frames.push(Frame::new(descriptor, local_color_table, lzw_code_size, compressed));

                Ok(ProcessImageDataTrailer)
            },
            ProcessImageDataTrailer => {
                let next_state = match self.read_optional_byte()? {
                    None => ProcessMissingTrailer,
                    // a doubled block terminator
                    Some(0) => DetermineNextBlock,
                    Some(label @ (EXTENSION_INTRODUCER | IMAGE_DESCRIPTOR_LABEL | TRAILER_LABEL)) => {
                        self.classify_block(label)?
                    },
                    Some(byte) => {
                        diagnostics.record(
                            DiagnosticKind::MalformedTrailer,
                            format!("expected block label after image data, got 0x{byte:02x}; skipping it"),
                        );
                        DetermineNextBlock
                    },
                };
                diagnostics.leave_frame();

                Ok(next_state)
            },
            ProcessTrailer => match self.read_optional_byte()? {
                None => Ok(Done),
                Some(_) => Err(FormatError::TrailingData),
            },
            ProcessMissingTrailer => {
                diagnostics.record(DiagnosticKind::MissingTrailer, "stream ended without a trailer");
                Ok(Done)
            },
            Done => Ok(Done),
        }
    }

    fn classify_block(&mut self, label: u8) -> Result<ParserState> {
        let block = match label {
            // extension introducer means that a label follows determining what exact type
            // of extension it is.
            EXTENSION_INTRODUCER => {
                let kind = self.read_byte("extension label")?;
                Block::Extension(ExtensionKind::try_from(kind)?)
            },
            IMAGE_DESCRIPTOR_LABEL => Block::Image,
            TRAILER_LABEL => Block::Trailer,
            label => return Err(FormatError::UnknownBlock(label)),
        };

        Ok(ParserState::ProcessBlock(block))
    }

    fn process_extension(&mut self, kind: ExtensionKind, diagnostics: &mut Diagnostics) -> Result<ParserState> {
        use ExtensionKind::*;

        debug!("processing extension type: {:?}", kind);
        match kind {
            GraphicControl => {
                // disposal, delay and transparency are not applied, only skipped
                let mut control_len = 0;
                self.scan_sub_blocks("graphic control extension", |_, payload| control_len += payload.len())?;
                debug!("skipped graphic control extension with {} bytes of control data", control_len);
            },
            Application => {
                let mut identifier = String::new();
                let mut data_len = 0;
                self.scan_sub_blocks("application extension", |index, payload| {
                    if index == 0 {
                        identifier = String::from_utf8_lossy(payload).into_owned();
                    } else {
                        data_len += payload.len();
                    }
                })?;
                debug!("skipped {} bytes of application data", data_len);

                diagnostics.record(
                    DiagnosticKind::ApplicationExtension,
                    format!("application extension: {identifier}"),
                );
            },
            Comment => {
                // sequence of data sub-blocks
                let mut text = Vec::new();
                self.scan_sub_blocks("comment extension", |_, payload| text.extend_from_slice(payload))?;

                diagnostics.record(
                    DiagnosticKind::Comment,
                    format!("comment extension: {}", String::from_utf8_lossy(&text)),
                );
            },
            PlainText => {
                // first sub-block holds the text grid layout, which is skipped
                let mut text = Vec::new();
                self.scan_sub_blocks("plain text extension", |index, payload| {
                    if index > 0 {
                        text.extend_from_slice(payload);
                    }
                })?;

                diagnostics.record(
                    DiagnosticKind::PlainText,
                    format!("plain text extension: {}", String::from_utf8_lossy(&text)),
                );
            },
        }

        Ok(ParserState::DetermineNextBlock)
    }

    /// Feeds every sub-block payload to `visit` along with its position in
    /// the chain, up to and including the zero-length terminator.
    fn scan_sub_blocks<F>(&mut self, what: &'static str, mut visit: F) -> Result<usize>
    where
        F: FnMut(usize, &[u8]),
    {
        let mut buffer = [0; 255];
        let mut index = 0;

        loop {
            let block_size = usize::from(self.read_byte(what)?);
            if block_size == 0 {
                return Ok(index);
            }

            self.read_exact(&mut buffer[..block_size], what)?;
            visit(index, &buffer[..block_size]);
            index += 1;
        }
    }

    fn read_color_table(&mut self, len: usize, what: &'static str) -> Result<ColorTable> {
        let bytes = self.read_bytes(3 * len, what)?;
        Ok(ColorTable::from_rgb_bytes(&bytes))
    }

    fn read_exact(&mut self, buffer: &mut [u8], what: &'static str) -> Result<()> {
        self.inner.read_exact(buffer).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => FormatError::Truncated(what),
            _ => FormatError::Io(err),
        })?;
        self.bytes_read += buffer.len();
        Ok(())
    }

    fn read_bytes(&mut self, count: usize, what: &'static str) -> Result<Vec<u8>> {
        let mut buffer = vec![0; count];
        self.read_exact(&mut buffer, what)?;
        Ok(buffer)
    }

    fn read_byte(&mut self, what: &'static str) -> Result<u8> {
        let mut buffer: [u8; 1] = [0; 1];
        self.read_exact(&mut buffer, what)?;
        Ok(buffer[0])
    }

    fn read_u16(&mut self, what: &'static str) -> Result<u16> {
        // multi-byte numeric fields are stored least significant byte first
        let mut buffer: [u8; 2] = [0; 2];
        self.read_exact(&mut buffer, what)?;
        Ok(u16::from_le_bytes(buffer))
    }

    /// Reads one byte where the stream is allowed to end.
    fn read_optional_byte(&mut self) -> Result<Option<u8>> {
        let mut buffer: [u8; 1] = [0; 1];

        loop {
            match self.inner.read(&mut buffer) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.bytes_read += 1;
                    return Ok(Some(buffer[0]));
                },
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}
