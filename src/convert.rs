//! Ties parsing, decoding and composing together for the two output modes.

use crate::bmp_writer::{self, Bitmap};
use crate::diagnostics::Diagnostics;
use crate::error::FormatError;
use crate::parser::{Decoder, Document};

use anyhow::{Context, Result};
use log::info;

use std::io::prelude::*;
use std::path::Path;

/// Sizes reported in the statistics log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionStats {
    /// Total bytes of BMP output.
    pub bmp_size: u64,
    /// Bytes of GIF input.
    pub gif_size: u64,
}

impl ConversionStats {
    pub fn write_log<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "uncodedSize = {}", self.bmp_size)?;
        writeln!(writer, "codedSize = {}", self.gif_size)
    }
}

pub fn parse_document<R: Read>(input: &mut R, diagnostics: &mut Diagnostics) -> Result<Document> {
    let document = Decoder::new(input)
        .parse(diagnostics)
        .context("failed to parse GIF")?;
    info!(
        "parsed {}x{} GIF with {} frames",
        document.header.screen_width,
        document.header.screen_height,
        document.frames.len()
    );

    Ok(document)
}

/// Decodes frame `index` and composes it with the color table it is drawn with.
pub fn render_frame(
    document: &Document,
    index: usize,
    diagnostics: &mut Diagnostics,
) -> std::result::Result<Bitmap, FormatError> {
    let frame = document.frames.get(index).ok_or(FormatError::NoFrames)?;
    let color_table = document.palette_for(index)?;

    diagnostics.enter_frame(index);
    let bitmap = frame
        .decode_indices(color_table.len(), diagnostics)
        .and_then(|indexes| {
            bmp_writer::compose(&indexes, color_table, frame.width(), frame.height(), diagnostics)
        });
    diagnostics.leave_frame();

    bitmap
}

/// Converts the first frame of `input` and writes it to `output`.
pub fn convert_first<R: Read, W: Write>(
    input: &mut R,
    output: &mut W,
    diagnostics: &mut Diagnostics,
) -> Result<ConversionStats> {
    let document = parse_document(input, diagnostics)?;

    let bitmap = render_frame(&document, 0, diagnostics).context("failed to convert frame 1")?;
    bitmap.write_to(output).context("failed to write BMP output")?;

    Ok(ConversionStats {
        bmp_size: bitmap.file_size() as u64,
        gif_size: document.bytes_read as u64,
    })
}

/// File name of the `index`-th (zero based) extracted frame.
pub fn frame_file_name(index: usize) -> String {
    format!("{:04}.bmp", index + 1)
}

/// Writes every frame of `input` to `directory` as `0001.bmp`, `0002.bmp`, ...
///
/// Each frame is composed in memory before its file is created, so the first
/// failing frame leaves no file behind and stops the extraction.
pub fn extract_all<R: Read>(
    input: &mut R,
    directory: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<ConversionStats> {
    let document = parse_document(input, diagnostics)?;
    if document.frames.is_empty() {
        return Err(FormatError::NoFrames.into());
    }

    let mut stats = ConversionStats {
        bmp_size: 0,
        gif_size: document.bytes_read as u64,
    };

    for index in 0..document.frames.len() {
        let bitmap = render_frame(&document, index, diagnostics)
            .with_context(|| format!("failed to convert frame {}", index + 1))?;

        let filename = directory.join(frame_file_name(index));
        bmp_writer::write_bmp(&filename, &bitmap)?;
        info!("wrote frame {} to {}", index + 1, filename.display());

        stats.bmp_size += bitmap.file_size() as u64;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;

    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;

    const HEADER: &[u8] = &[
        b'G', b'I', b'F', b'8', b'9', b'a',
        0x02, 0x00, 0x01, 0x00,
        0x80, 0x00, 0x00,
        0x00, 0x00, 0x00, 0xff, 0xff, 0xff,
    ];

    // decodes to [0, 1]
    const FRAME_BLACK_WHITE: &[u8] = &[
        0x2c, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00,
        0x01, 0x02, 0x42, 0x06, 0x00,
    ];

    // decodes to [1, 0]
    const FRAME_WHITE_BLACK: &[u8] = &[
        0x2c, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00,
        0x01, 0x02, 0x0a, 0x06, 0x00,
    ];

    // image data ends before the end-of-information code
    const FRAME_TRUNCATED_LZW: &[u8] = &[
        0x2c, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00,
        0x01, 0x01, 0x02, 0x00,
    ];

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gif2bmp_test_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn converts_first_frame() {
        let gif = [HEADER, FRAME_BLACK_WHITE, FRAME_WHITE_BLACK, &[0x3b]].concat();
        let mut output = Vec::new();
        let mut diagnostics = Diagnostics::new();

        let stats = convert_first(&mut Cursor::new(&gif), &mut output, &mut diagnostics).unwrap();

        assert_eq!(output.len(), 62);
        assert_eq!(&output[54..], [0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0x00, 0x00]);
        assert_eq!(stats, ConversionStats { bmp_size: 62, gif_size: gif.len() as u64 });
        assert_eq!(diagnostics.warnings().count(), 0);
    }

    #[test]
    fn stream_without_frames_fails() {
        let gif = [HEADER, &[0x3b]].concat();
        let err = convert_first(&mut Cursor::new(&gif), &mut Vec::new(), &mut Diagnostics::new()).unwrap_err();
        assert!(matches!(err.downcast_ref::<FormatError>(), Some(FormatError::NoFrames)));
    }

    #[test]
    fn frame_without_color_table_fails() {
        let gif = [&HEADER[..10], &[0x00, 0x00, 0x00], FRAME_BLACK_WHITE, &[0x3b]].concat();
        let err = convert_first(&mut Cursor::new(&gif), &mut Vec::new(), &mut Diagnostics::new()).unwrap_err();
        assert!(matches!(err.downcast_ref::<FormatError>(), Some(FormatError::NoColorTable(0))));
    }

    #[test]
    fn truncated_lzw_is_fatal() {
        let gif = [HEADER, FRAME_TRUNCATED_LZW, &[0x3b]].concat();
        let err = convert_first(&mut Cursor::new(&gif), &mut Vec::new(), &mut Diagnostics::new()).unwrap_err();
        assert!(matches!(err.downcast_ref::<FormatError>(), Some(FormatError::TruncatedLzw)));
    }

    #[test]
    fn extracts_every_frame() {
        let dir = scratch_dir("extract");
        let gif = [HEADER, FRAME_BLACK_WHITE, FRAME_WHITE_BLACK, &[0x3b]].concat();

        let stats = extract_all(&mut Cursor::new(&gif), &dir, &mut Diagnostics::new()).unwrap();

        let first = fs::read(dir.join("0001.bmp")).unwrap();
        let second = fs::read(dir.join("0002.bmp")).unwrap();
        assert_eq!(&first[54..], [0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0x00, 0x00]);
        assert_eq!(&second[54..], [0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(stats.bmp_size, 124);
        assert_eq!(stats.gif_size, gif.len() as u64);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn extraction_stops_at_first_failing_frame() {
        let dir = scratch_dir("abort");
        let gif = [HEADER, FRAME_BLACK_WHITE, FRAME_TRUNCATED_LZW, FRAME_WHITE_BLACK, &[0x3b]].concat();

        let err = extract_all(&mut Cursor::new(&gif), &dir, &mut Diagnostics::new()).unwrap_err();

        assert!(matches!(err.downcast_ref::<FormatError>(), Some(FormatError::TruncatedLzw)));
        assert!(dir.join("0001.bmp").exists());
        assert!(!dir.join("0002.bmp").exists());
        assert!(!dir.join("0003.bmp").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn render_records_warnings_against_frame() {
        // 2x1 frame whose data decodes to a single index
        let frame: &[u8] = &[
            0x2c, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00,
            0x01, 0x02, 0xc2, 0x00, 0x00,
        ];
        let gif = [HEADER, frame, &[0x3b]].concat();
        let mut diagnostics = Diagnostics::new();
        let document = parse_document(&mut Cursor::new(&gif), &mut diagnostics).unwrap();

        let bitmap = render_frame(&document, 0, &mut diagnostics).unwrap();

        assert_eq!(bitmap.pixels(), [0x00; 8]);
        let warnings: Vec<_> = diagnostics.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, DiagnosticKind::ShortIndexStream);
        assert_eq!(warnings[0].frame, Some(0));
    }

    #[test]
    fn frame_too_large_for_bmp_fails() {
        // 65535x65535 descriptor over data that decodes to [0, 1]
        let frame: &[u8] = &[
            0x2c, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0x00,
            0x01, 0x02, 0x42, 0x06, 0x00,
        ];
        let gif = [HEADER, frame, &[0x3b]].concat();
        let mut output = Vec::new();

        let err = convert_first(&mut Cursor::new(&gif), &mut output, &mut Diagnostics::new()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FormatError>(),
            Some(FormatError::ImageTooLarge { width: 65535, height: 65535 })
        ));
        assert!(output.is_empty());
    }

    #[test]
    fn frame_file_names_are_numbered_from_one() {
        assert_eq!(frame_file_name(0), "0001.bmp");
        assert_eq!(frame_file_name(41), "0042.bmp");
    }

    #[test]
    fn stats_log_has_two_lines() {
        let stats = ConversionStats { bmp_size: 62, gif_size: 35 };
        let mut log = Vec::new();
        stats.write_log(&mut log).unwrap();

        assert_eq!(String::from_utf8(log).unwrap(), "uncodedSize = 62\ncodedSize = 35\n");
    }
}
