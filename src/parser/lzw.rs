use super::bit_reader::{BitReader, MAX_CODE_WIDTH};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::FormatError;

use log::debug;

use std::ops::Range;

/// Codes past this point cannot be addressed with 12-bit codes.
const MAX_DICTIONARY_LEN: usize = 1 << MAX_CODE_WIDTH;

/// Width of the next code for a dictionary holding `dictionary_len` entries.
///
/// This is the bit length of `dictionary_len`, except that the reference
/// encoder keeps writing 12-bit codes where the computation yields 13.
pub fn code_width(dictionary_len: usize) -> u8 {
    let width = (usize::BITS - dictionary_len.leading_zeros()) as u8;
    width.min(MAX_CODE_WIDTH)
}

/// Phrase table, stored as spans into one shared byte arena.
#[derive(Debug)]
struct Dictionary {
    bytes: Vec<u8>,
    spans: Vec<Range<usize>>,
    base_len: usize,
    base_bytes: usize,
}

impl Dictionary {
    fn new(palette_len: usize) -> Self {
        debug_assert!((2..=256).contains(&palette_len));

        let mut bytes = Vec::with_capacity(palette_len * 8);
        let mut spans = Vec::with_capacity(MAX_DICTIONARY_LEN);
        for index in 0..palette_len {
            spans.push(bytes.len()..bytes.len() + 1);
            bytes.push(index as u8);
        }
        // clear code and end of information own no phrase
        spans.push(bytes.len()..bytes.len());
        spans.push(bytes.len()..bytes.len());

        Self {
            base_len: spans.len(),
            base_bytes: bytes.len(),
            bytes,
            spans,
        }
    }

    fn len(&self) -> usize {
        self.spans.len()
    }

    fn clear_code(&self) -> usize {
        self.base_len - 2
    }

    fn end_code(&self) -> usize {
        self.base_len - 1
    }

    fn reset(&mut self) {
        self.spans.truncate(self.base_len);
        self.bytes.truncate(self.base_bytes);
    }

    fn phrase(&self, code: usize) -> &[u8] {
        &self.bytes[self.spans[code].clone()]
    }

    /// Learns `phrase(prefix) ++ [suffix]`, returning its code.
    ///
    /// Only the base entries are checked for an identical phrase; learned
    /// entries may repeat, which keeps code numbering in step with the encoder.
    fn learn(&mut self, prefix: usize, suffix: u8) -> Option<usize> {
        if self.len() >= MAX_DICTIONARY_LEN {
            return None;
        }

        let start = self.bytes.len();
        self.bytes.extend_from_within(self.spans[prefix].clone());
        self.bytes.push(suffix);
        let candidate = &self.bytes[start..];

        if self.spans[..self.base_len]
            .iter()
            .any(|span| &self.bytes[span.clone()] == candidate)
        {
            self.bytes.truncate(start);
            return None;
        }

        self.spans.push(start..self.bytes.len());
        Some(self.spans.len() - 1)
    }
}

/// Decodes one frame's LZW data into palette indices.
///
/// `data` is the concatenated sub-block payload without the minimum code size
/// byte. The dictionary is seeded from `palette_len`, the size of the color
/// table the frame will be drawn with.
pub fn decode(
    min_code_size: u8,
    data: &[u8],
    palette_len: usize,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<u8>, FormatError> {
    if 1usize.checked_shl(min_code_size.into()) != Some(palette_len) {
        diagnostics.record(
            DiagnosticKind::CodeSizeMismatch,
            format!("minimum code size {min_code_size} does not match color table of {palette_len} entries"),
        );
    }

    let mut dictionary = Dictionary::new(palette_len);
    let clear_code = dictionary.clear_code();
    let end_code = dictionary.end_code();
    debug!("clear_code={clear_code} end_of_information_code={end_code}");

    let mut reader = BitReader::new(data);
    let mut indices: Vec<u8> = Vec::with_capacity(data.len() * 2);
    // code of the previously emitted phrase, none right after a clear
    let mut prefix: Option<usize> = None;

    loop {
        let width = code_width(dictionary.len());
        let code = reader.next_code(width).ok_or(FormatError::TruncatedLzw)?;
        let code = usize::from(code);

        if code == clear_code {
            dictionary.reset();
            prefix = None;
            continue;
        }

        if code == end_code {
            debug!(
                "end of information after {} indices, {} bits left over",
                indices.len(),
                reader.remaining_bits()
            );
            break;
        }

        if code < dictionary.len() {
            let phrase = dictionary.phrase(code);
            let first = phrase[0];
            indices.extend_from_slice(phrase);

            if let Some(prefix) = prefix {
                dictionary.learn(prefix, first);
            }
            prefix = Some(code);
        } else {
            if code != dictionary.len() {
                diagnostics.record(
                    DiagnosticKind::DictionaryCorruption,
                    format!(
                        "code {code} is beyond the next dictionary entry {}, image could be damaged",
                        dictionary.len()
                    ),
                );
            }

            let previous = prefix.ok_or(FormatError::InvalidLzwCode { code: code as u16 })?;
            let first = dictionary.phrase(previous)[0];
            let learned = dictionary
                .learn(previous, first)
                .ok_or(FormatError::InvalidLzwCode { code: code as u16 })?;

            indices.extend_from_slice(dictionary.phrase(learned));
            prefix = Some(learned);
        }
    }

    Ok(indices)
}
