/// Widest code a GIF stream may carry.
pub const MAX_CODE_WIDTH: u8 = 12;

/// Reads LSB-first codes through a rolling 3-byte window.
///
/// The window always holds the byte containing the next unread bit in slot 0,
/// which is enough for any code up to 12 bits starting at bit offset 7.
pub struct BitReader<'a> {
    buf: &'a [u8],
    // next byte to pull into the window
    cursor: usize,
    window: [u8; 3],
    // bit offset into window[0], always in 0..=7
    start: u8,
    // bits of real data at or after `start`
    remaining: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        let mut window = [0; 3];
        let cursor = buf.len().min(window.len());
        window[..cursor].copy_from_slice(&buf[..cursor]);

        Self {
            buf,
            cursor,
            window,
            start: 0,
            remaining: buf.len() * 8,
        }
    }

    /// Extracts the next `width`-bit code, or `None` once the data cannot
    /// supply that many bits.
    pub fn next_code(&mut self, width: u8) -> Option<u16> {
        debug_assert!((1..=MAX_CODE_WIDTH).contains(&width));

        if usize::from(width) > self.remaining {
            return None;
        }

        let (code, start, consumed) = split_code(self.window, self.start, width);
        for _ in 0..consumed {
            self.shift();
        }
        self.start = start;
        self.remaining -= usize::from(width);

        Some(code)
    }

    pub fn remaining_bits(&self) -> usize {
        self.remaining
    }

    fn shift(&mut self) {
        let incoming = self.buf.get(self.cursor).copied().unwrap_or(0);
        self.cursor += 1;
        self.window = [self.window[1], self.window[2], incoming];
    }
}

/// Pulls a `width`-bit code out of `window` starting at bit `start`.
///
/// Returns the code, the bit offset of the following code and how many
/// leading window bytes were fully consumed (0, 1 or 2).
pub fn split_code(window: [u8; 3], start: u8, width: u8) -> (u16, u8, usize) {
    debug_assert!(start <= 7);

    let bits = u32::from(window[0]) | u32::from(window[1]) << 8 | u32::from(window[2]) << 16;
    let mask = (1u32 << width) - 1;
    let code = (bits >> start) & mask;
    let end = start + width;

    (code as u16, end % 8, usize::from(end / 8))
}
