//! Recoverable findings collected while converting a stream.
//!
//! Every component takes a `&mut Diagnostics` instead of printing on its own.
//! Records are kept for the caller and mirrored to the `log` facade.

use log::{info, warn};

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    ApplicationExtension,
    Comment,
    PlainText,
    MalformedTrailer,
    MissingTrailer,
    CodeSizeMismatch,
    DictionaryCorruption,
    PaletteIndexOutOfRange,
    ShortIndexStream,
}

impl DiagnosticKind {
    /// Informational kinds carry extension text, everything else is a data warning.
    pub fn is_warning(self) -> bool {
        use DiagnosticKind::*;

        !matches!(self, ApplicationExtension | Comment | PlainText)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub frame: Option<usize>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frame {
            Some(frame) => write!(f, "frame {}: {}", frame, self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
    frame: Option<usize>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes subsequent records to `frame` until `leave_frame`.
    pub fn enter_frame(&mut self, frame: usize) {
        self.frame = Some(frame);
    }

    pub fn leave_frame(&mut self) {
        self.frame = None;
    }

    pub fn record(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            kind,
            message: message.into(),
            frame: self.frame,
        };

        if kind.is_warning() {
            warn!("{}", diagnostic);
        } else {
            info!("{}", diagnostic);
        }
        self.records.push(diagnostic);
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter().filter(|d| d.kind.is_warning())
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.records.iter().filter(|d| d.kind == kind).count()
    }
}
