//! Source location tracking.
//!
//! Every AST and IR node carries a [`Span`] so that diagnostics can always
//! point back at the offending source text.

use std::fmt;
use std::path::{Path, PathBuf};

/// A half-open region of source text, in 1-indexed line/column coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub file: PathBuf,
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    pub fn new(
        file: impl Into<PathBuf>,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            file: file.into(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// A single-point span, used for synthetic nodes produced by later
    /// compiler stages (inlining, lowering) that have no literal source text
    /// of their own but still want to report the originating line.
    pub fn point(file: impl Into<PathBuf>, line: usize, col: usize) -> Self {
        Self::new(file, line, col, line, col)
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(
                f,
                "{}:{}:{}",
                self.file.display(),
                self.start_line,
                self.start_col
            )
        } else {
            write!(
                f,
                "{}:{}:{}-{}:{}",
                self.file.display(),
                self.start_line,
                self.start_col,
                self.end_line,
                self.end_col
            )
        }
    }
}
