// P8C - A cross-compiler for the P8 systems language targeting 6502 microcomputers
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Error types and diagnostics for the P8C compiler.
//!
//! Two error channels exist:
//!
//! - [`Diagnostic`] values are recoverable problems (name, type, structural
//!   and codegen errors plus warnings). They are collected in a
//!   [`Diagnostics`] accumulator so a pass can keep going and report as many
//!   problems as possible in one run.
//! - [`CompilerError`] is fatal: an internal invariant of the AST was
//!   violated and the whole compilation must stop.

use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// A source position: file, line and column, all 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    /// Source file name.
    pub file: String,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub column: u32,
}

impl Position {
    /// Create a new position.
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// The position used for nodes created by the compiler itself.
    pub fn builtin() -> Self {
        Self::new("<builtin>", 0, 0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Stable diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    // Structural errors (E1xx)
    InvalidDeclaration,
    RecursiveInitializer,
    StructElementMismatch,
    StringLengthInvalid,
    DuplicateModuleName,
    DuplicateBlockName,
    MissingEntryPoint,
    RangeSizeMismatch,
    UnknownStruct,

    // Name resolution errors (E2xx)
    UnresolvedName,
    AmbiguousName,
    DuplicateName,

    // Type errors (E3xx)
    TypeMismatch,
    ValueOutOfRange,
    UnknownType,
    InvalidOperand,
    DivisionByZero,
    FloatOverflow,

    // Code generation errors (E4xx)
    UnsupportedStorage,
    ShiftCountNotByte,
    SignedRemainder,
    UnknownCastType,
    DivisionByZeroLiteral,

    // Warnings (W0xx)
    UnreachableCode,
    RecursionDetected,
}

impl DiagnosticCode {
    /// Get the code string for this diagnostic.
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticCode::InvalidDeclaration => "E100",
            DiagnosticCode::RecursiveInitializer => "E101",
            DiagnosticCode::StructElementMismatch => "E102",
            DiagnosticCode::StringLengthInvalid => "E103",
            DiagnosticCode::DuplicateModuleName => "E104",
            DiagnosticCode::DuplicateBlockName => "E105",
            DiagnosticCode::MissingEntryPoint => "E106",
            DiagnosticCode::RangeSizeMismatch => "E107",
            DiagnosticCode::UnknownStruct => "E108",

            DiagnosticCode::UnresolvedName => "E200",
            DiagnosticCode::AmbiguousName => "E201",
            DiagnosticCode::DuplicateName => "E202",

            DiagnosticCode::TypeMismatch => "E300",
            DiagnosticCode::ValueOutOfRange => "E301",
            DiagnosticCode::UnknownType => "E302",
            DiagnosticCode::InvalidOperand => "E303",
            DiagnosticCode::DivisionByZero => "E304",
            DiagnosticCode::FloatOverflow => "E305",

            DiagnosticCode::UnsupportedStorage => "E400",
            DiagnosticCode::ShiftCountNotByte => "E401",
            DiagnosticCode::SignedRemainder => "E402",
            DiagnosticCode::UnknownCastType => "E403",
            DiagnosticCode::DivisionByZeroLiteral => "E404",

            DiagnosticCode::UnreachableCode => "W001",
            DiagnosticCode::RecursionDetected => "W002",
        }
    }

    /// Whether this code is a warning rather than an error.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            DiagnosticCode::UnreachableCode | DiagnosticCode::RecursionDetected
        )
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A single recoverable diagnostic with a source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// The diagnostic code.
    pub code: DiagnosticCode,
    /// The human-readable message.
    pub message: String,
    /// Where in the source this was detected.
    pub pos: Position,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(code: DiagnosticCode, message: impl Into<String>, pos: Position) -> Self {
        Self {
            code,
            message: message.into(),
            pos,
        }
    }

    /// Whether this diagnostic is a warning.
    pub fn is_warning(&self) -> bool {
        self.code.is_warning()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_warning() { "warning" } else { "error" };
        write!(
            f,
            "{}: {}[{}]: {}",
            self.pos,
            kind,
            self.code.code(),
            self.message
        )
    }
}

/// An accumulator for diagnostics.
///
/// A diagnostic with the same message at the same position as one already
/// reported is suppressed.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    seen: HashSet<(String, Position)>,
}

impl Diagnostics {
    /// Create a new empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an error diagnostic.
    pub fn error(&mut self, code: DiagnosticCode, message: impl Into<String>, pos: Position) {
        self.push(Diagnostic::new(code, message, pos));
    }

    /// Report a warning diagnostic.
    pub fn warn(&mut self, code: DiagnosticCode, message: impl Into<String>, pos: Position) {
        self.push(Diagnostic::new(code, message, pos));
    }

    /// Add a diagnostic, suppressing exact duplicates.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        let key = (diagnostic.message.clone(), diagnostic.pos.clone());
        if self.seen.insert(key) {
            self.entries.push(diagnostic);
        }
    }

    /// Merge another collection into this one.
    pub fn merge(&mut self, other: Diagnostics) {
        for d in other.entries {
            self.push(d);
        }
    }

    /// Whether any error (not warning) was reported.
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| !d.is_warning())
    }

    /// Number of collected diagnostics, warnings included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the diagnostics in report order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Iterate over the errors only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| !d.is_warning())
    }

    /// Iterate over the warnings only.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.is_warning())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A fatal compiler error. These abort the whole compilation.
#[derive(Debug, Error)]
pub enum CompilerError {
    /// An internal invariant of the AST or a pass was violated.
    #[error("internal error: {0}")]
    Internal(String),

    /// A tree modification referenced a child its parent does not contain.
    #[error("internal error: node {child} is not a child of {parent}")]
    ChildNotFound { parent: String, child: String },

    /// A node that must have a parent link has none.
    #[error("internal error: node {0} has no parent link")]
    MissingParent(String),

    /// I/O failure in the driver.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fatal compiler operations.
pub type Result<T> = std::result::Result<T, CompilerError>;
