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

//! P8C Compiler Library
//!
//! P8C compiles programs written in the P8 systems language into 6502
//! assembly for Commodore-64 and Commander-X16 machines.
//!
//! # Modules
//!
//! - [`error`] - Diagnostics and fatal error types
//! - [`ast`] - The arena AST, tree walker and builder
//! - [`analyzer`] - The semantic pass pipeline
//! - [`codegen`] - 6502 assembly generation
//!
//! The parser front-end is an external collaborator: it delivers a parsed
//! tree through the [`ast::TreeBuilder`] API with positions attached and
//! numeric literals tagged with their smallest fitting type.
//!
//! # Example
//!
//! ```
//! use p8c::ast::{DataType, TreeBuilder};
//! use p8c::codegen::CompilationTarget;
//!
//! let mut t = TreeBuilder::new();
//! let block = t.block("main", None);
//! let start = t.subroutine(block, "start");
//! let x = t.var(start, "x", DataType::Ubyte);
//! let target = t.target_var("x", Some(x));
//! let five = t.lit(5, DataType::Ubyte);
//! t.assign_aug(start, target, p8c::ast::BinaryOperator::Add, five);
//! t.ret(start);
//!
//! let output = p8c::compile(&mut t.ast, &CompilationTarget::c64()).unwrap();
//! assert!(output.assembly.is_some());
//! ```

pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod error;

pub use ast::{Ast, TreeBuilder};
pub use codegen::CompilationTarget;
pub use error::{CompilerError, Diagnostic, DiagnosticCode, Diagnostics, Position};

/// The version of the P8C compiler.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the compiler.
pub const NAME: &str = "p8c";

/// The result of a compilation run.
#[derive(Debug)]
pub struct CompileOutput {
    /// The generated assembly text; `None` when errors prevented output.
    pub assembly: Option<String>,
    /// All collected diagnostics, warnings included.
    pub diagnostics: Diagnostics,
}

/// Compile a parsed program tree to 6502 assembly.
///
/// Runs the semantic pipeline and, when it reports no errors, the code
/// generator. Only an internal invariant violation returns `Err`; ordinary
/// problems are reported through the diagnostics.
pub fn compile(
    ast: &mut Ast,
    target: &CompilationTarget,
) -> std::result::Result<CompileOutput, CompilerError> {
    let mut diagnostics = analyzer::analyze(ast)?;
    if diagnostics.has_errors() {
        return Ok(CompileOutput {
            assembly: None,
            diagnostics,
        });
    }
    let (assembly, cg_diags) = codegen::generate(ast, target);
    diagnostics.merge(cg_diags);
    Ok(CompileOutput {
        assembly,
        diagnostics,
    })
}
