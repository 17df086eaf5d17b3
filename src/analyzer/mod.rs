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

//! The semantic middle-end of the P8C compiler.
//!
//! Runs the pass pipeline over a parsed tree:
//!
//! 1. name/scope resolution,
//! 2. type inference and checking,
//! 3. statement reordering and desugaring,
//! 4. constant folding, iterated to a fixpoint,
//! 5. dead code removal (with the call graph),
//! 6. program-level checks.
//!
//! Each pass accumulates recoverable diagnostics and keeps going; only an
//! internal invariant violation aborts the pipeline.

pub mod call_graph;
pub mod checks;
pub mod const_fold;
pub mod dead_code;
pub mod name_resolution;
pub mod reorder;
pub mod type_check;

pub use call_graph::CallGraph;
pub use checks::ProgramChecks;
pub use const_fold::ConstantFolder;
pub use dead_code::DeadCodeRemover;
pub use name_resolution::NameResolver;
pub use reorder::StatementReorderer;
pub use type_check::{declaration_type, infer_type, target_type, TypeChecker};

use crate::ast::{Ast, NameGen};
use crate::error::{Diagnostics, Result};

/// Run the whole semantic pipeline over a tree.
///
/// Returns the collected diagnostics. The tree is left in the canonical
/// post-pipeline shape; when the diagnostics contain errors the tree must
/// not be handed to code generation.
pub fn analyze(ast: &mut Ast) -> Result<Diagnostics> {
    let mut diags = Diagnostics::new();
    let mut names = NameGen::new();

    NameResolver::run(ast, &mut diags);
    TypeChecker::run(ast, &mut diags)?;
    StatementReorderer::run(ast, &mut diags, &mut names)?;
    ConstantFolder::run(ast, &mut diags)?;

    let graph = CallGraph::build(ast);
    graph.report_recursion(ast, &mut diags);
    DeadCodeRemover::run(ast, &mut diags, &graph)?;
    ProgramChecks::run(ast, &mut diags);

    ast.verify_parent_links()?;
    Ok(diags)
}
