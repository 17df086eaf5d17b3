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

//! Program-level checks.
//!
//! Enforces the global invariants that individual passes do not own:
//! entry point presence, unique block and module names, sane string
//! literals, literals that fit their declared types, and initializers that
//! do not refer to themselves.

use crate::ast::{Ast, DataType, LookupResult, NodeId, NodeKind, NumericValue};
use crate::error::{DiagnosticCode, Diagnostics};
use std::collections::HashSet;

/// The program-level check pass.
pub struct ProgramChecks;

impl ProgramChecks {
    /// Run all checks.
    pub fn run(ast: &Ast, diags: &mut Diagnostics) {
        Self::check_entry_point(ast, diags);
        Self::check_module_names(ast, diags);
        Self::check_block_names(ast, diags);
        Self::check_node(ast, ast.root(), diags);
    }

    fn check_entry_point(ast: &Ast, diags: &mut Diagnostics) {
        match ast.lookup_absolute(&["main".to_string(), "start".to_string()]) {
            LookupResult::Found(id) if matches!(ast.kind(id), NodeKind::Subroutine { .. }) => {}
            _ => {
                diags.error(
                    DiagnosticCode::MissingEntryPoint,
                    "program entry point is missing ('start' subroutine in 'main' block)",
                    ast.pos(ast.root()),
                );
            }
        }
    }

    fn check_module_names(ast: &Ast, diags: &mut Diagnostics) {
        let mut seen = HashSet::new();
        for module in ast.statements(ast.root()) {
            if let NodeKind::Module { name, .. } = ast.kind(*module) {
                if !seen.insert(name.clone()) {
                    diags.error(
                        DiagnosticCode::DuplicateModuleName,
                        format!("duplicate module name '{}'", name),
                        ast.pos(*module),
                    );
                }
            }
        }
    }

    fn check_block_names(ast: &Ast, diags: &mut Diagnostics) {
        let mut seen = HashSet::new();
        for module in ast.statements(ast.root()) {
            for stmt in ast.statements(*module) {
                if let NodeKind::Block { name, .. } = ast.kind(*stmt) {
                    if !seen.insert(name.clone()) {
                        diags.error(
                            DiagnosticCode::DuplicateBlockName,
                            format!("duplicate block name '{}'", name),
                            ast.pos(*stmt),
                        );
                    }
                }
            }
        }
    }

    fn check_node(ast: &Ast, node: NodeId, diags: &mut Diagnostics) {
        match ast.kind(node) {
            NodeKind::StringLiteral { value } => {
                if value.is_empty() || value.len() > 255 {
                    diags.error(
                        DiagnosticCode::StringLengthInvalid,
                        format!("string literal must be 1 to 255 bytes, not {}", value.len()),
                        ast.pos(node),
                    );
                }
            }
            NodeKind::VarDecl {
                name,
                kind,
                dt,
                struct_name,
                value,
                ..
            } => {
                if struct_name.is_some() && *dt != DataType::Struct {
                    diags.error(
                        DiagnosticCode::InvalidDeclaration,
                        format!("variable '{}' mixes a struct type with a scalar type", name),
                        ast.pos(node),
                    );
                }
                if let Some(value) = value {
                    // A memory-mapped declaration's value is its address.
                    if *kind != crate::ast::VarKind::Memory {
                        Self::check_literal_fits(ast, *value, *dt, diags);
                    }
                    if Self::initializer_reaches(ast, *value, node, &mut HashSet::new()) {
                        diags.error(
                            DiagnosticCode::RecursiveInitializer,
                            format!("initializer of '{}' refers to itself", name),
                            ast.pos(node),
                        );
                    }
                }
            }
            _ => {}
        }
        for child in ast.children(node) {
            Self::check_node(ast, child, diags);
        }
    }

    fn check_literal_fits(ast: &Ast, value: NodeId, dt: DataType, diags: &mut Diagnostics) {
        if let NodeKind::NumericLiteral {
            value: NumericValue::Integer(v),
            ..
        } = ast.kind(value)
        {
            if dt.is_integer() && !dt.value_fits(*v) {
                diags.error(
                    DiagnosticCode::ValueOutOfRange,
                    format!("value {} does not fit in {}", v, dt.name()),
                    ast.pos(value),
                );
            }
        }
    }

    /// Follow identifier references through constant declarations to detect
    /// initializer cycles.
    fn initializer_reaches(
        ast: &Ast,
        expr: NodeId,
        decl: NodeId,
        seen: &mut HashSet<NodeId>,
    ) -> bool {
        if let Some(target) = ast.identifier_target(expr) {
            if target == decl {
                return true;
            }
            if seen.insert(target) {
                if let NodeKind::VarDecl {
                    value: Some(value), ..
                } = ast.kind(target)
                {
                    if Self::initializer_reaches(ast, *value, decl, seen) {
                        return true;
                    }
                }
            }
        }
        ast.children(expr)
            .iter()
            .any(|&c| Self::initializer_reaches(ast, c, decl, seen))
    }
}
