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

//! Name and scope resolution.
//!
//! Links every identifier reference to the unique declaration reachable
//! through its scope chain, reports duplicates, and fills the scoped-name
//! cache used for assembly label emission.
//!
//! On an unresolved reference a placeholder declaration is created and
//! linked so that the later passes keep running and can produce their own
//! diagnostics instead of cascading failures.

use crate::ast::{Ast, DataType, LookupResult, NodeId, NodeKind, VarKind, ZeropageWish};
use crate::error::{DiagnosticCode, Diagnostics};
use std::collections::HashMap;

/// The name/scope resolution pass.
pub struct NameResolver<'a> {
    diags: &'a mut Diagnostics,
}

impl<'a> NameResolver<'a> {
    /// Run name resolution over the whole tree.
    pub fn run(ast: &mut Ast, diags: &mut Diagnostics) {
        let mut resolver = NameResolver { diags };
        resolver.check_duplicates(ast, ast.root());
        resolver.resolve_node(ast, ast.root());
        resolver.populate_scoped_names(ast, ast.root());
    }

    fn check_duplicates(&mut self, ast: &Ast, node: NodeId) {
        if ast.kind(node).is_scope() {
            let mut seen: HashMap<String, NodeId> = HashMap::new();
            for child in ast.statements(node).to_vec() {
                if let Some(name) = ast.kind(child).symbol_name() {
                    if seen.contains_key(name) {
                        self.diags.error(
                            DiagnosticCode::DuplicateName,
                            format!("name '{}' is already defined in this scope", name),
                            ast.pos(child),
                        );
                    } else {
                        seen.insert(name.to_string(), child);
                    }
                }
            }
        }
        for child in ast.children(node) {
            self.check_duplicates(ast, child);
        }
    }

    fn resolve_node(&mut self, ast: &mut Ast, node: NodeId) {
        if let NodeKind::IdentifierRef { path, target } = ast.kind(node) {
            if target.is_none() {
                let path = path.clone();
                self.resolve_identifier(ast, node, &path);
            }
        }
        for child in ast.children(node) {
            self.resolve_node(ast, child);
        }
    }

    fn resolve_identifier(&mut self, ast: &mut Ast, node: NodeId, path: &[String]) {
        match ast.lookup(path, node) {
            LookupResult::Found(decl) => {
                self.set_target(ast, node, decl);
            }
            LookupResult::Ambiguous => {
                self.diags.error(
                    DiagnosticCode::AmbiguousName,
                    format!("name '{}' is ambiguous", path.join(".")),
                    ast.pos(node),
                );
                let placeholder = self.make_placeholder(ast, node, path);
                self.set_target(ast, node, placeholder);
            }
            LookupResult::NotFound => {
                // Dotted member access into a struct variable is resolved by
                // the flattening pass; leave those references alone.
                if path.len() > 1 && self.head_is_struct_var(ast, node, path) {
                    return;
                }
                self.diags.error(
                    DiagnosticCode::UnresolvedName,
                    format!("undefined symbol '{}'", path.join(".")),
                    ast.pos(node),
                );
                let placeholder = self.make_placeholder(ast, node, path);
                self.set_target(ast, node, placeholder);
            }
        }
    }

    fn head_is_struct_var(&self, ast: &Ast, node: NodeId, path: &[String]) -> bool {
        if let LookupResult::Found(decl) = ast.lookup(&path[..1], node) {
            matches!(
                ast.kind(decl),
                NodeKind::VarDecl {
                    struct_name: Some(_),
                    ..
                }
            )
        } else {
            false
        }
    }

    fn set_target(&mut self, ast: &mut Ast, node: NodeId, decl: NodeId) {
        if let NodeKind::IdentifierRef { target, .. } = ast.kind_mut(node) {
            *target = Some(decl);
        }
    }

    fn make_placeholder(&mut self, ast: &mut Ast, node: NodeId, path: &[String]) -> NodeId {
        let pos = ast.pos(node);
        ast.add_detached(
            NodeKind::VarDecl {
                name: path.join("."),
                kind: VarKind::Var,
                dt: DataType::Ubyte,
                zp: ZeropageWish::DontCare,
                array_size: None,
                struct_name: None,
                value: None,
            },
            pos,
        )
    }

    fn populate_scoped_names(&mut self, ast: &mut Ast, node: NodeId) {
        if ast.kind(node).symbol_name().is_some() {
            ast.scoped_name(node);
        }
        for child in ast.children(node) {
            self.populate_scoped_names(ast, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NumericValue;
    use crate::error::Position;

    fn pos() -> Position {
        Position::builtin()
    }

    fn program_with_var() -> (Ast, NodeId, NodeId) {
        let mut ast = Ast::new();
        let module = ast
            .append(
                ast.root(),
                NodeKind::Module {
                    name: "m".to_string(),
                    library: false,
                    statements: vec![],
                },
                pos(),
            )
            .unwrap();
        let block = ast
            .append(
                module,
                NodeKind::Block {
                    name: "main".to_string(),
                    address: None,
                    options: vec![],
                    statements: vec![],
                },
                pos(),
            )
            .unwrap();
        let var = ast
            .append(
                block,
                NodeKind::VarDecl {
                    name: "x".to_string(),
                    kind: VarKind::Var,
                    dt: DataType::Ubyte,
                    zp: ZeropageWish::DontCare,
                    array_size: None,
                    struct_name: None,
                    value: None,
                },
                pos(),
            )
            .unwrap();
        (ast, block, var)
    }

    #[test]
    fn test_resolves_reference() {
        let (mut ast, block, var) = program_with_var();
        let r = ast.add_detached(
            NodeKind::IdentifierRef {
                path: vec!["x".to_string()],
                target: None,
            },
            pos(),
        );
        let lit = ast.add_detached(
            NodeKind::NumericLiteral {
                value: NumericValue::Integer(1),
                dt: DataType::Ubyte,
            },
            pos(),
        );
        let tgt = ast.add_detached(
            NodeKind::AssignTarget {
                identifier: Some(r),
                array_indexed: None,
                memory_address: None,
                register: None,
            },
            pos(),
        );
        let assign = ast.add_detached(
            NodeKind::Assignment {
                target: tgt,
                aug_op: None,
                value: lit,
            },
            pos(),
        );
        ast.insert_last(block, assign).unwrap();

        let mut diags = Diagnostics::new();
        NameResolver::run(&mut ast, &mut diags);
        assert!(!diags.has_errors());
        assert_eq!(ast.identifier_target(r), Some(var));
    }

    #[test]
    fn test_unresolved_gets_placeholder() {
        let (mut ast, block, _) = program_with_var();
        let r = ast.add_detached(
            NodeKind::IdentifierRef {
                path: vec!["nosuch".to_string()],
                target: None,
            },
            pos(),
        );
        let call = ast.add_detached(
            NodeKind::FunctionCall {
                target: r,
                args: vec![],
            },
            pos(),
        );
        let stmt = ast.add_detached(NodeKind::FunctionCallStatement { call }, pos());
        ast.insert_last(block, stmt).unwrap();

        let mut diags = Diagnostics::new();
        NameResolver::run(&mut ast, &mut diags);
        assert!(diags.has_errors());
        assert!(diags.iter().any(|d| d.code == DiagnosticCode::UnresolvedName));
        // Placeholder keeps the reference usable.
        assert!(ast.identifier_target(r).is_some());
    }

    #[test]
    fn test_duplicate_name_reported() {
        let (mut ast, block, _) = program_with_var();
        ast.append(
            block,
            NodeKind::VarDecl {
                name: "x".to_string(),
                kind: VarKind::Var,
                dt: DataType::Ubyte,
                zp: ZeropageWish::DontCare,
                array_size: None,
                struct_name: None,
                value: None,
            },
            pos(),
        )
        .unwrap();

        let mut diags = Diagnostics::new();
        NameResolver::run(&mut ast, &mut diags);
        assert!(diags.iter().any(|d| d.code == DiagnosticCode::DuplicateName));
    }

    #[test]
    fn test_scoped_name_cache_filled() {
        let (mut ast, _, var) = program_with_var();
        let mut diags = Diagnostics::new();
        NameResolver::run(&mut ast, &mut diags);
        assert_eq!(
            ast.node(var).scoped_name.as_deref(),
            Some("main.x")
        );
    }
}
