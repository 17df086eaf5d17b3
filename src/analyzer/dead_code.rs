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

//! Dead code removal.
//!
//! Runs after name resolution so the call graph is meaningful. Removes
//! uncalled or empty subroutines, empty blocks and modules, warns about
//! statements following an unconditional terminator, and drops stores that
//! are overwritten by the directly following statement.

use crate::analyzer::call_graph::CallGraph;
use crate::ast::{Ast, NodeId, NodeKind, VarKind};
use crate::error::{DiagnosticCode, Diagnostics, Result};

/// The dead code removal pass.
pub struct DeadCodeRemover;

impl DeadCodeRemover {
    /// Run all removal steps once.
    pub fn run(ast: &mut Ast, diags: &mut Diagnostics, graph: &CallGraph) -> Result<()> {
        Self::remove_unused_subroutines(ast, graph)?;
        Self::remove_empty_blocks(ast)?;
        Self::remove_empty_modules(ast)?;
        Self::warn_unreachable(ast, diags);
        Self::deduplicate_assignments(ast)?;
        Ok(())
    }

    fn entry_point(ast: &Ast) -> Option<NodeId> {
        match ast.lookup_absolute(&["main".to_string(), "start".to_string()]) {
            crate::ast::LookupResult::Found(id) => Some(id),
            _ => None,
        }
    }

    fn remove_unused_subroutines(ast: &mut Ast, graph: &CallGraph) -> Result<()> {
        let entry = Self::entry_point(ast);
        let mut doomed = Vec::new();
        CallGraph::for_all_subroutines(ast, |ast, sub| {
            if Some(sub) == entry {
                return;
            }
            let NodeKind::Subroutine {
                is_asm,
                asm_address,
                statements,
                ..
            } = ast.kind(sub)
            else {
                return;
            };
            if *is_asm || asm_address.is_some() {
                return;
            }
            let block = ast.enclosing_scope(sub);
            if let Some(block) = block {
                if let NodeKind::Block { options, .. } = ast.kind(block) {
                    if options.iter().any(|o| o == "force_output") {
                        return;
                    }
                }
            }
            let empty = statements.iter().all(|&s| {
                matches!(
                    ast.kind(s),
                    NodeKind::Label { .. } | NodeKind::Directive { .. } | NodeKind::NoOp
                )
            });
            if !graph.has_callers(sub) || empty {
                doomed.push(sub);
            }
        });
        for &sub in &doomed {
            let parent = ast.node(sub).parent;
            ast.remove_child(parent, sub)?;
        }
        Self::remove_calls_to(ast, &doomed)?;
        Ok(())
    }

    /// Call statements to a removed subroutine would leave dangling labels.
    fn remove_calls_to(ast: &mut Ast, removed: &[NodeId]) -> Result<()> {
        if removed.is_empty() {
            return Ok(());
        }
        let mut doomed = Vec::new();
        let mut stack = vec![ast.root()];
        while let Some(node) = stack.pop() {
            if let NodeKind::FunctionCallStatement { call } = ast.kind(node) {
                if let NodeKind::FunctionCall { target, .. } = ast.kind(*call) {
                    if let Some(decl) = ast.identifier_target(*target) {
                        if removed.contains(&decl) {
                            doomed.push((ast.node(node).parent, node));
                        }
                    }
                }
            }
            stack.extend(ast.children(node));
        }
        for (parent, stmt) in doomed {
            ast.remove_child(parent, stmt)?;
        }
        Ok(())
    }

    fn remove_empty_blocks(ast: &mut Ast) -> Result<()> {
        let mut doomed = Vec::new();
        for module in ast.statements(ast.root()).to_vec() {
            for block in ast.statements(module).to_vec() {
                let NodeKind::Block {
                    options,
                    statements,
                    ..
                } = ast.kind(block)
                else {
                    continue;
                };
                if options.iter().any(|o| o == "force_output") {
                    continue;
                }
                let has_content = statements.iter().any(|&s| {
                    !matches!(
                        ast.kind(s),
                        NodeKind::Directive { .. } | NodeKind::Label { .. } | NodeKind::NoOp
                    )
                });
                if !has_content {
                    doomed.push((module, block));
                }
            }
        }
        for (module, block) in doomed {
            ast.remove_child(module, block)?;
        }
        Ok(())
    }

    fn remove_empty_modules(ast: &mut Ast) -> Result<()> {
        let root = ast.root();
        let mut doomed = Vec::new();
        for module in ast.statements(root).to_vec() {
            if ast.statements(module).is_empty() {
                doomed.push(module);
            }
        }
        for module in doomed {
            ast.remove_child(root, module)?;
        }
        Ok(())
    }

    /// Whether this statement unconditionally leaves the flow of control.
    fn is_terminator(ast: &Ast, stmt: NodeId) -> bool {
        match ast.kind(stmt) {
            NodeKind::Break | NodeKind::Return { .. } | NodeKind::Jump { .. } => true,
            NodeKind::FunctionCallStatement { call } => {
                let NodeKind::FunctionCall { target, .. } = ast.kind(*call) else {
                    return false;
                };
                match ast.kind(*target) {
                    NodeKind::IdentifierRef { path, .. } => {
                        path.last().map(|s| s == "exit").unwrap_or(false)
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn warn_unreachable(ast: &Ast, diags: &mut Diagnostics) {
        let mut stack = vec![ast.root()];
        while let Some(node) = stack.pop() {
            let stmts = ast.statements(node);
            for pair in stmts.windows(2) {
                let (first, second) = (pair[0], pair[1]);
                if !Self::is_terminator(ast, first) {
                    continue;
                }
                let harmless = matches!(
                    ast.kind(second),
                    NodeKind::Label { .. }
                        | NodeKind::Directive { .. }
                        | NodeKind::VarDecl { .. }
                        | NodeKind::InlineAssembly { .. }
                        | NodeKind::Subroutine { .. }
                        | NodeKind::StructDecl { .. }
                );
                if !harmless {
                    diags.warn(
                        DiagnosticCode::UnreachableCode,
                        "unreachable code",
                        ast.pos(second),
                    );
                    break;
                }
            }
            stack.extend(ast.children(node));
        }
    }

    /// Remove the first of two consecutive plain assignments to the same
    /// RAM-resident target when the second one plainly overwrites it.
    fn deduplicate_assignments(ast: &mut Ast) -> Result<()> {
        let mut doomed: Vec<(NodeId, NodeId)> = Vec::new();
        let mut stack = vec![ast.root()];
        while let Some(node) = stack.pop() {
            let stmts = ast.statements(node).to_vec();
            for pair in stmts.windows(2) {
                let (first, second) = (pair[0], pair[1]);
                if Self::removable_duplicate(ast, first, second) {
                    doomed.push((node, first));
                }
            }
            stack.extend(ast.children(node));
        }
        for (parent, stmt) in doomed {
            ast.remove_child(parent, stmt)?;
        }
        Ok(())
    }

    fn removable_duplicate(ast: &Ast, first: NodeId, second: NodeId) -> bool {
        let (NodeKind::Assignment {
            target: t1,
            aug_op: None,
            value: _,
        }, NodeKind::Assignment {
            target: t2,
            aug_op: None,
            value: v2,
        }) = (ast.kind(first), ast.kind(second))
        else {
            return false;
        };
        let (t1, t2, v2) = (*t1, *t2, *v2);

        if crate::codegen::assignment::is_augmentable(ast, first)
            || crate::codegen::assignment::is_augmentable(ast, second)
        {
            return false;
        }
        if !Self::targets_equal(ast, t1, t2) {
            return false;
        }
        if !Self::target_in_ram(ast, t1) {
            return false;
        }
        // The second store must be trivial and independent of the target.
        if matches!(
            ast.kind(v2),
            NodeKind::PrefixExpr { .. }
                | NodeKind::BinaryExpr { .. }
                | NodeKind::TypecastExpr { .. }
                | NodeKind::FunctionCall { .. }
        ) {
            return false;
        }
        if let Some(decl) = Self::target_declaration(ast, t1) {
            if ast.mentions(v2, decl) {
                return false;
            }
        }
        true
    }

    fn targets_equal(ast: &Ast, a: NodeId, b: NodeId) -> bool {
        let (NodeKind::AssignTarget {
            identifier: i1,
            array_indexed: x1,
            memory_address: m1,
            register: r1,
        }, NodeKind::AssignTarget {
            identifier: i2,
            array_indexed: x2,
            memory_address: m2,
            register: r2,
        }) = (ast.kind(a), ast.kind(b))
        else {
            return false;
        };
        if r1 != r2 {
            return false;
        }
        match (i1, i2, x1, x2, m1, m2) {
            (Some(a), Some(b), None, None, None, None) => ast.exprs_equal(*a, *b),
            (None, None, Some(a), Some(b), None, None) => ast.exprs_equal(*a, *b),
            (None, None, None, None, Some(a), Some(b)) => ast.exprs_equal(*a, *b),
            (None, None, None, None, None, None) => true,
            _ => false,
        }
    }

    fn target_declaration(ast: &Ast, target: NodeId) -> Option<NodeId> {
        let NodeKind::AssignTarget {
            identifier: Some(ident),
            ..
        } = ast.kind(target)
        else {
            return None;
        };
        ast.identifier_target(*ident)
    }

    /// A target lives in regular RAM when it is a plain variable, not a
    /// memory-mapped declaration, a register or an address expression.
    fn target_in_ram(ast: &Ast, target: NodeId) -> bool {
        let Some(decl) = Self::target_declaration(ast, target) else {
            return false;
        };
        matches!(
            ast.kind(decl),
            NodeKind::VarDecl {
                kind: VarKind::Var,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::name_resolution::NameResolver;
    use crate::ast::{DataType, TreeBuilder};

    fn run(t: &mut TreeBuilder) -> Diagnostics {
        let mut diags = Diagnostics::new();
        NameResolver::run(&mut t.ast, &mut diags);
        let graph = CallGraph::build(&t.ast);
        DeadCodeRemover::run(&mut t.ast, &mut diags, &graph).unwrap();
        diags
    }

    #[test]
    fn test_uncalled_subroutine_removed() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let start = t.subroutine(block, "start");
        t.ret(start);
        let unused = t.subroutine(block, "unused");
        t.ret(unused);

        run(&mut t);

        let names: Vec<&str> = t
            .ast
            .statements(block)
            .iter()
            .filter_map(|&s| t.ast.kind(s).symbol_name())
            .collect();
        assert!(names.contains(&"start"));
        assert!(!names.contains(&"unused"));
    }

    #[test]
    fn test_called_subroutine_kept() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let start = t.subroutine(block, "start");
        let helper = t.subroutine(block, "helper");
        t.ret(helper);
        let href = t.ident_to("helper", helper);
        t.call_stmt(start, href);

        run(&mut t);

        let names: Vec<&str> = t
            .ast
            .statements(block)
            .iter()
            .filter_map(|&s| t.ast.kind(s).symbol_name())
            .collect();
        assert!(names.contains(&"helper"));
    }

    #[test]
    fn test_asm_subroutine_never_removed() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let start = t.subroutine(block, "start");
        t.ret(start);
        t.rom_subroutine(block, "chrout", 0xffd2);

        run(&mut t);

        let names: Vec<&str> = t
            .ast
            .statements(block)
            .iter()
            .filter_map(|&s| t.ast.kind(s).symbol_name())
            .collect();
        assert!(names.contains(&"chrout"));
    }

    #[test]
    fn test_duplicate_store_removed() {
        // x = 1; x = 1  ->  one store remains
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        let x = t.var(sub, "x", DataType::Ubyte);
        let one_a = t.lit(1, DataType::Ubyte);
        let ta = t.target_var("x", Some(x));
        t.assign(sub, ta, one_a);
        let one_b = t.lit(1, DataType::Ubyte);
        let tb = t.target_var("x", Some(x));
        t.assign(sub, tb, one_b);

        run(&mut t);

        let stores = t
            .ast
            .statements(sub)
            .iter()
            .filter(|&&s| matches!(t.ast.kind(s), NodeKind::Assignment { .. }))
            .count();
        assert_eq!(stores, 1);
    }

    #[test]
    fn test_dependent_store_not_removed() {
        // x = 1; x = y  keeps both when y mentions... here y is independent,
        // but x = 1; x = x stays untouched because the value mentions x.
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        let x = t.var(sub, "x", DataType::Ubyte);
        let one = t.lit(1, DataType::Ubyte);
        let ta = t.target_var("x", Some(x));
        t.assign(sub, ta, one);
        let xref = t.ident_to("x", x);
        let tb = t.target_var("x", Some(x));
        t.assign(sub, tb, xref);

        run(&mut t);

        let stores = t
            .ast
            .statements(sub)
            .iter()
            .filter(|&&s| matches!(t.ast.kind(s), NodeKind::Assignment { .. }))
            .count();
        assert_eq!(stores, 2);
    }

    #[test]
    fn test_unreachable_code_warned() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        let x = t.var(sub, "x", DataType::Ubyte);
        t.ret(sub);
        let one = t.lit(1, DataType::Ubyte);
        let target = t.target_var("x", Some(x));
        t.assign(sub, target, one);

        let diags = run(&mut t);
        assert!(diags
            .iter()
            .any(|d| d.code == DiagnosticCode::UnreachableCode));
    }

    #[test]
    fn test_label_after_return_not_warned() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        t.ret(sub);
        t.label(sub, "done");

        let diags = run(&mut t);
        assert!(!diags
            .iter()
            .any(|d| d.code == DiagnosticCode::UnreachableCode));
    }
}
