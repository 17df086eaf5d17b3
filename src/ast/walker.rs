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

//! Uniform tree traversal for the P8C compiler.
//!
//! Two traversal styles exist:
//!
//! - [`AstVisitor`]: read-only, pre-order, with a per-kind dispatch hook.
//! - [`AstWalker`]: mutating. Hooks return lists of deferred
//!   [`Modification`] values which are applied only after the traversal has
//!   finished, so iteration order is never disturbed by the rewrites.
//!
//! Walker hooks receive `&mut Ast` so that they can allocate detached
//! replacement nodes, but they must not touch sibling lists directly; every
//! structural change has to be expressed as one of the six modification
//! primitives.

use super::{Ast, NodeId, NodeKind};
use crate::error::Result;

/// A deferred tree modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modification {
    /// Remove `node` from `parent`.
    Remove { node: NodeId, parent: NodeId },
    /// Replace `old` with `new` under `parent`.
    Replace {
        old: NodeId,
        new: NodeId,
        parent: NodeId,
    },
    /// Insert `new` before `anchor` under `parent`.
    InsertBefore {
        anchor: NodeId,
        new: NodeId,
        parent: NodeId,
    },
    /// Insert `new` after `anchor` under `parent`.
    InsertAfter {
        anchor: NodeId,
        new: NodeId,
        parent: NodeId,
    },
    /// Insert `new` at the front of `parent`'s statement list.
    InsertFirst { new: NodeId, parent: NodeId },
    /// Insert `new` at the end of `parent`'s statement list.
    InsertLast { new: NodeId, parent: NodeId },
}

/// Apply a list of deferred modifications in order.
///
/// Every introduced node gets its parent link updated by the underlying
/// surgery primitive. Returns the number of applied modifications.
pub fn apply_modifications(ast: &mut Ast, mods: Vec<Modification>) -> Result<usize> {
    let count = mods.len();
    for m in mods {
        match m {
            Modification::Remove { node, parent } => ast.remove_child(parent, node)?,
            Modification::Replace { old, new, parent } => ast.replace_child(parent, old, new)?,
            Modification::InsertBefore {
                anchor,
                new,
                parent,
            } => ast.insert_before(parent, anchor, new)?,
            Modification::InsertAfter {
                anchor,
                new,
                parent,
            } => ast.insert_after(parent, anchor, new)?,
            Modification::InsertFirst { new, parent } => ast.insert_first(parent, new)?,
            Modification::InsertLast { new, parent } => ast.insert_last(parent, new)?,
        }
    }
    Ok(count)
}

/// Read-only pre-order visitor.
pub trait AstVisitor {
    /// Called for every node before its children.
    fn visit_node(&mut self, _ast: &Ast, _node: NodeId) {}

    /// Drive a traversal from the given node.
    fn visit(&mut self, ast: &Ast, node: NodeId)
    where
        Self: Sized,
    {
        self.visit_node(ast, node);
        for child in ast.children(node) {
            self.visit(ast, child);
        }
    }
}

/// Mutating walker with deferred modifications.
///
/// The default hooks return no modifications and the traversal recurses into
/// children in source order. A pass overrides only the hooks it needs.
pub trait AstWalker {
    fn visit_module(&mut self, _ast: &mut Ast, _node: NodeId) -> Vec<Modification> {
        Vec::new()
    }

    fn visit_block(&mut self, _ast: &mut Ast, _node: NodeId) -> Vec<Modification> {
        Vec::new()
    }

    fn visit_subroutine(&mut self, _ast: &mut Ast, _node: NodeId) -> Vec<Modification> {
        Vec::new()
    }

    fn visit_var_decl(&mut self, _ast: &mut Ast, _node: NodeId) -> Vec<Modification> {
        Vec::new()
    }

    fn visit_assignment(&mut self, _ast: &mut Ast, _node: NodeId) -> Vec<Modification> {
        Vec::new()
    }

    fn visit_for_loop(&mut self, _ast: &mut Ast, _node: NodeId) -> Vec<Modification> {
        Vec::new()
    }

    fn visit_when(&mut self, _ast: &mut Ast, _node: NodeId) -> Vec<Modification> {
        Vec::new()
    }

    fn visit_identifier(&mut self, _ast: &mut Ast, _node: NodeId) -> Vec<Modification> {
        Vec::new()
    }

    /// Called for every expression node other than identifiers.
    fn visit_expression(&mut self, _ast: &mut Ast, _node: NodeId) -> Vec<Modification> {
        Vec::new()
    }

    /// Called for every statement node without a dedicated hook.
    fn visit_statement(&mut self, _ast: &mut Ast, _node: NodeId) -> Vec<Modification> {
        Vec::new()
    }
}

#[derive(Clone, Copy)]
enum HookClass {
    Module,
    Block,
    Subroutine,
    VarDecl,
    Assignment,
    ForLoop,
    When,
    Identifier,
    Expression,
    Statement,
    Program,
}

fn classify(kind: &NodeKind) -> HookClass {
    match kind {
        NodeKind::Program { .. } => HookClass::Program,
        NodeKind::Module { .. } => HookClass::Module,
        NodeKind::Block { .. } => HookClass::Block,
        NodeKind::Subroutine { .. } => HookClass::Subroutine,
        NodeKind::VarDecl { .. } => HookClass::VarDecl,
        NodeKind::Assignment { .. } => HookClass::Assignment,
        NodeKind::ForLoop { .. } => HookClass::ForLoop,
        NodeKind::When { .. } => HookClass::When,
        NodeKind::IdentifierRef { .. } => HookClass::Identifier,
        k if k.is_expression() => HookClass::Expression,
        _ => HookClass::Statement,
    }
}

fn dispatch<W: AstWalker + ?Sized>(
    walker: &mut W,
    ast: &mut Ast,
    node: NodeId,
) -> Vec<Modification> {
    match classify(ast.kind(node)) {
        HookClass::Module => walker.visit_module(ast, node),
        HookClass::Block => walker.visit_block(ast, node),
        HookClass::Subroutine => walker.visit_subroutine(ast, node),
        HookClass::VarDecl => walker.visit_var_decl(ast, node),
        HookClass::Assignment => walker.visit_assignment(ast, node),
        HookClass::ForLoop => walker.visit_for_loop(ast, node),
        HookClass::When => walker.visit_when(ast, node),
        HookClass::Identifier => walker.visit_identifier(ast, node),
        HookClass::Expression => walker.visit_expression(ast, node),
        HookClass::Program => Vec::new(),
        HookClass::Statement => walker.visit_statement(ast, node),
    }
}

fn collect<W: AstWalker + ?Sized>(
    walker: &mut W,
    ast: &mut Ast,
    node: NodeId,
    mods: &mut Vec<Modification>,
) {
    mods.extend(dispatch(walker, ast, node));
    for child in ast.children(node) {
        collect(walker, ast, child, mods);
    }
}

/// Run one full traversal, then apply the gathered modifications.
/// Returns the number of applied modifications.
pub fn walk(walker: &mut dyn AstWalker, ast: &mut Ast) -> Result<usize> {
    let mut mods = Vec::new();
    collect(walker, ast, ast.root(), &mut mods);
    apply_modifications(ast, mods)
}

/// Repeat [`walk`] until a traversal produces no modifications.
/// Returns the number of full rounds that performed rewrites.
pub fn walk_to_fixpoint(walker: &mut dyn AstWalker, ast: &mut Ast, max_rounds: usize) -> Result<usize> {
    let mut rounds = 0;
    while rounds < max_rounds {
        if walk(walker, ast)? == 0 {
            break;
        }
        rounds += 1;
    }
    Ok(rounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DataType, NumericValue, VarKind, ZeropageWish};
    use crate::error::Position;

    fn pos() -> Position {
        Position::builtin()
    }

    struct CountingVisitor {
        nodes: usize,
    }

    impl AstVisitor for CountingVisitor {
        fn visit_node(&mut self, _ast: &Ast, _node: NodeId) {
            self.nodes += 1;
        }
    }

    fn tree_with_block() -> (Ast, NodeId) {
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
        (ast, block)
    }

    #[test]
    fn test_visitor_counts_all_nodes() {
        let (mut ast, block) = tree_with_block();
        ast.append(block, NodeKind::NoOp, pos()).unwrap();
        let mut v = CountingVisitor { nodes: 0 };
        v.visit(&ast, ast.root());
        // program + module + block + noop
        assert_eq!(v.nodes, 4);
    }

    /// Replaces every NoOp statement with a Break.
    struct NoOpReplacer;

    impl AstWalker for NoOpReplacer {
        fn visit_statement(&mut self, ast: &mut Ast, node: NodeId) -> Vec<Modification> {
            if matches!(ast.kind(node), NodeKind::NoOp) {
                let new = ast.add_detached(NodeKind::Break, ast.pos(node));
                vec![Modification::Replace {
                    old: node,
                    new,
                    parent: ast.node(node).parent,
                }]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn test_walker_replace() {
        let (mut ast, block) = tree_with_block();
        ast.append(block, NodeKind::NoOp, pos()).unwrap();
        ast.append(block, NodeKind::NoOp, pos()).unwrap();

        let applied = walk(&mut NoOpReplacer, &mut ast).unwrap();
        assert_eq!(applied, 2);
        for stmt in ast.statements(block) {
            assert!(matches!(ast.kind(*stmt), NodeKind::Break));
        }
        ast.verify_parent_links().unwrap();
    }

    /// Removes every Break statement.
    struct BreakRemover;

    impl AstWalker for BreakRemover {
        fn visit_statement(&mut self, ast: &mut Ast, node: NodeId) -> Vec<Modification> {
            if matches!(ast.kind(node), NodeKind::Break) {
                vec![Modification::Remove {
                    node,
                    parent: ast.node(node).parent,
                }]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn test_walker_remove_reaches_fixpoint() {
        let (mut ast, block) = tree_with_block();
        ast.append(block, NodeKind::Break, pos()).unwrap();
        ast.append(block, NodeKind::NoOp, pos()).unwrap();
        ast.append(block, NodeKind::Break, pos()).unwrap();

        let rounds = walk_to_fixpoint(&mut BreakRemover, &mut ast, 10).unwrap();
        assert_eq!(rounds, 1);
        assert_eq!(ast.statements(block).len(), 1);
    }

    #[test]
    fn test_insert_modifications() {
        let (mut ast, block) = tree_with_block();
        let anchor = ast.append(block, NodeKind::NoOp, pos()).unwrap();
        let before = ast.add_detached(NodeKind::Break, pos());
        let first = ast.add_detached(
            NodeKind::VarDecl {
                name: "v".to_string(),
                kind: VarKind::Var,
                dt: DataType::Ubyte,
                zp: ZeropageWish::DontCare,
                array_size: None,
                struct_name: None,
                value: None,
            },
            pos(),
        );
        let last = ast.add_detached(
            NodeKind::NumericLiteral {
                value: NumericValue::Integer(0),
                dt: DataType::Ubyte,
            },
            pos(),
        );
        apply_modifications(
            &mut ast,
            vec![
                Modification::InsertBefore {
                    anchor,
                    new: before,
                    parent: block,
                },
                Modification::InsertFirst {
                    new: first,
                    parent: block,
                },
                Modification::InsertLast {
                    new: last,
                    parent: block,
                },
            ],
        )
        .unwrap();
        assert_eq!(ast.statements(block), &[first, before, anchor, last]);
        ast.verify_parent_links().unwrap();
    }

    #[test]
    fn test_bad_modification_is_fatal() {
        let (mut ast, block) = tree_with_block();
        let stray = ast.add_detached(NodeKind::Break, pos());
        let result = apply_modifications(
            &mut ast,
            vec![Modification::Remove {
                node: stray,
                parent: block,
            }],
        );
        assert!(result.is_err());
    }
}
