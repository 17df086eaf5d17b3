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

//! Statement reordering and desugaring.
//!
//! One pass that brings the tree into the canonical shape the later passes
//! and the code generator rely on:
//!
//! 1. order top-level blocks (main first, addressed blocks by address,
//!    library blocks last),
//! 2. hoist directives and variable declarations inside every scope,
//! 3. promote the `start` subroutine to be the first subroutine of its
//!    block,
//! 4. split non-constant variable initializers into a bare declaration plus
//!    an assignment at the original position,
//! 5. rewrite augmented assignments `x op= e` into `x = x op e`,
//! 6. expand struct declarations and struct assignments into flattened
//!    member variables and memberwise assignments,
//! 7. sort `when` choices by their smallest constant value, the else arm
//!    last.

use crate::ast::{
    Ast, DataType, LookupResult, NameGen, NodeId, NodeKind, VarKind, ZeropageWish,
};
use crate::error::{DiagnosticCode, Diagnostics, Result};
use std::collections::HashMap;

/// Directives hoisted above the variable declarations of a scope.
const HOISTED_DIRECTIVES: &[&str] = &[
    "output",
    "launcher",
    "zeropage",
    "zpreserved",
    "address",
    "option",
];

/// The reorder/desugar pass.
pub struct StatementReorderer;

impl StatementReorderer {
    /// Run all reorder and desugar steps once, in order.
    pub fn run(ast: &mut Ast, diags: &mut Diagnostics, names: &mut NameGen) -> Result<()> {
        Self::reorder_toplevel(ast)?;
        Self::split_initializers(ast)?;
        Self::hoist_declarations(ast, names)?;
        Self::promote_start(ast)?;
        Self::desugar_augmented(ast, diags)?;
        Self::flatten_structs(ast, diags)?;
        Self::sort_when_choices(ast)?;
        Ok(())
    }

    // ------------------------- 1. top-level order -------------------------

    fn reorder_toplevel(ast: &mut Ast) -> Result<()> {
        // Library modules go last in program order.
        let root = ast.root();
        let modules = ast.statements(root).to_vec();
        let (libs, normal): (Vec<NodeId>, Vec<NodeId>) = modules
            .iter()
            .copied()
            .partition(|&m| matches!(ast.kind(m), NodeKind::Module { library: true, .. }));
        let mut new_modules = normal;
        new_modules.extend(libs);
        ast.reorder_statements(root, new_modules.clone())?;

        for module in new_modules {
            let stmts = ast.statements(module).to_vec();
            let mut others = Vec::new();
            let mut main_blocks = Vec::new();
            let mut addressed: Vec<(u16, NodeId)> = Vec::new();
            let mut unaddressed = Vec::new();
            for stmt in stmts {
                match ast.kind(stmt) {
                    NodeKind::Block { name, address, .. } => match address {
                        Some(a) => addressed.push((*a, stmt)),
                        None if name == "main" => main_blocks.push(stmt),
                        None => unaddressed.push(stmt),
                    },
                    _ => others.push(stmt),
                }
            }
            addressed.sort_by_key(|(a, _)| *a);
            let mut order = others;
            order.extend(main_blocks);
            order.extend(addressed.into_iter().map(|(_, b)| b));
            order.extend(unaddressed);
            ast.reorder_statements(module, order)?;
        }
        Ok(())
    }

    // ---------------------- 4. initializer splitting ----------------------

    fn split_initializers(ast: &mut Ast) -> Result<()> {
        for scope in Self::statement_scopes(ast) {
            for decl in ast.statements(scope).to_vec() {
                let NodeKind::VarDecl {
                    name,
                    kind: VarKind::Var,
                    value: Some(value),
                    ..
                } = ast.kind(decl)
                else {
                    continue;
                };
                let (name, value) = (name.clone(), *value);
                // Literal and range initializers are compile-time material.
                if ast.is_literal(value) || matches!(ast.kind(value), NodeKind::RangeExpr { .. }) {
                    continue;
                }

                if let NodeKind::VarDecl { value, .. } = ast.kind_mut(decl) {
                    *value = None;
                }
                let pos = ast.pos(decl);
                let ident = ast.add_detached(
                    NodeKind::IdentifierRef {
                        path: vec![name],
                        target: Some(decl),
                    },
                    pos.clone(),
                );
                let target = ast.add_detached(
                    NodeKind::AssignTarget {
                        identifier: Some(ident),
                        array_indexed: None,
                        memory_address: None,
                        register: None,
                    },
                    pos.clone(),
                );
                let assign = ast.add_detached(
                    NodeKind::Assignment {
                        target,
                        aug_op: None,
                        value,
                    },
                    pos,
                );
                ast.insert_after(scope, decl, assign)?;
            }
        }
        Ok(())
    }

    // ------------------------- 2. in-scope hoisting -------------------------

    fn hoist_declarations(ast: &mut Ast, names: &mut NameGen) -> Result<()> {
        Self::pull_up_anonymous_vars(ast, names)?;

        for scope in Self::statement_scopes(ast) {
            let stmts = ast.statements(scope).to_vec();
            let mut directives = Vec::new();
            let mut decls = Vec::new();
            let mut rest = Vec::new();
            for stmt in stmts {
                match ast.kind(stmt) {
                    NodeKind::Directive { name, .. }
                        if HOISTED_DIRECTIVES.contains(&name.as_str()) =>
                    {
                        directives.push(stmt)
                    }
                    NodeKind::VarDecl { .. } => decls.push(stmt),
                    _ => rest.push(stmt),
                }
            }
            let mut order = directives;
            order.extend(decls);
            order.extend(rest);
            ast.reorder_statements(scope, order)?;
        }
        Ok(())
    }

    /// Variable declarations inside anonymous scopes move up into the
    /// enclosing subroutine or block, renamed on collision, so that storage
    /// emission sees every variable in a named scope.
    fn pull_up_anonymous_vars(ast: &mut Ast, names: &mut NameGen) -> Result<()> {
        let anon_scopes: Vec<NodeId> = Self::statement_scopes(ast)
            .into_iter()
            .filter(|&s| matches!(ast.kind(s), NodeKind::AnonymousScope { .. }))
            .collect();
        for anon in anon_scopes {
            let mut home = ast.enclosing_scope(anon);
            while let Some(h) = home {
                if matches!(
                    ast.kind(h),
                    NodeKind::Subroutine { .. } | NodeKind::Block { .. }
                ) {
                    break;
                }
                home = ast.enclosing_scope(h);
            }
            let Some(home) = home else { continue };

            for decl in ast.statements(anon).to_vec() {
                let NodeKind::VarDecl { name, .. } = ast.kind(decl) else {
                    continue;
                };
                let name = name.clone();
                let collides = ast
                    .statements(home)
                    .iter()
                    .any(|&s| s != decl && ast.kind(s).symbol_name() == Some(name.as_str()));
                if collides {
                    let fresh = names.next(&name);
                    if let NodeKind::VarDecl { name, .. } = ast.kind_mut(decl) {
                        *name = fresh;
                    }
                }
                ast.remove_child(anon, decl)?;
                ast.insert_first(home, decl)?;
                ast.invalidate_scoped_names(decl);
            }
        }
        Ok(())
    }

    // ------------------------- 3. start promotion -------------------------

    fn promote_start(ast: &mut Ast) -> Result<()> {
        for block in Self::all_blocks(ast) {
            let stmts = ast.statements(block).to_vec();
            let mut first_sub = None;
            let mut start = None;
            for (i, stmt) in stmts.iter().enumerate() {
                if let NodeKind::Subroutine { name, .. } = ast.kind(*stmt) {
                    if first_sub.is_none() {
                        first_sub = Some(i);
                    }
                    if name == "start" {
                        start = Some(i);
                        break;
                    }
                }
            }
            if let (Some(first), Some(start_idx)) = (first_sub, start) {
                if start_idx > first {
                    let mut order = stmts;
                    let start_id = order.remove(start_idx);
                    order.insert(first, start_id);
                    ast.reorder_statements(block, order)?;
                }
            }
        }
        Ok(())
    }

    // --------------------- 5. augmented assign desugar ---------------------

    fn desugar_augmented(ast: &mut Ast, diags: &mut Diagnostics) -> Result<()> {
        for assign in Self::all_of_kind(ast, |k| matches!(k, NodeKind::Assignment { .. })) {
            let NodeKind::Assignment {
                target,
                aug_op: Some(op),
                value,
            } = ast.kind(assign)
            else {
                continue;
            };
            let (target, op, value) = (*target, *op, *value);

            let target_expr = match Self::target_as_expression(ast, target) {
                Some(e) => e,
                None => {
                    diags.error(
                        DiagnosticCode::UnsupportedStorage,
                        "augmented assignment needs a variable, array or memory target",
                        ast.pos(assign),
                    );
                    if let NodeKind::Assignment { aug_op, .. } = ast.kind_mut(assign) {
                        *aug_op = None;
                    }
                    continue;
                }
            };

            let pos = ast.pos(assign);
            let binary = ast.add_detached(
                NodeKind::BinaryExpr {
                    left: target_expr,
                    op,
                    right: value,
                },
                pos,
            );
            if let NodeKind::Assignment { aug_op, .. } = ast.kind_mut(assign) {
                *aug_op = None;
            }
            ast.replace_child(assign, value, binary)?;
        }
        Ok(())
    }

    /// Express an assignment target as an equivalent read expression.
    fn target_as_expression(ast: &mut Ast, target: NodeId) -> Option<NodeId> {
        let NodeKind::AssignTarget {
            identifier,
            array_indexed,
            memory_address,
            ..
        } = ast.kind(target)
        else {
            return None;
        };
        let (identifier, array_indexed, memory_address) =
            (*identifier, *array_indexed, *memory_address);
        if let Some(ident) = identifier {
            return Some(ast.clone_subtree(ident));
        }
        if let Some(indexed) = array_indexed {
            return Some(ast.clone_subtree(indexed));
        }
        if let Some(addr) = memory_address {
            let addr_copy = ast.clone_subtree(addr);
            let pos = ast.pos(addr);
            return Some(ast.add_detached(NodeKind::DirectMemoryRead { address: addr_copy }, pos));
        }
        None
    }

    // ------------------------ 6. struct flattening ------------------------

    fn flatten_structs(ast: &mut Ast, diags: &mut Diagnostics) -> Result<()> {
        // member map: struct var decl -> [(member name, flattened decl)]
        let mut flattened: HashMap<NodeId, Vec<(String, NodeId)>> = HashMap::new();

        for decl in Self::all_of_kind(ast, |k| {
            matches!(
                k,
                NodeKind::VarDecl {
                    struct_name: Some(_),
                    ..
                }
            )
        }) {
            let NodeKind::VarDecl {
                name,
                struct_name: Some(struct_name),
                value,
                ..
            } = ast.kind(decl)
            else {
                continue;
            };
            let (var_name, struct_name, init) = (name.clone(), struct_name.clone(), *value);

            let struct_decl = match ast.lookup(&[struct_name.clone()], decl) {
                LookupResult::Found(s) if matches!(ast.kind(s), NodeKind::StructDecl { .. }) => s,
                _ => {
                    diags.error(
                        DiagnosticCode::UnknownStruct,
                        format!("undefined struct '{}'", struct_name),
                        ast.pos(decl),
                    );
                    continue;
                }
            };

            let members: Vec<(String, DataType)> = ast
                .statements(struct_decl)
                .iter()
                .filter_map(|&m| match ast.kind(m) {
                    NodeKind::VarDecl { name, dt, .. } => Some((name.clone(), *dt)),
                    _ => None,
                })
                .collect();

            let init_elements: Vec<NodeId> = match init.map(|v| ast.kind(v)) {
                Some(NodeKind::ArrayLiteral { elements, .. }) => elements.clone(),
                _ => Vec::new(),
            };
            if init.is_some() && init_elements.len() != members.len() {
                diags.error(
                    DiagnosticCode::StructElementMismatch,
                    format!(
                        "struct '{}' has {} members, initializer has {}",
                        struct_name,
                        members.len(),
                        init_elements.len()
                    ),
                    ast.pos(decl),
                );
            }

            let scope = ast.node(decl).parent;
            let pos = ast.pos(decl);
            let mut member_decls = Vec::new();
            for (i, (member, dt)) in members.iter().enumerate() {
                let member_value = init_elements.get(i).copied();
                let flat = ast.add_detached(
                    NodeKind::VarDecl {
                        name: format!("{}${}", var_name, member),
                        kind: VarKind::Var,
                        dt: *dt,
                        zp: ZeropageWish::DontCare,
                        array_size: None,
                        struct_name: None,
                        value: member_value,
                    },
                    pos.clone(),
                );
                ast.insert_before(scope, decl, flat)?;
                member_decls.push((member.clone(), flat));
            }
            ast.remove_child(scope, decl)?;
            flattened.insert(decl, member_decls);
        }

        if flattened.is_empty() {
            return Ok(());
        }

        Self::rewrite_member_refs(ast, diags, &flattened);
        Self::expand_struct_assignments(ast, diags, &flattened)?;
        Ok(())
    }

    /// Rewrite `s.member` references left unresolved by name resolution
    /// into references to the flattened variables.
    fn rewrite_member_refs(
        ast: &mut Ast,
        diags: &mut Diagnostics,
        flattened: &HashMap<NodeId, Vec<(String, NodeId)>>,
    ) {
        for r in Self::all_of_kind(ast, |k| {
            matches!(k, NodeKind::IdentifierRef { target: None, .. })
        }) {
            let NodeKind::IdentifierRef { path, .. } = ast.kind(r) else {
                continue;
            };
            if path.len() != 2 {
                continue;
            }
            let path = path.clone();
            let LookupResult::Found(head) = ast.lookup(&path[..1], r) else {
                continue;
            };
            let Some(members) = flattened.get(&head) else {
                continue;
            };
            match members.iter().find(|(m, _)| *m == path[1]) {
                Some((member, decl)) => {
                    let flat_name = format!("{}${}", path[0], member);
                    let decl = *decl;
                    if let NodeKind::IdentifierRef { path, target } = ast.kind_mut(r) {
                        *path = vec![flat_name];
                        *target = Some(decl);
                    }
                }
                None => {
                    diags.error(
                        DiagnosticCode::UnknownStruct,
                        format!("struct variable '{}' has no member '{}'", path[0], path[1]),
                        ast.pos(r),
                    );
                }
            }
        }
    }

    /// Expand whole-struct assignments into memberwise assignments.
    fn expand_struct_assignments(
        ast: &mut Ast,
        diags: &mut Diagnostics,
        flattened: &HashMap<NodeId, Vec<(String, NodeId)>>,
    ) -> Result<()> {
        for assign in Self::all_of_kind(ast, |k| matches!(k, NodeKind::Assignment { .. })) {
            let NodeKind::Assignment {
                target,
                aug_op: None,
                value,
            } = ast.kind(assign)
            else {
                continue;
            };
            let (target, value) = (*target, *value);
            let NodeKind::AssignTarget {
                identifier: Some(tid),
                ..
            } = ast.kind(target)
            else {
                continue;
            };
            let Some(tdecl) = ast.identifier_target(*tid) else {
                continue;
            };
            let Some(tmembers) = flattened.get(&tdecl) else {
                continue;
            };
            let tmembers = tmembers.clone();
            let scope = ast.node(assign).parent;
            let pos = ast.pos(assign);

            // s1 = s2
            if let Some(vdecl) = ast.identifier_target(value) {
                if let Some(vmembers) = flattened.get(&vdecl) {
                    let vmembers = vmembers.clone();
                    for ((mname, tflat), (_, vflat)) in tmembers.iter().zip(vmembers.iter()) {
                        let src = Self::flat_ref(ast, *vflat, &pos);
                        let dst = Self::flat_target(ast, *tflat, &pos);
                        let member_assign = ast.add_detached(
                            NodeKind::Assignment {
                                target: dst,
                                aug_op: None,
                                value: src,
                            },
                            pos.clone(),
                        );
                        ast.insert_before(scope, assign, member_assign)?;
                        let _ = mname;
                    }
                    ast.remove_child(scope, assign)?;
                    continue;
                }
            }

            // s = { v1, .., vN }
            if let NodeKind::ArrayLiteral { elements, .. } = ast.kind(value) {
                let elements = elements.clone();
                if elements.len() != tmembers.len() {
                    diags.error(
                        DiagnosticCode::StructElementMismatch,
                        format!(
                            "struct assignment needs {} values, found {}",
                            tmembers.len(),
                            elements.len()
                        ),
                        pos.clone(),
                    );
                    ast.remove_child(scope, assign)?;
                    continue;
                }
                for ((_, tflat), element) in tmembers.iter().zip(elements.iter()) {
                    let dst = Self::flat_target(ast, *tflat, &pos);
                    let member_assign = ast.add_detached(
                        NodeKind::Assignment {
                            target: dst,
                            aug_op: None,
                            value: *element,
                        },
                        pos.clone(),
                    );
                    ast.insert_before(scope, assign, member_assign)?;
                }
                ast.remove_child(scope, assign)?;
                continue;
            }

            diags.error(
                DiagnosticCode::TypeMismatch,
                "a struct can only be assigned from another struct or a value list",
                pos,
            );
        }
        Ok(())
    }

    fn flat_ref(ast: &mut Ast, decl: NodeId, pos: &crate::error::Position) -> NodeId {
        let name = ast
            .kind(decl)
            .symbol_name()
            .unwrap_or_default()
            .to_string();
        ast.add_detached(
            NodeKind::IdentifierRef {
                path: vec![name],
                target: Some(decl),
            },
            pos.clone(),
        )
    }

    fn flat_target(ast: &mut Ast, decl: NodeId, pos: &crate::error::Position) -> NodeId {
        let ident = Self::flat_ref(ast, decl, pos);
        ast.add_detached(
            NodeKind::AssignTarget {
                identifier: Some(ident),
                array_indexed: None,
                memory_address: None,
                register: None,
            },
            pos.clone(),
        )
    }

    // ------------------------- 7. when choice sort -------------------------

    fn sort_when_choices(ast: &mut Ast) -> Result<()> {
        for when in Self::all_of_kind(ast, |k| matches!(k, NodeKind::When { .. })) {
            let choices = ast.statements(when).to_vec();
            let mut keyed: Vec<(i64, usize, NodeId)> = Vec::new();
            for (i, choice) in choices.iter().enumerate() {
                let NodeKind::WhenChoice { values, .. } = ast.kind(*choice) else {
                    continue;
                };
                let key = if values.is_empty() {
                    // The else arm sorts last.
                    i64::MAX
                } else {
                    values
                        .iter()
                        .filter_map(|&v| ast.integer_literal_value(v))
                        .min()
                        .unwrap_or(i64::MAX - 1)
                };
                keyed.push((key, i, *choice));
            }
            keyed.sort_by_key(|(key, i, _)| (*key, *i));
            let order: Vec<NodeId> = keyed.into_iter().map(|(_, _, c)| c).collect();
            if order.len() == choices.len() {
                ast.reorder_statements(when, order)?;
            }
        }
        Ok(())
    }

    // ------------------------------- helpers -------------------------------

    fn statement_scopes(ast: &Ast) -> Vec<NodeId> {
        Self::all_of_kind(ast, |k| {
            matches!(
                k,
                NodeKind::Block { .. } | NodeKind::Subroutine { .. } | NodeKind::AnonymousScope { .. }
            )
        })
    }

    fn all_blocks(ast: &Ast) -> Vec<NodeId> {
        Self::all_of_kind(ast, |k| matches!(k, NodeKind::Block { .. }))
    }

    fn all_of_kind(ast: &Ast, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![ast.root()];
        while let Some(node) = stack.pop() {
            if pred(ast.kind(node)) {
                out.push(node);
            }
            let mut children = ast.children(node);
            children.reverse();
            stack.extend(children);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::name_resolution::NameResolver;
    use crate::ast::{BinaryOperator, TreeBuilder};

    fn run(t: &mut TreeBuilder) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let mut names = NameGen::new();
        NameResolver::run(&mut t.ast, &mut diags);
        StatementReorderer::run(&mut t.ast, &mut diags, &mut names).unwrap();
        diags
    }

    #[test]
    fn test_main_block_first_library_modules_last() {
        let mut t = TreeBuilder::new();
        t.block("screen", Some(0xc000));
        t.block("helpers", None);
        t.block("main", None);
        let lib = t.module("lib.p8", true);
        t.block_in(lib, "math", None);

        run(&mut t);

        let root = t.ast.root();
        let modules = t.ast.statements(root).to_vec();
        assert!(matches!(
            t.ast.kind(*modules.last().unwrap()),
            NodeKind::Module { library: true, .. }
        ));
        let blocks: Vec<String> = t
            .ast
            .statements(modules[0])
            .iter()
            .filter_map(|&b| t.ast.kind(b).symbol_name().map(str::to_string))
            .collect();
        assert_eq!(blocks, vec!["main", "screen", "helpers"]);
    }

    #[test]
    fn test_addressed_blocks_sorted() {
        let mut t = TreeBuilder::new();
        t.block("high", Some(0xc000));
        t.block("low", Some(0x2000));
        run(&mut t);

        let module = t.module;
        let blocks: Vec<String> = t
            .ast
            .statements(module)
            .iter()
            .filter_map(|&b| t.ast.kind(b).symbol_name().map(str::to_string))
            .collect();
        assert_eq!(blocks, vec!["low", "high"]);
    }

    #[test]
    fn test_vardecls_hoisted() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        t.ret(sub);
        t.var(sub, "x", DataType::Ubyte);
        run(&mut t);

        let stmts = t.ast.statements(sub).to_vec();
        assert!(matches!(t.ast.kind(stmts[0]), NodeKind::VarDecl { .. }));
        assert!(matches!(t.ast.kind(stmts[1]), NodeKind::Return { .. }));
    }

    #[test]
    fn test_start_promoted() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        t.subroutine(block, "helper");
        t.subroutine(block, "start");
        run(&mut t);

        let subs: Vec<String> = t
            .ast
            .statements(block)
            .iter()
            .filter_map(|&s| match t.ast.kind(s) {
                NodeKind::Subroutine { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(subs, vec!["start", "helper"]);
    }

    #[test]
    fn test_nonconst_initializer_split() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        let a = t.var(sub, "a", DataType::Ubyte);
        let aref = t.ident_to("a", a);
        let one = t.lit(1, DataType::Ubyte);
        let sum = t.binary(aref, BinaryOperator::Add, one);
        t.var_init(sub, "b", DataType::Ubyte, sum);
        run(&mut t);

        let stmts = t.ast.statements(sub).to_vec();
        // decl a, decl b (bare), then the assignment
        let decls = stmts
            .iter()
            .filter(|&&s| matches!(t.ast.kind(s), NodeKind::VarDecl { .. }))
            .count();
        assert_eq!(decls, 2);
        let assigns: Vec<NodeId> = stmts
            .iter()
            .copied()
            .filter(|&s| matches!(t.ast.kind(s), NodeKind::Assignment { .. }))
            .collect();
        assert_eq!(assigns.len(), 1);
        // The declaration itself no longer carries the initializer.
        for &s in &stmts {
            if let NodeKind::VarDecl {
                name, value: Some(_), ..
            } = t.ast.kind(s)
            {
                panic!("vardecl '{}' kept its non-constant initializer", name);
            }
        }
    }

    #[test]
    fn test_augmented_assignment_desugared() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        let x = t.var(sub, "x", DataType::Ubyte);
        let target = t.target_var("x", Some(x));
        let five = t.lit(5, DataType::Ubyte);
        let assign = t.assign_aug(sub, target, BinaryOperator::Add, five);
        run(&mut t);

        let NodeKind::Assignment {
            aug_op: None,
            value,
            ..
        } = t.ast.kind(assign)
        else {
            panic!("augmented operator survived desugaring");
        };
        let NodeKind::BinaryExpr { left, op, .. } = t.ast.kind(*value) else {
            panic!("value is not the rewritten binary expression");
        };
        assert_eq!(*op, BinaryOperator::Add);
        assert_eq!(t.ast.identifier_target(*left), Some(x));
    }

    #[test]
    fn test_struct_assignment_flattened() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        t.struct_decl(
            block,
            "Point",
            &[("x", DataType::Ubyte), ("y", DataType::Ubyte)],
        );
        let sub = t.subroutine(block, "start");
        let p1 = t.struct_var(sub, "p1", "Point");
        let p2 = t.struct_var(sub, "p2", "Point");
        let p2ref = t.ident_to("p2", p2);
        let target = t.target_var("p1", Some(p1));
        t.assign(sub, target, p2ref);

        run(&mut t);

        let stmts = t.ast.statements(sub).to_vec();
        let decl_names: Vec<String> = stmts
            .iter()
            .filter_map(|&s| match t.ast.kind(s) {
                NodeKind::VarDecl { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert!(decl_names.contains(&"p1$x".to_string()));
        assert!(decl_names.contains(&"p2$y".to_string()));
        assert_eq!(decl_names.len(), 4);

        // Two memberwise assignments replace the struct assignment.
        let assigns = stmts
            .iter()
            .filter(|&&s| matches!(t.ast.kind(s), NodeKind::Assignment { .. }))
            .count();
        assert_eq!(assigns, 2);
    }

    #[test]
    fn test_struct_value_list_count_mismatch() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        t.struct_decl(
            block,
            "Point",
            &[("x", DataType::Ubyte), ("y", DataType::Ubyte)],
        );
        let sub = t.subroutine(block, "start");
        let p = t.struct_var(sub, "p", "Point");
        let e1 = t.lit(1, DataType::Ubyte);
        let arr = t.ast.add_detached(
            NodeKind::ArrayLiteral {
                elements: vec![e1],
                dt: DataType::ArrayUbyte,
            },
            crate::error::Position::builtin(),
        );
        let target = t.target_var("p", Some(p));
        t.assign(sub, target, arr);

        let diags = run(&mut t);
        assert!(diags
            .iter()
            .any(|d| d.code == DiagnosticCode::StructElementMismatch));
    }

    #[test]
    fn test_when_choices_sorted() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        let x = t.var(sub, "x", DataType::Ubyte);
        let cond = t.ident_to("x", x);

        let v9 = t.lit(9, DataType::Ubyte);
        let c1 = t.ast.add_detached(
            NodeKind::WhenChoice {
                values: vec![v9],
                statements: vec![],
            },
            crate::error::Position::builtin(),
        );
        let else_arm = t.ast.add_detached(
            NodeKind::WhenChoice {
                values: vec![],
                statements: vec![],
            },
            crate::error::Position::builtin(),
        );
        let v2 = t.lit(2, DataType::Ubyte);
        let c2 = t.ast.add_detached(
            NodeKind::WhenChoice {
                values: vec![v2],
                statements: vec![],
            },
            crate::error::Position::builtin(),
        );
        let when = t.ast.add_detached(
            NodeKind::When {
                condition: cond,
                choices: vec![c1, else_arm, c2],
            },
            crate::error::Position::builtin(),
        );
        t.ast.insert_last(sub, when).unwrap();

        run(&mut t);
        assert_eq!(t.ast.statements(when), &[c2, c1, else_arm]);
    }
}
