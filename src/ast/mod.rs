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

//! The abstract syntax tree of the P8C compiler.
//!
//! Nodes are stored in an arena ([`Ast`]) and addressed through stable
//! [`NodeId`] indices. Ids stay valid for the whole compilation: removing a
//! node only detaches it from its parent's child list, it never invalidates
//! other ids, so cross-references recorded by earlier passes survive later
//! tree surgery.
//!
//! Structural changes go through a small set of surgery primitives
//! (`replace_child`, `remove_child`, the `insert_*` family and
//! `reorder_statements`). Rewriting passes do not call these directly; they
//! queue [`walker::Modification`] values which are applied between
//! traversals.

pub mod builder;
mod nodes;
mod types;
pub mod walker;

pub use builder::TreeBuilder;
pub use nodes::*;
pub use types::*;

use crate::error::{CompilerError, Position, Result};
use std::collections::HashMap;

/// A stable index of a node in the [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// The sentinel id used for "no node" parent links.
    pub const NONE: NodeId = NodeId(u32::MAX);

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    /// What this node is.
    pub kind: NodeKind,
    /// The parent node, or [`NodeId::NONE`] for the Program root.
    pub parent: NodeId,
    /// Source position.
    pub pos: Position,
    /// Memoized dotted path from the Program root, for declarations.
    /// Populated by name resolution, invalidated when a declaration moves.
    pub scoped_name: Option<String>,
}

/// The result of a scope-chain name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    /// Exactly one declaration was found.
    Found(NodeId),
    /// No binding is reachable.
    NotFound,
    /// Two bindings are reachable at the same distance.
    Ambiguous,
}

/// Generator for compiler-created names.
#[derive(Debug, Default)]
pub struct NameGen {
    counters: HashMap<String, u32>,
}

impl NameGen {
    /// Create a new name generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next unique name with the given prefix.
    pub fn next(&mut self, prefix: &str) -> String {
        let n = self.counters.entry(prefix.to_string()).or_insert(0);
        *n += 1;
        format!("{}_{}", prefix, n)
    }
}

/// The AST arena.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    /// Create a new tree containing only the Program root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Program { modules: vec![] },
                parent: NodeId::NONE,
                pos: Position::builtin(),
                scoped_name: None,
            }],
        }
    }

    /// The Program root node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Access a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Access a node mutably.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Access a node's kind.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    /// Access a node's kind mutably.
    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    /// A node's source position.
    pub fn pos(&self, id: NodeId) -> Position {
        self.nodes[id.index()].pos.clone()
    }

    /// Total number of allocated nodes, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds only the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    // ------------------------------ creation ------------------------------

    /// Allocate a node without linking it anywhere. The children already
    /// referenced by `kind` are adopted.
    pub fn add_detached(&mut self, kind: NodeKind, pos: Position) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let children = Self::kind_children(&kind);
        self.nodes.push(Node {
            kind,
            parent: NodeId::NONE,
            pos,
            scoped_name: None,
        });
        for child in children {
            self.nodes[child.index()].parent = id;
        }
        id
    }

    /// Allocate a node and append it to the parent's primary child list.
    pub fn append(&mut self, parent: NodeId, kind: NodeKind, pos: Position) -> Result<NodeId> {
        let id = self.add_detached(kind, pos);
        self.insert_last(parent, id)?;
        Ok(id)
    }

    // ------------------------------ children ------------------------------

    /// All direct children of a node, in source order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        Self::kind_children(self.kind(id))
    }

    fn kind_children(kind: &NodeKind) -> Vec<NodeId> {
        let mut out = Vec::new();
        match kind {
            NodeKind::Program { modules } => out.extend(modules),
            NodeKind::Module { statements, .. }
            | NodeKind::Block { statements, .. }
            | NodeKind::Subroutine { statements, .. }
            | NodeKind::AnonymousScope { statements } => out.extend(statements),
            NodeKind::VarDecl { value, .. } => out.extend(value.iter()),
            NodeKind::StructDecl { members, .. } => out.extend(members),
            NodeKind::Assignment { target, value, .. } => {
                out.push(*target);
                out.push(*value);
            }
            NodeKind::AssignTarget {
                identifier,
                array_indexed,
                memory_address,
                ..
            } => {
                out.extend(identifier.iter());
                out.extend(array_indexed.iter());
                out.extend(memory_address.iter());
            }
            NodeKind::PostIncrDecr { target, .. } => out.push(*target),
            NodeKind::FunctionCallStatement { call } => out.push(*call),
            NodeKind::Return { values } => out.extend(values),
            NodeKind::Jump { identifier, .. } => out.extend(identifier.iter()),
            NodeKind::IfElse {
                condition,
                truepart,
                elsepart,
            } => {
                out.push(*condition);
                out.extend(truepart);
                out.extend(elsepart);
            }
            NodeKind::Branch {
                truepart, elsepart, ..
            } => {
                out.extend(truepart);
                out.extend(elsepart);
            }
            NodeKind::ForLoop {
                loopvar,
                iterable,
                statements,
            } => {
                out.push(*loopvar);
                out.push(*iterable);
                out.extend(statements);
            }
            NodeKind::WhileLoop {
                condition,
                statements,
            }
            | NodeKind::UntilLoop {
                condition,
                statements,
            } => {
                out.push(*condition);
                out.extend(statements);
            }
            NodeKind::RepeatLoop { count, statements } => {
                out.push(*count);
                out.extend(statements);
            }
            NodeKind::When { condition, choices } => {
                out.push(*condition);
                out.extend(choices);
            }
            NodeKind::WhenChoice { values, statements } => {
                out.extend(values);
                out.extend(statements);
            }
            NodeKind::ArrayLiteral { elements, .. } => out.extend(elements),
            NodeKind::BinaryExpr { left, right, .. } => {
                out.push(*left);
                out.push(*right);
            }
            NodeKind::PrefixExpr { expr, .. } | NodeKind::TypecastExpr { expr, .. } => {
                out.push(*expr)
            }
            NodeKind::FunctionCall { target, args } => {
                out.push(*target);
                out.extend(args);
            }
            NodeKind::DirectMemoryRead { address } => out.push(*address),
            NodeKind::AddressOf { identifier } => out.push(*identifier),
            NodeKind::RangeExpr { from, to, step } => {
                out.push(*from);
                out.push(*to);
                out.extend(step.iter());
            }
            NodeKind::ArrayIndexedRef { identifier, index } => {
                out.push(*identifier);
                out.push(*index);
            }
            NodeKind::Label { .. }
            | NodeKind::Directive { .. }
            | NodeKind::Break
            | NodeKind::InlineAssembly { .. }
            | NodeKind::NoOp
            | NodeKind::NumericLiteral { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::IdentifierRef { .. } => {}
        }
        out
    }

    fn replace_in_kind(kind: &mut NodeKind, old: NodeId, new: NodeId) -> bool {
        fn rep_vec(v: &mut Vec<NodeId>, old: NodeId, new: NodeId) -> bool {
            if let Some(i) = v.iter().position(|&c| c == old) {
                v[i] = new;
                true
            } else {
                false
            }
        }
        fn rep_slot(s: &mut NodeId, old: NodeId, new: NodeId) -> bool {
            if *s == old {
                *s = new;
                true
            } else {
                false
            }
        }
        fn rep_opt(s: &mut Option<NodeId>, old: NodeId, new: NodeId) -> bool {
            if *s == Some(old) {
                *s = Some(new);
                true
            } else {
                false
            }
        }

        match kind {
            NodeKind::Program { modules } => rep_vec(modules, old, new),
            NodeKind::Module { statements, .. }
            | NodeKind::Block { statements, .. }
            | NodeKind::Subroutine { statements, .. }
            | NodeKind::AnonymousScope { statements } => rep_vec(statements, old, new),
            NodeKind::VarDecl { value, .. } => rep_opt(value, old, new),
            NodeKind::StructDecl { members, .. } => rep_vec(members, old, new),
            NodeKind::Assignment { target, value, .. } => {
                rep_slot(target, old, new) || rep_slot(value, old, new)
            }
            NodeKind::AssignTarget {
                identifier,
                array_indexed,
                memory_address,
                ..
            } => {
                rep_opt(identifier, old, new)
                    || rep_opt(array_indexed, old, new)
                    || rep_opt(memory_address, old, new)
            }
            NodeKind::PostIncrDecr { target, .. } => rep_slot(target, old, new),
            NodeKind::FunctionCallStatement { call } => rep_slot(call, old, new),
            NodeKind::Return { values } => rep_vec(values, old, new),
            NodeKind::Jump { identifier, .. } => rep_opt(identifier, old, new),
            NodeKind::IfElse {
                condition,
                truepart,
                elsepart,
            } => {
                rep_slot(condition, old, new)
                    || rep_vec(truepart, old, new)
                    || rep_vec(elsepart, old, new)
            }
            NodeKind::Branch {
                truepart, elsepart, ..
            } => rep_vec(truepart, old, new) || rep_vec(elsepart, old, new),
            NodeKind::ForLoop {
                loopvar,
                iterable,
                statements,
            } => {
                rep_slot(loopvar, old, new)
                    || rep_slot(iterable, old, new)
                    || rep_vec(statements, old, new)
            }
            NodeKind::WhileLoop {
                condition,
                statements,
            }
            | NodeKind::UntilLoop {
                condition,
                statements,
            } => rep_slot(condition, old, new) || rep_vec(statements, old, new),
            NodeKind::RepeatLoop { count, statements } => {
                rep_slot(count, old, new) || rep_vec(statements, old, new)
            }
            NodeKind::When { condition, choices } => {
                rep_slot(condition, old, new) || rep_vec(choices, old, new)
            }
            NodeKind::WhenChoice { values, statements } => {
                rep_vec(values, old, new) || rep_vec(statements, old, new)
            }
            NodeKind::ArrayLiteral { elements, .. } => rep_vec(elements, old, new),
            NodeKind::BinaryExpr { left, right, .. } => {
                rep_slot(left, old, new) || rep_slot(right, old, new)
            }
            NodeKind::PrefixExpr { expr, .. } | NodeKind::TypecastExpr { expr, .. } => {
                rep_slot(expr, old, new)
            }
            NodeKind::FunctionCall { target, args } => {
                rep_slot(target, old, new) || rep_vec(args, old, new)
            }
            NodeKind::DirectMemoryRead { address } => rep_slot(address, old, new),
            NodeKind::AddressOf { identifier } => rep_slot(identifier, old, new),
            NodeKind::RangeExpr { from, to, step } => {
                rep_slot(from, old, new) || rep_slot(to, old, new) || rep_opt(step, old, new)
            }
            NodeKind::ArrayIndexedRef { identifier, index } => {
                rep_slot(identifier, old, new) || rep_slot(index, old, new)
            }
            _ => false,
        }
    }

    // ---------------------------- tree surgery ----------------------------

    /// Replace `old` with `new` in the parent's child slots.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> Result<()> {
        if !Self::replace_in_kind(&mut self.nodes[parent.index()].kind, old, new) {
            return Err(CompilerError::ChildNotFound {
                parent: self.describe(parent),
                child: self.describe(old),
            });
        }
        self.nodes[new.index()].parent = parent;
        Ok(())
    }

    /// Detach a child from its parent's child list.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_desc = self.describe(parent);
        let child_desc = self.describe(child);
        let kind = &mut self.nodes[parent.index()].kind;
        match Self::list_containing(kind, child) {
            Some(list) => {
                list.retain(|&c| c != child);
                Ok(())
            }
            None => Err(CompilerError::ChildNotFound {
                parent: parent_desc,
                child: child_desc,
            }),
        }
    }

    /// Insert `new` directly before `anchor` in the parent's child list.
    pub fn insert_before(&mut self, parent: NodeId, anchor: NodeId, new: NodeId) -> Result<()> {
        self.insert_at_anchor(parent, anchor, new, 0)
    }

    /// Insert `new` directly after `anchor` in the parent's child list.
    pub fn insert_after(&mut self, parent: NodeId, anchor: NodeId, new: NodeId) -> Result<()> {
        self.insert_at_anchor(parent, anchor, new, 1)
    }

    fn insert_at_anchor(
        &mut self,
        parent: NodeId,
        anchor: NodeId,
        new: NodeId,
        offset: usize,
    ) -> Result<()> {
        let parent_desc = self.describe(parent);
        let anchor_desc = self.describe(anchor);
        {
            let kind = &mut self.nodes[parent.index()].kind;
            match Self::list_containing(kind, anchor) {
                Some(list) => {
                    let i = list
                        .iter()
                        .position(|&c| c == anchor)
                        .map(|i| i + offset)
                        .unwrap_or(list.len());
                    list.insert(i, new);
                }
                None => {
                    return Err(CompilerError::ChildNotFound {
                        parent: parent_desc,
                        child: anchor_desc,
                    })
                }
            }
        }
        self.nodes[new.index()].parent = parent;
        Ok(())
    }

    /// Insert `new` as the first entry of the parent's primary child list.
    pub fn insert_first(&mut self, parent: NodeId, new: NodeId) -> Result<()> {
        self.insert_at_edge(parent, new, true)
    }

    /// Insert `new` as the last entry of the parent's primary child list.
    pub fn insert_last(&mut self, parent: NodeId, new: NodeId) -> Result<()> {
        self.insert_at_edge(parent, new, false)
    }

    fn insert_at_edge(&mut self, parent: NodeId, new: NodeId, front: bool) -> Result<()> {
        let desc = self.describe(parent);
        {
            let kind = &mut self.nodes[parent.index()].kind;
            match Self::primary_list(kind) {
                Some(list) => {
                    if front {
                        list.insert(0, new);
                    } else {
                        list.push(new);
                    }
                }
                None => {
                    return Err(CompilerError::Internal(format!(
                        "{} has no statement list",
                        desc
                    )))
                }
            }
        }
        self.nodes[new.index()].parent = parent;
        Ok(())
    }

    /// Reorder the parent's primary child list. The new order must be a
    /// permutation of the current one.
    pub fn reorder_statements(&mut self, parent: NodeId, new_order: Vec<NodeId>) -> Result<()> {
        let desc = self.describe(parent);
        let current = self.statements(parent).to_vec();
        if current.len() != new_order.len() {
            return Err(CompilerError::Internal(format!(
                "reorder of {} changes statement count",
                desc
            )));
        }
        let mut check: Vec<NodeId> = new_order.clone();
        check.sort();
        let mut have: Vec<NodeId> = current;
        have.sort();
        if check != have {
            return Err(CompilerError::Internal(format!(
                "reorder of {} is not a permutation",
                desc
            )));
        }
        let kind = &mut self.nodes[parent.index()].kind;
        match Self::primary_list(kind) {
            Some(list) => {
                *list = new_order;
                Ok(())
            }
            None => Err(CompilerError::Internal(format!(
                "{} has no statement list",
                desc
            ))),
        }
    }

    /// The primary statement list of a container node.
    pub fn statements(&self, id: NodeId) -> &[NodeId] {
        match self.kind(id) {
            NodeKind::Program { modules } => modules,
            NodeKind::Module { statements, .. }
            | NodeKind::Block { statements, .. }
            | NodeKind::Subroutine { statements, .. }
            | NodeKind::AnonymousScope { statements }
            | NodeKind::ForLoop { statements, .. }
            | NodeKind::WhileLoop { statements, .. }
            | NodeKind::UntilLoop { statements, .. }
            | NodeKind::RepeatLoop { statements, .. }
            | NodeKind::WhenChoice { statements, .. } => statements,
            NodeKind::StructDecl { members, .. } => members,
            NodeKind::When { choices, .. } => choices,
            _ => &[],
        }
    }

    fn primary_list(kind: &mut NodeKind) -> Option<&mut Vec<NodeId>> {
        match kind {
            NodeKind::Program { modules } => Some(modules),
            NodeKind::Module { statements, .. }
            | NodeKind::Block { statements, .. }
            | NodeKind::Subroutine { statements, .. }
            | NodeKind::AnonymousScope { statements }
            | NodeKind::ForLoop { statements, .. }
            | NodeKind::WhileLoop { statements, .. }
            | NodeKind::UntilLoop { statements, .. }
            | NodeKind::RepeatLoop { statements, .. }
            | NodeKind::WhenChoice { statements, .. } => Some(statements),
            NodeKind::StructDecl { members, .. } => Some(members),
            NodeKind::When { choices, .. } => Some(choices),
            _ => None,
        }
    }

    fn list_containing(kind: &mut NodeKind, child: NodeId) -> Option<&mut Vec<NodeId>> {
        let lists: Vec<&mut Vec<NodeId>> = match kind {
            NodeKind::Program { modules } => vec![modules],
            NodeKind::Module { statements, .. }
            | NodeKind::Block { statements, .. }
            | NodeKind::Subroutine { statements, .. }
            | NodeKind::AnonymousScope { statements } => vec![statements],
            NodeKind::StructDecl { members, .. } => vec![members],
            NodeKind::Return { values } => vec![values],
            NodeKind::IfElse {
                truepart, elsepart, ..
            }
            | NodeKind::Branch {
                truepart, elsepart, ..
            } => vec![truepart, elsepart],
            NodeKind::ForLoop { statements, .. }
            | NodeKind::WhileLoop { statements, .. }
            | NodeKind::UntilLoop { statements, .. }
            | NodeKind::RepeatLoop { statements, .. } => vec![statements],
            NodeKind::When { choices, .. } => vec![choices],
            NodeKind::WhenChoice { values, statements } => vec![values, statements],
            NodeKind::ArrayLiteral { elements, .. } => vec![elements],
            NodeKind::FunctionCall { args, .. } => vec![args],
            _ => vec![],
        };
        lists.into_iter().find(|l| l.contains(&child))
    }

    fn describe(&self, id: NodeId) -> String {
        format!("{} {}", self.kind(id).kind_name(), id)
    }

    // ------------------------------- scopes -------------------------------

    /// The nearest enclosing scope node, not counting the node itself.
    pub fn enclosing_scope(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.node(id).parent;
        while cur != NodeId::NONE {
            if self.kind(cur).is_scope() {
                return Some(cur);
            }
            cur = self.node(cur).parent;
        }
        None
    }

    /// The module a node belongs to.
    pub fn module_of(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = id;
        while cur != NodeId::NONE {
            if matches!(self.kind(cur), NodeKind::Module { .. }) {
                return Some(cur);
            }
            cur = self.node(cur).parent;
        }
        None
    }

    /// Named declarations directly inside a scope.
    fn named_children(&self, scope: NodeId, name: &str) -> Vec<NodeId> {
        let mut matches = Vec::new();
        for child in self.statements(scope) {
            if self.kind(*child).symbol_name() == Some(name) {
                matches.push(*child);
            }
        }
        matches
    }

    /// Look up a dotted name path starting from the scope chain of `from`.
    ///
    /// The head of the path is searched in the enclosing scopes walking
    /// outward; once found, the remaining segments follow named children.
    /// At the Program root the search also covers every module's blocks,
    /// which are visible across modules.
    pub fn lookup(&self, path: &[String], from: NodeId) -> LookupResult {
        if path.is_empty() {
            return LookupResult::NotFound;
        }
        let head = &path[0];

        let mut scope = if self.kind(from).is_scope() {
            Some(from)
        } else {
            self.enclosing_scope(from)
        };
        while let Some(s) = scope {
            let matches = self.named_children(s, head);
            match matches.len() {
                0 => {}
                1 => return self.follow_path(matches[0], &path[1..]),
                _ => return LookupResult::Ambiguous,
            }
            // Subroutine parameters live as implicit vardecls in the body,
            // so the statement search above already covers them.
            scope = self.enclosing_scope(s);
        }
        self.lookup_global(path)
    }

    /// Look up a dotted name path starting from the Program root.
    pub fn lookup_absolute(&self, path: &[String]) -> LookupResult {
        if path.is_empty() {
            return LookupResult::NotFound;
        }
        self.lookup_global(path)
    }

    fn lookup_global(&self, path: &[String]) -> LookupResult {
        let head = &path[0];
        let mut matches = Vec::new();
        for module in self.statements(self.root()) {
            if self.kind(*module).symbol_name() == Some(head) {
                matches.push(*module);
            }
            for stmt in self.statements(*module) {
                if matches!(self.kind(*stmt), NodeKind::Block { .. })
                    && self.kind(*stmt).symbol_name() == Some(head)
                {
                    matches.push(*stmt);
                }
            }
        }
        match matches.len() {
            0 => LookupResult::NotFound,
            1 => self.follow_path(matches[0], &path[1..]),
            _ => LookupResult::Ambiguous,
        }
    }

    fn follow_path(&self, mut node: NodeId, rest: &[String]) -> LookupResult {
        for segment in rest {
            let matches = self.named_children(node, segment);
            match matches.len() {
                0 => return LookupResult::NotFound,
                1 => node = matches[0],
                _ => return LookupResult::Ambiguous,
            }
        }
        LookupResult::Found(node)
    }

    /// Compute the canonical dotted path of a declaration, from the Program
    /// root down. Module names are not part of the path; blocks are the
    /// outermost naming unit in the emitted assembly.
    pub fn compute_scoped_name(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        if let Some(name) = self.kind(id).symbol_name() {
            parts.push(name.to_string());
        }
        let mut cur = self.node(id).parent;
        while cur != NodeId::NONE {
            let kind = self.kind(cur);
            if kind.is_scope() && !matches!(kind, NodeKind::Program { .. } | NodeKind::Module { .. })
            {
                if let Some(name) = kind.symbol_name() {
                    parts.push(name.to_string());
                }
            }
            cur = self.node(cur).parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// The cached scoped name of a declaration, computing and memoizing it
    /// on first use.
    pub fn scoped_name(&mut self, id: NodeId) -> String {
        if let Some(name) = &self.nodes[id.index()].scoped_name {
            return name.clone();
        }
        let name = self.compute_scoped_name(id);
        self.nodes[id.index()].scoped_name = Some(name.clone());
        name
    }

    /// Drop the memoized scoped name of a declaration and its subtree.
    /// Passes that move declarations across scopes call this.
    pub fn invalidate_scoped_names(&mut self, id: NodeId) {
        self.nodes[id.index()].scoped_name = None;
        for child in self.children(id) {
            self.invalidate_scoped_names(child);
        }
    }

    // ------------------------------ utilities ------------------------------

    /// The resolved declaration of an identifier reference.
    pub fn identifier_target(&self, id: NodeId) -> Option<NodeId> {
        match self.kind(id) {
            NodeKind::IdentifierRef { target, .. } => *target,
            _ => None,
        }
    }

    /// The value of an integer literal node.
    pub fn integer_literal_value(&self, id: NodeId) -> Option<i64> {
        match self.kind(id) {
            NodeKind::NumericLiteral {
                value: NumericValue::Integer(v),
                ..
            } => Some(*v),
            _ => None,
        }
    }

    /// Whether this expression is a compile-time literal.
    pub fn is_literal(&self, id: NodeId) -> bool {
        matches!(
            self.kind(id),
            NodeKind::NumericLiteral { .. }
                | NodeKind::StringLiteral { .. }
                | NodeKind::ArrayLiteral { .. }
        )
    }

    /// Deep-copy a subtree, returning the id of the new detached root.
    /// Resolved identifier targets keep pointing at the original
    /// declarations.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let mut kind = self.kind(id).clone();
        let pos = self.pos(id);
        let children = Self::kind_children(&kind);
        for child in children {
            let copy = self.clone_subtree(child);
            Self::replace_in_kind(&mut kind, child, copy);
        }
        self.add_detached(kind, pos)
    }

    /// Structural equality of two expressions: same shape, same operators,
    /// same literal values, identifiers resolving to the same declaration.
    pub fn exprs_equal(&self, a: NodeId, b: NodeId) -> bool {
        match (self.kind(a), self.kind(b)) {
            (
                NodeKind::NumericLiteral { value: v1, dt: d1 },
                NodeKind::NumericLiteral { value: v2, dt: d2 },
            ) => v1 == v2 && d1 == d2,
            (NodeKind::StringLiteral { value: v1 }, NodeKind::StringLiteral { value: v2 }) => {
                v1 == v2
            }
            (
                NodeKind::IdentifierRef {
                    path: p1,
                    target: t1,
                },
                NodeKind::IdentifierRef {
                    path: p2,
                    target: t2,
                },
            ) => match (t1, t2) {
                (Some(t1), Some(t2)) => t1 == t2,
                _ => p1 == p2,
            },
            (
                NodeKind::BinaryExpr {
                    left: l1,
                    op: o1,
                    right: r1,
                },
                NodeKind::BinaryExpr {
                    left: l2,
                    op: o2,
                    right: r2,
                },
            ) => o1 == o2 && self.exprs_equal(*l1, *l2) && self.exprs_equal(*r1, *r2),
            (
                NodeKind::PrefixExpr { op: o1, expr: e1 },
                NodeKind::PrefixExpr { op: o2, expr: e2 },
            ) => o1 == o2 && self.exprs_equal(*e1, *e2),
            (
                NodeKind::TypecastExpr { dt: d1, expr: e1, .. },
                NodeKind::TypecastExpr { dt: d2, expr: e2, .. },
            ) => d1 == d2 && self.exprs_equal(*e1, *e2),
            (
                NodeKind::DirectMemoryRead { address: a1 },
                NodeKind::DirectMemoryRead { address: a2 },
            ) => self.exprs_equal(*a1, *a2),
            (NodeKind::AddressOf { identifier: i1 }, NodeKind::AddressOf { identifier: i2 }) => {
                self.exprs_equal(*i1, *i2)
            }
            (
                NodeKind::ArrayIndexedRef {
                    identifier: i1,
                    index: x1,
                },
                NodeKind::ArrayIndexedRef {
                    identifier: i2,
                    index: x2,
                },
            ) => self.exprs_equal(*i1, *i2) && self.exprs_equal(*x1, *x2),
            _ => false,
        }
    }

    /// Whether the subtree rooted at `tree` contains a reference resolving
    /// to the declaration `decl`.
    pub fn mentions(&self, tree: NodeId, decl: NodeId) -> bool {
        if self.identifier_target(tree) == Some(decl) {
            return true;
        }
        self.children(tree).iter().any(|&c| self.mentions(c, decl))
    }

    /// Verify that every node reachable from the root has its parent link
    /// set to the node it is listed under.
    pub fn verify_parent_links(&self) -> Result<()> {
        self.verify_links_from(self.root())
    }

    fn verify_links_from(&self, id: NodeId) -> Result<()> {
        for child in self.children(id) {
            if self.node(child).parent != id {
                return Err(CompilerError::MissingParent(self.describe(child)));
            }
            self.verify_links_from(child)?;
        }
        Ok(())
    }
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}
