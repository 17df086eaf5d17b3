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

//! The caller/callee relation between subroutines.
//!
//! Built from function call statements, call expressions and identifier
//! references that resolve to subroutines (taking the address of a
//! subroutine keeps it alive). Callers are the enclosing subroutine of the
//! call site, or the enclosing block for block-level code.

use crate::ast::{Ast, NodeId, NodeKind};
use crate::error::{DiagnosticCode, Diagnostics};
use indexmap::{IndexMap, IndexSet};

/// The call graph of a program.
#[derive(Debug, Default)]
pub struct CallGraph {
    calls: IndexMap<NodeId, IndexSet<NodeId>>,
    called_by: IndexMap<NodeId, IndexSet<NodeId>>,
}

impl CallGraph {
    /// Build the graph by walking every call site in the tree.
    pub fn build(ast: &Ast) -> Self {
        let mut graph = CallGraph::default();
        graph.scan(ast, ast.root());
        graph
    }

    fn scan(&mut self, ast: &Ast, node: NodeId) {
        let callee = match ast.kind(node) {
            NodeKind::FunctionCall { target, .. } => ast.identifier_target(*target),
            NodeKind::Jump {
                identifier: Some(ident),
                ..
            } => ast.identifier_target(*ident),
            NodeKind::IdentifierRef { target, .. } => *target,
            _ => None,
        };
        if let Some(callee) = callee {
            if matches!(ast.kind(callee), NodeKind::Subroutine { .. }) {
                if let Some(caller) = Self::call_site_scope(ast, node) {
                    self.add_call(caller, callee);
                }
            }
        }
        for child in ast.children(node) {
            self.scan(ast, child);
        }
    }

    fn call_site_scope(ast: &Ast, node: NodeId) -> Option<NodeId> {
        let mut cur = ast.enclosing_scope(node);
        while let Some(scope) = cur {
            if matches!(
                ast.kind(scope),
                NodeKind::Subroutine { .. } | NodeKind::Block { .. }
            ) {
                return Some(scope);
            }
            cur = ast.enclosing_scope(scope);
        }
        None
    }

    fn add_call(&mut self, caller: NodeId, callee: NodeId) {
        self.calls.entry(caller).or_default().insert(callee);
        self.called_by.entry(callee).or_default().insert(caller);
    }

    /// All call sites' scopes invoking the given subroutine.
    pub fn callers(&self, sub: NodeId) -> Vec<NodeId> {
        self.called_by
            .get(&sub)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All subroutines invoked from the given scope.
    pub fn callees(&self, scope: NodeId) -> Vec<NodeId> {
        self.calls
            .get(&scope)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether a subroutine has any caller at all.
    pub fn has_callers(&self, sub: NodeId) -> bool {
        self.called_by
            .get(&sub)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }

    /// Every scope transitively reachable from the entry point, the entry
    /// point's enclosing block included.
    pub fn reachable_from(&self, ast: &Ast, entry: NodeId) -> IndexSet<NodeId> {
        let mut reached = IndexSet::new();
        let mut work = vec![entry];
        if let Some(block) = ast.enclosing_scope(entry) {
            work.push(block);
        }
        while let Some(scope) = work.pop() {
            if !reached.insert(scope) {
                continue;
            }
            if let Some(callees) = self.calls.get(&scope) {
                work.extend(callees.iter().copied());
            }
        }
        reached
    }

    /// Run an action for every subroutine of every block, in program order.
    pub fn for_all_subroutines(ast: &Ast, mut action: impl FnMut(&Ast, NodeId)) {
        for module in ast.statements(ast.root()).to_vec() {
            for block in ast.statements(module).to_vec() {
                if !matches!(ast.kind(block), NodeKind::Block { .. }) {
                    continue;
                }
                for stmt in ast.statements(block).to_vec() {
                    if matches!(ast.kind(stmt), NodeKind::Subroutine { .. }) {
                        action(ast, stmt);
                    }
                }
            }
        }
    }

    /// Report recursion as a warning. A cycle does not abort compilation.
    pub fn report_recursion(&self, ast: &mut Ast, diags: &mut Diagnostics) {
        let subs: Vec<NodeId> = self
            .calls
            .keys()
            .copied()
            .filter(|&s| matches!(ast.kind(s), NodeKind::Subroutine { .. }))
            .collect();
        for &sub in &subs {
            if self.reaches(sub, sub, &mut IndexSet::new()) {
                let name = ast.scoped_name(sub);
                let pos = ast.pos(sub);
                diags.warn(
                    DiagnosticCode::RecursionDetected,
                    format!("subroutine '{}' calls itself, directly or indirectly", name),
                    pos,
                );
                return;
            }
        }
    }

    fn reaches(&self, from: NodeId, to: NodeId, seen: &mut IndexSet<NodeId>) -> bool {
        if let Some(callees) = self.calls.get(&from) {
            for &callee in callees {
                if callee == to {
                    return true;
                }
                if seen.insert(callee) && self.reaches(callee, to, seen) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DataType, TreeBuilder};

    #[test]
    fn test_direct_call_recorded() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let start = t.subroutine(block, "start");
        let helper = t.subroutine(block, "helper");
        let href = t.ident_to("helper", helper);
        t.call_stmt(start, href);

        let graph = CallGraph::build(&t.ast);
        assert_eq!(graph.callers(helper), vec![start]);
        assert_eq!(graph.callees(start), vec![helper]);
        assert!(graph.has_callers(helper));
        assert!(!graph.has_callers(start));
    }

    #[test]
    fn test_reachability() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let start = t.subroutine(block, "start");
        let a = t.subroutine(block, "a");
        let b = t.subroutine(block, "b");
        let orphan = t.subroutine(block, "orphan");
        let aref = t.ident_to("a", a);
        t.call_stmt(start, aref);
        let bref = t.ident_to("b", b);
        t.call_stmt(a, bref);

        let graph = CallGraph::build(&t.ast);
        let reached = graph.reachable_from(&t.ast, start);
        assert!(reached.contains(&a));
        assert!(reached.contains(&b));
        assert!(!reached.contains(&orphan));
    }

    #[test]
    fn test_address_of_counts_as_use() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let start = t.subroutine(block, "start");
        let irq = t.subroutine(block, "irq_handler");
        let w = t.var(start, "w", DataType::Uword);
        let iref = t.ident_to("irq_handler", irq);
        let addr = t.addr_of(iref);
        let target = t.target_var("w", Some(w));
        t.assign(start, target, addr);

        let graph = CallGraph::build(&t.ast);
        assert!(graph.has_callers(irq));
    }

    #[test]
    fn test_recursion_reported_not_fatal() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let rec = t.subroutine(block, "rec");
        let rref = t.ident_to("rec", rec);
        t.call_stmt(rec, rref);

        let graph = CallGraph::build(&t.ast);
        let mut diags = Diagnostics::new();
        graph.report_recursion(&mut t.ast, &mut diags);
        assert!(!diags.has_errors());
        assert!(diags
            .iter()
            .any(|d| d.code == DiagnosticCode::RecursionDetected));
    }
}
