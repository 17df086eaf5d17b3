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

//! Type inference and checking.
//!
//! Inference is structural and local: literals carry their type, identifier
//! references take their declaration's type, operators combine through the
//! promotion lattice. The checker validates assignments and initializers and
//! inserts implicit widening casts; narrowing requires either a literal that
//! provably fits or an explicit cast written by the programmer.

use crate::ast::walker::{self, AstWalker, Modification};
use crate::ast::{Ast, DataType, NodeId, NodeKind, NumericValue, PrefixOperator};
use crate::error::{DiagnosticCode, Diagnostics, Result};

/// Infer the type of an expression node. Returns `None` when the type is
/// not known, for example for unresolved references.
pub fn infer_type(ast: &Ast, expr: NodeId) -> Option<DataType> {
    match ast.kind(expr) {
        NodeKind::NumericLiteral { dt, .. } => Some(*dt),
        NodeKind::StringLiteral { .. } => Some(DataType::Str),
        NodeKind::ArrayLiteral { dt, .. } => Some(*dt),
        NodeKind::IdentifierRef { target, .. } => {
            let target = (*target)?;
            declaration_type(ast, target)
        }
        NodeKind::BinaryExpr { left, op, right } => {
            if op.is_comparison() {
                return Some(DataType::Ubyte);
            }
            let lt = infer_type(ast, *left)?;
            let rt = infer_type(ast, *right)?;
            DataType::promoted(lt, rt)
        }
        NodeKind::PrefixExpr { op, expr } => {
            let dt = infer_type(ast, *expr)?;
            match op {
                PrefixOperator::Not => Some(DataType::Ubyte),
                _ => Some(dt),
            }
        }
        NodeKind::TypecastExpr { dt, .. } => Some(*dt),
        NodeKind::FunctionCall { target, .. } => {
            let decl = ast.identifier_target(*target)?;
            match ast.kind(decl) {
                NodeKind::Subroutine { returns, .. } => returns.first().copied(),
                _ => None,
            }
        }
        NodeKind::DirectMemoryRead { .. } => Some(DataType::Ubyte),
        NodeKind::AddressOf { .. } => Some(DataType::Uword),
        NodeKind::RangeExpr { from, .. } => infer_type(ast, *from),
        NodeKind::ArrayIndexedRef { identifier, .. } => {
            let decl = ast.identifier_target(*identifier)?;
            declaration_type(ast, decl)?.element_type()
        }
        _ => None,
    }
}

/// The value type of a declaration node.
pub fn declaration_type(ast: &Ast, decl: NodeId) -> Option<DataType> {
    match ast.kind(decl) {
        NodeKind::VarDecl { dt, .. } => Some(*dt),
        NodeKind::Subroutine { returns, .. } => returns.first().copied(),
        NodeKind::Label { .. } | NodeKind::Block { .. } => Some(DataType::Uword),
        _ => None,
    }
}

/// The value type of an assignment target.
pub fn target_type(ast: &Ast, target: NodeId) -> Option<DataType> {
    match ast.kind(target) {
        NodeKind::AssignTarget {
            identifier,
            array_indexed,
            memory_address,
            register,
        } => {
            if let Some(ident) = identifier {
                let decl = ast.identifier_target(*ident)?;
                return declaration_type(ast, decl);
            }
            if let Some(indexed) = array_indexed {
                return infer_type(ast, *indexed);
            }
            if memory_address.is_some() {
                return Some(DataType::Ubyte);
            }
            if register.is_some() {
                return Some(DataType::Ubyte);
            }
            None
        }
        _ => None,
    }
}

/// The type checking pass.
pub struct TypeChecker<'a> {
    diags: &'a mut Diagnostics,
}

impl<'a> TypeChecker<'a> {
    /// Run the type checker over the whole tree.
    pub fn run(ast: &mut Ast, diags: &mut Diagnostics) -> Result<()> {
        let mut checker = TypeChecker { diags };
        walker::walk(&mut checker, ast)?;
        Ok(())
    }

    /// Make `value` compatible with `expected`, returning the modification
    /// that adjusts the value when one is needed.
    fn coerce(
        &mut self,
        ast: &mut Ast,
        value: NodeId,
        expected: DataType,
        context: &str,
    ) -> Vec<Modification> {
        let Some(value_dt) = infer_type(ast, value) else {
            return Vec::new();
        };
        if value_dt == expected {
            return Vec::new();
        }

        let parent = ast.node(value).parent;

        // A literal that provably fits is simply retyped.
        if let NodeKind::NumericLiteral {
            value: NumericValue::Integer(v),
            ..
        } = ast.kind(value)
        {
            let v = *v;
            if expected.is_numeric() && expected.value_fits(v) {
                let pos = ast.pos(value);
                let new = ast.add_detached(
                    NodeKind::NumericLiteral {
                        value: NumericValue::Integer(v),
                        dt: expected,
                    },
                    pos,
                );
                return vec![Modification::Replace {
                    old: value,
                    new,
                    parent,
                }];
            }
        }

        if value_dt.is_assignable_to(expected) {
            let pos = ast.pos(value);
            let cast = ast.add_detached(
                NodeKind::TypecastExpr {
                    dt: expected,
                    expr: value,
                    implicit: true,
                },
                pos,
            );
            return vec![Modification::Replace {
                old: value,
                new: cast,
                parent,
            }];
        }

        self.diags.error(
            DiagnosticCode::TypeMismatch,
            format!(
                "cannot assign {} to {} {}",
                value_dt.name(),
                expected.name(),
                context
            ),
            ast.pos(value),
        );
        Vec::new()
    }
}

impl<'a> AstWalker for TypeChecker<'a> {
    fn visit_assignment(&mut self, ast: &mut Ast, node: NodeId) -> Vec<Modification> {
        let NodeKind::Assignment { target, value, .. } = ast.kind(node) else {
            return Vec::new();
        };
        let (target, value) = (*target, *value);
        let Some(expected) = target_type(ast, target) else {
            return Vec::new();
        };
        if expected == DataType::Struct {
            // Memberwise expansion happens later; nothing to coerce here.
            return Vec::new();
        }
        self.coerce(ast, value, expected, "target")
    }

    fn visit_var_decl(&mut self, ast: &mut Ast, node: NodeId) -> Vec<Modification> {
        let NodeKind::VarDecl {
            kind,
            dt,
            array_size,
            value,
            ..
        } = ast.kind(node)
        else {
            return Vec::new();
        };
        let (kind, dt, array_size, value) = (*kind, *dt, *array_size, *value);
        // A memory-mapped declaration's value is its address, not an
        // initializer of the declared type.
        if kind == crate::ast::VarKind::Memory {
            return Vec::new();
        }
        let Some(value) = value else {
            return Vec::new();
        };

        if dt.is_array() {
            if let (Some(declared), NodeKind::ArrayLiteral { elements, .. }) =
                (array_size, ast.kind(value))
            {
                if elements.len() != declared as usize {
                    self.diags.error(
                        DiagnosticCode::InvalidDeclaration,
                        format!(
                            "array initializer has {} elements, declaration says {}",
                            elements.len(),
                            declared
                        ),
                        ast.pos(node),
                    );
                }
            }
            return Vec::new();
        }
        if dt == DataType::Struct || dt == DataType::Str {
            return Vec::new();
        }
        self.coerce(ast, value, dt, "variable")
    }

    fn visit_expression(&mut self, ast: &mut Ast, node: NodeId) -> Vec<Modification> {
        let NodeKind::BinaryExpr { left, op, right } = ast.kind(node) else {
            return Vec::new();
        };
        let (left, op, right) = (*left, *op, *right);
        // Shift counts keep their own type; the shifted value decides.
        if matches!(
            op,
            crate::ast::BinaryOperator::ShiftLeft | crate::ast::BinaryOperator::ShiftRight
        ) {
            return Vec::new();
        }
        let (Some(lt), Some(rt)) = (infer_type(ast, left), infer_type(ast, right)) else {
            return Vec::new();
        };
        if lt == rt || !lt.is_numeric() || !rt.is_numeric() {
            return Vec::new();
        }
        let Some(promoted) = DataType::promoted(lt, rt) else {
            return Vec::new();
        };
        if lt != promoted {
            self.coerce(ast, left, promoted, "operand")
        } else {
            self.coerce(ast, right, promoted, "operand")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::name_resolution::NameResolver;
    use crate::ast::{BinaryOperator, TreeBuilder};

    #[test]
    fn test_infer_literals() {
        let mut t = TreeBuilder::new();
        let b = t.lit(3, DataType::Ubyte);
        assert_eq!(infer_type(&t.ast, b), Some(DataType::Ubyte));
    }

    #[test]
    fn test_infer_binary_promotion() {
        let mut t = TreeBuilder::new();
        let a = t.lit(3, DataType::Ubyte);
        let b = t.lit(1000, DataType::Uword);
        let e = t.binary(a, BinaryOperator::Add, b);
        assert_eq!(infer_type(&t.ast, e), Some(DataType::Uword));
    }

    #[test]
    fn test_infer_memread_and_addressof() {
        let mut t = TreeBuilder::new();
        let addr = t.lit(53280, DataType::Uword);
        let mr = t.memread(addr);
        assert_eq!(infer_type(&t.ast, mr), Some(DataType::Ubyte));
    }

    #[test]
    fn test_widening_cast_inserted() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let w = t.var(block, "w", DataType::Uword);
        let x = t.var(block, "x", DataType::Ubyte);
        let xref = t.ident_to("x", x);
        let assign = t.assign_var(block, "w", w, xref);

        let mut diags = Diagnostics::new();
        NameResolver::run(&mut t.ast, &mut diags);
        TypeChecker::run(&mut t.ast, &mut diags).unwrap();
        assert!(!diags.has_errors());

        let NodeKind::Assignment { value, .. } = t.ast.kind(assign) else {
            panic!("not an assignment")
        };
        assert!(matches!(
            t.ast.kind(*value),
            NodeKind::TypecastExpr {
                dt: DataType::Uword,
                implicit: true,
                ..
            }
        ));
    }

    #[test]
    fn test_fitting_literal_retyped() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let w = t.var(block, "w", DataType::Uword);
        let lit = t.lit(5, DataType::Ubyte);
        let assign = t.assign_var(block, "w", w, lit);

        let mut diags = Diagnostics::new();
        NameResolver::run(&mut t.ast, &mut diags);
        TypeChecker::run(&mut t.ast, &mut diags).unwrap();

        let NodeKind::Assignment { value, .. } = t.ast.kind(assign) else {
            panic!("not an assignment")
        };
        assert_eq!(infer_type(&t.ast, *value), Some(DataType::Uword));
    }

    #[test]
    fn test_narrowing_rejected() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let b = t.var(block, "b", DataType::Ubyte);
        let w = t.var(block, "w", DataType::Uword);
        let wref = t.ident_to("w", w);
        t.assign_var(block, "b", b, wref);

        let mut diags = Diagnostics::new();
        NameResolver::run(&mut t.ast, &mut diags);
        TypeChecker::run(&mut t.ast, &mut diags).unwrap();
        assert!(diags.iter().any(|d| d.code == DiagnosticCode::TypeMismatch));
    }

    #[test]
    fn test_array_initializer_size_checked() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let e1 = t.lit(1, DataType::Ubyte);
        let e2 = t.lit(2, DataType::Ubyte);
        let arr = t.ast.add_detached(
            NodeKind::ArrayLiteral {
                elements: vec![e1, e2],
                dt: DataType::ArrayUbyte,
            },
            crate::error::Position::builtin(),
        );
        t.array_var(block, "a", DataType::ArrayUbyte, 3, Some(arr));

        let mut diags = Diagnostics::new();
        NameResolver::run(&mut t.ast, &mut diags);
        TypeChecker::run(&mut t.ast, &mut diags).unwrap();
        assert!(diags
            .iter()
            .any(|d| d.code == DiagnosticCode::InvalidDeclaration));
    }
}
