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

//! Tests for the constant folder's rewrite rules.

use p8c::analyzer::{ConstantFolder, NameResolver};
use p8c::ast::{BinaryOperator, DataType, NodeId, NodeKind, NumericValue, TreeBuilder};
use p8c::error::Diagnostics;
use test_case::test_case;

// ============================================================================
// Helper Functions
// ============================================================================

/// Build `main.start` with one ubyte variable and an assignment `a = rhs`,
/// then fold and return the final rhs node.
fn fold_assignment(build: impl FnOnce(&mut TreeBuilder, NodeId) -> NodeId) -> (TreeBuilder, NodeId) {
    let mut t = TreeBuilder::new();
    let block = t.block("main", None);
    let start = t.subroutine(block, "start");
    let a = t.var(start, "a", DataType::Ubyte);
    let rhs = build(&mut t, a);
    let target = t.target_var("a", Some(a));
    let assign = t.assign(start, target, rhs);

    let mut diags = Diagnostics::new();
    NameResolver::run(&mut t.ast, &mut diags);
    ConstantFolder::run(&mut t.ast, &mut diags).unwrap();
    assert!(!diags.has_errors());

    let NodeKind::Assignment { value, .. } = t.ast.kind(assign) else {
        panic!("assignment vanished")
    };
    let value = *value;
    (t, value)
}

fn expect_binary_with_constant(
    t: &TreeBuilder,
    value: NodeId,
    op: BinaryOperator,
    constant: i64,
    constant_on_left: bool,
) {
    let NodeKind::BinaryExpr { left, op: got, right } = t.ast.kind(value) else {
        panic!("expected a binary expression, got {:?}", t.ast.kind(value));
    };
    assert_eq!(*got, op);
    let (const_side, var_side) = if constant_on_left {
        (*left, *right)
    } else {
        (*right, *left)
    };
    assert_eq!(
        t.ast.integer_literal_value(const_side),
        Some(constant),
        "folded constant mismatch"
    );
    assert!(matches!(
        t.ast.kind(var_side),
        NodeKind::IdentifierRef { .. }
    ));
}

// ============================================================================
// Re-association: addition and subtraction rows
// ============================================================================

// c1 + (c2 + T) and c1 + (T + c2) group to T + (c1+c2)
#[test_case(true; "constant left in inner")]
#[test_case(false; "constant right in inner")]
fn test_add_of_add(inner_const_left: bool) {
    let (t, value) = fold_assignment(|t, a| {
        let aref = t.ident_to("a", a);
        let c2 = t.lit(3, DataType::Ubyte);
        let inner = if inner_const_left {
            t.binary(c2, BinaryOperator::Add, aref)
        } else {
            t.binary(aref, BinaryOperator::Add, c2)
        };
        let c1 = t.lit(5, DataType::Ubyte);
        t.binary(c1, BinaryOperator::Add, inner)
    });
    expect_binary_with_constant(&t, value, BinaryOperator::Add, 8, false);
}

// (c1 + T) + c2 and (T + c1) + c2 group to T + (c1+c2)
#[test_case(true; "constant left in inner")]
#[test_case(false; "constant right in inner")]
fn test_add_then_add(inner_const_left: bool) {
    let (t, value) = fold_assignment(|t, a| {
        let aref = t.ident_to("a", a);
        let c1 = t.lit(3, DataType::Ubyte);
        let inner = if inner_const_left {
            t.binary(c1, BinaryOperator::Add, aref)
        } else {
            t.binary(aref, BinaryOperator::Add, c1)
        };
        let c2 = t.lit(5, DataType::Ubyte);
        t.binary(inner, BinaryOperator::Add, c2)
    });
    expect_binary_with_constant(&t, value, BinaryOperator::Add, 8, false);
}

#[test]
fn test_sub_of_add_groups_to_difference() {
    // 10 - (3 + a)  ->  7 - a
    let (t, value) = fold_assignment(|t, a| {
        let aref = t.ident_to("a", a);
        let three = t.lit(3, DataType::Ubyte);
        let inner = t.binary(three, BinaryOperator::Add, aref);
        let ten = t.lit(10, DataType::Ubyte);
        t.binary(ten, BinaryOperator::Sub, inner)
    });
    expect_binary_with_constant(&t, value, BinaryOperator::Sub, 7, true);
}

#[test]
fn test_add_of_sub_constant_first() {
    // 10 + (3 - a)  ->  13 - a
    let (t, value) = fold_assignment(|t, a| {
        let aref = t.ident_to("a", a);
        let three = t.lit(3, DataType::Ubyte);
        let inner = t.binary(three, BinaryOperator::Sub, aref);
        let ten = t.lit(10, DataType::Ubyte);
        t.binary(ten, BinaryOperator::Add, inner)
    });
    expect_binary_with_constant(&t, value, BinaryOperator::Sub, 13, true);
}

#[test]
fn test_add_of_sub_variable_first() {
    // 10 + (a - 3)  ->  a + 7
    let (t, value) = fold_assignment(|t, a| {
        let aref = t.ident_to("a", a);
        let three = t.lit(3, DataType::Ubyte);
        let inner = t.binary(aref, BinaryOperator::Sub, three);
        let ten = t.lit(10, DataType::Ubyte);
        t.binary(ten, BinaryOperator::Add, inner)
    });
    expect_binary_with_constant(&t, value, BinaryOperator::Add, 7, false);
}

#[test]
fn test_sub_then_add() {
    // (10 - a) + 3  ->  13 - a
    let (t, value) = fold_assignment(|t, a| {
        let aref = t.ident_to("a", a);
        let ten = t.lit(10, DataType::Ubyte);
        let inner = t.binary(ten, BinaryOperator::Sub, aref);
        let three = t.lit(3, DataType::Ubyte);
        t.binary(inner, BinaryOperator::Add, three)
    });
    expect_binary_with_constant(&t, value, BinaryOperator::Sub, 13, true);
}

#[test]
fn test_add_then_sub() {
    // (a + 10) - 3  ->  a + 7
    let (t, value) = fold_assignment(|t, a| {
        let aref = t.ident_to("a", a);
        let ten = t.lit(10, DataType::Ubyte);
        let inner = t.binary(aref, BinaryOperator::Add, ten);
        let three = t.lit(3, DataType::Ubyte);
        t.binary(inner, BinaryOperator::Sub, three)
    });
    expect_binary_with_constant(&t, value, BinaryOperator::Add, 7, false);
}

// ============================================================================
// Re-association: multiplication
// ============================================================================

#[test]
fn test_mul_of_mul_groups() {
    // 2 * (3 * a)  ->  a * 6
    let (t, value) = fold_assignment(|t, a| {
        let aref = t.ident_to("a", a);
        let three = t.lit(3, DataType::Ubyte);
        let inner = t.binary(three, BinaryOperator::Mul, aref);
        let two = t.lit(2, DataType::Ubyte);
        t.binary(two, BinaryOperator::Mul, inner)
    });
    expect_binary_with_constant(&t, value, BinaryOperator::Mul, 6, false);
}

// ============================================================================
// Re-association: integer division stays untouched
// ============================================================================

#[test]
fn test_integer_div_rows_not_applied() {
    // (a * 10) / 4 keeps its shape for integers.
    let (t, value) = fold_assignment(|t, a| {
        let aref = t.ident_to("a", a);
        let ten = t.lit(10, DataType::Ubyte);
        let inner = t.binary(aref, BinaryOperator::Mul, ten);
        let four = t.lit(4, DataType::Ubyte);
        t.binary(inner, BinaryOperator::Div, four)
    });
    let NodeKind::BinaryExpr { op, .. } = t.ast.kind(value) else {
        panic!("expected a binary expression");
    };
    assert_eq!(*op, BinaryOperator::Div);
}

// ============================================================================
// Re-association: float division rows
// ============================================================================

#[test]
fn test_float_mul_then_div_groups() {
    // (f * 10.0) / 4.0  ->  f * 2.5
    let mut t = TreeBuilder::new();
    let block = t.block("main", None);
    let start = t.subroutine(block, "start");
    let f = t.var(start, "f", DataType::Float);
    let fref = t.ident_to("f", f);
    let ten = t.flit(10.0);
    let inner = t.binary(fref, BinaryOperator::Mul, ten);
    let four = t.flit(4.0);
    let outer = t.binary(inner, BinaryOperator::Div, four);
    let target = t.target_var("f", Some(f));
    let assign = t.assign(start, target, outer);

    let mut diags = Diagnostics::new();
    NameResolver::run(&mut t.ast, &mut diags);
    ConstantFolder::run(&mut t.ast, &mut diags).unwrap();

    let NodeKind::Assignment { value, .. } = t.ast.kind(assign) else {
        panic!("assignment vanished");
    };
    let NodeKind::BinaryExpr { left, op, right } = t.ast.kind(*value) else {
        panic!("expected a binary expression");
    };
    assert_eq!(*op, BinaryOperator::Mul);
    let constant = match (t.ast.kind(*left), t.ast.kind(*right)) {
        (
            NodeKind::NumericLiteral {
                value: NumericValue::Float(v),
                ..
            },
            _,
        ) => *v,
        (
            _,
            NodeKind::NumericLiteral {
                value: NumericValue::Float(v),
                ..
            },
        ) => *v,
        _ => panic!("no folded float constant"),
    };
    assert_eq!(constant, 2.5);
}

// ============================================================================
// Fixpoint behavior
// ============================================================================

#[test]
fn test_deep_constant_tree_folds_fully() {
    // ((1+2)+(3+4)) + ((5+6)+(7+8)) = 36
    let mut t = TreeBuilder::new();
    let block = t.block("main", None);
    let mut pairs = Vec::new();
    for base in [1i64, 3, 5, 7] {
        let l = t.lit(base, DataType::Ubyte);
        let r = t.lit(base + 1, DataType::Ubyte);
        pairs.push(t.binary(l, BinaryOperator::Add, r));
    }
    let left = t.binary(pairs[0], BinaryOperator::Add, pairs[1]);
    let right = t.binary(pairs[2], BinaryOperator::Add, pairs[3]);
    let total = t.binary(left, BinaryOperator::Add, right);
    let decl = t.const_var(block, "total", DataType::Ubyte, total);

    let mut diags = Diagnostics::new();
    NameResolver::run(&mut t.ast, &mut diags);
    let first = ConstantFolder::run(&mut t.ast, &mut diags).unwrap();
    assert!(first > 0);

    let NodeKind::VarDecl { value: Some(v), .. } = t.ast.kind(decl) else {
        panic!("declaration lost its value");
    };
    assert_eq!(t.ast.integer_literal_value(*v), Some(36));

    // A second run finds nothing left to do.
    let second = ConstantFolder::run(&mut t.ast, &mut diags).unwrap();
    assert_eq!(second, 0);
}

#[test]
fn test_mixed_tree_converges() {
    // 1 + (a + (2 + (a + 3))) keeps both variable references but folds
    // every foldable pair, and reaches a normal form.
    let (t, value) = fold_assignment(|t, a| {
        let a1 = t.ident_to("a", a);
        let a2 = t.ident_to("a", a);
        let three = t.lit(3, DataType::Ubyte);
        let inner1 = t.binary(a2, BinaryOperator::Add, three);
        let two = t.lit(2, DataType::Ubyte);
        let inner2 = t.binary(two, BinaryOperator::Add, inner1);
        let inner3 = t.binary(a1, BinaryOperator::Add, inner2);
        let one = t.lit(1, DataType::Ubyte);
        t.binary(one, BinaryOperator::Add, inner3)
    });
    // The normal form still computes a + a + 6 in some association.
    let mut constants = Vec::new();
    let mut idents = 0;
    collect(&t, value, &mut constants, &mut idents);
    assert_eq!(idents, 2);
    assert_eq!(constants.iter().sum::<i64>(), 6);

    fn collect(t: &TreeBuilder, node: NodeId, constants: &mut Vec<i64>, idents: &mut usize) {
        match t.ast.kind(node) {
            NodeKind::BinaryExpr { left, right, .. } => {
                let (l, r) = (*left, *right);
                collect(t, l, constants, idents);
                collect(t, r, constants, idents);
            }
            NodeKind::IdentifierRef { .. } => *idents += 1,
            NodeKind::NumericLiteral {
                value: NumericValue::Integer(v),
                ..
            } => constants.push(*v),
            _ => {}
        }
    }
}
