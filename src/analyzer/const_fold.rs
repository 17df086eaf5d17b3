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

//! Constant folding and algebraic rewriting.
//!
//! Runs to a fixpoint and combines:
//!
//! - literal evaluation of constant expressions, with division-by-zero,
//!   domain and float-range problems reported as diagnostics instead of
//!   evaluated,
//! - inlining of references to simple numeric constants,
//! - re-association that groups two constants around one non-constant
//!   operand so they can be folded ("group two constants"),
//! - expansion of constant range initializers into array literals,
//! - retyping of for-loop range bounds to the loop variable type,
//! - retyping of literals to the assignment target type.
//!
//! Every rewrite bumps an optimization counter; a traversal that performs
//! none is the fixpoint.

use crate::analyzer::type_check::{infer_type, target_type};
use crate::ast::walker::{self, AstWalker, Modification};
use crate::ast::{
    Ast, BinaryOperator, DataType, NodeId, NodeKind, NumericValue, PrefixOperator, VarKind,
    FLOAT_MAX,
};
use crate::error::{DiagnosticCode, Diagnostics, Position, Result};

const MAX_FOLD_ROUNDS: usize = 100;

/// The constant folding pass.
pub struct ConstantFolder<'a> {
    diags: &'a mut Diagnostics,
    optimizations: usize,
}

impl<'a> ConstantFolder<'a> {
    /// Fold until nothing changes anymore. Returns the total number of
    /// rewrites performed.
    pub fn run(ast: &mut Ast, diags: &mut Diagnostics) -> Result<usize> {
        let mut folder = ConstantFolder {
            diags,
            optimizations: 0,
        };
        walker::walk_to_fixpoint(&mut folder, ast, MAX_FOLD_ROUNDS)?;
        Ok(folder.optimizations)
    }

    /// The number of rewrites performed so far.
    pub fn optimizations_done(&self) -> usize {
        self.optimizations
    }

    // ----------------------------- evaluation -----------------------------

    fn literal_of(ast: &Ast, id: NodeId) -> Option<(NumericValue, DataType)> {
        match ast.kind(id) {
            NodeKind::NumericLiteral { value, dt } => Some((*value, *dt)),
            _ => None,
        }
    }

    fn make_literal(ast: &mut Ast, value: NumericValue, dt: DataType, pos: Position) -> NodeId {
        ast.add_detached(NodeKind::NumericLiteral { value, dt }, pos)
    }

    fn int_result(&mut self, value: i64, at_least: DataType, pos: &Position) -> Option<(NumericValue, DataType)> {
        match DataType::smallest_fitting(value, at_least) {
            Some(DataType::Float) | None => {
                self.diags.error(
                    DiagnosticCode::ValueOutOfRange,
                    format!("constant value {} does not fit an integer type", value),
                    pos.clone(),
                );
                None
            }
            Some(dt) => Some((NumericValue::Integer(value), dt)),
        }
    }

    fn float_result(&mut self, value: f64, pos: &Position) -> Option<(NumericValue, DataType)> {
        if !(-FLOAT_MAX..=FLOAT_MAX).contains(&value) {
            self.diags.error(
                DiagnosticCode::FloatOverflow,
                "floating point constant out of range",
                pos.clone(),
            );
            return None;
        }
        Some((NumericValue::Float(value), DataType::Float))
    }

    fn eval_binary_const(
        &mut self,
        op: BinaryOperator,
        left: (NumericValue, DataType),
        right: (NumericValue, DataType),
        pos: &Position,
    ) -> Option<(NumericValue, DataType)> {
        let (lv, lt) = left;
        let (rv, rt) = right;
        let float_math = lt == DataType::Float || rt == DataType::Float;

        if op.is_comparison() {
            let result = match op {
                BinaryOperator::Equal => lv.as_float() == rv.as_float(),
                BinaryOperator::NotEqual => lv.as_float() != rv.as_float(),
                BinaryOperator::Less => lv.as_float() < rv.as_float(),
                BinaryOperator::Greater => lv.as_float() > rv.as_float(),
                BinaryOperator::LessEqual => lv.as_float() <= rv.as_float(),
                BinaryOperator::GreaterEqual => lv.as_float() >= rv.as_float(),
                _ => unreachable!(),
            };
            return Some((NumericValue::Integer(result as i64), DataType::Ubyte));
        }

        match op {
            BinaryOperator::And => {
                let r = (lv.as_float() != 0.0) && (rv.as_float() != 0.0);
                return Some((NumericValue::Integer(r as i64), DataType::Ubyte));
            }
            BinaryOperator::Or => {
                let r = (lv.as_float() != 0.0) || (rv.as_float() != 0.0);
                return Some((NumericValue::Integer(r as i64), DataType::Ubyte));
            }
            BinaryOperator::Pow => {
                return self.float_result(lv.as_float().powf(rv.as_float()), pos);
            }
            _ => {}
        }

        if float_math {
            let (l, r) = (lv.as_float(), rv.as_float());
            let value = match op {
                BinaryOperator::Add => l + r,
                BinaryOperator::Sub => l - r,
                BinaryOperator::Mul => l * r,
                BinaryOperator::Div => {
                    if r == 0.0 {
                        self.diags.error(
                            DiagnosticCode::DivisionByZero,
                            "division by zero",
                            pos.clone(),
                        );
                        return None;
                    }
                    l / r
                }
                _ => {
                    self.diags.error(
                        DiagnosticCode::InvalidOperand,
                        format!("operator '{}' is not defined for floats", op),
                        pos.clone(),
                    );
                    return None;
                }
            };
            return self.float_result(value, pos);
        }

        let l = lv.as_integer()?;
        let r = rv.as_integer()?;
        let promoted = DataType::promoted(lt, rt).unwrap_or(DataType::Uword);
        match op {
            BinaryOperator::Add => self.int_result(l.checked_add(r)?, promoted, pos),
            BinaryOperator::Sub => self.int_result(l.checked_sub(r)?, promoted, pos),
            BinaryOperator::Mul => self.int_result(l.checked_mul(r)?, promoted, pos),
            BinaryOperator::Div | BinaryOperator::Remainder => {
                if r == 0 {
                    self.diags.error(
                        DiagnosticCode::DivisionByZero,
                        "division by zero",
                        pos.clone(),
                    );
                    return None;
                }
                let value = if op == BinaryOperator::Div { l / r } else { l % r };
                self.int_result(value, promoted, pos)
            }
            BinaryOperator::ShiftLeft => {
                // Shifts stay in the type of the shifted value.
                let value = if r >= 64 { 0 } else { l << r };
                Some((NumericValue::Integer(mask_to(value, lt)), lt))
            }
            BinaryOperator::ShiftRight => {
                let value = if lt.is_signed() {
                    if r >= 63 {
                        if l < 0 {
                            -1
                        } else {
                            0
                        }
                    } else {
                        l >> r
                    }
                } else if r >= 63 {
                    0
                } else {
                    (mask_to(l, lt)) >> r
                };
                Some((NumericValue::Integer(mask_to(value, lt)), lt))
            }
            BinaryOperator::BitAnd => self.int_result(l & r, promoted, pos),
            BinaryOperator::BitOr => self.int_result(l | r, promoted, pos),
            BinaryOperator::BitXor => self.int_result(l ^ r, promoted, pos),
            _ => None,
        }
    }

    fn eval_prefix_const(
        &mut self,
        op: PrefixOperator,
        value: NumericValue,
        dt: DataType,
        pos: &Position,
    ) -> Option<(NumericValue, DataType)> {
        match op {
            PrefixOperator::Plus => Some((value, dt)),
            PrefixOperator::Minus => match value {
                NumericValue::Integer(v) => {
                    let n = -v;
                    if dt.value_fits(n) {
                        Some((NumericValue::Integer(n), dt))
                    } else {
                        self.int_result(n, DataType::Ubyte, pos)
                    }
                }
                NumericValue::Float(v) => self.float_result(-v, pos),
            },
            PrefixOperator::BitInvert => match value {
                NumericValue::Integer(v) => Some((NumericValue::Integer(mask_to(!v, dt)), dt)),
                NumericValue::Float(_) => {
                    self.diags.error(
                        DiagnosticCode::InvalidOperand,
                        "bitwise inversion needs an integer operand",
                        pos.clone(),
                    );
                    None
                }
            },
            PrefixOperator::Not => {
                let zero = value.as_float() == 0.0;
                Some((NumericValue::Integer(zero as i64), DataType::Ubyte))
            }
        }
    }

    // --------------------------- re-association ---------------------------

    /// Try the "group two constants" rewrites on a binary expression, and
    /// return the replacement expression when one applies.
    fn try_reassociate(&mut self, ast: &mut Ast, node: NodeId) -> Option<NodeId> {
        let NodeKind::BinaryExpr { left, op, right } = ast.kind(node) else {
            return None;
        };
        let (left, op1, right) = (*left, *op, *right);
        let pos = ast.pos(node);

        // c1 op1 (a op2 b)
        if let (Some(c1), NodeKind::BinaryExpr { left: a, op: op2, right: b }) =
            (Self::literal_of(ast, left), ast.kind(right))
        {
            let (a, op2, b) = (*a, *op2, *b);
            let (t, c2, c_left) = match (Self::literal_of(ast, a), Self::literal_of(ast, b)) {
                (Some(c2), None) => (b, c2, true),
                (None, Some(c2)) => (a, c2, false),
                _ => return None,
            };
            if !self.reassociation_allowed(ast, t, c1.1, c2.1, op1, op2) {
                return None;
            }
            return match (op1, op2, c_left) {
                // c1 + (c2 + T), c1 + (T + c2)  ->  T + (c1+c2)
                (BinaryOperator::Add, BinaryOperator::Add, _) => {
                    self.build_t_op_k(ast, t, BinaryOperator::Add, c1, BinaryOperator::Add, c2, &pos)
                }
                // c1 * (c2 * T) and symmetric  ->  T * (c1*c2)
                (BinaryOperator::Mul, BinaryOperator::Mul, _) => {
                    self.build_t_op_k(ast, t, BinaryOperator::Mul, c1, BinaryOperator::Mul, c2, &pos)
                }
                // c1 - (c2 + T), c1 - (T + c2)  ->  (c1-c2) - T
                (BinaryOperator::Sub, BinaryOperator::Add, _) => {
                    self.build_k_op_t(ast, t, BinaryOperator::Sub, c1, BinaryOperator::Sub, c2, &pos)
                }
                // c1 + (c2 - T)  ->  (c1+c2) - T
                (BinaryOperator::Add, BinaryOperator::Sub, true) => {
                    self.build_k_op_t(ast, t, BinaryOperator::Sub, c1, BinaryOperator::Add, c2, &pos)
                }
                // c1 + (T - c2)  ->  T + (c1-c2)
                (BinaryOperator::Add, BinaryOperator::Sub, false) => {
                    self.build_t_op_k(ast, t, BinaryOperator::Add, c1, BinaryOperator::Sub, c2, &pos)
                }
                // c1 / (c2 * T), c1 / (T * c2)  ->  (c1/c2) / T
                (BinaryOperator::Div, BinaryOperator::Mul, _) => {
                    self.build_k_op_t(ast, t, BinaryOperator::Div, c1, BinaryOperator::Div, c2, &pos)
                }
                // c1 * (c2 / T)  ->  (c1*c2) / T
                (BinaryOperator::Mul, BinaryOperator::Div, true) => {
                    self.build_k_op_t(ast, t, BinaryOperator::Div, c1, BinaryOperator::Mul, c2, &pos)
                }
                // c1 * (T / c2)  ->  (c1/c2) * T
                (BinaryOperator::Mul, BinaryOperator::Div, false) => {
                    self.build_k_op_t(ast, t, BinaryOperator::Mul, c1, BinaryOperator::Div, c2, &pos)
                }
                _ => None,
            };
        }

        // (a op2 b) op1 c2
        if let (NodeKind::BinaryExpr { left: a, op: op2, right: b }, Some(c2)) =
            (ast.kind(left), Self::literal_of(ast, right))
        {
            let (a, op2, b) = (*a, *op2, *b);
            let (t, c1, c_left) = match (Self::literal_of(ast, a), Self::literal_of(ast, b)) {
                (Some(c1), None) => (b, c1, true),
                (None, Some(c1)) => (a, c1, false),
                _ => return None,
            };
            if !self.reassociation_allowed(ast, t, c1.1, c2.1, op1, op2) {
                return None;
            }
            return match (op1, op2, c_left) {
                // (c1 + T) + c2, (T + c1) + c2  ->  T + (c1+c2)
                (BinaryOperator::Add, BinaryOperator::Add, _) => {
                    self.build_t_op_k(ast, t, BinaryOperator::Add, c1, BinaryOperator::Add, c2, &pos)
                }
                // (c1 * T) * c2 and symmetric  ->  T * (c1*c2)
                (BinaryOperator::Mul, BinaryOperator::Mul, _) => {
                    self.build_t_op_k(ast, t, BinaryOperator::Mul, c1, BinaryOperator::Mul, c2, &pos)
                }
                // (c1 + T) - c2, (T + c1) - c2  ->  T + (c1-c2)
                (BinaryOperator::Sub, BinaryOperator::Add, _) => {
                    self.build_t_op_k(ast, t, BinaryOperator::Add, c1, BinaryOperator::Sub, c2, &pos)
                }
                // (c1 - T) + c2  ->  (c1+c2) - T
                (BinaryOperator::Add, BinaryOperator::Sub, true) => {
                    self.build_k_op_t(ast, t, BinaryOperator::Sub, c1, BinaryOperator::Add, c2, &pos)
                }
                // (c1 * T) / c2, (T * c1) / c2  ->  (c1/c2) * T
                (BinaryOperator::Div, BinaryOperator::Mul, _) => {
                    self.build_t_op_k(ast, t, BinaryOperator::Mul, c1, BinaryOperator::Div, c2, &pos)
                }
                // (c1 / T) * c2  ->  (c1*c2) / T
                (BinaryOperator::Mul, BinaryOperator::Div, true) => {
                    self.build_k_op_t(ast, t, BinaryOperator::Div, c1, BinaryOperator::Mul, c2, &pos)
                }
                // (T / c1) * c2  ->  (c2/c1) * T
                (BinaryOperator::Mul, BinaryOperator::Div, false) => {
                    let k = self.eval_binary_const(BinaryOperator::Div, c2, c1, &pos)?;
                    let k_node = Self::make_literal(ast, k.0, k.1, pos.clone());
                    let t_copy = ast.clone_subtree(t);
                    Some(ast.add_detached(
                        NodeKind::BinaryExpr {
                            left: k_node,
                            op: BinaryOperator::Mul,
                            right: t_copy,
                        },
                        pos,
                    ))
                }
                _ => None,
            };
        }

        None
    }

    /// Build `T outer_op K` where `K = c1 fold_op c2`.
    #[allow(clippy::too_many_arguments)]
    fn build_t_op_k(
        &mut self,
        ast: &mut Ast,
        t: NodeId,
        outer_op: BinaryOperator,
        c1: (NumericValue, DataType),
        fold_op: BinaryOperator,
        c2: (NumericValue, DataType),
        pos: &Position,
    ) -> Option<NodeId> {
        let k = self.eval_binary_const(fold_op, c1, c2, pos)?;
        let k_node = Self::make_literal(ast, k.0, k.1, pos.clone());
        let t_copy = ast.clone_subtree(t);
        Some(ast.add_detached(
            NodeKind::BinaryExpr {
                left: t_copy,
                op: outer_op,
                right: k_node,
            },
            pos.clone(),
        ))
    }

    /// Build `K outer_op T` where `K = c1 fold_op c2`.
    #[allow(clippy::too_many_arguments)]
    fn build_k_op_t(
        &mut self,
        ast: &mut Ast,
        t: NodeId,
        outer_op: BinaryOperator,
        c1: (NumericValue, DataType),
        fold_op: BinaryOperator,
        c2: (NumericValue, DataType),
        pos: &Position,
    ) -> Option<NodeId> {
        let k = self.eval_binary_const(fold_op, c1, c2, pos)?;
        let k_node = Self::make_literal(ast, k.0, k.1, pos.clone());
        let t_copy = ast.clone_subtree(t);
        Some(ast.add_detached(
            NodeKind::BinaryExpr {
                left: k_node,
                op: outer_op,
                right: t_copy,
            },
            pos.clone(),
        ))
    }

    /// Re-association applies only when the whole triple is exact-integer
    /// or all-float; mixing the two has different semantics. Integer
    /// division is not exact, so division rewrites are float-only.
    fn reassociation_allowed(
        &self,
        ast: &Ast,
        t: NodeId,
        c1_dt: DataType,
        c2_dt: DataType,
        op1: BinaryOperator,
        op2: BinaryOperator,
    ) -> bool {
        let Some(t_dt) = infer_type(ast, t) else {
            return false;
        };
        let all_float =
            t_dt == DataType::Float && c1_dt == DataType::Float && c2_dt == DataType::Float;
        let all_int = t_dt.is_integer() && c1_dt.is_integer() && c2_dt.is_integer();
        let uses_div = op1 == BinaryOperator::Div || op2 == BinaryOperator::Div;
        if uses_div {
            all_float
        } else {
            all_float || all_int
        }
    }

    fn replace(&mut self, ast: &Ast, old: NodeId, new: NodeId) -> Vec<Modification> {
        self.optimizations += 1;
        vec![Modification::Replace {
            old,
            new,
            parent: ast.node(old).parent,
        }]
    }
}

fn mask_to(value: i64, dt: DataType) -> i64 {
    match dt {
        DataType::Ubyte => value & 0xff,
        DataType::Uword => value & 0xffff,
        DataType::Byte => value as i8 as i64,
        DataType::Word => value as i16 as i64,
        _ => value,
    }
}

impl<'a> AstWalker for ConstantFolder<'a> {
    fn visit_expression(&mut self, ast: &mut Ast, node: NodeId) -> Vec<Modification> {
        match ast.kind(node) {
            NodeKind::BinaryExpr { left, op, right } => {
                let (left, op, right) = (*left, *op, *right);
                if let (Some(l), Some(r)) =
                    (Self::literal_of(ast, left), Self::literal_of(ast, right))
                {
                    let pos = ast.pos(node);
                    if let Some((value, dt)) = self.eval_binary_const(op, l, r, &pos) {
                        let new = Self::make_literal(ast, value, dt, pos);
                        return self.replace(ast, node, new);
                    }
                    return Vec::new();
                }
                if let Some(new) = self.try_reassociate(ast, node) {
                    return self.replace(ast, node, new);
                }
                Vec::new()
            }
            NodeKind::PrefixExpr { op, expr } => {
                let (op, expr) = (*op, *expr);
                if let Some((value, dt)) = Self::literal_of(ast, expr) {
                    let pos = ast.pos(node);
                    if let Some((value, dt)) = self.eval_prefix_const(op, value, dt, &pos) {
                        let new = Self::make_literal(ast, value, dt, pos);
                        return self.replace(ast, node, new);
                    }
                } else if matches!(ast.kind(expr), NodeKind::StringLiteral { .. })
                    && op == PrefixOperator::Not
                {
                    self.diags.error(
                        DiagnosticCode::InvalidOperand,
                        "'not' needs a numeric operand",
                        ast.pos(node),
                    );
                }
                Vec::new()
            }
            NodeKind::TypecastExpr { dt, expr, .. } => {
                let (dt, expr) = (*dt, *expr);
                let Some((value, _)) = Self::literal_of(ast, expr) else {
                    return Vec::new();
                };
                let pos = ast.pos(node);
                let new_value = match (value, dt) {
                    (NumericValue::Integer(v), DataType::Float) => Some(NumericValue::Float(v as f64)),
                    (NumericValue::Integer(v), dt) if dt.is_integer() => {
                        Some(NumericValue::Integer(mask_to(v, dt)))
                    }
                    (NumericValue::Float(v), dt) if dt.is_integer() => {
                        let truncated = v as i64;
                        Some(NumericValue::Integer(mask_to(truncated, dt)))
                    }
                    (NumericValue::Float(v), DataType::Float) => Some(NumericValue::Float(v)),
                    _ => None,
                };
                if let Some(value) = new_value {
                    let new = Self::make_literal(ast, value, dt, pos);
                    return self.replace(ast, node, new);
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn visit_identifier(&mut self, ast: &mut Ast, node: NodeId) -> Vec<Modification> {
        // Only value positions may be inlined.
        let parent = ast.node(node).parent;
        match ast.kind(parent) {
            NodeKind::AssignTarget { .. }
            | NodeKind::AddressOf { .. }
            | NodeKind::ArrayIndexedRef { .. } => return Vec::new(),
            NodeKind::FunctionCall { target, .. } if *target == node => return Vec::new(),
            NodeKind::ForLoop { loopvar, .. } if *loopvar == node => return Vec::new(),
            _ => {}
        }
        let Some(decl) = ast.identifier_target(node) else {
            return Vec::new();
        };
        let NodeKind::VarDecl {
            kind: VarKind::Const,
            dt,
            value: Some(value),
            ..
        } = ast.kind(decl)
        else {
            return Vec::new();
        };
        let (dt, value) = (*dt, *value);
        let Some((constant, _)) = Self::literal_of(ast, value) else {
            return Vec::new();
        };
        let pos = ast.pos(node);
        let new = Self::make_literal(ast, constant, dt, pos);
        self.replace(ast, node, new)
    }

    fn visit_var_decl(&mut self, ast: &mut Ast, node: NodeId) -> Vec<Modification> {
        let NodeKind::VarDecl {
            dt,
            array_size,
            value: Some(value),
            ..
        } = ast.kind(node)
        else {
            return Vec::new();
        };
        let (dt, array_size, value) = (*dt, *array_size, *value);

        // Constant integer ranges initializing an integer array become
        // array literals.
        if dt.is_array() {
            if let NodeKind::RangeExpr { from, to, step } = ast.kind(value) {
                let (from, to, step) = (*from, *to, *step);
                let Some(element_dt) = dt.element_type() else {
                    return Vec::new();
                };
                if element_dt == DataType::Float {
                    return Vec::new();
                }
                let (Some(fv), Some(tv)) = (
                    ast.integer_literal_value(from),
                    ast.integer_literal_value(to),
                ) else {
                    return Vec::new();
                };
                let sv = match step {
                    Some(s) => match ast.integer_literal_value(s) {
                        Some(v) => v,
                        None => return Vec::new(),
                    },
                    None if tv < fv => -1,
                    None => 1,
                };
                if sv == 0 {
                    return Vec::new();
                }
                let mut values = Vec::new();
                let mut v = fv;
                while (sv > 0 && v <= tv) || (sv < 0 && v >= tv) {
                    values.push(v);
                    v += sv;
                }
                let pos = ast.pos(node);
                if let Some(declared) = array_size {
                    if declared as usize != values.len() {
                        self.diags.error(
                            DiagnosticCode::RangeSizeMismatch,
                            format!(
                                "range produces {} values, array is declared with {}",
                                values.len(),
                                declared
                            ),
                            pos,
                        );
                        return Vec::new();
                    }
                } else if let NodeKind::VarDecl { array_size, .. } = ast.kind_mut(node) {
                    *array_size = Some(values.len() as u16);
                }
                let elements: Vec<NodeId> = values
                    .iter()
                    .map(|&v| {
                        Self::make_literal(
                            ast,
                            NumericValue::Integer(v),
                            element_dt,
                            pos.clone(),
                        )
                    })
                    .collect();
                let array = ast.add_detached(NodeKind::ArrayLiteral { elements, dt }, pos);
                return self.replace(ast, value, array);
            }
            return Vec::new();
        }

        // Literal promotion to the declared type.
        self.promote_literal(ast, value, dt)
    }

    fn visit_assignment(&mut self, ast: &mut Ast, node: NodeId) -> Vec<Modification> {
        let NodeKind::Assignment { target, value, .. } = ast.kind(node) else {
            return Vec::new();
        };
        let (target, value) = (*target, *value);
        let Some(expected) = target_type(ast, target) else {
            return Vec::new();
        };
        self.promote_literal(ast, value, expected)
    }

    fn visit_for_loop(&mut self, ast: &mut Ast, node: NodeId) -> Vec<Modification> {
        let NodeKind::ForLoop {
            loopvar, iterable, ..
        } = ast.kind(node)
        else {
            return Vec::new();
        };
        let (loopvar, iterable) = (*loopvar, *iterable);
        let Some(decl) = ast.identifier_target(loopvar) else {
            return Vec::new();
        };
        let Some(var_dt) = super::type_check::declaration_type(ast, decl) else {
            return Vec::new();
        };
        let NodeKind::RangeExpr { from, to, step } = ast.kind(iterable) else {
            return Vec::new();
        };
        let parts: Vec<NodeId> = [Some(*from), Some(*to), *step].iter().flatten().copied().collect();

        let mut mods = Vec::new();
        for part in parts {
            mods.extend(self.promote_literal(ast, part, var_dt));
        }
        mods
    }
}

impl<'a> ConstantFolder<'a> {
    /// Retype a literal in place to match the expected type when the value
    /// provably fits.
    fn promote_literal(
        &mut self,
        ast: &mut Ast,
        value: NodeId,
        expected: DataType,
    ) -> Vec<Modification> {
        let Some((constant, dt)) = Self::literal_of(ast, value) else {
            return Vec::new();
        };
        if dt == expected || !expected.is_numeric() {
            return Vec::new();
        }
        let pos = ast.pos(value);
        match constant {
            NumericValue::Integer(v) if expected == DataType::Float => {
                let new = Self::make_literal(ast, NumericValue::Float(v as f64), expected, pos);
                self.replace(ast, value, new)
            }
            NumericValue::Integer(v) if expected.value_fits(v) => {
                let new = Self::make_literal(ast, constant, expected, pos);
                self.replace(ast, value, new)
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::name_resolution::NameResolver;
    use crate::ast::TreeBuilder;

    fn fold(t: &mut TreeBuilder) -> (usize, Diagnostics) {
        let mut diags = Diagnostics::new();
        NameResolver::run(&mut t.ast, &mut diags);
        let n = ConstantFolder::run(&mut t.ast, &mut diags).unwrap();
        (n, diags)
    }

    fn lit_value(ast: &Ast, id: NodeId) -> Option<(i64, DataType)> {
        match ast.kind(id) {
            NodeKind::NumericLiteral {
                value: NumericValue::Integer(v),
                dt,
            } => Some((*v, *dt)),
            _ => None,
        }
    }

    #[test]
    fn test_const_decl_folds_to_literal() {
        // const ubyte N = 2+3*4  ->  14
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let three = t.lit(3, DataType::Ubyte);
        let four = t.lit(4, DataType::Ubyte);
        let product = t.binary(three, BinaryOperator::Mul, four);
        let two = t.lit(2, DataType::Ubyte);
        let sum = t.binary(two, BinaryOperator::Add, product);
        let decl = t.const_var(block, "N", DataType::Ubyte, sum);

        fold(&mut t);

        let NodeKind::VarDecl { value: Some(v), .. } = t.ast.kind(decl) else {
            panic!("declaration lost its value");
        };
        assert_eq!(lit_value(&t.ast, *v), Some((14, DataType::Ubyte)));
    }

    #[test]
    fn test_reassociation_groups_constants() {
        // (a + 3) + 5  ->  a + 8
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        let a = t.var(sub, "a", DataType::Ubyte);
        let aref = t.ident_to("a", a);
        let three = t.lit(3, DataType::Ubyte);
        let inner = t.binary(aref, BinaryOperator::Add, three);
        let five = t.lit(5, DataType::Ubyte);
        let outer = t.binary(inner, BinaryOperator::Add, five);
        let target = t.target_var("a", Some(a));
        let assign = t.assign(sub, target, outer);

        fold(&mut t);

        let NodeKind::Assignment { value, .. } = t.ast.kind(assign) else {
            panic!("not an assignment");
        };
        let NodeKind::BinaryExpr { left, op, right } = t.ast.kind(*value) else {
            panic!("rhs did not stay a binary expression");
        };
        assert_eq!(*op, BinaryOperator::Add);
        assert_eq!(t.ast.identifier_target(*left), Some(a));
        assert_eq!(lit_value(&t.ast, *right), Some((8, DataType::Ubyte)));
    }

    #[test]
    fn test_reassociation_sub_patterns() {
        // 10 - (3 + a)  ->  7 - a
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        let a = t.var(sub, "a", DataType::Ubyte);
        let aref = t.ident_to("a", a);
        let three = t.lit(3, DataType::Ubyte);
        let inner = t.binary(three, BinaryOperator::Add, aref);
        let ten = t.lit(10, DataType::Ubyte);
        let outer = t.binary(ten, BinaryOperator::Sub, inner);
        let target = t.target_var("a", Some(a));
        let assign = t.assign(sub, target, outer);

        fold(&mut t);

        let NodeKind::Assignment { value, .. } = t.ast.kind(assign) else {
            panic!("not an assignment");
        };
        let NodeKind::BinaryExpr { left, op, right } = t.ast.kind(*value) else {
            panic!("rhs did not stay a binary expression");
        };
        assert_eq!(*op, BinaryOperator::Sub);
        assert_eq!(lit_value(&t.ast, *left), Some((7, DataType::Ubyte)));
        assert_eq!(t.ast.identifier_target(*right), Some(a));
    }

    #[test]
    fn test_integer_division_not_reassociated() {
        // (a * 10) / 4 must stay as written for integers.
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        let a = t.var(sub, "a", DataType::Ubyte);
        let aref = t.ident_to("a", a);
        let ten = t.lit(10, DataType::Ubyte);
        let inner = t.binary(aref, BinaryOperator::Mul, ten);
        let four = t.lit(4, DataType::Ubyte);
        let outer = t.binary(inner, BinaryOperator::Div, four);
        let target = t.target_var("a", Some(a));
        let assign = t.assign(sub, target, outer);

        fold(&mut t);

        let NodeKind::Assignment { value, .. } = t.ast.kind(assign) else {
            panic!("not an assignment");
        };
        let NodeKind::BinaryExpr { op, .. } = t.ast.kind(*value) else {
            panic!("rhs did not stay a binary expression");
        };
        assert_eq!(*op, BinaryOperator::Div);
    }

    #[test]
    fn test_const_identifier_inlined() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let thousand = t.lit(1000, DataType::Uword);
        let n = t.const_var(block, "N", DataType::Uword, thousand);
        let sub = t.subroutine(block, "start");
        let w = t.var(sub, "w", DataType::Uword);
        let nref = t.ident_to("N", n);
        let one = t.lit(1, DataType::Uword);
        let sum = t.binary(nref, BinaryOperator::Add, one);
        let target = t.target_var("w", Some(w));
        let assign = t.assign(sub, target, sum);

        fold(&mut t);

        let NodeKind::Assignment { value, .. } = t.ast.kind(assign) else {
            panic!("not an assignment");
        };
        assert_eq!(lit_value(&t.ast, *value), Some((1001, DataType::Uword)));
    }

    #[test]
    fn test_division_by_zero_diagnosed() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let one = t.lit(1, DataType::Ubyte);
        let zero = t.lit(0, DataType::Ubyte);
        let div = t.binary(one, BinaryOperator::Div, zero);
        t.const_var(block, "N", DataType::Ubyte, div);

        let (_, diags) = fold(&mut t);
        assert!(diags.iter().any(|d| d.code == DiagnosticCode::DivisionByZero));
    }

    #[test]
    fn test_float_overflow_diagnosed() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let big = t.flit(1.0e38);
        let ten = t.flit(10.0);
        let product = t.binary(big, BinaryOperator::Mul, ten);
        t.const_var(block, "F", DataType::Float, product);

        let (_, diags) = fold(&mut t);
        assert!(diags.iter().any(|d| d.code == DiagnosticCode::FloatOverflow));
    }

    #[test]
    fn test_range_desugared_to_array() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let from = t.lit(1, DataType::Ubyte);
        let to = t.lit(5, DataType::Ubyte);
        let range = t.range(from, to, None);
        let decl = t.array_var(block, "arr", DataType::ArrayUbyte, 5, Some(range));

        fold(&mut t);

        let NodeKind::VarDecl { value: Some(v), .. } = t.ast.kind(decl) else {
            panic!("declaration lost its value");
        };
        let NodeKind::ArrayLiteral { elements, .. } = t.ast.kind(*v) else {
            panic!("range was not expanded");
        };
        assert_eq!(elements.len(), 5);
        assert_eq!(lit_value(&t.ast, elements[0]), Some((1, DataType::Ubyte)));
        assert_eq!(lit_value(&t.ast, elements[4]), Some((5, DataType::Ubyte)));
    }

    #[test]
    fn test_range_size_mismatch_diagnosed() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let from = t.lit(1, DataType::Ubyte);
        let to = t.lit(5, DataType::Ubyte);
        let range = t.range(from, to, None);
        t.array_var(block, "arr", DataType::ArrayUbyte, 8, Some(range));

        let (_, diags) = fold(&mut t);
        assert!(diags
            .iter()
            .any(|d| d.code == DiagnosticCode::RangeSizeMismatch));
    }

    #[test]
    fn test_literal_promoted_to_target_type() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        let w = t.var(sub, "w", DataType::Uword);
        let five = t.lit(5, DataType::Ubyte);
        let target = t.target_var("w", Some(w));
        let assign = t.assign(sub, target, five);

        fold(&mut t);

        let NodeKind::Assignment { value, .. } = t.ast.kind(assign) else {
            panic!("not an assignment");
        };
        assert_eq!(lit_value(&t.ast, *value), Some((5, DataType::Uword)));
    }

    #[test]
    fn test_fold_is_idempotent() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let sub = t.subroutine(block, "start");
        let a = t.var(sub, "a", DataType::Ubyte);
        let aref = t.ident_to("a", a);
        let three = t.lit(3, DataType::Ubyte);
        let inner = t.binary(aref, BinaryOperator::Add, three);
        let five = t.lit(5, DataType::Ubyte);
        let outer = t.binary(inner, BinaryOperator::Add, five);
        let target = t.target_var("a", Some(a));
        t.assign(sub, target, outer);

        let (first, _) = fold(&mut t);
        assert!(first > 0);
        let mut diags = Diagnostics::new();
        let second = ConstantFolder::run(&mut t.ast, &mut diags).unwrap();
        assert_eq!(second, 0);
    }
}
