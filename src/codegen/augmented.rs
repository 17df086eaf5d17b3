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

//! In-place code generation for augmentable assignments.
//!
//! Handles the desugared form `target = target op operand` (and the prefix
//! and cast shapes) as a direct modification of the target's storage,
//! without a general evaluate-then-store round trip. Dispatch runs along
//! three axes: the storage kind of the target, the operand type (byte,
//! word, float), and the shape of the right-hand side (literal, variable,
//! direct memory read, typecast, arbitrary expression).
//!
//! Register and stack targets are rejected here; those only travel the
//! general assignment path.

use super::assignment::{
    classify_target, offset_label, target_matches, AsmTarget, AsmTargetKind, AssignmentEmitter,
    Operand,
};
use super::eval::ExpressionEval;
use super::target::{SCRATCH_B1, SCRATCH_REG, SCRATCH_W2};
use super::{cg_err, to_hex, AsmGen, CgResult};
use crate::analyzer::type_check::infer_type;
use crate::ast::{BinaryOperator, DataType, NodeId, NodeKind, PrefixOperator};
use crate::error::DiagnosticCode;

/// Byte multipliers with a dedicated optimized product routine.
pub(crate) const BYTE_MULTIPLIERS: &[i64] = &[3, 5, 6, 7, 9, 10, 11, 12, 13, 14, 15, 20, 25, 40];

/// Translate an augmentable assignment as an in-place update.
pub(crate) fn translate(gen: &mut AsmGen, assign: NodeId) -> CgResult<()> {
    let NodeKind::Assignment { target, value, .. } = gen.ast.kind(assign) else {
        return Ok(());
    };
    let (target, value) = (*target, *value);
    let tgt = classify_target(gen, target)?;

    match &tgt.kind {
        AsmTargetKind::Register { .. } => {
            return Err(cg_err(
                DiagnosticCode::UnsupportedStorage,
                "in-place modification of a register is not supported here",
                tgt.pos.clone(),
            ))
        }
        AsmTargetKind::Stack => {
            return Err(cg_err(
                DiagnosticCode::UnsupportedStorage,
                "in-place modification of a stack value is not supported here",
                tgt.pos.clone(),
            ))
        }
        _ => {}
    }

    match gen.ast.kind(value) {
        NodeKind::BinaryExpr { left, op, right } => {
            let (left, op, right) = (*left, *op, *right);
            if target_matches(gen.ast, target, left) {
                return in_place(gen, &tgt, op, right);
            }
            if op.is_associative() && target_matches(gen.ast, target, right) {
                return in_place(gen, &tgt, op, left);
            }
            translate_two_level(gen, &tgt, target, value, left, op, right)
        }
        NodeKind::PrefixExpr { op, expr } => {
            let (op, expr) = (*op, *expr);
            let _ = expr;
            in_place_prefix(gen, &tgt, op)
        }
        NodeKind::TypecastExpr { dt, expr, .. } => {
            let (cast_dt, inner) = (*dt, *expr);
            translate_cast(gen, &tgt, target, value, cast_dt, inner)
        }
        _ => gen.translate_normal_assignment(target, value),
    }
}

/// The two-level same-operator shape: apply the two other leaves one after
/// the other. When the target is not the leftmost leaf this is only valid
/// for associative operators; anything else falls back to the general path.
fn translate_two_level(
    gen: &mut AsmGen,
    tgt: &AsmTarget,
    target: NodeId,
    value: NodeId,
    left: NodeId,
    op: BinaryOperator,
    right: NodeId,
) -> CgResult<()> {
    if let NodeKind::BinaryExpr {
        left: ll,
        op: lop,
        right: lr,
    } = gen.ast.kind(left)
    {
        let (ll, lop, lr) = (*ll, *lop, *lr);
        if lop == op && target_matches(gen.ast, target, ll) {
            // (A op X) op Y
            in_place(gen, tgt, op, lr)?;
            return in_place(gen, tgt, op, right);
        }
        if lop == op && op.is_associative() && target_matches(gen.ast, target, lr) {
            // (X op A) op Y
            in_place(gen, tgt, op, ll)?;
            return in_place(gen, tgt, op, right);
        }
    }
    if let NodeKind::BinaryExpr {
        left: rl,
        op: rop,
        right: rr,
    } = gen.ast.kind(right)
    {
        let (rl, rop, rr) = (*rl, *rop, *rr);
        if rop == op && op.is_associative() {
            // X op (A op Y) and X op (Y op A)
            if target_matches(gen.ast, target, rl) {
                in_place(gen, tgt, op, left)?;
                return in_place(gen, tgt, op, rr);
            }
            if target_matches(gen.ast, target, rr) {
                in_place(gen, tgt, op, left)?;
                return in_place(gen, tgt, op, rl);
            }
        }
    }
    gen.translate_normal_assignment(target, value)
}

/// The cast shape `A = T(A)`. A cast to the same or a wider integer type
/// is a no-op for this path and is stripped; everything else goes through
/// the general assignment.
fn translate_cast(
    gen: &mut AsmGen,
    tgt: &AsmTarget,
    target: NodeId,
    value: NodeId,
    cast_dt: DataType,
    inner: NodeId,
) -> CgResult<()> {
    // Look through one nested cast for the target itself.
    let source = match gen.ast.kind(inner) {
        NodeKind::TypecastExpr { expr, .. } => *expr,
        _ => inner,
    };
    let natural = infer_type(gen.ast, source);
    if let Some(natural) = natural {
        let redundant = cast_dt != DataType::Float
            && natural != DataType::Float
            && cast_dt.size() >= natural.size();
        if redundant && target_matches(gen.ast, target, source) {
            return Ok(());
        }
    }
    if natural.is_none() {
        return Err(cg_err(
            DiagnosticCode::UnknownCastType,
            "no known type for the casted expression",
            gen.ast.pos(value),
        ));
    }
    gen.translate_normal_assignment(target, value)
}

// ---------------------------------------------------------------------------
// operand analysis
// ---------------------------------------------------------------------------

/// The shape of the right-hand operand of an in-place operation.
#[derive(Debug, Clone)]
pub(crate) enum RhsForm {
    /// An integer literal.
    Imm(i64),
    /// A named variable of matching width.
    Var(String),
    /// A direct memory read at a fixed address.
    Mem(u16),
    /// Anything else; evaluated into a scratch location first.
    Expr(NodeId),
}

impl RhsForm {
    fn operand(&self) -> Operand {
        match self {
            RhsForm::Imm(v) => Operand::Imm(*v),
            RhsForm::Var(label) => Operand::Var(label.clone()),
            RhsForm::Mem(addr) => Operand::Mem(*addr),
            RhsForm::Expr(_) => Operand::Var(SCRATCH_B1.to_string()),
        }
    }
}

/// Classify an operand expression, stripping redundant casts.
pub(crate) fn analyze_operand(
    gen: &mut AsmGen,
    expr: NodeId,
    width: DataType,
) -> CgResult<RhsForm> {
    match gen.ast.kind(expr) {
        NodeKind::NumericLiteral { .. } => {
            if let Some(v) = gen.ast.integer_literal_value(expr) {
                return Ok(RhsForm::Imm(v));
            }
            Ok(RhsForm::Expr(expr))
        }
        NodeKind::IdentifierRef { .. } => {
            let dt = infer_type(gen.ast, expr);
            if dt.map(|d| d.size()) == Some(width.size()) {
                let label = gen.symbol_label(expr)?;
                return Ok(RhsForm::Var(label));
            }
            Ok(RhsForm::Expr(expr))
        }
        NodeKind::DirectMemoryRead { address } => {
            let address = *address;
            if width.is_byte() {
                if let Some(a) = gen.ast.integer_literal_value(address) {
                    return Ok(RhsForm::Mem(a as u16));
                }
            }
            Ok(RhsForm::Expr(expr))
        }
        NodeKind::TypecastExpr { dt, expr: inner, .. } => {
            let (cast_dt, inner) = (*dt, *inner);
            let natural = infer_type(gen.ast, inner).ok_or_else(|| {
                cg_err(
                    DiagnosticCode::UnknownCastType,
                    "no known type for the casted expression",
                    gen.ast.pos(expr),
                )
            })?;
            let redundant = cast_dt != DataType::Float
                && natural != DataType::Float
                && cast_dt.size() >= natural.size();
            if redundant {
                return analyze_operand(gen, inner, width);
            }
            Ok(RhsForm::Expr(expr))
        }
        _ => Ok(RhsForm::Expr(expr)),
    }
}

// ---------------------------------------------------------------------------
// in-place dispatch
// ---------------------------------------------------------------------------

pub(crate) fn in_place(
    gen: &mut AsmGen,
    tgt: &AsmTarget,
    op: BinaryOperator,
    operand: NodeId,
) -> CgResult<()> {
    // A shift count is a byte quantity; a word shift amount is an error.
    if matches!(op, BinaryOperator::ShiftLeft | BinaryOperator::ShiftRight) {
        if let Some(dt) = infer_type(gen.ast, operand) {
            if dt.is_word() {
                return Err(cg_err(
                    DiagnosticCode::ShiftCountNotByte,
                    "shift count must be a byte value",
                    gen.ast.pos(operand),
                ));
            }
        }
    }

    match tgt.dt {
        dt if dt.is_byte() => in_place_byte(gen, tgt, op, operand),
        dt if dt.is_word() => super::augmented_word::in_place_word(gen, tgt, op, operand),
        DataType::Float => super::augmented_float::in_place_float(gen, tgt, op, operand),
        _ => Err(cg_err(
            DiagnosticCode::UnknownType,
            format!("cannot modify a {} value in place", tgt.dt.name()),
            tgt.pos.clone(),
        )),
    }
}

// ---------------------------------------------------------------------------
// byte targets
// ---------------------------------------------------------------------------

fn in_place_byte(
    gen: &mut AsmGen,
    tgt: &AsmTarget,
    op: BinaryOperator,
    operand: NodeId,
) -> CgResult<()> {
    let form = analyze_operand(gen, operand, tgt.dt)?;

    match &tgt.kind {
        AsmTargetKind::Variable { label } => {
            let label = label.clone();
            let form = spill_expr_operand(gen, form)?;
            in_place_byte_location(gen, &label, tgt, op, &form)
        }
        AsmTargetKind::ArrayLiteralIndex { label, offset } => {
            let location = offset_label(label, *offset);
            let form = spill_expr_operand(gen, form)?;
            in_place_byte_location(gen, &location, tgt, op, &form)
        }
        AsmTargetKind::MemoryLiteral { address } => {
            let location = to_hex(*address);
            let form = spill_expr_operand(gen, form)?;
            in_place_byte_location(gen, &location, tgt, op, &form)
        }
        AsmTargetKind::MemoryPointer { label, zeropage } => {
            let (label, zeropage) = (label.clone(), *zeropage);
            let form = spill_expr_operand(gen, form)?;
            let pointer = if zeropage {
                label
            } else {
                gen.out.ins(format!("lda  {}", label));
                gen.out.ins(format!("sta  {}", SCRATCH_W2));
                gen.out.ins(format!("lda  {}+1", label));
                gen.out.ins(format!("sta  {}+1", SCRATCH_W2));
                SCRATCH_W2.to_string()
            };
            gen.out.ins("ldy  #0");
            gen.out.ins(format!("lda  ({}),y", pointer));
            gen.apply_byte_op_to_a(tgt.dt, op, &form.operand())?;
            gen.out.ins("ldy  #0");
            gen.out.ins(format!("sta  ({}),y", pointer));
            Ok(())
        }
        AsmTargetKind::MemoryComputed { address } => {
            let address = *address;
            gen.eval_word_into_ay(address)?;
            gen.out.ins("pha");
            gen.out.ins("tya");
            gen.out.ins("pha");
            let form = spill_expr_operand(gen, form)?;
            gen.out.jsr("prog8_lib.read_byte_from_address_on_stack");
            gen.apply_byte_op_to_a(tgt.dt, op, &form.operand())?;
            gen.out.jsr("prog8_lib.write_byte_to_address_on_stack");
            Ok(())
        }
        AsmTargetKind::ArrayRuntimeIndex { label, index } => {
            let (label, index) = (label.clone(), *index);
            gen.eval_byte_into_a(index)?;
            gen.out.ins(format!("sta  {}", SCRATCH_REG));
            let form = spill_expr_operand(gen, form)?;
            gen.out.ins(format!("ldy  {}", SCRATCH_REG));
            gen.out.ins(format!("lda  {},y", label));
            gen.apply_byte_op_to_a(tgt.dt, op, &form.operand())?;
            gen.out.ins(format!("ldy  {}", SCRATCH_REG));
            gen.out.ins(format!("sta  {},y", label));
            Ok(())
        }
        AsmTargetKind::Register { .. } | AsmTargetKind::Stack => unreachable!(),
    }
}

/// Evaluate an expression operand into the byte scratch so the in-place
/// code can address it like a variable.
fn spill_expr_operand(gen: &mut AsmGen, form: RhsForm) -> CgResult<RhsForm> {
    if let RhsForm::Expr(expr) = form {
        gen.eval_byte_into_a(expr)?;
        gen.out.ins(format!("sta  {}", SCRATCH_B1));
        return Ok(RhsForm::Var(SCRATCH_B1.to_string()));
    }
    Ok(form)
}

/// The tuned in-place byte operations on a directly addressable location.
fn in_place_byte_location(
    gen: &mut AsmGen,
    location: &str,
    tgt: &AsmTarget,
    op: BinaryOperator,
    form: &RhsForm,
) -> CgResult<()> {
    let dt = tgt.dt;
    match op {
        BinaryOperator::Add => match form {
            RhsForm::Imm(0) => Ok(()),
            RhsForm::Imm(1) => {
                gen.out.ins(format!("inc  {}", location));
                Ok(())
            }
            form => {
                gen.out.ins(format!("lda  {}", location));
                gen.out.ins("clc");
                gen.out.ins(format!("adc  {}", form_text(form)));
                gen.out.ins(format!("sta  {}", location));
                Ok(())
            }
        },
        BinaryOperator::Sub => match form {
            RhsForm::Imm(0) => Ok(()),
            RhsForm::Imm(1) => {
                gen.out.ins(format!("dec  {}", location));
                Ok(())
            }
            form => {
                gen.out.ins(format!("lda  {}", location));
                gen.out.ins("sec");
                gen.out.ins(format!("sbc  {}", form_text(form)));
                gen.out.ins(format!("sta  {}", location));
                Ok(())
            }
        },
        BinaryOperator::Mul => match form {
            RhsForm::Imm(0) => {
                gen.out.clear_byte(location);
                Ok(())
            }
            RhsForm::Imm(1) => Ok(()),
            RhsForm::Imm(v) if v.count_ones() == 1 => {
                let v = *v;
                if v >= 256 {
                    gen.out.clear_byte(location);
                } else {
                    for _ in 0..v.trailing_zeros() {
                        gen.out.ins(format!("asl  {}", location));
                    }
                }
                Ok(())
            }
            RhsForm::Imm(v) if BYTE_MULTIPLIERS.contains(v) => {
                gen.out.ins(format!("lda  {}", location));
                gen.out.jsr(format!("math.mul_byte_{}", v));
                gen.out.ins(format!("sta  {}", location));
                Ok(())
            }
            form => {
                gen.out.ins(format!("lda  {}", location));
                gen.out.ins(format!("ldy  {}", form_text(form)));
                gen.out.jsr("math.multiply_bytes");
                gen.out.ins(format!("sta  {}", location));
                Ok(())
            }
        },
        BinaryOperator::Div => match form {
            RhsForm::Imm(0) => Err(cg_err(
                DiagnosticCode::DivisionByZeroLiteral,
                "division by zero",
                tgt.pos.clone(),
            )),
            RhsForm::Imm(1) => Ok(()),
            RhsForm::Imm(v) if !dt.is_signed() && v.count_ones() == 1 => {
                let v = *v;
                if v >= 256 {
                    gen.out.clear_byte(location);
                } else {
                    for _ in 0..v.trailing_zeros() {
                        gen.out.ins(format!("lsr  {}", location));
                    }
                }
                Ok(())
            }
            form => {
                // Signed and unsigned division have separate routines.
                gen.out.ins(format!("lda  {}", location));
                gen.out.ins(format!("ldy  {}", form_text(form)));
                if dt.is_signed() {
                    gen.out.jsr("math.divmod_b_asm");
                } else {
                    gen.out.jsr("math.divmod_ub_asm");
                }
                gen.out.ins(format!("sty  {}", location));
                Ok(())
            }
        },
        BinaryOperator::Remainder => {
            if dt.is_signed() {
                return Err(cg_err(
                    DiagnosticCode::SignedRemainder,
                    "remainder of signed integers is not defined",
                    tgt.pos.clone(),
                ));
            }
            match form {
                RhsForm::Imm(0) => Err(cg_err(
                    DiagnosticCode::DivisionByZeroLiteral,
                    "division by zero",
                    tgt.pos.clone(),
                )),
                RhsForm::Imm(1) => {
                    gen.out.clear_byte(location);
                    Ok(())
                }
                RhsForm::Imm(v) if v.count_ones() == 1 && *v < 256 => {
                    gen.out.ins(format!("lda  {}", location));
                    gen.out.ins(format!("and  #{}", v - 1));
                    gen.out.ins(format!("sta  {}", location));
                    Ok(())
                }
                form => {
                    gen.out.ins(format!("lda  {}", location));
                    gen.out.ins(format!("ldy  {}", form_text(form)));
                    gen.out.jsr("math.divmod_ub_asm");
                    gen.out.ins(format!("sta  {}", location));
                    Ok(())
                }
            }
        }
        BinaryOperator::ShiftLeft => match form {
            RhsForm::Imm(0) => Ok(()),
            RhsForm::Imm(v) if *v >= 8 => {
                // Shifting an entire byte out leaves zero.
                gen.out.clear_byte(location);
                Ok(())
            }
            RhsForm::Imm(v) if *v <= 4 => {
                for _ in 0..*v {
                    gen.out.ins(format!("asl  {}", location));
                }
                Ok(())
            }
            RhsForm::Imm(v) => {
                gen.out.ins(format!("ldy  #{}", v));
                gen.out.raw("-");
                gen.out.ins(format!("asl  {}", location));
                gen.out.ins("dey");
                gen.out.ins("bne  -");
                Ok(())
            }
            form => {
                gen.out.ins(format!("ldy  {}", form_text(form)));
                gen.out.ins("beq  +");
                gen.out.raw("-");
                gen.out.ins(format!("asl  {}", location));
                gen.out.ins("dey");
                gen.out.ins("bne  -");
                gen.out.raw("+");
                Ok(())
            }
        },
        BinaryOperator::ShiftRight => {
            if dt.is_signed() {
                return in_place_byte_shift_right_signed(gen, location, form);
            }
            match form {
                RhsForm::Imm(0) => Ok(()),
                RhsForm::Imm(v) if *v >= 8 => {
                    gen.out.clear_byte(location);
                    Ok(())
                }
                RhsForm::Imm(v) if *v <= 4 => {
                    for _ in 0..*v {
                        gen.out.ins(format!("lsr  {}", location));
                    }
                    Ok(())
                }
                RhsForm::Imm(v) => {
                    gen.out.ins(format!("ldy  #{}", v));
                    gen.out.raw("-");
                    gen.out.ins(format!("lsr  {}", location));
                    gen.out.ins("dey");
                    gen.out.ins("bne  -");
                    Ok(())
                }
                form => {
                    gen.out.ins(format!("ldy  {}", form_text(form)));
                    gen.out.ins("beq  +");
                    gen.out.raw("-");
                    gen.out.ins(format!("lsr  {}", location));
                    gen.out.ins("dey");
                    gen.out.ins("bne  -");
                    gen.out.raw("+");
                    Ok(())
                }
            }
        }
        BinaryOperator::BitAnd | BinaryOperator::And => match form {
            RhsForm::Imm(0) => {
                gen.out.clear_byte(location);
                Ok(())
            }
            RhsForm::Imm(255) => Ok(()),
            form => {
                gen.out.ins(format!("lda  {}", location));
                gen.out.ins(format!("and  {}", form_text(form)));
                gen.out.ins(format!("sta  {}", location));
                Ok(())
            }
        },
        BinaryOperator::BitOr | BinaryOperator::Or => match form {
            RhsForm::Imm(0) => Ok(()),
            RhsForm::Imm(255) => {
                gen.out.ins("lda  #255");
                gen.out.ins(format!("sta  {}", location));
                Ok(())
            }
            form => {
                gen.out.ins(format!("lda  {}", location));
                gen.out.ins(format!("ora  {}", form_text(form)));
                gen.out.ins(format!("sta  {}", location));
                Ok(())
            }
        },
        BinaryOperator::BitXor => match form {
            RhsForm::Imm(0) => Ok(()),
            form => {
                gen.out.ins(format!("lda  {}", location));
                gen.out.ins(format!("eor  {}", form_text(form)));
                gen.out.ins(format!("sta  {}", location));
                Ok(())
            }
        },
        BinaryOperator::Pow => Err(cg_err(
            DiagnosticCode::InvalidOperand,
            "power is only available for floats",
            tgt.pos.clone(),
        )),
        _ => Err(cg_err(
            DiagnosticCode::InvalidOperand,
            format!("operator '{}' has no in-place form", op),
            tgt.pos.clone(),
        )),
    }
}

/// Arithmetic shift right keeps the sign bit. Small constant counts are
/// unrolled; everything else goes through the shift helper routine.
fn in_place_byte_shift_right_signed(
    gen: &mut AsmGen,
    location: &str,
    form: &RhsForm,
) -> CgResult<()> {
    match form {
        RhsForm::Imm(0) => Ok(()),
        RhsForm::Imm(v) if *v <= 2 => {
            for _ in 0..*v {
                gen.out.ins(format!("lda  {}", location));
                gen.out.ins("asl  a");
                gen.out.ins(format!("ror  {}", location));
            }
            Ok(())
        }
        RhsForm::Imm(v) => {
            // Eight or more shifts saturate to the sign fill; the helper
            // handles that uniformly.
            let count = (*v).min(8);
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("ldy  #{}", count));
            gen.out.jsr("math.lsr_byte_A");
            gen.out.ins(format!("sta  {}", location));
            Ok(())
        }
        form => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("ldy  {}", form_text(form)));
            gen.out.jsr("math.lsr_byte_A");
            gen.out.ins(format!("sta  {}", location));
            Ok(())
        }
    }
}

fn form_text(form: &RhsForm) -> String {
    form.operand().text()
}

// ---------------------------------------------------------------------------
// prefix operators in place
// ---------------------------------------------------------------------------

pub(crate) fn in_place_prefix(
    gen: &mut AsmGen,
    tgt: &AsmTarget,
    op: PrefixOperator,
) -> CgResult<()> {
    if op == PrefixOperator::Plus {
        return Ok(());
    }
    match tgt.dt {
        dt if dt.is_byte() => in_place_prefix_byte(gen, tgt, op),
        dt if dt.is_word() => super::augmented_word::in_place_prefix_word(gen, tgt, op),
        DataType::Float => super::augmented_float::in_place_prefix_float(gen, tgt, op),
        _ => Err(cg_err(
            DiagnosticCode::UnknownType,
            format!("cannot modify a {} value in place", tgt.dt.name()),
            tgt.pos.clone(),
        )),
    }
}

fn in_place_prefix_byte(gen: &mut AsmGen, tgt: &AsmTarget, op: PrefixOperator) -> CgResult<()> {
    let location = match &tgt.kind {
        AsmTargetKind::Variable { label } => Some(label.clone()),
        AsmTargetKind::ArrayLiteralIndex { label, offset } => Some(offset_label(label, *offset)),
        AsmTargetKind::MemoryLiteral { address } => Some(to_hex(*address)),
        _ => None,
    };
    if let Some(location) = location {
        match op {
            PrefixOperator::Minus => {
                // Integer negation expands to 0 - target.
                gen.out.ins("lda  #0");
                gen.out.ins("sec");
                gen.out.ins(format!("sbc  {}", location));
                gen.out.ins(format!("sta  {}", location));
            }
            PrefixOperator::BitInvert => {
                gen.out.ins(format!("lda  {}", location));
                gen.out.ins("eor  #255");
                gen.out.ins(format!("sta  {}", location));
            }
            PrefixOperator::Not => {
                gen.out.ins(format!("lda  {}", location));
                gen.out.ins("beq  +");
                gen.out.ins("lda  #1");
                gen.out.raw("+");
                gen.out.ins("eor  #1");
                gen.out.ins(format!("sta  {}", location));
            }
            PrefixOperator::Plus => {}
        }
        return Ok(());
    }

    // Pointer, computed memory and runtime array targets modify through
    // the accumulator.
    rmw_byte_target(gen, tgt, |gen| {
        match op {
            PrefixOperator::Minus => {
                gen.out.ins("eor  #255");
                gen.out.ins("clc");
                gen.out.ins("adc  #1");
            }
            PrefixOperator::BitInvert => gen.out.ins("eor  #255"),
            PrefixOperator::Not => {
                gen.out.ins("beq  +");
                gen.out.ins("lda  #1");
                gen.out.raw("+");
                gen.out.ins("eor  #1");
            }
            PrefixOperator::Plus => {}
        }
        Ok(())
    })
}

/// Load the target byte into A, run `modify`, store A back.
fn rmw_byte_target<F>(gen: &mut AsmGen, tgt: &AsmTarget, modify: F) -> CgResult<()>
where
    F: FnOnce(&mut AsmGen) -> CgResult<()>,
{
    match &tgt.kind {
        AsmTargetKind::MemoryPointer { label, zeropage } => {
            let (label, zeropage) = (label.clone(), *zeropage);
            let pointer = if zeropage {
                label
            } else {
                gen.out.ins(format!("lda  {}", label));
                gen.out.ins(format!("sta  {}", SCRATCH_W2));
                gen.out.ins(format!("lda  {}+1", label));
                gen.out.ins(format!("sta  {}+1", SCRATCH_W2));
                SCRATCH_W2.to_string()
            };
            gen.out.ins("ldy  #0");
            gen.out.ins(format!("lda  ({}),y", pointer));
            modify(gen)?;
            gen.out.ins("ldy  #0");
            gen.out.ins(format!("sta  ({}),y", pointer));
            Ok(())
        }
        AsmTargetKind::MemoryComputed { address } => {
            let address = *address;
            gen.eval_word_into_ay(address)?;
            gen.out.ins("pha");
            gen.out.ins("tya");
            gen.out.ins("pha");
            gen.out.jsr("prog8_lib.read_byte_from_address_on_stack");
            modify(gen)?;
            gen.out.jsr("prog8_lib.write_byte_to_address_on_stack");
            Ok(())
        }
        AsmTargetKind::ArrayRuntimeIndex { label, index } => {
            let (label, index) = (label.clone(), *index);
            gen.eval_byte_into_a(index)?;
            gen.out.ins(format!("sta  {}", SCRATCH_REG));
            gen.out.ins(format!("ldy  {}", SCRATCH_REG));
            gen.out.ins(format!("lda  {},y", label));
            modify(gen)?;
            gen.out.ins(format!("ldy  {}", SCRATCH_REG));
            gen.out.ins(format!("sta  {},y", label));
            Ok(())
        }
        _ => Err(cg_err(
            DiagnosticCode::UnsupportedStorage,
            "unsupported storage for an in-place modification",
            tgt.pos.clone(),
        )),
    }
}
