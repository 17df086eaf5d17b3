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

//! In-place modification of float targets.
//!
//! Floats are 5-byte CBM values operated on through FAC1: the operand is
//! loaded with `MOVFM`, combined with the target through the library's
//! mem-with-FAC routines (`FADD`, `FSUB`, `FMULT`, `FDIV`, `FPWR`), and the
//! result is stored back with `MOVMF`. Negation needs no library call at
//! all; it flips the sign bit in the stored representation directly.

use super::assignment::{offset_label, AsmTarget, AsmTargetKind};
use super::eval::ExpressionEval;
use super::{cg_err, AsmGen, CgResult};
use crate::analyzer::type_check::infer_type;
use crate::ast::{BinaryOperator, DataType, NodeId, NodeKind, PrefixOperator};
use crate::error::DiagnosticCode;

pub(crate) fn in_place_float(
    gen: &mut AsmGen,
    tgt: &AsmTarget,
    op: BinaryOperator,
    operand: NodeId,
) -> CgResult<()> {
    let routine = match op {
        BinaryOperator::Add => "floats.FADD",
        BinaryOperator::Sub => "floats.FSUB",
        BinaryOperator::Mul => "floats.FMULT",
        BinaryOperator::Div => "floats.FDIV",
        BinaryOperator::Pow => "floats.FPWR",
        _ => {
            return Err(cg_err(
                DiagnosticCode::InvalidOperand,
                format!("operator '{}' is not defined for floats", op),
                tgt.pos.clone(),
            ))
        }
    };

    let location = match &tgt.kind {
        AsmTargetKind::Variable { label } => label.clone(),
        AsmTargetKind::ArrayLiteralIndex { label, offset } => offset_label(label, *offset),
        _ => {
            return Err(cg_err(
                DiagnosticCode::UnsupportedStorage,
                "a float value cannot live in this storage",
                tgt.pos.clone(),
            ))
        }
    };

    // FAC1 takes the operand; the memory argument of the library routine
    // is the target itself (the routines compute mem op FAC).
    load_operand_into_fac1(gen, operand)?;
    gen.out.ins(format!("lda  #<{}", location));
    gen.out.ins(format!("ldy  #>{}", location));
    gen.out.jsr(routine);
    gen.out.ins(format!("ldx  #<{}", location));
    gen.out.ins(format!("ldy  #>{}", location));
    gen.out.jsr("floats.MOVMF");
    Ok(())
}

fn load_operand_into_fac1(gen: &mut AsmGen, operand: NodeId) -> CgResult<()> {
    // Simple operands are addressed directly; everything else evaluates
    // through the general float path.
    match gen.ast.kind(operand) {
        NodeKind::NumericLiteral { value, .. } => {
            let label = {
                let v = value.as_float();
                gen.float_const_label(v)
            };
            gen.out.ins(format!("lda  #<{}", label));
            gen.out.ins(format!("ldy  #>{}", label));
            gen.out.jsr("floats.MOVFM");
            Ok(())
        }
        NodeKind::IdentifierRef { .. } => {
            if infer_type(gen.ast, operand) == Some(DataType::Float) {
                let label = gen.symbol_label(operand)?;
                gen.out.ins(format!("lda  #<{}", label));
                gen.out.ins(format!("ldy  #>{}", label));
                gen.out.jsr("floats.MOVFM");
                Ok(())
            } else {
                Err(cg_err(
                    DiagnosticCode::TypeMismatch,
                    "float operation needs a float operand",
                    gen.ast.pos(operand),
                ))
            }
        }
        _ => gen.eval_float_into_fac1(operand, 0),
    }
}

pub(crate) fn in_place_prefix_float(
    gen: &mut AsmGen,
    tgt: &AsmTarget,
    op: PrefixOperator,
) -> CgResult<()> {
    let location = match &tgt.kind {
        AsmTargetKind::Variable { label } => label.clone(),
        AsmTargetKind::ArrayLiteralIndex { label, offset } => offset_label(label, *offset),
        _ => {
            return Err(cg_err(
                DiagnosticCode::UnsupportedStorage,
                "a float value cannot live in this storage",
                tgt.pos.clone(),
            ))
        }
    };
    match op {
        PrefixOperator::Minus => {
            // The sign lives in bit 7 of the first mantissa byte.
            gen.out.ins(format!("lda  {}+1", location));
            gen.out.ins("eor  #$80");
            gen.out.ins(format!("sta  {}+1", location));
            Ok(())
        }
        PrefixOperator::Plus => Ok(()),
        _ => Err(cg_err(
            DiagnosticCode::InvalidOperand,
            format!("operator '{}' is not defined for floats", op),
            tgt.pos.clone(),
        )),
    }
}
