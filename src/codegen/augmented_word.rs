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

//! In-place modification of word targets.
//!
//! Words live little-endian at `label` and `label+1`. Byte additions inline
//! `clc`/`adc` and propagate the carry into the high byte; constants that
//! are a multiple of $100 touch only the high byte (`w += $0200` becomes
//! two `inc w+1`). Shifts of eight or more move whole bytes; sixteen or
//! more clear the word. Narrowing bitwise AND zeroes the high byte.

use super::assignment::{offset_label, AsmTarget, AsmTargetKind};
use super::augmented::{analyze_operand, RhsForm};
use super::eval::ExpressionEval;
use super::target::{SCRATCH_REG, SCRATCH_W1, SCRATCH_W2};
use super::{cg_err, AsmGen, CgResult};
use crate::analyzer::type_check::infer_type;
use crate::ast::{BinaryOperator, DataType, NodeId, PrefixOperator};
use crate::error::DiagnosticCode;

/// Word multipliers with a dedicated optimized product routine.
pub(crate) const WORD_MULTIPLIERS: &[i64] =
    &[3, 5, 6, 7, 9, 10, 12, 15, 20, 25, 40, 50, 80, 100, 320];

/// Virtual registers used as word scratch homes by this module.
const VREG_OPERAND: &str = "cx16.r0";
const VREG_ELEMENT: &str = "cx16.r1";

/// The widened shape of a word operand.
enum WordForm {
    Imm(i64),
    /// A word variable (or scratch) label.
    Word(String),
    /// An unsigned byte variable; widening is done inline at the use site.
    UByte(String),
}

pub(crate) fn in_place_word(
    gen: &mut AsmGen,
    tgt: &AsmTarget,
    op: BinaryOperator,
    operand: NodeId,
) -> CgResult<()> {
    match &tgt.kind {
        AsmTargetKind::Variable { label } => {
            let label = label.clone();
            let form = word_form(gen, tgt, op, operand)?;
            in_place_word_location(gen, &label, tgt, op, &form)
        }
        AsmTargetKind::ArrayLiteralIndex { label, offset } => {
            let location = offset_label(label, *offset);
            let form = word_form(gen, tgt, op, operand)?;
            in_place_word_location(gen, &location, tgt, op, &form)
        }
        AsmTargetKind::ArrayRuntimeIndex { label, index } => {
            let (label, index) = (label.clone(), *index);
            let form = word_form(gen, tgt, op, operand)?;
            // Copy the element to a virtual register, modify it there with
            // the variable path, copy it back.
            gen.eval_byte_into_a(index)?;
            gen.out.ins("asl  a");
            gen.out.ins(format!("sta  {}", SCRATCH_REG));
            gen.out.ins("tay");
            gen.out.ins(format!("lda  {},y", label));
            gen.out.ins(format!("sta  {}", VREG_ELEMENT));
            gen.out.ins(format!("lda  {}+1,y", label));
            gen.out.ins(format!("sta  {}+1", VREG_ELEMENT));
            in_place_word_location(gen, VREG_ELEMENT, tgt, op, &form)?;
            gen.out.ins(format!("ldy  {}", SCRATCH_REG));
            gen.out.ins(format!("lda  {}", VREG_ELEMENT));
            gen.out.ins(format!("sta  {},y", label));
            gen.out.ins(format!("lda  {}+1", VREG_ELEMENT));
            gen.out.ins(format!("sta  {}+1,y", label));
            Ok(())
        }
        _ => Err(cg_err(
            DiagnosticCode::UnsupportedStorage,
            "a word value cannot live in this storage",
            tgt.pos.clone(),
        )),
    }
}

/// Normalize the operand to an immediate, a word label, or a ubyte label.
/// Arbitrary expressions and signed bytes evaluate into a virtual register
/// first.
fn word_form(
    gen: &mut AsmGen,
    tgt: &AsmTarget,
    op: BinaryOperator,
    operand: NodeId,
) -> CgResult<WordForm> {
    let shift = matches!(op, BinaryOperator::ShiftLeft | BinaryOperator::ShiftRight);
    match analyze_operand(gen, operand, tgt.dt)? {
        RhsForm::Imm(v) => Ok(WordForm::Imm(v)),
        RhsForm::Var(label) => Ok(WordForm::Word(label)),
        RhsForm::Mem(addr) => Ok(WordForm::UByte(super::to_hex(addr))),
        RhsForm::Expr(expr) => {
            let dt = infer_type(gen.ast, expr).unwrap_or(DataType::Uword);
            if shift || dt == DataType::Ubyte {
                // Shift counts and plain bytes stay byte-sized.
                if let Some(label) = byte_label(gen, expr)? {
                    return Ok(WordForm::UByte(label));
                }
                gen.eval_byte_into_a(expr)?;
                gen.out.ins(format!("sta  {}", VREG_OPERAND));
                return Ok(WordForm::UByte(VREG_OPERAND.to_string()));
            }
            if dt == DataType::Byte {
                // Sign-extend a signed byte into a word scratch.
                gen.eval_byte_into_a(expr)?;
                gen.out.ins(format!("sta  {}", VREG_OPERAND));
                gen.out.ins("ldy  #0");
                gen.out.ins("cmp  #$80");
                gen.out.ins("bcc  +");
                gen.out.ins("dey");
                gen.out.raw("+");
                gen.out.ins(format!("sty  {}+1", VREG_OPERAND));
                return Ok(WordForm::Word(VREG_OPERAND.to_string()));
            }
            gen.eval_word_into_ay(expr)?;
            gen.out.ins(format!("sta  {}", VREG_OPERAND));
            gen.out.ins(format!("sty  {}+1", VREG_OPERAND));
            Ok(WordForm::Word(VREG_OPERAND.to_string()))
        }
    }
}

/// A directly addressable byte operand, when the expression is one.
fn byte_label(gen: &mut AsmGen, expr: NodeId) -> CgResult<Option<String>> {
    match gen.ast.kind(expr) {
        crate::ast::NodeKind::IdentifierRef { .. } => {
            if infer_type(gen.ast, expr).map(|d| d.is_byte()) == Some(true) {
                Ok(Some(gen.symbol_label(expr)?))
            } else {
                Ok(None)
            }
        }
        _ => Ok(None),
    }
}

fn in_place_word_location(
    gen: &mut AsmGen,
    location: &str,
    tgt: &AsmTarget,
    op: BinaryOperator,
    form: &WordForm,
) -> CgResult<()> {
    let dt = tgt.dt;
    match op {
        BinaryOperator::Add => add_to_word(gen, location, form),
        BinaryOperator::Sub => subtract_from_word(gen, location, form),
        BinaryOperator::Mul => multiply_word(gen, location, tgt, form),
        BinaryOperator::Div => divide_word(gen, location, tgt, form, false),
        BinaryOperator::Remainder => {
            if dt.is_signed() {
                return Err(cg_err(
                    DiagnosticCode::SignedRemainder,
                    "remainder of signed integers is not defined",
                    tgt.pos.clone(),
                ));
            }
            divide_word(gen, location, tgt, form, true)
        }
        BinaryOperator::ShiftLeft => shift_word_left(gen, location, form),
        BinaryOperator::ShiftRight => shift_word_right(gen, location, dt, form),
        BinaryOperator::BitAnd | BinaryOperator::And => and_word(gen, location, form),
        BinaryOperator::BitOr | BinaryOperator::Or => or_xor_word(gen, location, form, "ora"),
        BinaryOperator::BitXor => or_xor_word(gen, location, form, "eor"),
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

fn add_to_word(gen: &mut AsmGen, location: &str, form: &WordForm) -> CgResult<()> {
    match form {
        WordForm::Imm(0) => {}
        WordForm::Imm(1) => {
            gen.out.ins(format!("inc  {}", location));
            gen.out.ins("bne  +");
            gen.out.ins(format!("inc  {}+1", location));
            gen.out.raw("+");
        }
        WordForm::Imm(v) if *v & 0xff == 0 => {
            // Only the high byte changes.
            let msb = (*v >> 8) & 0xff;
            if msb <= 2 {
                for _ in 0..msb {
                    gen.out.ins(format!("inc  {}+1", location));
                }
            } else {
                gen.out.ins(format!("lda  {}+1", location));
                gen.out.ins("clc");
                gen.out.ins(format!("adc  #{}", msb));
                gen.out.ins(format!("sta  {}+1", location));
            }
        }
        WordForm::Imm(v) if *v < 0x100 => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins("clc");
            gen.out.ins(format!("adc  #{}", v));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins("bcc  +");
            gen.out.ins(format!("inc  {}+1", location));
            gen.out.raw("+");
        }
        WordForm::Imm(v) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins("clc");
            gen.out.ins(format!("adc  #<{}", v));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("lda  {}+1", location));
            gen.out.ins(format!("adc  #>{}", v));
            gen.out.ins(format!("sta  {}+1", location));
        }
        WordForm::Word(o) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins("clc");
            gen.out.ins(format!("adc  {}", o));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("lda  {}+1", location));
            gen.out.ins(format!("adc  {}+1", o));
            gen.out.ins(format!("sta  {}+1", location));
        }
        WordForm::UByte(o) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins("clc");
            gen.out.ins(format!("adc  {}", o));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins("bcc  +");
            gen.out.ins(format!("inc  {}+1", location));
            gen.out.raw("+");
        }
    }
    Ok(())
}

fn subtract_from_word(gen: &mut AsmGen, location: &str, form: &WordForm) -> CgResult<()> {
    match form {
        WordForm::Imm(0) => {}
        WordForm::Imm(1) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins("bne  +");
            gen.out.ins(format!("dec  {}+1", location));
            gen.out.raw("+");
            gen.out.ins(format!("dec  {}", location));
        }
        WordForm::Imm(v) if *v & 0xff == 0 => {
            let msb = (*v >> 8) & 0xff;
            if msb <= 2 {
                for _ in 0..msb {
                    gen.out.ins(format!("dec  {}+1", location));
                }
            } else {
                gen.out.ins(format!("lda  {}+1", location));
                gen.out.ins("sec");
                gen.out.ins(format!("sbc  #{}", msb));
                gen.out.ins(format!("sta  {}+1", location));
            }
        }
        WordForm::Imm(v) if *v < 0x100 => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins("sec");
            gen.out.ins(format!("sbc  #{}", v));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins("bcs  +");
            gen.out.ins(format!("dec  {}+1", location));
            gen.out.raw("+");
        }
        WordForm::Imm(v) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins("sec");
            gen.out.ins(format!("sbc  #<{}", v));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("lda  {}+1", location));
            gen.out.ins(format!("sbc  #>{}", v));
            gen.out.ins(format!("sta  {}+1", location));
        }
        WordForm::Word(o) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins("sec");
            gen.out.ins(format!("sbc  {}", o));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("lda  {}+1", location));
            gen.out.ins(format!("sbc  {}+1", o));
            gen.out.ins(format!("sta  {}+1", location));
        }
        WordForm::UByte(o) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins("sec");
            gen.out.ins(format!("sbc  {}", o));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins("bcs  +");
            gen.out.ins(format!("dec  {}+1", location));
            gen.out.raw("+");
        }
    }
    Ok(())
}

fn multiply_word(
    gen: &mut AsmGen,
    location: &str,
    tgt: &AsmTarget,
    form: &WordForm,
) -> CgResult<()> {
    match form {
        WordForm::Imm(0) => {
            clear_word(gen, location);
            Ok(())
        }
        WordForm::Imm(1) => Ok(()),
        WordForm::Imm(v) if v.count_ones() == 1 => {
            let v = *v;
            if v >= 0x10000 {
                clear_word(gen, location);
            } else {
                for _ in 0..v.trailing_zeros() {
                    gen.out.ins(format!("asl  {}", location));
                    gen.out.ins(format!("rol  {}+1", location));
                }
            }
            Ok(())
        }
        WordForm::Imm(v) if WORD_MULTIPLIERS.contains(v) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("ldy  {}+1", location));
            gen.out.jsr(format!("math.mul_word_{}", v));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("sty  {}+1", location));
            Ok(())
        }
        WordForm::Imm(v) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("ldy  {}+1", location));
            gen.out.ins(format!("sta  {}", SCRATCH_W1));
            gen.out.ins(format!("sty  {}+1", SCRATCH_W1));
            gen.out.ins(format!("lda  #<{}", v));
            gen.out.ins(format!("ldy  #>{}", v));
            gen.out.jsr("math.multiply_words");
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("sty  {}+1", location));
            Ok(())
        }
        WordForm::Word(o) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("ldy  {}+1", location));
            gen.out.ins(format!("sta  {}", SCRATCH_W1));
            gen.out.ins(format!("sty  {}+1", SCRATCH_W1));
            gen.out.ins(format!("lda  {}", o));
            gen.out.ins(format!("ldy  {}+1", o));
            gen.out.jsr("math.multiply_words");
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("sty  {}+1", location));
            Ok(())
        }
        WordForm::UByte(o) => {
            // Word times byte goes through the general word product.
            let _ = tgt;
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("ldy  {}+1", location));
            gen.out.ins(format!("sta  {}", SCRATCH_W1));
            gen.out.ins(format!("sty  {}+1", SCRATCH_W1));
            gen.out.ins(format!("lda  {}", o));
            gen.out.ins("ldy  #0");
            gen.out.jsr("math.multiply_words");
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("sty  {}+1", location));
            Ok(())
        }
    }
}

fn divide_word(
    gen: &mut AsmGen,
    location: &str,
    tgt: &AsmTarget,
    form: &WordForm,
    remainder: bool,
) -> CgResult<()> {
    let signed = tgt.dt.is_signed();
    match form {
        WordForm::Imm(0) => Err(cg_err(
            DiagnosticCode::DivisionByZeroLiteral,
            "division by zero",
            tgt.pos.clone(),
        )),
        WordForm::Imm(1) if !remainder => Ok(()),
        WordForm::Imm(1) => {
            clear_word(gen, location);
            Ok(())
        }
        WordForm::Imm(v) if !signed && !remainder && v.count_ones() == 1 => {
            let v = *v;
            if v >= 0x10000 {
                clear_word(gen, location);
            } else {
                for _ in 0..v.trailing_zeros() {
                    gen.out.ins(format!("lsr  {}+1", location));
                    gen.out.ins(format!("ror  {}", location));
                }
            }
            Ok(())
        }
        WordForm::Imm(v) if !signed && remainder && v.count_ones() == 1 && *v <= 0x10000 => {
            let mask = *v - 1;
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("and  #<{}", mask));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("lda  {}+1", location));
            gen.out.ins(format!("and  #>{}", mask));
            gen.out.ins(format!("sta  {}+1", location));
            Ok(())
        }
        form => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("ldy  {}+1", location));
            gen.out.ins(format!("sta  {}", SCRATCH_W1));
            gen.out.ins(format!("sty  {}+1", SCRATCH_W1));
            match form {
                WordForm::Imm(v) => {
                    gen.out.ins(format!("lda  #<{}", v));
                    gen.out.ins(format!("ldy  #>{}", v));
                }
                WordForm::Word(o) => {
                    gen.out.ins(format!("lda  {}", o));
                    gen.out.ins(format!("ldy  {}+1", o));
                }
                WordForm::UByte(o) => {
                    gen.out.ins(format!("lda  {}", o));
                    gen.out.ins("ldy  #0");
                }
            }
            if signed {
                gen.out.jsr("math.divmod_w_asm");
            } else {
                gen.out.jsr("math.divmod_uw_asm");
            }
            if remainder {
                gen.out.ins(format!("lda  {}", SCRATCH_W2));
                gen.out.ins(format!("sta  {}", location));
                gen.out.ins(format!("lda  {}+1", SCRATCH_W2));
                gen.out.ins(format!("sta  {}+1", location));
            } else {
                gen.out.ins(format!("sta  {}", location));
                gen.out.ins(format!("sty  {}+1", location));
            }
            Ok(())
        }
    }
}

fn shift_word_left(gen: &mut AsmGen, location: &str, form: &WordForm) -> CgResult<()> {
    match form {
        WordForm::Imm(0) => {}
        WordForm::Imm(v) if *v >= 16 => clear_word(gen, location),
        WordForm::Imm(v) if *v >= 8 => {
            // The low byte becomes the high byte.
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("sta  {}+1", location));
            gen.out.clear_byte(location);
            for _ in 8..*v {
                gen.out.ins(format!("asl  {}+1", location));
            }
        }
        WordForm::Imm(v) if *v <= 3 => {
            for _ in 0..*v {
                gen.out.ins(format!("asl  {}", location));
                gen.out.ins(format!("rol  {}+1", location));
            }
        }
        WordForm::Imm(v) => {
            gen.out.ins(format!("ldy  #{}", v));
            gen.out.raw("-");
            gen.out.ins(format!("asl  {}", location));
            gen.out.ins(format!("rol  {}+1", location));
            gen.out.ins("dey");
            gen.out.ins("bne  -");
        }
        WordForm::Word(o) | WordForm::UByte(o) => {
            gen.out.ins(format!("ldy  {}", o));
            gen.out.ins("beq  +");
            gen.out.raw("-");
            gen.out.ins(format!("asl  {}", location));
            gen.out.ins(format!("rol  {}+1", location));
            gen.out.ins("dey");
            gen.out.ins("bne  -");
            gen.out.raw("+");
        }
    }
    Ok(())
}

fn shift_word_right(
    gen: &mut AsmGen,
    location: &str,
    dt: DataType,
    form: &WordForm,
) -> CgResult<()> {
    let signed = dt.is_signed();
    match form {
        WordForm::Imm(0) => {}
        WordForm::Imm(v) if !signed && *v >= 16 => clear_word(gen, location),
        WordForm::Imm(v) if !signed && *v >= 8 => {
            gen.out.ins(format!("lda  {}+1", location));
            gen.out.ins(format!("sta  {}", location));
            gen.out.clear_byte(&format!("{}+1", location));
            for _ in 8..*v {
                gen.out.ins(format!("lsr  {}", location));
            }
        }
        WordForm::Imm(v) if !signed && *v <= 3 => {
            for _ in 0..*v {
                gen.out.ins(format!("lsr  {}+1", location));
                gen.out.ins(format!("ror  {}", location));
            }
        }
        WordForm::Imm(v) if !signed => {
            gen.out.ins(format!("ldy  #{}", v));
            gen.out.raw("-");
            gen.out.ins(format!("lsr  {}+1", location));
            gen.out.ins(format!("ror  {}", location));
            gen.out.ins("dey");
            gen.out.ins("bne  -");
        }
        WordForm::Imm(v) => {
            // Arithmetic shift replicates the sign bit.
            let count = (*v).min(16);
            if count <= 2 {
                for _ in 0..count {
                    gen.out.ins(format!("lda  {}+1", location));
                    gen.out.ins("asl  a");
                    gen.out.ins(format!("ror  {}+1", location));
                    gen.out.ins(format!("ror  {}", location));
                }
            } else {
                gen.out.ins(format!("ldy  #{}", count));
                gen.out.raw("-");
                gen.out.ins(format!("lda  {}+1", location));
                gen.out.ins("asl  a");
                gen.out.ins(format!("ror  {}+1", location));
                gen.out.ins(format!("ror  {}", location));
                gen.out.ins("dey");
                gen.out.ins("bne  -");
            }
        }
        WordForm::Word(o) | WordForm::UByte(o) => {
            gen.out.ins(format!("ldy  {}", o));
            gen.out.ins("beq  +");
            gen.out.raw("-");
            if signed {
                gen.out.ins(format!("lda  {}+1", location));
                gen.out.ins("asl  a");
                gen.out.ins(format!("ror  {}+1", location));
                gen.out.ins(format!("ror  {}", location));
            } else {
                gen.out.ins(format!("lsr  {}+1", location));
                gen.out.ins(format!("ror  {}", location));
            }
            gen.out.ins("dey");
            gen.out.ins("bne  -");
            gen.out.raw("+");
        }
    }
    Ok(())
}

fn and_word(gen: &mut AsmGen, location: &str, form: &WordForm) -> CgResult<()> {
    match form {
        WordForm::Imm(0) => clear_word(gen, location),
        WordForm::Imm(0xffff) => {}
        WordForm::Imm(v) if *v < 0x100 => {
            // A byte mask zeroes the high byte entirely.
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("and  #{}", v));
            gen.out.ins(format!("sta  {}", location));
            gen.out.clear_byte(&format!("{}+1", location));
        }
        WordForm::Imm(v) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("and  #<{}", v));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("lda  {}+1", location));
            gen.out.ins(format!("and  #>{}", v));
            gen.out.ins(format!("sta  {}+1", location));
        }
        WordForm::Word(o) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("and  {}", o));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("lda  {}+1", location));
            gen.out.ins(format!("and  {}+1", o));
            gen.out.ins(format!("sta  {}+1", location));
        }
        WordForm::UByte(o) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("and  {}", o));
            gen.out.ins(format!("sta  {}", location));
            gen.out.clear_byte(&format!("{}+1", location));
        }
    }
    Ok(())
}

fn or_xor_word(
    gen: &mut AsmGen,
    location: &str,
    form: &WordForm,
    mnemonic: &str,
) -> CgResult<()> {
    match form {
        WordForm::Imm(0) => {}
        WordForm::Imm(v) if *v < 0x100 => {
            // Or and xor with a byte value leave the high byte alone.
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("{}  #{}", mnemonic, v));
            gen.out.ins(format!("sta  {}", location));
        }
        WordForm::Imm(v) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("{}  #<{}", mnemonic, v));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("lda  {}+1", location));
            gen.out.ins(format!("{}  #>{}", mnemonic, v));
            gen.out.ins(format!("sta  {}+1", location));
        }
        WordForm::Word(o) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("{}  {}", mnemonic, o));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("lda  {}+1", location));
            gen.out.ins(format!("{}  {}+1", mnemonic, o));
            gen.out.ins(format!("sta  {}+1", location));
        }
        WordForm::UByte(o) => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("{}  {}", mnemonic, o));
            gen.out.ins(format!("sta  {}", location));
        }
    }
    Ok(())
}

fn clear_word(gen: &mut AsmGen, location: &str) {
    gen.out.clear_byte(location);
    gen.out.clear_byte(&format!("{}+1", location));
}

pub(crate) fn in_place_prefix_word(
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
                "unsupported storage for an in-place word modification",
                tgt.pos.clone(),
            ))
        }
    };
    match op {
        PrefixOperator::Minus => {
            // 0 - target, low byte first to propagate the borrow.
            gen.out.ins("lda  #0");
            gen.out.ins("sec");
            gen.out.ins(format!("sbc  {}", location));
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins("lda  #0");
            gen.out.ins(format!("sbc  {}+1", location));
            gen.out.ins(format!("sta  {}+1", location));
        }
        PrefixOperator::BitInvert => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins("eor  #255");
            gen.out.ins(format!("sta  {}", location));
            gen.out.ins(format!("lda  {}+1", location));
            gen.out.ins("eor  #255");
            gen.out.ins(format!("sta  {}+1", location));
        }
        PrefixOperator::Not => {
            gen.out.ins(format!("lda  {}", location));
            gen.out.ins(format!("ora  {}+1", location));
            gen.out.ins("beq  +");
            gen.out.ins("lda  #1");
            gen.out.raw("+");
            gen.out.ins("eor  #1");
            gen.out.ins(format!("sta  {}", location));
            gen.out.clear_byte(&format!("{}+1", location));
        }
        PrefixOperator::Plus => {}
    }
    Ok(())
}
