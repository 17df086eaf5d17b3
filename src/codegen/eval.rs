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

//! General expression evaluation.
//!
//! Byte values are evaluated into the accumulator, word values into the
//! A/Y register pair (A low, Y high), float values into FAC1. Nested
//! operands spill to the CPU stack and the zero-page scratch registers;
//! nested float operands spill to a small set of float temporaries emitted
//! with the program footer.

use super::assignment::{offset_label, Operand};
use super::target::{SCRATCH_B1, SCRATCH_REG, SCRATCH_W1, SCRATCH_W2};
use super::{cg_err, to_hex, AsmGen, CgResult};
use crate::analyzer::type_check::{declaration_type, infer_type};
use crate::ast::{BinaryOperator, DataType, NodeId, NodeKind, NumericValue, PrefixOperator};
use crate::error::DiagnosticCode;

/// How many float temporaries exist for nested float expressions.
pub(crate) const FLOAT_TEMP_COUNT: usize = 3;

/// Extension trait for expression evaluation.
pub(crate) trait ExpressionEval {
    fn eval_byte_into_a(&mut self, expr: NodeId) -> CgResult<()>;
    fn eval_word_into_ay(&mut self, expr: NodeId) -> CgResult<()>;
    fn eval_float_into_fac1(&mut self, expr: NodeId, depth: usize) -> CgResult<()>;

    /// Apply a binary operator to the accumulator with the given operand.
    fn apply_byte_op_to_a(
        &mut self,
        dt: DataType,
        op: BinaryOperator,
        operand: &Operand,
    ) -> CgResult<()>;

    /// Leave the address of `label[index]` (5-byte elements) in the second
    /// word scratch.
    fn float_element_address_into_w2(&mut self, label: &str, index: NodeId) -> CgResult<()>;
}

impl ExpressionEval for AsmGen<'_> {
    fn eval_byte_into_a(&mut self, expr: NodeId) -> CgResult<()> {
        match self.ast.kind(expr) {
            NodeKind::NumericLiteral { value, .. } => {
                let v = match value {
                    NumericValue::Integer(v) => *v,
                    NumericValue::Float(_) => {
                        return Err(cg_err(
                            DiagnosticCode::UnknownCastType,
                            "float literal in a byte context",
                            self.ast.pos(expr),
                        ))
                    }
                };
                self.out.ins(format!("lda  #{}", v as u8));
                Ok(())
            }
            NodeKind::IdentifierRef { .. } => {
                let label = self.symbol_label(expr)?;
                self.out.ins(format!("lda  {}", label));
                Ok(())
            }
            NodeKind::DirectMemoryRead { address } => {
                let address = *address;
                if let Some(a) = self.ast.integer_literal_value(address) {
                    self.out.ins(format!("lda  {}", to_hex(a as u16)));
                } else {
                    self.eval_word_into_ay(address)?;
                    self.out.ins(format!("sta  {}", SCRATCH_W2));
                    self.out.ins(format!("sty  {}+1", SCRATCH_W2));
                    self.out.ins("ldy  #0");
                    self.out.ins(format!("lda  ({}),y", SCRATCH_W2));
                }
                Ok(())
            }
            NodeKind::ArrayIndexedRef { identifier, index } => {
                let (identifier, index) = (*identifier, *index);
                let label = self.symbol_label(identifier)?;
                if let Some(i) = self.ast.integer_literal_value(index) {
                    self.out
                        .ins(format!("lda  {}", offset_label(&label, i as u16)));
                } else {
                    self.eval_byte_into_a(index)?;
                    self.out.ins("tay");
                    self.out.ins(format!("lda  {},y", label));
                }
                Ok(())
            }
            NodeKind::TypecastExpr { dt, expr: inner, .. } => {
                let (dt, inner) = (*dt, *inner);
                let inner_dt = infer_type(self.ast, inner).unwrap_or(dt);
                if inner_dt == DataType::Float {
                    return Err(cg_err(
                        DiagnosticCode::UnknownCastType,
                        "cannot cast a float to an integer at runtime",
                        self.ast.pos(expr),
                    ));
                }
                if inner_dt.is_word() {
                    // The low byte is already in A after word evaluation.
                    self.eval_word_into_ay(inner)?;
                } else {
                    self.eval_byte_into_a(inner)?;
                }
                Ok(())
            }
            NodeKind::PrefixExpr { op, expr: inner } => {
                let (op, inner) = (*op, *inner);
                self.eval_byte_into_a(inner)?;
                match op {
                    PrefixOperator::Plus => {}
                    PrefixOperator::Minus => {
                        self.out.ins("eor  #255");
                        self.out.ins("clc");
                        self.out.ins("adc  #1");
                    }
                    PrefixOperator::BitInvert => self.out.ins("eor  #255"),
                    PrefixOperator::Not => {
                        self.out.ins("beq  +");
                        self.out.ins("lda  #1");
                        self.out.raw("+");
                        self.out.ins("eor  #1");
                    }
                }
                Ok(())
            }
            NodeKind::BinaryExpr { left, op, right } => {
                let (left, op, right) = (*left, *op, *right);
                let dt = infer_type(self.ast, left).unwrap_or(DataType::Ubyte);
                if op.is_comparison() {
                    if dt.is_word() {
                        return self.eval_word_comparison(dt, op, left, right);
                    }
                    return self.eval_byte_comparison(dt, op, left, right);
                }
                self.eval_byte_into_a(left)?;
                self.out.ins("pha");
                self.eval_byte_into_a(right)?;
                self.out.ins(format!("sta  {}", SCRATCH_B1));
                self.out.ins("pla");
                self.apply_byte_op_to_a(dt, op, &Operand::Var(SCRATCH_B1.to_string()))
            }
            NodeKind::FunctionCall { .. } => self.eval_call(expr),
            NodeKind::AddressOf { .. } => Err(cg_err(
                DiagnosticCode::TypeMismatch,
                "an address is a word value",
                self.ast.pos(expr),
            )),
            _ => Err(cg_err(
                DiagnosticCode::UnsupportedStorage,
                "expression cannot be evaluated to a byte",
                self.ast.pos(expr),
            )),
        }
    }

    fn eval_word_into_ay(&mut self, expr: NodeId) -> CgResult<()> {
        match self.ast.kind(expr) {
            NodeKind::NumericLiteral { value, .. } => {
                let v = match value {
                    NumericValue::Integer(v) => *v as u16,
                    NumericValue::Float(_) => {
                        return Err(cg_err(
                            DiagnosticCode::UnknownCastType,
                            "float literal in a word context",
                            self.ast.pos(expr),
                        ))
                    }
                };
                self.out.ins(format!("lda  #<{}", v));
                self.out.ins(format!("ldy  #>{}", v));
                Ok(())
            }
            NodeKind::IdentifierRef { .. } => {
                let dt = infer_type(self.ast, expr).unwrap_or(DataType::Uword);
                let label = self.symbol_label(expr)?;
                self.out.ins(format!("lda  {}", label));
                match dt {
                    DataType::Ubyte => self.out.ins("ldy  #0"),
                    DataType::Byte => {
                        self.out.ins("ldy  #0");
                        self.out.ins("cmp  #$80");
                        self.out.ins("bcc  +");
                        self.out.ins("dey");
                        self.out.raw("+");
                    }
                    _ => self.out.ins(format!("ldy  {}+1", label)),
                }
                Ok(())
            }
            NodeKind::AddressOf { identifier } => {
                let identifier = *identifier;
                let label = self.symbol_label(identifier)?;
                self.out.ins(format!("lda  #<{}", label));
                self.out.ins(format!("ldy  #>{}", label));
                Ok(())
            }
            NodeKind::ArrayIndexedRef { identifier, index } => {
                let (identifier, index) = (*identifier, *index);
                if infer_type(self.ast, expr).map(|d| d.is_byte()) == Some(true) {
                    self.eval_byte_into_a(expr)?;
                    self.out.ins("ldy  #0");
                    return Ok(());
                }
                let label = self.symbol_label(identifier)?;
                if let Some(i) = self.ast.integer_literal_value(index) {
                    let location = offset_label(&label, (i as u16) * 2);
                    self.out.ins(format!("lda  {}", location));
                    self.out.ins(format!("ldy  {}+1", location));
                } else {
                    self.eval_byte_into_a(index)?;
                    self.out.ins("asl  a");
                    self.out.ins("tay");
                    self.out.ins(format!("lda  {},y", label));
                    self.out.ins("pha");
                    self.out.ins(format!("lda  {}+1,y", label));
                    self.out.ins("tay");
                    self.out.ins("pla");
                }
                Ok(())
            }
            NodeKind::TypecastExpr { dt, expr: inner, .. } => {
                let (dt, inner) = (*dt, *inner);
                let _ = dt;
                let inner_dt = infer_type(self.ast, inner).unwrap_or(DataType::Uword);
                match inner_dt {
                    DataType::Float => Err(cg_err(
                        DiagnosticCode::UnknownCastType,
                        "cannot cast a float to an integer at runtime",
                        self.ast.pos(expr),
                    )),
                    DataType::Ubyte => {
                        self.eval_byte_into_a(inner)?;
                        self.out.ins("ldy  #0");
                        Ok(())
                    }
                    DataType::Byte => {
                        self.eval_byte_into_a(inner)?;
                        self.out.ins("ldy  #0");
                        self.out.ins("cmp  #$80");
                        self.out.ins("bcc  +");
                        self.out.ins("dey");
                        self.out.raw("+");
                        Ok(())
                    }
                    _ => self.eval_word_into_ay(inner),
                }
            }
            NodeKind::PrefixExpr { op, expr: inner } => {
                let (op, inner) = (*op, *inner);
                self.eval_word_into_ay(inner)?;
                match op {
                    PrefixOperator::Plus => {}
                    PrefixOperator::Minus => {
                        self.out.ins("eor  #255");
                        self.out.ins("clc");
                        self.out.ins("adc  #1");
                        self.out.ins("pha");
                        self.out.ins("tya");
                        self.out.ins("eor  #255");
                        self.out.ins("adc  #0");
                        self.out.ins("tay");
                        self.out.ins("pla");
                    }
                    PrefixOperator::BitInvert => {
                        self.out.ins("eor  #255");
                        self.out.ins("pha");
                        self.out.ins("tya");
                        self.out.ins("eor  #255");
                        self.out.ins("tay");
                        self.out.ins("pla");
                    }
                    PrefixOperator::Not => {
                        self.out.ins(format!("sty  {}", SCRATCH_B1));
                        self.out.ins(format!("ora  {}", SCRATCH_B1));
                        self.out.ins("beq  +");
                        self.out.ins("lda  #1");
                        self.out.raw("+");
                        self.out.ins("eor  #1");
                        self.out.ins("ldy  #0");
                    }
                }
                Ok(())
            }
            NodeKind::BinaryExpr { left, op, right } => {
                let (left, op, right) = (*left, *op, *right);
                self.eval_word_binary(left, op, right)
            }
            NodeKind::FunctionCall { .. } => self.eval_call(expr),
            _ => {
                // A byte-typed expression widens with a zero high byte.
                if infer_type(self.ast, expr).map(|dt| dt.is_byte()) == Some(true) {
                    self.eval_byte_into_a(expr)?;
                    self.out.ins("ldy  #0");
                    return Ok(());
                }
                Err(cg_err(
                    DiagnosticCode::UnsupportedStorage,
                    "expression cannot be evaluated to a word",
                    self.ast.pos(expr),
                ))
            }
        }
    }

    fn eval_float_into_fac1(&mut self, expr: NodeId, depth: usize) -> CgResult<()> {
        if let Some(label) = self.float_operand_label(expr)? {
            self.out.ins(format!("lda  #<{}", label));
            self.out.ins(format!("ldy  #>{}", label));
            self.out.jsr("floats.MOVFM");
            return Ok(());
        }
        match self.ast.kind(expr) {
            NodeKind::BinaryExpr { left, op, right } => {
                let (left, op, right) = (*left, *op, *right);
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
                            self.ast.pos(expr),
                        ))
                    }
                };
                // The float library routines combine a memory operand with
                // FAC1 as mem+FAC, mem-FAC, mem*FAC, mem/FAC, mem**FAC.
                // FAC1 therefore holds the right-hand side and the memory
                // operand is the left-hand side.
                let mem = match self.float_operand_label(left)? {
                    Some(label) => label,
                    None => {
                        let temp = self.float_temp(depth, expr)?;
                        self.eval_float_into_fac1(left, depth + 1)?;
                        self.out.ins(format!("ldx  #<{}", temp));
                        self.out.ins(format!("ldy  #>{}", temp));
                        self.out.jsr("floats.MOVMF");
                        temp
                    }
                };
                self.eval_float_into_fac1(right, depth + 1)?;
                self.out.ins(format!("lda  #<{}", mem));
                self.out.ins(format!("ldy  #>{}", mem));
                self.out.jsr(routine);
                Ok(())
            }
            NodeKind::PrefixExpr { op, expr: inner } => {
                let (op, inner) = (*op, *inner);
                match op {
                    PrefixOperator::Plus => self.eval_float_into_fac1(inner, depth),
                    PrefixOperator::Minus => {
                        self.eval_float_into_fac1(inner, depth)?;
                        let temp = self.float_temp(depth, expr)?;
                        self.out.ins(format!("ldx  #<{}", temp));
                        self.out.ins(format!("ldy  #>{}", temp));
                        self.out.jsr("floats.MOVMF");
                        self.out.ins(format!("lda  {}+1", temp));
                        self.out.ins("eor  #$80");
                        self.out.ins(format!("sta  {}+1", temp));
                        self.out.ins(format!("lda  #<{}", temp));
                        self.out.ins(format!("ldy  #>{}", temp));
                        self.out.jsr("floats.MOVFM");
                        Ok(())
                    }
                    _ => Err(cg_err(
                        DiagnosticCode::InvalidOperand,
                        format!("operator '{}' is not defined for floats", op),
                        self.ast.pos(expr),
                    )),
                }
            }
            NodeKind::TypecastExpr { expr: inner, .. } => {
                let inner = *inner;
                let inner_dt = infer_type(self.ast, inner);
                if inner_dt == Some(DataType::Float) {
                    self.eval_float_into_fac1(inner, depth)
                } else {
                    Err(cg_err(
                        DiagnosticCode::UnknownCastType,
                        "cannot cast an integer to a float at runtime",
                        self.ast.pos(expr),
                    ))
                }
            }
            NodeKind::FunctionCall { .. } => self.eval_call(expr),
            _ => Err(cg_err(
                DiagnosticCode::UnsupportedStorage,
                "expression cannot be evaluated to a float",
                self.ast.pos(expr),
            )),
        }
    }

    fn apply_byte_op_to_a(
        &mut self,
        dt: DataType,
        op: BinaryOperator,
        operand: &Operand,
    ) -> CgResult<()> {
        let text = operand.text();
        match op {
            BinaryOperator::Add => {
                self.out.ins("clc");
                self.out.ins(format!("adc  {}", text));
            }
            BinaryOperator::Sub => {
                self.out.ins("sec");
                self.out.ins(format!("sbc  {}", text));
            }
            BinaryOperator::Mul => {
                self.out.ins(format!("ldy  {}", text));
                self.out.jsr("math.multiply_bytes");
            }
            BinaryOperator::Div => {
                self.out.ins(format!("ldy  {}", text));
                if dt.is_signed() {
                    self.out.jsr("math.divmod_b_asm");
                } else {
                    self.out.jsr("math.divmod_ub_asm");
                }
                self.out.ins("tya");
            }
            BinaryOperator::Remainder => {
                self.out.ins(format!("ldy  {}", text));
                self.out.jsr("math.divmod_ub_asm");
            }
            BinaryOperator::BitAnd | BinaryOperator::And => {
                self.out.ins(format!("and  {}", text))
            }
            BinaryOperator::BitOr | BinaryOperator::Or => self.out.ins(format!("ora  {}", text)),
            BinaryOperator::BitXor => self.out.ins(format!("eor  {}", text)),
            BinaryOperator::ShiftLeft => match operand {
                Operand::Imm(n) => {
                    let n = *n;
                    if n >= 8 {
                        self.out.ins("lda  #0");
                    } else {
                        for _ in 0..n {
                            self.out.ins("asl  a");
                        }
                    }
                }
                _ => {
                    self.out.ins(format!("ldy  {}", text));
                    self.out.ins("beq  +");
                    self.out.raw("-");
                    self.out.ins("asl  a");
                    self.out.ins("dey");
                    self.out.ins("bne  -");
                    self.out.raw("+");
                }
            },
            BinaryOperator::ShiftRight => match operand {
                Operand::Imm(n) => {
                    let n = *n;
                    if dt.is_signed() {
                        for _ in 0..n.min(8) {
                            self.out.ins("cmp  #$80");
                            self.out.ins("ror  a");
                        }
                    } else if n >= 8 {
                        self.out.ins("lda  #0");
                    } else {
                        for _ in 0..n {
                            self.out.ins("lsr  a");
                        }
                    }
                }
                _ => {
                    self.out.ins(format!("ldy  {}", text));
                    self.out.ins("beq  +");
                    self.out.raw("-");
                    if dt.is_signed() {
                        self.out.ins("cmp  #$80");
                        self.out.ins("ror  a");
                    } else {
                        self.out.ins("lsr  a");
                    }
                    self.out.ins("dey");
                    self.out.ins("bne  -");
                    self.out.raw("+");
                }
            },
            BinaryOperator::Pow => {
                return Err(cg_err(
                    DiagnosticCode::InvalidOperand,
                    "power is only available for floats",
                    crate::error::Position::builtin(),
                ))
            }
            _ => {
                return Err(cg_err(
                    DiagnosticCode::InvalidOperand,
                    format!("operator '{}' has no in-place byte form", op),
                    crate::error::Position::builtin(),
                ))
            }
        }
        Ok(())
    }

    fn float_element_address_into_w2(&mut self, label: &str, index: NodeId) -> CgResult<()> {
        self.eval_byte_into_a(index)?;
        self.out.ins(format!("sta  {}", SCRATCH_REG));
        self.out.ins("asl  a");
        self.out.ins("asl  a");
        self.out.ins("clc");
        self.out.ins(format!("adc  {}", SCRATCH_REG));
        self.out.ins(format!("adc  #<{}", label));
        self.out.ins(format!("sta  {}", SCRATCH_W2));
        self.out.ins(format!("lda  #>{}", label));
        self.out.ins("adc  #0");
        self.out.ins(format!("sta  {}+1", SCRATCH_W2));
        Ok(())
    }
}

impl AsmGen<'_> {
    /// The assembly label of an identifier reference.
    pub(crate) fn symbol_label(&mut self, ident: NodeId) -> CgResult<String> {
        let decl = self.ast.identifier_target(ident).ok_or_else(|| {
            cg_err(
                DiagnosticCode::UnresolvedName,
                "unresolved reference in code generation",
                self.ast.pos(ident),
            )
        })?;
        Ok(self.ast.scoped_name(decl))
    }

    /// The label of a float variable or float constant operand, when the
    /// expression is simple enough to address directly.
    fn float_operand_label(&mut self, expr: NodeId) -> CgResult<Option<String>> {
        match self.ast.kind(expr) {
            NodeKind::NumericLiteral { value, .. } => {
                let v = value.as_float();
                Ok(Some(self.float_const_label(v)))
            }
            NodeKind::IdentifierRef { .. } => {
                let decl = self.ast.identifier_target(expr);
                let Some(decl) = decl else {
                    return Ok(None);
                };
                if declaration_type(self.ast, decl) == Some(DataType::Float) {
                    Ok(Some(self.ast.scoped_name(decl)))
                } else {
                    Ok(None)
                }
            }
            NodeKind::ArrayIndexedRef { identifier, index } => {
                let (identifier, index) = (*identifier, *index);
                let Some(i) = self.ast.integer_literal_value(index) else {
                    return Ok(None);
                };
                let Some(decl) = self.ast.identifier_target(identifier) else {
                    return Ok(None);
                };
                if declaration_type(self.ast, decl) == Some(DataType::ArrayFloat) {
                    let label = self.ast.scoped_name(decl);
                    Ok(Some(offset_label(&label, (i as u16) * 5)))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    fn float_temp(&mut self, depth: usize, at: NodeId) -> CgResult<String> {
        if depth >= FLOAT_TEMP_COUNT {
            return Err(cg_err(
                DiagnosticCode::UnsupportedStorage,
                "float expression nests too deeply",
                self.ast.pos(at),
            ));
        }
        self.float_temps_used = self.float_temps_used.max(depth + 1);
        Ok(format!("floats_temp_var_{}", depth + 1))
    }

    fn eval_byte_comparison(
        &mut self,
        dt: DataType,
        op: BinaryOperator,
        left: NodeId,
        right: NodeId,
    ) -> CgResult<()> {
        self.eval_byte_into_a(left)?;
        self.out.ins("pha");
        self.eval_byte_into_a(right)?;
        self.out.ins(format!("sta  {}", SCRATCH_B1));
        self.out.ins("pla");
        if dt.is_signed() {
            // Bias both sides so an unsigned compare orders signed values.
            self.out.ins("eor  #$80");
            self.out.ins("pha");
            self.out.ins(format!("lda  {}", SCRATCH_B1));
            self.out.ins("eor  #$80");
            self.out.ins(format!("sta  {}", SCRATCH_B1));
            self.out.ins("pla");
        }
        let yes = self.labels.next("p8c_cmp_true");
        let done = self.labels.next("p8c_cmp_done");
        self.out.ins(format!("cmp  {}", SCRATCH_B1));
        match op {
            BinaryOperator::Equal => self.out.ins(format!("beq  {}", yes)),
            BinaryOperator::NotEqual => self.out.ins(format!("bne  {}", yes)),
            BinaryOperator::Less => self.out.ins(format!("bcc  {}", yes)),
            BinaryOperator::GreaterEqual => self.out.ins(format!("bcs  {}", yes)),
            BinaryOperator::Greater => {
                self.out.ins(format!("beq  {}", done));
                self.out.ins(format!("bcs  {}", yes));
            }
            BinaryOperator::LessEqual => {
                self.out.ins(format!("beq  {}", yes));
                self.out.ins(format!("bcc  {}", yes));
            }
            _ => {}
        }
        // Falls through with A holding an arbitrary value; the done label
        // normalizes both paths to 0/1.
        self.out.ins("lda  #0");
        self.out.ins(format!("beq  {}", done));
        self.out.label(&yes);
        self.out.ins("lda  #1");
        self.out.label(&done);
        Ok(())
    }

    /// A comparison of word operands yields a 0/1 byte. Both operands are
    /// parked in the word scratches; ordering uses a 16-bit subtract with
    /// carry, with the sign-bias trick applied to the high bytes for
    /// signed words.
    fn eval_word_comparison(
        &mut self,
        dt: DataType,
        op: BinaryOperator,
        left: NodeId,
        right: NodeId,
    ) -> CgResult<()> {
        self.eval_word_into_ay(left)?;
        self.out.ins("pha");
        self.out.ins("tya");
        self.out.ins("pha");
        self.eval_word_into_ay(right)?;
        self.out.ins(format!("sta  {}", SCRATCH_W2));
        self.out.ins(format!("sty  {}+1", SCRATCH_W2));
        self.out.ins("pla");
        self.out.ins("tay");
        self.out.ins("pla");
        self.out.ins(format!("sta  {}", SCRATCH_W1));
        self.out.ins(format!("sty  {}+1", SCRATCH_W1));
        if dt.is_signed() {
            // Bias both high bytes so an unsigned compare orders signed
            // words.
            self.out.ins(format!("lda  {}+1", SCRATCH_W1));
            self.out.ins("eor  #$80");
            self.out.ins(format!("sta  {}+1", SCRATCH_W1));
            self.out.ins(format!("lda  {}+1", SCRATCH_W2));
            self.out.ins("eor  #$80");
            self.out.ins(format!("sta  {}+1", SCRATCH_W2));
        }
        let yes = self.labels.next("p8c_cmp_true");
        let done = self.labels.next("p8c_cmp_done");
        match op {
            BinaryOperator::Equal => {
                self.out.ins(format!("lda  {}", SCRATCH_W1));
                self.out.ins(format!("cmp  {}", SCRATCH_W2));
                self.out.ins("bne  +");
                self.out.ins(format!("lda  {}+1", SCRATCH_W1));
                self.out.ins(format!("cmp  {}+1", SCRATCH_W2));
                self.out.ins(format!("beq  {}", yes));
                self.out.raw("+");
            }
            BinaryOperator::NotEqual => {
                self.out.ins(format!("lda  {}", SCRATCH_W1));
                self.out.ins(format!("cmp  {}", SCRATCH_W2));
                self.out.ins(format!("bne  {}", yes));
                self.out.ins(format!("lda  {}+1", SCRATCH_W1));
                self.out.ins(format!("cmp  {}+1", SCRATCH_W2));
                self.out.ins(format!("bne  {}", yes));
            }
            BinaryOperator::Less | BinaryOperator::GreaterEqual => {
                // left - right; the carry orders the operands.
                self.out.ins(format!("lda  {}", SCRATCH_W1));
                self.out.ins(format!("cmp  {}", SCRATCH_W2));
                self.out.ins(format!("lda  {}+1", SCRATCH_W1));
                self.out.ins(format!("sbc  {}+1", SCRATCH_W2));
                if op == BinaryOperator::Less {
                    self.out.ins(format!("bcc  {}", yes));
                } else {
                    self.out.ins(format!("bcs  {}", yes));
                }
            }
            BinaryOperator::Greater | BinaryOperator::LessEqual => {
                // right - left, swapping the roles of the operands.
                self.out.ins(format!("lda  {}", SCRATCH_W2));
                self.out.ins(format!("cmp  {}", SCRATCH_W1));
                self.out.ins(format!("lda  {}+1", SCRATCH_W2));
                self.out.ins(format!("sbc  {}+1", SCRATCH_W1));
                if op == BinaryOperator::Greater {
                    self.out.ins(format!("bcc  {}", yes));
                } else {
                    self.out.ins(format!("bcs  {}", yes));
                }
            }
            _ => {}
        }
        self.out.ins("lda  #0");
        self.out.ins(format!("beq  {}", done));
        self.out.label(&yes);
        self.out.ins("lda  #1");
        self.out.label(&done);
        Ok(())
    }

    fn eval_word_binary(
        &mut self,
        left: NodeId,
        op: BinaryOperator,
        right: NodeId,
    ) -> CgResult<()> {
        let dt = infer_type(self.ast, left).unwrap_or(DataType::Uword);
        if op.is_comparison() {
            return Err(cg_err(
                DiagnosticCode::UnsupportedStorage,
                "word comparisons are byte values, not words",
                self.ast.pos(left),
            ));
        }
        match op {
            BinaryOperator::Add
            | BinaryOperator::Sub
            | BinaryOperator::BitAnd
            | BinaryOperator::BitOr
            | BinaryOperator::BitXor => {
                self.eval_word_into_ay(left)?;
                self.out.ins("pha");
                self.out.ins("tya");
                self.out.ins("pha");
                self.eval_word_into_ay(right)?;
                self.out.ins(format!("sta  {}", SCRATCH_W2));
                self.out.ins(format!("sty  {}+1", SCRATCH_W2));
                self.out.ins("pla");
                self.out.ins("tay");
                self.out.ins("pla");
                let (mnemonic, prepare) = match op {
                    BinaryOperator::Add => ("adc", Some("clc")),
                    BinaryOperator::Sub => ("sbc", Some("sec")),
                    BinaryOperator::BitAnd => ("and", None),
                    BinaryOperator::BitOr => ("ora", None),
                    BinaryOperator::BitXor => ("eor", None),
                    _ => unreachable!(),
                };
                if let Some(p) = prepare {
                    self.out.ins(p);
                }
                self.out.ins(format!("{}  {}", mnemonic, SCRATCH_W2));
                self.out.ins("pha");
                self.out.ins("tya");
                self.out.ins(format!("{}  {}+1", mnemonic, SCRATCH_W2));
                self.out.ins("tay");
                self.out.ins("pla");
                Ok(())
            }
            BinaryOperator::Mul => {
                self.eval_word_into_ay(left)?;
                self.out.ins(format!("sta  {}", SCRATCH_W1));
                self.out.ins(format!("sty  {}+1", SCRATCH_W1));
                self.eval_word_into_ay(right)?;
                self.out.jsr("math.multiply_words");
                Ok(())
            }
            BinaryOperator::Div | BinaryOperator::Remainder => {
                if op == BinaryOperator::Remainder && dt.is_signed() {
                    return Err(cg_err(
                        DiagnosticCode::SignedRemainder,
                        "remainder of signed integers is not defined",
                        self.ast.pos(left),
                    ));
                }
                self.eval_word_into_ay(left)?;
                self.out.ins(format!("sta  {}", SCRATCH_W1));
                self.out.ins(format!("sty  {}+1", SCRATCH_W1));
                self.eval_word_into_ay(right)?;
                if dt.is_signed() {
                    self.out.jsr("math.divmod_w_asm");
                } else {
                    self.out.jsr("math.divmod_uw_asm");
                }
                if op == BinaryOperator::Remainder {
                    self.out.ins(format!("lda  {}", SCRATCH_W2));
                    self.out.ins(format!("ldy  {}+1", SCRATCH_W2));
                }
                Ok(())
            }
            BinaryOperator::ShiftLeft | BinaryOperator::ShiftRight => {
                self.eval_word_into_ay(left)?;
                self.out.ins(format!("sta  {}", SCRATCH_W1));
                self.out.ins(format!("sty  {}+1", SCRATCH_W1));
                self.eval_byte_into_a(right)?;
                self.out.ins("tay");
                self.out.ins("beq  +");
                self.out.raw("-");
                if op == BinaryOperator::ShiftLeft {
                    self.out.ins(format!("asl  {}", SCRATCH_W1));
                    self.out.ins(format!("rol  {}+1", SCRATCH_W1));
                } else if dt.is_signed() {
                    self.out.ins(format!("lda  {}+1", SCRATCH_W1));
                    self.out.ins("asl  a");
                    self.out.ins(format!("ror  {}+1", SCRATCH_W1));
                    self.out.ins(format!("ror  {}", SCRATCH_W1));
                } else {
                    self.out.ins(format!("lsr  {}+1", SCRATCH_W1));
                    self.out.ins(format!("ror  {}", SCRATCH_W1));
                }
                self.out.ins("dey");
                self.out.ins("bne  -");
                self.out.raw("+");
                self.out.ins(format!("lda  {}", SCRATCH_W1));
                self.out.ins(format!("ldy  {}+1", SCRATCH_W1));
                Ok(())
            }
            _ => Err(cg_err(
                DiagnosticCode::InvalidOperand,
                format!("operator '{}' has no word form", op),
                self.ast.pos(left),
            )),
        }
    }

    /// Evaluate a function call; the result follows the register
    /// convention (byte in A, word in A/Y, float in FAC1).
    pub(crate) fn eval_call(&mut self, call: NodeId) -> CgResult<()> {
        let NodeKind::FunctionCall { target, args } = self.ast.kind(call) else {
            return Ok(());
        };
        let (target, args) = (*target, args.clone());
        let decl = self.ast.identifier_target(target).ok_or_else(|| {
            cg_err(
                DiagnosticCode::UnresolvedName,
                "call to an unresolved subroutine",
                self.ast.pos(call),
            )
        })?;
        let NodeKind::Subroutine { params, .. } = self.ast.kind(decl) else {
            return Err(cg_err(
                DiagnosticCode::UnsupportedStorage,
                "call target is not a subroutine",
                self.ast.pos(call),
            ));
        };
        let params = params.clone();
        let sub_label = self.ast.scoped_name(decl);

        for (i, arg) in args.iter().enumerate() {
            let Some(param) = params.get(i) else { break };
            match param.register {
                Some(reg) => {
                    self.eval_byte_into_a(*arg)?;
                    match reg {
                        crate::ast::CpuRegister::A => {}
                        crate::ast::CpuRegister::X => self.out.ins("tax"),
                        crate::ast::CpuRegister::Y => self.out.ins("tay"),
                        _ => {
                            return Err(cg_err(
                                DiagnosticCode::UnsupportedStorage,
                                "register pair parameters need word arguments",
                                self.ast.pos(*arg),
                            ))
                        }
                    }
                }
                None => {
                    let param_label = format!("{}.{}", sub_label, param.name);
                    if param.dt.is_word() {
                        self.eval_word_into_ay(*arg)?;
                        self.out.ins(format!("sta  {}", param_label));
                        self.out.ins(format!("sty  {}+1", param_label));
                    } else {
                        self.eval_byte_into_a(*arg)?;
                        self.out.ins(format!("sta  {}", param_label));
                    }
                }
            }
        }
        self.out.jsr(&sub_label);
        Ok(())
    }
}
