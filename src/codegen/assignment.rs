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

//! Assignment code generation.
//!
//! Classifies assignment targets into storage kinds (variable, memory,
//! array, register, stack), decides through [`is_augmentable`] whether an
//! assignment can be handled by the in-place engine, and emits the general
//! load/store path for everything else.

use super::eval::ExpressionEval;
use super::target::{SCRATCH_B1, SCRATCH_REG, SCRATCH_W2};
use super::{cg_err, to_hex, AsmGen, CgResult};
use crate::analyzer::type_check::{declaration_type, infer_type};
use crate::ast::{Ast, CpuRegister, DataType, NodeId, NodeKind, VarKind, ZeropageWish};
use crate::error::{DiagnosticCode, Position};

/// The storage category of an assignment target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStorageKind {
    Variable,
    Memory,
    Array,
    Register,
    Stack,
}

/// A classified assignment target, resolved to emission terms.
#[derive(Debug, Clone)]
pub(crate) struct AsmTarget {
    pub kind: AsmTargetKind,
    pub dt: DataType,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub(crate) enum AsmTargetKind {
    /// A named variable at a known label.
    Variable { label: String },
    /// A byte at a fixed numeric address.
    MemoryLiteral { address: u16 },
    /// A byte through an address held in a pointer variable.
    MemoryPointer { label: String, zeropage: bool },
    /// A byte at a computed address.
    MemoryComputed { address: NodeId },
    /// An array element with the offset folded into the label.
    ArrayLiteralIndex { label: String, offset: u16 },
    /// An array element with a runtime index.
    ArrayRuntimeIndex { label: String, index: NodeId },
    /// A CPU register or register pair.
    Register { register: CpuRegister },
    /// The evaluation stack.
    Stack,
}

impl AsmTarget {
    /// The coarse storage kind of this target.
    pub fn storage(&self) -> TargetStorageKind {
        match self.kind {
            AsmTargetKind::Variable { .. } => TargetStorageKind::Variable,
            AsmTargetKind::MemoryLiteral { .. }
            | AsmTargetKind::MemoryPointer { .. }
            | AsmTargetKind::MemoryComputed { .. } => TargetStorageKind::Memory,
            AsmTargetKind::ArrayLiteralIndex { .. } | AsmTargetKind::ArrayRuntimeIndex { .. } => {
                TargetStorageKind::Array
            }
            AsmTargetKind::Register { .. } => TargetStorageKind::Register,
            AsmTargetKind::Stack => TargetStorageKind::Stack,
        }
    }
}

/// An operand that can appear directly in an instruction.
#[derive(Debug, Clone)]
pub(crate) enum Operand {
    /// An immediate value.
    Imm(i64),
    /// A variable or scratch label.
    Var(String),
    /// A fixed memory address.
    Mem(u16),
}

impl Operand {
    /// The operand text for an instruction like `adc`.
    pub fn text(&self) -> String {
        match self {
            Operand::Imm(v) => format!("#{}", v),
            Operand::Var(label) => label.clone(),
            Operand::Mem(addr) => to_hex(*addr),
        }
    }
}

// ---------------------------------------------------------------------------
// the augmentable predicate
// ---------------------------------------------------------------------------

/// Whether a plain assignment `A = RHS` can be reshaped into an in-place
/// update of A:
///
/// - `RHS = A op X`, or
/// - `op` is associative and `RHS = X op A`, or
/// - RHS is a two-level binary tree with the same operator at both levels
///   and A appears exactly once as a leaf, or
/// - RHS is a prefix expression or a typecast whose sub-expression is A,
///   possibly through one nested cast.
pub fn is_augmentable(ast: &Ast, assignment: NodeId) -> bool {
    let NodeKind::Assignment {
        target,
        aug_op: None,
        value,
    } = ast.kind(assignment)
    else {
        return false;
    };
    let (target, value) = (*target, *value);

    match ast.kind(value) {
        NodeKind::BinaryExpr { left, op, right } => {
            let (left, op, right) = (*left, *op, *right);
            if target_matches(ast, target, left) {
                return true;
            }
            if op.is_associative() && target_matches(ast, target, right) {
                return true;
            }
            // Two levels of the same operator with the target as one leaf.
            let mut leaves = Vec::new();
            let mut depth_ok = false;
            match (ast.kind(left), ast.kind(right)) {
                (NodeKind::BinaryExpr { left: ll, op: lop, right: lr }, _) if *lop == op => {
                    depth_ok = true;
                    leaves.extend([*ll, *lr, right]);
                }
                (_, NodeKind::BinaryExpr { left: rl, op: rop, right: rr }) if *rop == op => {
                    depth_ok = true;
                    leaves.extend([left, *rl, *rr]);
                }
                _ => {}
            }
            if depth_ok {
                let hits = leaves
                    .iter()
                    .filter(|&&l| target_matches(ast, target, l))
                    .count();
                return hits == 1;
            }
            false
        }
        NodeKind::PrefixExpr { expr, .. } => {
            target_matches(ast, target, *expr)
                || target_matches_through_cast(ast, target, *expr)
        }
        NodeKind::TypecastExpr { expr, .. } => {
            target_matches(ast, target, *expr)
                || target_matches_through_cast(ast, target, *expr)
        }
        _ => false,
    }
}

fn target_matches_through_cast(ast: &Ast, target: NodeId, expr: NodeId) -> bool {
    match ast.kind(expr) {
        NodeKind::TypecastExpr { expr, .. } => target_matches(ast, target, *expr),
        _ => false,
    }
}

/// Whether an expression reads exactly the storage the target writes.
pub(crate) fn target_matches(ast: &Ast, target: NodeId, expr: NodeId) -> bool {
    let NodeKind::AssignTarget {
        identifier,
        array_indexed,
        memory_address,
        ..
    } = ast.kind(target)
    else {
        return false;
    };
    if let Some(ident) = identifier {
        return ast.exprs_equal(*ident, expr);
    }
    if let Some(indexed) = array_indexed {
        return ast.exprs_equal(*indexed, expr);
    }
    if let Some(addr) = memory_address {
        if let NodeKind::DirectMemoryRead { address } = ast.kind(expr) {
            return ast.exprs_equal(*addr, *address);
        }
    }
    false
}

// ---------------------------------------------------------------------------
// target classification
// ---------------------------------------------------------------------------

pub(crate) fn classify_target(gen: &mut AsmGen, target: NodeId) -> CgResult<AsmTarget> {
    let pos = gen.ast.pos(target);
    let NodeKind::AssignTarget {
        identifier,
        array_indexed,
        memory_address,
        register,
    } = gen.ast.kind(target)
    else {
        return Err(cg_err(
            DiagnosticCode::UnsupportedStorage,
            "malformed assignment target",
            pos,
        ));
    };
    let (identifier, array_indexed, memory_address, register) =
        (*identifier, *array_indexed, *memory_address, *register);

    if let Some(register) = register {
        return Ok(AsmTarget {
            kind: AsmTargetKind::Register { register },
            dt: DataType::Ubyte,
            pos,
        });
    }

    if let Some(ident) = identifier {
        let decl = gen.ast.identifier_target(ident).ok_or_else(|| {
            cg_err(
                DiagnosticCode::UnresolvedName,
                "assignment to an unresolved name",
                pos.clone(),
            )
        })?;
        let dt = declaration_type(gen.ast, decl).ok_or_else(|| {
            cg_err(
                DiagnosticCode::UnknownType,
                "assignment target has no known type",
                pos.clone(),
            )
        })?;
        let label = gen.ast.scoped_name(decl);
        return Ok(AsmTarget {
            kind: AsmTargetKind::Variable { label },
            dt,
            pos,
        });
    }

    if let Some(indexed) = array_indexed {
        let NodeKind::ArrayIndexedRef { identifier, index } = gen.ast.kind(indexed) else {
            return Err(cg_err(
                DiagnosticCode::UnsupportedStorage,
                "malformed array assignment target",
                pos,
            ));
        };
        let (identifier, index) = (*identifier, *index);
        let decl = gen.ast.identifier_target(identifier).ok_or_else(|| {
            cg_err(
                DiagnosticCode::UnresolvedName,
                "assignment to an unresolved array",
                pos.clone(),
            )
        })?;
        let array_dt = declaration_type(gen.ast, decl).unwrap_or(DataType::ArrayUbyte);
        let dt = array_dt.element_type().unwrap_or(DataType::Ubyte);
        let label = gen.ast.scoped_name(decl);
        if let Some(i) = gen.ast.integer_literal_value(index) {
            let offset = (i as u16) * dt.size() as u16;
            return Ok(AsmTarget {
                kind: AsmTargetKind::ArrayLiteralIndex { label, offset },
                dt,
                pos,
            });
        }
        return Ok(AsmTarget {
            kind: AsmTargetKind::ArrayRuntimeIndex { label, index },
            dt,
            pos,
        });
    }

    if let Some(addr) = memory_address {
        if let Some(a) = gen.ast.integer_literal_value(addr) {
            return Ok(AsmTarget {
                kind: AsmTargetKind::MemoryLiteral { address: a as u16 },
                dt: DataType::Ubyte,
                pos,
            });
        }
        if let Some(decl) = gen.ast.identifier_target(addr) {
            if let NodeKind::VarDecl { kind, zp, dt, .. } = gen.ast.kind(decl) {
                let (kind, zp, dt) = (*kind, *zp, *dt);
                if kind == VarKind::Var && dt == DataType::Uword {
                    let zeropage = zp == ZeropageWish::Require;
                    let label = gen.ast.scoped_name(decl);
                    return Ok(AsmTarget {
                        kind: AsmTargetKind::MemoryPointer { label, zeropage },
                        dt: DataType::Ubyte,
                        pos,
                    });
                }
            }
        }
        return Ok(AsmTarget {
            kind: AsmTargetKind::MemoryComputed { address: addr },
            dt: DataType::Ubyte,
            pos,
        });
    }

    Ok(AsmTarget {
        kind: AsmTargetKind::Stack,
        dt: DataType::Ubyte,
        pos,
    })
}

// ---------------------------------------------------------------------------
// the general assignment path
// ---------------------------------------------------------------------------

/// Extension trait for assignment emission.
pub(crate) trait AssignmentEmitter {
    /// Emit one assignment statement, dispatching to the in-place engine
    /// when the shape allows it.
    fn translate_assignment(&mut self, assign: NodeId) -> CgResult<()>;

    /// Emit the general evaluate-then-store path.
    fn translate_normal_assignment(&mut self, target: NodeId, value: NodeId) -> CgResult<()>;
}

impl AssignmentEmitter for AsmGen<'_> {
    fn translate_assignment(&mut self, assign: NodeId) -> CgResult<()> {
        let NodeKind::Assignment { target, value, .. } = self.ast.kind(assign) else {
            return Ok(());
        };
        let (target, value) = (*target, *value);
        if is_augmentable(self.ast, assign) {
            return super::augmented::translate(self, assign);
        }
        self.translate_normal_assignment(target, value)
    }

    fn translate_normal_assignment(&mut self, target: NodeId, value: NodeId) -> CgResult<()> {
        let tgt = classify_target(self, target)?;
        match &tgt.kind {
            AsmTargetKind::Variable { label } => {
                let label = label.clone();
                match tgt.dt {
                    dt if dt.is_byte() => {
                        self.eval_byte_into_a(value)?;
                        self.out.ins(format!("sta  {}", label));
                    }
                    dt if dt.is_word() => {
                        self.eval_word_into_ay(value)?;
                        self.out.ins(format!("sta  {}", label));
                        self.out.ins(format!("sty  {}+1", label));
                    }
                    DataType::Float => {
                        self.eval_float_into_fac1(value, 0)?;
                        self.out.ins(format!("ldx  #<{}", label));
                        self.out.ins(format!("ldy  #>{}", label));
                        self.out.jsr("floats.MOVMF");
                    }
                    _ => {
                        return Err(cg_err(
                            DiagnosticCode::UnsupportedStorage,
                            format!("cannot store a {} value", tgt.dt.name()),
                            tgt.pos.clone(),
                        ))
                    }
                }
            }
            AsmTargetKind::MemoryLiteral { address } => {
                let address = *address;
                self.eval_byte_into_a(value)?;
                self.out.ins(format!("sta  {}", to_hex(address)));
            }
            AsmTargetKind::MemoryPointer { label, zeropage } => {
                let (label, zeropage) = (label.clone(), *zeropage);
                self.eval_byte_into_a(value)?;
                if zeropage {
                    self.out.ins("ldy  #0");
                    self.out.ins(format!("sta  ({}),y", label));
                } else {
                    self.out.ins("pha");
                    self.out.ins(format!("lda  {}", label));
                    self.out.ins(format!("sta  {}", SCRATCH_W2));
                    self.out.ins(format!("lda  {}+1", label));
                    self.out.ins(format!("sta  {}+1", SCRATCH_W2));
                    self.out.ins("ldy  #0");
                    self.out.ins("pla");
                    self.out.ins(format!("sta  ({}),y", SCRATCH_W2));
                }
            }
            AsmTargetKind::MemoryComputed { address } => {
                let address = *address;
                self.eval_byte_into_a(value)?;
                self.out.ins(format!("sta  {}", SCRATCH_B1));
                self.eval_word_into_ay(address)?;
                self.out.ins("pha");
                self.out.ins("tya");
                self.out.ins("pha");
                self.out.ins(format!("lda  {}", SCRATCH_B1));
                self.out.jsr("prog8_lib.write_byte_to_address_on_stack");
            }
            AsmTargetKind::ArrayLiteralIndex { label, offset } => {
                let location = offset_label(label, *offset);
                match tgt.dt {
                    dt if dt.is_byte() => {
                        self.eval_byte_into_a(value)?;
                        self.out.ins(format!("sta  {}", location));
                    }
                    dt if dt.is_word() => {
                        self.eval_word_into_ay(value)?;
                        self.out.ins(format!("sta  {}", location));
                        self.out.ins(format!("sty  {}+1", location));
                    }
                    DataType::Float => {
                        self.eval_float_into_fac1(value, 0)?;
                        self.out.ins(format!("ldx  #<{}", location));
                        self.out.ins(format!("ldy  #>{}", location));
                        self.out.jsr("floats.MOVMF");
                    }
                    _ => {
                        return Err(cg_err(
                            DiagnosticCode::UnsupportedStorage,
                            format!("cannot store a {} array element", tgt.dt.name()),
                            tgt.pos.clone(),
                        ))
                    }
                }
            }
            AsmTargetKind::ArrayRuntimeIndex { label, index } => {
                let (label, index) = (label.clone(), *index);
                match tgt.dt {
                    dt if dt.is_byte() => {
                        self.eval_byte_into_a(index)?;
                        self.out.ins(format!("sta  {}", SCRATCH_REG));
                        self.eval_byte_into_a(value)?;
                        self.out.ins(format!("ldy  {}", SCRATCH_REG));
                        self.out.ins(format!("sta  {},y", label));
                    }
                    dt if dt.is_word() => {
                        self.eval_byte_into_a(index)?;
                        self.out.ins("asl  a");
                        self.out.ins(format!("sta  {}", SCRATCH_REG));
                        self.eval_word_into_ay(value)?;
                        self.out.ins(format!("sta  {}", SCRATCH_W2));
                        self.out.ins(format!("sty  {}+1", SCRATCH_W2));
                        self.out.ins(format!("ldy  {}", SCRATCH_REG));
                        self.out.ins(format!("lda  {}", SCRATCH_W2));
                        self.out.ins(format!("sta  {},y", label));
                        self.out.ins(format!("lda  {}+1", SCRATCH_W2));
                        self.out.ins(format!("sta  {}+1,y", label));
                    }
                    DataType::Float => {
                        self.eval_float_into_fac1(value, 0)?;
                        self.float_element_address_into_w2(&label, index)?;
                        self.out.ins(format!("ldx  {}", SCRATCH_W2));
                        self.out.ins(format!("ldy  {}+1", SCRATCH_W2));
                        self.out.jsr("floats.MOVMF");
                    }
                    _ => {
                        return Err(cg_err(
                            DiagnosticCode::UnsupportedStorage,
                            format!("cannot store a {} array element", tgt.dt.name()),
                            tgt.pos.clone(),
                        ))
                    }
                }
            }
            AsmTargetKind::Register { register } => {
                let register = *register;
                match register {
                    CpuRegister::A => self.eval_byte_into_a(value)?,
                    CpuRegister::X => {
                        self.eval_byte_into_a(value)?;
                        self.out.ins("tax");
                    }
                    CpuRegister::Y => {
                        self.eval_byte_into_a(value)?;
                        self.out.ins("tay");
                    }
                    CpuRegister::AY => self.eval_word_into_ay(value)?,
                    CpuRegister::AX => {
                        self.eval_word_into_ay(value)?;
                        self.out.ins("pha");
                        self.out.ins("tya");
                        self.out.ins("tax");
                        self.out.ins("pla");
                    }
                    CpuRegister::XY => {
                        self.eval_word_into_ay(value)?;
                        self.out.ins("tax");
                    }
                }
            }
            AsmTargetKind::Stack => {
                let value_dt = infer_type(self.ast, value).unwrap_or(DataType::Ubyte);
                if value_dt.is_word() {
                    self.eval_word_into_ay(value)?;
                    self.out.ins("pha");
                    self.out.ins("tya");
                    self.out.ins("pha");
                } else {
                    self.eval_byte_into_a(value)?;
                    self.out.ins("pha");
                }
            }
        }
        Ok(())
    }
}

/// A label plus a constant byte offset.
pub(crate) fn offset_label(label: &str, offset: u16) -> String {
    if offset == 0 {
        label.to_string()
    } else {
        format!("{}+{}", label, offset)
    }
}
