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

//! 6502 assembly generation.
//!
//! Consumes the canonical post-pipeline tree and produces 64tass-syntax
//! assembly text. Blocks become `.proc`/`.pend` sections ordered the way
//! the reorder pass left them; variables become `.byte`/`.word`/`.fill`
//! storage; float literals are packed into 5-byte CBM constants in the
//! program footer.
//!
//! The emitted code calls into a runtime library with these contracts:
//!
//! - `math.multiply_bytes`: A * Y -> A.
//! - `math.divmod_ub_asm` / `math.divmod_b_asm`: A / Y -> quotient in Y,
//!   remainder in A (unsigned / signed).
//! - `math.multiply_words`: `P8ZP_SCRATCH_W1` * AY -> AY.
//! - `math.divmod_uw_asm` / `math.divmod_w_asm`: `P8ZP_SCRATCH_W1` / AY ->
//!   quotient in AY, remainder in `P8ZP_SCRATCH_W2`.
//! - `math.mul_byte_N` / `math.mul_word_N`: optimized small products.
//! - `math.lsr_byte_A`: arithmetic shift of A right by Y.
//! - `prog8_lib.read_byte_from_address_on_stack` /
//!   `prog8_lib.write_byte_to_address_on_stack`: byte access through an
//!   address pushed on the evaluation stack (the read peeks, the write
//!   pops).
//! - `floats.MOVFM` (load FAC1 from the address in A/Y), `floats.MOVMF`
//!   (store FAC1 at the address in X/Y), `floats.CONUPK`, and the
//!   mem-with-FAC1 operations `FADD`, `FSUB`, `FMULT`, `FDIV`, `FPWR`,
//!   `FPWRT`.
//!
//! A code generation error aborts the current subroutine; the remaining
//! subroutines are still processed for their diagnostics, but no output
//! text is produced.

pub mod assignment;
pub(crate) mod augmented;
pub(crate) mod augmented_float;
pub(crate) mod augmented_word;
pub mod emit;
pub(crate) mod eval;
pub(crate) mod statements;
pub mod target;

pub use assignment::{is_augmentable, TargetStorageKind};
pub use emit::{to_hex, Emitter};
pub use target::{CompilationTarget, CpuType};

use crate::ast::{
    to_mflpt5, Ast, DataType, NameGen, NodeId, NodeKind, NumericValue, VarKind,
};
use crate::error::{Diagnostic, DiagnosticCode, Diagnostics, Position};
use statements::StatementEmitter;
use target::{SCRATCH_B1, SCRATCH_REG, SCRATCH_W1, SCRATCH_W2};

/// Result type for code generation; an error aborts the current function.
pub(crate) type CgResult<T> = std::result::Result<T, Diagnostic>;

/// Build a code generation error.
pub(crate) fn cg_err(
    code: DiagnosticCode,
    message: impl Into<String>,
    pos: Position,
) -> Diagnostic {
    Diagnostic::new(code, message, pos)
}

/// The assembly generator.
pub struct AsmGen<'a> {
    pub(crate) ast: &'a mut Ast,
    pub(crate) target: CompilationTarget,
    pub(crate) out: Emitter,
    pub(crate) diags: Diagnostics,
    pub(crate) labels: NameGen,
    pub(crate) loop_ends: Vec<String>,
    float_consts: Vec<(String, f64)>,
    pub(crate) float_temps_used: usize,
    sub_locals: Vec<(String, usize)>,
    had_errors: bool,
}

/// Generate assembly for a fully analyzed program.
///
/// Returns the assembly text (or `None` when any code generation error was
/// reported) together with the diagnostics.
pub fn generate(ast: &mut Ast, target: &CompilationTarget) -> (Option<String>, Diagnostics) {
    let cpu = target.cpu;
    let mut gen = AsmGen {
        ast,
        target: target.clone(),
        out: Emitter::new(cpu),
        diags: Diagnostics::new(),
        labels: NameGen::new(),
        loop_ends: Vec::new(),
        float_consts: Vec::new(),
        float_temps_used: 0,
        sub_locals: Vec::new(),
        had_errors: false,
    };
    gen.emit_program();
    let AsmGen {
        out,
        diags,
        had_errors,
        ..
    } = gen;
    if had_errors {
        (None, diags)
    } else {
        (Some(out.finish()), diags)
    }
}

impl<'a> AsmGen<'a> {
    /// Allocate a hidden local storage label in the current subroutine.
    pub(crate) fn alloc_local(&mut self, prefix: &str, size: usize) -> String {
        let label = self.labels.next(prefix);
        self.sub_locals.push((label.clone(), size));
        label
    }

    /// The label of a float constant, pooling duplicates.
    pub(crate) fn float_const_label(&mut self, value: f64) -> String {
        if let Some((label, _)) = self
            .float_consts
            .iter()
            .find(|(_, v)| v.to_bits() == value.to_bits())
        {
            return label.clone();
        }
        let label = format!("p8c_float_const_{}", self.float_consts.len() + 1);
        self.float_consts.push((label.clone(), value));
        label
    }

    fn emit_program(&mut self) {
        self.header();
        for module in self.ast.statements(self.ast.root()).to_vec() {
            for stmt in self.ast.statements(module).to_vec() {
                if matches!(self.ast.kind(stmt), NodeKind::Block { .. }) {
                    self.emit_block(stmt);
                }
            }
        }
        self.footer();
    }

    fn header(&mut self) {
        let cpu = match self.target.cpu {
            CpuType::Mos6502 => "6502",
            CpuType::Mos65c02 => "65c02",
        };
        self.out.raw("; generated by p8c");
        self.out.raw(format!("; compilation target: {}", self.target.name));
        self.out.raw("; assembler syntax is for the 64tass cross-assembler");
        self.out.blank();
        self.out.raw(format!(".cpu  '{}'", cpu));
        self.out.raw(".enc  'none'");
        self.out.blank();

        // Zero page scratch registers and the virtual register block.
        self.out.raw(format!(
            "{} = {}",
            SCRATCH_B1,
            to_hex(self.target.zp_scratch_b1 as u16)
        ));
        self.out.raw(format!(
            "{} = {}",
            SCRATCH_REG,
            to_hex(self.target.zp_scratch_reg as u16)
        ));
        self.out.raw(format!(
            "{} = {}",
            SCRATCH_W1,
            to_hex(self.target.zp_scratch_w1 as u16)
        ));
        self.out.raw(format!(
            "{} = {}",
            SCRATCH_W2,
            to_hex(self.target.zp_scratch_w2 as u16)
        ));
        self.out.blank();
        self.out.raw("cx16\t.proc");
        for r in 0..16u16 {
            self.out.ins(format!(
                "r{} = {}",
                r,
                to_hex(self.target.virtual_registers as u16 + r * 2)
            ));
        }
        self.out.ins(".pend");
        self.out.blank();

        // BASIC launcher stub with a SYS to the entry point.
        self.out.raw("; ---- basic program with sys call ----");
        self.out.raw(format!("* = {}", to_hex(self.target.load_address)));
        self.out.ins(".word  (+), 10");
        self.out
            .ins(".null  $9e, format(' %d ', _p8c_entrypoint), $3a, $8f, ' p8c'");
        self.out.raw("+\t\t.word  0");
        self.out.raw("_p8c_entrypoint");
        self.out.ins("cld");
        self.out.ins("clc");
        self.out.ins("clv");
        self.out.ins("jmp  main.start");
        self.out.blank();
    }

    fn footer(&mut self) {
        if !self.float_consts.is_empty() {
            self.out.blank();
            self.out.raw("; float constants");
            for (label, value) in self.float_consts.clone() {
                match to_mflpt5(value) {
                    Some(bytes) => self.out.raw(format!(
                        "{}\t.byte  ${:02x}, ${:02x}, ${:02x}, ${:02x}, ${:02x}\t; {}",
                        label, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], value
                    )),
                    None => {
                        self.diags.error(
                            DiagnosticCode::FloatOverflow,
                            "floating point constant out of range",
                            Position::builtin(),
                        );
                        self.had_errors = true;
                    }
                }
            }
        }
        if self.float_temps_used > 0 {
            self.out.blank();
            for i in 1..=self.float_temps_used {
                self.out.raw(format!("floats_temp_var_{}\t.fill  5", i));
            }
        }
        self.out.blank();
        self.out.ins(".end");
    }

    fn emit_block(&mut self, block: NodeId) {
        let NodeKind::Block { name, address, .. } = self.ast.kind(block) else {
            return;
        };
        let (name, address) = (name.clone(), *address);
        let pos = self.ast.pos(block);

        self.out.blank();
        self.out.raw(format!("; ---- block: '{}' ----", name));
        self.out
            .raw(format!("; file: '{}' line {}", pos.file, pos.line));
        if let Some(addr) = address {
            self.out.raw(format!("* = {}", to_hex(addr)));
        }
        self.out.raw(format!("{}\t.proc", name));

        let stmts = self.ast.statements(block).to_vec();

        // Constants, memory mapped variables and ROM stubs become equates.
        for stmt in &stmts {
            self.emit_equate(*stmt);
        }

        // Block level code (labels, jumps, plain statements).
        self.sub_locals.clear();
        for stmt in &stmts {
            if matches!(
                self.ast.kind(*stmt),
                NodeKind::VarDecl { .. }
                    | NodeKind::Directive { .. }
                    | NodeKind::StructDecl { .. }
                    | NodeKind::Subroutine { .. }
            ) {
                continue;
            }
            if let Err(diag) = self.translate_statement(*stmt) {
                self.diags.push(diag);
                self.had_errors = true;
            }
        }
        self.flush_sub_locals();

        // Subroutines.
        for stmt in &stmts {
            if matches!(self.ast.kind(*stmt), NodeKind::Subroutine { .. }) {
                self.emit_subroutine(*stmt);
            }
        }

        // Variable storage.
        for stmt in &stmts {
            if matches!(
                self.ast.kind(*stmt),
                NodeKind::VarDecl {
                    kind: VarKind::Var,
                    ..
                }
            ) {
                self.emit_var_storage(*stmt);
            }
        }

        self.out.ins(".pend");
    }

    fn emit_equate(&mut self, stmt: NodeId) {
        match self.ast.kind(stmt) {
            NodeKind::VarDecl {
                name,
                kind: VarKind::Const,
                dt,
                value: Some(value),
                ..
            } => {
                let (name, dt, value) = (name.clone(), *dt, *value);
                match self.ast.kind(value) {
                    NodeKind::NumericLiteral {
                        value: NumericValue::Integer(v),
                        ..
                    } => {
                        let v = *v;
                        if dt.is_integer() {
                            self.out.raw(format!("\t{} = {}", name, to_hex(v as u16)));
                        }
                    }
                    NodeKind::NumericLiteral {
                        value: NumericValue::Float(v),
                        ..
                    } => {
                        let v = *v;
                        self.out.raw(format!("\t{} = {}", name, v));
                    }
                    _ => {}
                }
            }
            NodeKind::VarDecl {
                name,
                kind: VarKind::Memory,
                value: Some(value),
                ..
            } => {
                let name = name.clone();
                if let Some(addr) = self.ast.integer_literal_value(*value) {
                    self.out
                        .raw(format!("\t{} = {}", name, to_hex(addr as u16)));
                }
            }
            NodeKind::Subroutine {
                name,
                asm_address: Some(addr),
                ..
            } => {
                let (name, addr) = (name.clone(), *addr);
                self.out.raw(format!("\t{} = {}", name, to_hex(addr)));
            }
            _ => {}
        }
    }

    fn emit_subroutine(&mut self, sub: NodeId) {
        let NodeKind::Subroutine {
            name,
            asm_address,
            statements,
            ..
        } = self.ast.kind(sub)
        else {
            return;
        };
        if asm_address.is_some() {
            // ROM stubs were emitted as equates.
            return;
        }
        let (name, statements) = (name.clone(), statements.clone());
        let pos = self.ast.pos(sub);

        self.out.blank();
        self.out.raw(format!("; sub: '{}' line {}", name, pos.line));
        self.out.raw(format!("{}\t.proc", name));
        self.sub_locals.clear();

        let mut aborted = false;
        for stmt in &statements {
            if matches!(
                self.ast.kind(*stmt),
                NodeKind::VarDecl { .. } | NodeKind::Directive { .. } | NodeKind::StructDecl { .. }
            ) {
                continue;
            }
            if let Err(diag) = self.translate_statement(*stmt) {
                self.diags.push(diag);
                self.had_errors = true;
                aborted = true;
                break;
            }
        }

        // A subroutine always returns, even with no explicit statement.
        let falls_through = statements.last().map_or(true, |&last| {
            !matches!(
                self.ast.kind(last),
                NodeKind::Return { .. } | NodeKind::Jump { .. }
            )
        });
        if falls_through && !aborted {
            self.out.ins("rts");
        }

        for stmt in &statements {
            if matches!(
                self.ast.kind(*stmt),
                NodeKind::VarDecl {
                    kind: VarKind::Var,
                    ..
                }
            ) {
                self.emit_var_storage(*stmt);
            }
        }
        self.flush_sub_locals();
        self.out.ins(".pend");
    }

    /// Emit the hidden storage (loop counters, loop indices) allocated
    /// while translating the preceding statements.
    fn flush_sub_locals(&mut self) {
        for (label, size) in self.sub_locals.clone() {
            if size == 1 {
                self.out.raw(format!("{}\t.byte  ?", label));
            } else {
                self.out.raw(format!("{}\t.fill  {}", label, size));
            }
        }
        self.sub_locals.clear();
    }

    fn emit_var_storage(&mut self, decl: NodeId) {
        let NodeKind::VarDecl {
            name,
            dt,
            array_size,
            value,
            ..
        } = self.ast.kind(decl)
        else {
            return;
        };
        let (name, dt, array_size, value) = (name.clone(), *dt, *array_size, *value);

        match dt {
            dt if dt.is_byte() => {
                let init = value.and_then(|v| self.ast.integer_literal_value(v));
                match init {
                    Some(v) => self.out.raw(format!("{}\t.byte  {}", name, v as u8)),
                    None => self.out.raw(format!("{}\t.byte  ?", name)),
                }
            }
            dt if dt.is_word() => {
                let init = value.and_then(|v| self.ast.integer_literal_value(v));
                match init {
                    Some(v) => self.out.raw(format!("{}\t.word  {}", name, v as u16)),
                    None => self.out.raw(format!("{}\t.word  ?", name)),
                }
            }
            DataType::Float => {
                let init = value.and_then(|v| match self.ast.kind(v) {
                    NodeKind::NumericLiteral { value, .. } => Some(value.as_float()),
                    _ => None,
                });
                match init.and_then(to_mflpt5) {
                    Some(bytes) => self.out.raw(format!(
                        "{}\t.byte  ${:02x}, ${:02x}, ${:02x}, ${:02x}, ${:02x}",
                        name, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]
                    )),
                    None => self.out.raw(format!("{}\t.fill  5\t\t; float", name)),
                }
            }
            DataType::Str => {
                let text = value.and_then(|v| match self.ast.kind(v) {
                    NodeKind::StringLiteral { value } => Some(value.clone()),
                    _ => None,
                });
                match text {
                    Some(text) => self
                        .out
                        .raw(format!("{}\t.null  \"{}\"", name, text.replace('"', "'"))),
                    None => self.out.raw(format!("{}\t.fill  256", name)),
                }
            }
            dt if dt.is_array() => {
                let element = dt.element_type().unwrap_or(DataType::Ubyte);
                let elements: Option<Vec<NodeId>> = value.and_then(|v| match self.ast.kind(v) {
                    NodeKind::ArrayLiteral { elements, .. } => Some(elements.clone()),
                    _ => None,
                });
                match elements {
                    Some(elements) if element == DataType::Float => {
                        self.out.raw(format!("{}", name));
                        for e in elements {
                            let v = match self.ast.kind(e) {
                                NodeKind::NumericLiteral { value, .. } => value.as_float(),
                                _ => 0.0,
                            };
                            if let Some(bytes) = to_mflpt5(v) {
                                self.out.ins(format!(
                                    ".byte  ${:02x}, ${:02x}, ${:02x}, ${:02x}, ${:02x}",
                                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]
                                ));
                            }
                        }
                    }
                    Some(elements) => {
                        let directive = if element.is_word() { ".word" } else { ".byte" };
                        let values: Vec<String> = elements
                            .iter()
                            .map(|&e| {
                                self.ast
                                    .integer_literal_value(e)
                                    .map(|v| v.to_string())
                                    .unwrap_or_else(|| "0".to_string())
                            })
                            .collect();
                        self.out.raw(format!(
                            "{}\t{}  {}",
                            name,
                            directive,
                            values.join(", ")
                        ));
                    }
                    None => {
                        let n = array_size.unwrap_or(0) as usize;
                        self.out.raw(format!(
                            "{}\t.fill  {}\t\t; {}",
                            name,
                            n * element.size(),
                            dt.name()
                        ));
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer;
    use crate::ast::{BinaryOperator, TreeBuilder};

    fn compile(t: &mut TreeBuilder) -> String {
        let diags = analyzer::analyze(&mut t.ast).unwrap();
        assert!(!diags.has_errors(), "{:?}", diags.iter().collect::<Vec<_>>());
        let (asm, cg_diags) = generate(&mut t.ast, &CompilationTarget::c64());
        assert!(
            !cg_diags.has_errors(),
            "{:?}",
            cg_diags.iter().collect::<Vec<_>>()
        );
        asm.expect("no assembly produced")
    }

    #[test]
    fn test_program_skeleton() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let start = t.subroutine(block, "start");
        t.ret(start);

        let asm = compile(&mut t);
        assert!(asm.contains(".cpu  '6502'"));
        assert!(asm.contains("* = $0801"));
        assert!(asm.contains("jmp  main.start"));
        assert!(asm.contains("main\t.proc"));
        assert!(asm.contains("start\t.proc"));
        assert!(asm.contains("\t\trts"));
        assert!(asm.contains("\t\t.end"));
    }

    #[test]
    fn test_cx16_uses_65c02() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let start = t.subroutine(block, "start");
        t.ret(start);

        analyzer::analyze(&mut t.ast).unwrap();
        let (asm, _) = generate(&mut t.ast, &CompilationTarget::cx16());
        let asm = asm.unwrap();
        assert!(asm.contains(".cpu  '65c02'"));
    }

    #[test]
    fn test_variable_storage_emitted() {
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let start = t.subroutine(block, "start");
        let x = t.var(start, "x", crate::ast::DataType::Ubyte);
        let target = t.target_var("x", Some(x));
        let one = t.lit(1, crate::ast::DataType::Ubyte);
        t.assign(start, target, one);
        t.ret(start);

        let asm = compile(&mut t);
        assert!(asm.contains("x\t.byte  ?"));
        assert!(asm.contains("lda  #1"));
        assert!(asm.contains("sta  main.start.x"));
    }

    #[test]
    fn test_folded_constant_becomes_immediate() {
        // const ubyte N = 2+3*4; x = N  ->  lda #14
        let mut t = TreeBuilder::new();
        let block = t.block("main", None);
        let three = t.lit(3, crate::ast::DataType::Ubyte);
        let four = t.lit(4, crate::ast::DataType::Ubyte);
        let product = t.binary(three, BinaryOperator::Mul, four);
        let two = t.lit(2, crate::ast::DataType::Ubyte);
        let sum = t.binary(two, BinaryOperator::Add, product);
        let n = t.const_var(block, "N", crate::ast::DataType::Ubyte, sum);
        let start = t.subroutine(block, "start");
        let x = t.var(start, "x", crate::ast::DataType::Ubyte);
        let nref = t.ident_to("N", n);
        let target = t.target_var("x", Some(x));
        t.assign(start, target, nref);
        t.ret(start);

        let asm = compile(&mut t);
        assert!(asm.contains("lda  #14"));
        assert!(!asm.contains("multiply"));
    }
}
