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

//! Statement lowering.
//!
//! Translates the statement kinds that survive the pass pipeline. Struct
//! assignments and augmented operators never arrive here; the reorder pass
//! has already rewritten them.

use super::assignment::{classify_target, AssignmentEmitter};
use super::augmented;
use super::eval::ExpressionEval;
use super::target::SCRATCH_B1;
use super::{cg_err, to_hex, AsmGen, CgResult};
use crate::analyzer::type_check::{declaration_type, infer_type};
use crate::ast::{DataType, NodeId, NodeKind, NumericValue};
use crate::error::DiagnosticCode;

/// Extension trait for statement emission.
pub(crate) trait StatementEmitter {
    fn translate_statement(&mut self, stmt: NodeId) -> CgResult<()>;
}

impl StatementEmitter for AsmGen<'_> {
    fn translate_statement(&mut self, stmt: NodeId) -> CgResult<()> {
        match self.ast.kind(stmt) {
            NodeKind::Assignment { .. } => self.translate_assignment(stmt),
            NodeKind::Label { name } => {
                let name = name.clone();
                self.out.label(&name);
                Ok(())
            }
            NodeKind::Jump {
                address,
                identifier,
            } => {
                let (address, identifier) = (*address, *identifier);
                if let Some(addr) = address {
                    self.out.ins(format!("jmp  {}", to_hex(addr)));
                } else if let Some(ident) = identifier {
                    let label = self.symbol_label(ident)?;
                    self.out.ins(format!("jmp  {}", label));
                }
                Ok(())
            }
            NodeKind::FunctionCallStatement { call } => {
                let call = *call;
                self.eval_call(call)
            }
            NodeKind::Return { values } => {
                let values = values.clone();
                if let Some(value) = values.first() {
                    match self.return_type_at(stmt) {
                        Some(DataType::Float) => self.eval_float_into_fac1(*value, 0)?,
                        Some(dt) if dt.is_word() => self.eval_word_into_ay(*value)?,
                        _ => self.eval_byte_into_a(*value)?,
                    }
                }
                self.out.ins("rts");
                Ok(())
            }
            NodeKind::Break => {
                let end = self.loop_ends.last().cloned().ok_or_else(|| {
                    cg_err(
                        DiagnosticCode::UnsupportedStorage,
                        "break outside of a loop",
                        self.ast.pos(stmt),
                    )
                })?;
                self.out.ins(format!("jmp  {}", end));
                Ok(())
            }
            NodeKind::PostIncrDecr { target, increment } => {
                let (target, increment) = (*target, *increment);
                self.translate_incr_decr(target, increment)
            }
            NodeKind::InlineAssembly { assembly } => {
                let assembly = assembly.clone();
                for line in assembly.lines() {
                    self.out.raw(line);
                }
                Ok(())
            }
            NodeKind::IfElse { .. } => self.translate_if(stmt),
            NodeKind::Branch { .. } => self.translate_branch(stmt),
            NodeKind::WhileLoop { .. } => self.translate_while(stmt),
            NodeKind::UntilLoop { .. } => self.translate_until(stmt),
            NodeKind::RepeatLoop { .. } => self.translate_repeat(stmt),
            NodeKind::When { .. } => self.translate_when(stmt),
            NodeKind::ForLoop { .. } => self.translate_for(stmt),
            NodeKind::AnonymousScope { statements } => {
                let statements = statements.clone();
                for s in statements {
                    self.translate_statement(s)?;
                }
                Ok(())
            }
            NodeKind::NoOp
            | NodeKind::VarDecl { .. }
            | NodeKind::Directive { .. }
            | NodeKind::StructDecl { .. }
            | NodeKind::Subroutine { .. } => Ok(()),
            _ => Ok(()),
        }
    }
}

impl AsmGen<'_> {
    /// The first declared return type of the enclosing subroutine.
    fn return_type_at(&self, stmt: NodeId) -> Option<DataType> {
        let mut cur = self.ast.enclosing_scope(stmt);
        while let Some(scope) = cur {
            if let NodeKind::Subroutine { returns, .. } = self.ast.kind(scope) {
                return returns.first().copied();
            }
            cur = self.ast.enclosing_scope(scope);
        }
        None
    }

    fn translate_incr_decr(&mut self, target: NodeId, increment: bool) -> CgResult<()> {
        let tgt = classify_target(self, target)?;
        let pos = tgt.pos.clone();
        let one = if tgt.dt == DataType::Float {
            self.ast.add_detached(
                NodeKind::NumericLiteral {
                    value: NumericValue::Float(1.0),
                    dt: DataType::Float,
                },
                pos,
            )
        } else {
            self.ast.add_detached(
                NodeKind::NumericLiteral {
                    value: NumericValue::Integer(1),
                    dt: tgt.dt,
                },
                pos,
            )
        };
        let op = if increment {
            crate::ast::BinaryOperator::Add
        } else {
            crate::ast::BinaryOperator::Sub
        };
        augmented::in_place(self, &tgt, op, one)
    }

    /// Leave the condition's truth value in the zero flag.
    fn eval_condition(&mut self, condition: NodeId) -> CgResult<()> {
        let dt = infer_type(self.ast, condition).unwrap_or(DataType::Ubyte);
        if dt.is_word() {
            self.eval_word_into_ay(condition)?;
            self.out.ins(format!("sty  {}", SCRATCH_B1));
            self.out.ins(format!("ora  {}", SCRATCH_B1));
        } else {
            self.eval_byte_into_a(condition)?;
            self.out.ins("cmp  #0");
        }
        Ok(())
    }

    fn translate_if(&mut self, stmt: NodeId) -> CgResult<()> {
        let NodeKind::IfElse {
            condition,
            truepart,
            elsepart,
        } = self.ast.kind(stmt)
        else {
            return Ok(());
        };
        let (condition, truepart, elsepart) = (*condition, truepart.clone(), elsepart.clone());
        let else_label = self.labels.next("p8c_if_else");
        let end_label = self.labels.next("p8c_if_end");

        self.eval_condition(condition)?;
        self.out.ins(format!("beq  {}", else_label));
        for s in truepart {
            self.translate_statement(s)?;
        }
        if elsepart.is_empty() {
            self.out.label(&else_label);
        } else {
            self.out.ins(format!("jmp  {}", end_label));
            self.out.label(&else_label);
            for s in elsepart {
                self.translate_statement(s)?;
            }
            self.out.label(&end_label);
        }
        Ok(())
    }

    fn translate_branch(&mut self, stmt: NodeId) -> CgResult<()> {
        let NodeKind::Branch {
            condition,
            truepart,
            elsepart,
        } = self.ast.kind(stmt)
        else {
            return Ok(());
        };
        let (condition, truepart, elsepart) = (*condition, truepart.clone(), elsepart.clone());
        let else_label = self.labels.next("p8c_branch_else");
        let end_label = self.labels.next("p8c_branch_end");

        self.out
            .ins(format!("{}  {}", condition.inverse_mnemonic(), else_label));
        for s in truepart {
            self.translate_statement(s)?;
        }
        if elsepart.is_empty() {
            self.out.label(&else_label);
        } else {
            self.out.ins(format!("jmp  {}", end_label));
            self.out.label(&else_label);
            for s in elsepart {
                self.translate_statement(s)?;
            }
            self.out.label(&end_label);
        }
        Ok(())
    }

    fn translate_while(&mut self, stmt: NodeId) -> CgResult<()> {
        let NodeKind::WhileLoop {
            condition,
            statements,
        } = self.ast.kind(stmt)
        else {
            return Ok(());
        };
        let (condition, statements) = (*condition, statements.clone());
        let loop_label = self.labels.next("p8c_while");
        let end_label = self.labels.next("p8c_while_end");

        self.out.label(&loop_label);
        self.eval_condition(condition)?;
        self.out.ins(format!("beq  {}", end_label));
        self.loop_ends.push(end_label.clone());
        for s in statements {
            self.translate_statement(s)?;
        }
        self.loop_ends.pop();
        self.out.ins(format!("jmp  {}", loop_label));
        self.out.label(&end_label);
        Ok(())
    }

    fn translate_until(&mut self, stmt: NodeId) -> CgResult<()> {
        let NodeKind::UntilLoop {
            condition,
            statements,
        } = self.ast.kind(stmt)
        else {
            return Ok(());
        };
        let (condition, statements) = (*condition, statements.clone());
        let loop_label = self.labels.next("p8c_until");
        let end_label = self.labels.next("p8c_until_end");

        self.out.label(&loop_label);
        self.loop_ends.push(end_label.clone());
        for s in statements {
            self.translate_statement(s)?;
        }
        self.loop_ends.pop();
        self.eval_condition(condition)?;
        self.out.ins(format!("beq  {}", loop_label));
        self.out.label(&end_label);
        Ok(())
    }

    fn translate_repeat(&mut self, stmt: NodeId) -> CgResult<()> {
        let NodeKind::RepeatLoop { count, statements } = self.ast.kind(stmt) else {
            return Ok(());
        };
        let (count, statements) = (*count, statements.clone());
        let dt = infer_type(self.ast, count).unwrap_or(DataType::Ubyte);
        let loop_label = self.labels.next("p8c_repeat");
        let end_label = self.labels.next("p8c_repeat_end");

        if dt.is_word() {
            let counter = self.alloc_local("p8c_repeat_counter", 2);
            self.eval_word_into_ay(count)?;
            self.out.ins(format!("sta  {}", counter));
            self.out.ins(format!("sty  {}+1", counter));
            self.out.label(&loop_label);
            self.out.ins(format!("lda  {}", counter));
            self.out.ins(format!("ora  {}+1", counter));
            self.out.ins(format!("beq  {}", end_label));
            self.loop_ends.push(end_label.clone());
            for s in statements {
                self.translate_statement(s)?;
            }
            self.loop_ends.pop();
            self.out.ins(format!("lda  {}", counter));
            self.out.ins("bne  +");
            self.out.ins(format!("dec  {}+1", counter));
            self.out.raw("+");
            self.out.ins(format!("dec  {}", counter));
            self.out.ins(format!("jmp  {}", loop_label));
        } else {
            let counter = self.alloc_local("p8c_repeat_counter", 1);
            self.eval_byte_into_a(count)?;
            self.out.ins(format!("sta  {}", counter));
            self.out.label(&loop_label);
            self.out.ins(format!("lda  {}", counter));
            self.out.ins(format!("beq  {}", end_label));
            self.loop_ends.push(end_label.clone());
            for s in statements {
                self.translate_statement(s)?;
            }
            self.loop_ends.pop();
            self.out.ins(format!("dec  {}", counter));
            self.out.ins(format!("jmp  {}", loop_label));
        }
        self.out.label(&end_label);
        Ok(())
    }

    fn translate_when(&mut self, stmt: NodeId) -> CgResult<()> {
        let NodeKind::When { condition, choices } = self.ast.kind(stmt) else {
            return Ok(());
        };
        let (condition, choices) = (*condition, choices.clone());
        let dt = infer_type(self.ast, condition).unwrap_or(DataType::Ubyte);
        let end_label = self.labels.next("p8c_when_end");

        if dt.is_word() {
            self.eval_word_into_ay(condition)?;
        } else {
            self.eval_byte_into_a(condition)?;
        }

        let mut arms = Vec::new();
        let mut else_body = None;
        for choice in &choices {
            let NodeKind::WhenChoice { values, statements } = self.ast.kind(*choice) else {
                continue;
            };
            if values.is_empty() {
                else_body = Some(statements.clone());
            } else {
                let label = self.labels.next("p8c_when_choice");
                arms.push((values.clone(), statements.clone(), label));
            }
        }

        for (values, _, label) in &arms {
            for value in values {
                let Some(v) = self.ast.integer_literal_value(*value) else {
                    continue;
                };
                if dt.is_word() {
                    self.out.ins(format!("cmp  #<{}", v as u16));
                    self.out.ins("bne  +");
                    self.out.ins(format!("cpy  #>{}", v as u16));
                    self.out.ins(format!("beq  {}", label));
                    self.out.raw("+");
                } else {
                    self.out.ins(format!("cmp  #{}", v as u8));
                    self.out.ins(format!("beq  {}", label));
                }
            }
        }
        if let Some(body) = else_body {
            for s in body {
                self.translate_statement(s)?;
            }
        }
        self.out.ins(format!("jmp  {}", end_label));
        for (_, body, label) in arms {
            self.out.label(&label);
            for s in body {
                self.translate_statement(s)?;
            }
            self.out.ins(format!("jmp  {}", end_label));
        }
        self.out.label(&end_label);
        Ok(())
    }

    fn translate_for(&mut self, stmt: NodeId) -> CgResult<()> {
        let NodeKind::ForLoop {
            loopvar,
            iterable,
            statements,
        } = self.ast.kind(stmt)
        else {
            return Ok(());
        };
        let (loopvar, iterable, statements) = (*loopvar, *iterable, statements.clone());
        let decl = self.ast.identifier_target(loopvar).ok_or_else(|| {
            cg_err(
                DiagnosticCode::UnresolvedName,
                "for loop variable is unresolved",
                self.ast.pos(stmt),
            )
        })?;
        let var_dt = declaration_type(self.ast, decl).unwrap_or(DataType::Ubyte);
        let var_label = self.ast.scoped_name(decl);

        match self.ast.kind(iterable) {
            NodeKind::RangeExpr { from, to, step } => {
                let (from, to, step) = (*from, *to, *step);
                self.translate_for_range(&var_label, var_dt, from, to, step, &statements)
            }
            NodeKind::IdentifierRef { .. } => {
                let iter_decl = self.ast.identifier_target(iterable).ok_or_else(|| {
                    cg_err(
                        DiagnosticCode::UnresolvedName,
                        "for loop iterable is unresolved",
                        self.ast.pos(iterable),
                    )
                })?;
                self.translate_for_iterable(&var_label, iter_decl, &statements)
            }
            _ => Err(cg_err(
                DiagnosticCode::UnsupportedStorage,
                "for loop needs a range or an iterable symbol",
                self.ast.pos(iterable),
            )),
        }
    }

    fn translate_for_range(
        &mut self,
        var_label: &str,
        var_dt: DataType,
        from: NodeId,
        to: NodeId,
        step: Option<NodeId>,
        body: &[NodeId],
    ) -> CgResult<()> {
        let loop_label = self.labels.next("p8c_for");
        let end_label = self.labels.next("p8c_for_end");

        // loop variable = from
        if var_dt.is_word() {
            self.eval_word_into_ay(from)?;
            self.out.ins(format!("sta  {}", var_label));
            self.out.ins(format!("sty  {}+1", var_label));
        } else {
            self.eval_byte_into_a(from)?;
            self.out.ins(format!("sta  {}", var_label));
        }

        self.out.label(&loop_label);
        self.loop_ends.push(end_label.clone());
        for s in body {
            self.translate_statement(*s)?;
        }
        self.loop_ends.pop();

        // Stop after the iteration that reached the end value.
        let step_value = match step {
            Some(s) => self.ast.integer_literal_value(s).unwrap_or(1),
            None => {
                let (fv, tv) = (
                    self.ast.integer_literal_value(from),
                    self.ast.integer_literal_value(to),
                );
                match (fv, tv) {
                    (Some(f), Some(t)) if t < f => -1,
                    _ => 1,
                }
            }
        };
        if let Some(tv) = self.ast.integer_literal_value(to) {
            if var_dt.is_word() {
                self.out.ins(format!("lda  {}", var_label));
                self.out.ins(format!("cmp  #<{}", tv as u16));
                self.out.ins("bne  +");
                self.out.ins(format!("lda  {}+1", var_label));
                self.out.ins(format!("cmp  #>{}", tv as u16));
                self.out.ins(format!("beq  {}", end_label));
                self.out.raw("+");
            } else {
                self.out.ins(format!("lda  {}", var_label));
                self.out.ins(format!("cmp  #{}", tv as u8));
                self.out.ins(format!("beq  {}", end_label));
            }
        } else {
            self.eval_byte_into_a(to)?;
            self.out.ins(format!("cmp  {}", var_label));
            self.out.ins(format!("beq  {}", end_label));
        }

        // Step the loop variable in place.
        let pos = crate::error::Position::builtin();
        let one = self.ast.add_detached(
            NodeKind::NumericLiteral {
                value: NumericValue::Integer(step_value.abs()),
                dt: var_dt,
            },
            pos.clone(),
        );
        let tgt = super::assignment::AsmTarget {
            kind: super::assignment::AsmTargetKind::Variable {
                label: var_label.to_string(),
            },
            dt: var_dt,
            pos,
        };
        let op = if step_value >= 0 {
            crate::ast::BinaryOperator::Add
        } else {
            crate::ast::BinaryOperator::Sub
        };
        augmented::in_place(self, &tgt, op, one)?;
        self.out.ins(format!("jmp  {}", loop_label));
        self.out.label(&end_label);
        Ok(())
    }

    fn translate_for_iterable(
        &mut self,
        var_label: &str,
        iter_decl: NodeId,
        body: &[NodeId],
    ) -> CgResult<()> {
        let NodeKind::VarDecl {
            dt, array_size, ..
        } = self.ast.kind(iter_decl)
        else {
            return Err(cg_err(
                DiagnosticCode::UnsupportedStorage,
                "for loop iterable is not a variable",
                self.ast.pos(iter_decl),
            ));
        };
        let (dt, array_size) = (*dt, *array_size);
        let iter_label = self.ast.scoped_name(iter_decl);
        let loop_label = self.labels.next("p8c_for");
        let end_label = self.labels.next("p8c_for_end");
        let index = self.alloc_local("p8c_for_index", 1);

        self.out.clear_byte(&index);
        self.out.label(&loop_label);
        match dt {
            DataType::Str => {
                // A string iterates until its terminating zero byte.
                self.out.ins(format!("ldy  {}", index));
                self.out.ins(format!("lda  {},y", iter_label));
                self.out.ins(format!("beq  {}", end_label));
                self.out.ins(format!("sta  {}", var_label));
            }
            dt if dt.is_array() => {
                let size = array_size.unwrap_or(0);
                self.out.ins(format!("lda  {}", index));
                self.out.ins(format!("cmp  #{}", size));
                self.out.ins(format!("beq  {}", end_label));
                match dt.element_type() {
                    Some(e) if e.is_word() => {
                        self.out.ins(format!("lda  {}", index));
                        self.out.ins("asl  a");
                        self.out.ins("tay");
                        self.out.ins(format!("lda  {},y", iter_label));
                        self.out.ins(format!("sta  {}", var_label));
                        self.out.ins(format!("lda  {}+1,y", iter_label));
                        self.out.ins(format!("sta  {}+1", var_label));
                    }
                    _ => {
                        self.out.ins(format!("ldy  {}", index));
                        self.out.ins(format!("lda  {},y", iter_label));
                        self.out.ins(format!("sta  {}", var_label));
                    }
                }
            }
            _ => {
                return Err(cg_err(
                    DiagnosticCode::UnsupportedStorage,
                    format!("cannot iterate over a {} value", dt.name()),
                    self.ast.pos(iter_decl),
                ))
            }
        }
        self.loop_ends.push(end_label.clone());
        for s in body {
            self.translate_statement(*s)?;
        }
        self.loop_ends.pop();
        self.out.ins(format!("inc  {}", index));
        self.out.ins(format!("jmp  {}", loop_label));
        self.out.label(&end_label);
        Ok(())
    }
}
