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

//! Tests for the in-place augmented assignment code generator.
//!
//! Covers the dispatch across storage kinds, operand types and operand
//! shapes, and the tuned idioms the emitter is expected to pick.

use p8c::ast::{BinaryOperator, DataType, NodeId, PrefixOperator, TreeBuilder};
use p8c::codegen::CompilationTarget;
use p8c::error::DiagnosticCode;
use test_case::test_case;

// ============================================================================
// Helper Functions
// ============================================================================

/// A program skeleton: main.start with one ubyte x, one uword w, one float f.
struct Fixture {
    t: TreeBuilder,
    start: NodeId,
    x: NodeId,
    w: NodeId,
    f: NodeId,
}

fn fixture() -> Fixture {
    let mut t = TreeBuilder::new();
    let block = t.block("main", None);
    let start = t.subroutine(block, "start");
    let x = t.var(start, "x", DataType::Ubyte);
    let w = t.var(start, "w", DataType::Uword);
    let f = t.var(start, "f", DataType::Float);
    Fixture { t, start, x, w, f }
}

fn compile(mut t: TreeBuilder) -> String {
    let output = p8c::compile(&mut t.ast, &CompilationTarget::c64()).expect("internal error");
    assert!(
        !output.diagnostics.has_errors(),
        "unexpected errors: {:?}",
        output.diagnostics.iter().collect::<Vec<_>>()
    );
    output.assembly.expect("no assembly produced")
}

fn compile_expecting_error(mut t: TreeBuilder, code: DiagnosticCode) {
    let output = p8c::compile(&mut t.ast, &CompilationTarget::c64()).expect("internal error");
    assert!(
        output.diagnostics.iter().any(|d| d.code == code),
        "expected {:?}, got {:?}",
        code,
        output.diagnostics.iter().collect::<Vec<_>>()
    );
    assert!(output.assembly.is_none());
}

// ============================================================================
// Byte Variables
// ============================================================================

#[test]
fn test_byte_add_one_uses_inc() {
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let one = fx.t.lit(1, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, one);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("inc  main.start.x"));
    assert!(!asm.contains("adc"));
}

#[test]
fn test_byte_add_constant_inlines_adc() {
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let v = fx.t.lit(8, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("lda  main.start.x"));
    assert!(asm.contains("clc"));
    assert!(asm.contains("adc  #8"));
    assert!(asm.contains("sta  main.start.x"));
}

#[test]
fn test_byte_add_variable() {
    let mut fx = fixture();
    let other = fx.t.var(fx.start, "other", DataType::Ubyte);
    let target = fx.t.target_var("x", Some(fx.x));
    let oref = fx.t.ident_to("other", other);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, oref);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("adc  main.start.other"));
}

#[test]
fn test_byte_subtract_one_uses_dec() {
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let one = fx.t.lit(1, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Sub, one);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("dec  main.start.x"));
}

#[test_case(2, 1; "times two is one shift")]
#[test_case(4, 2; "times four is two shifts")]
#[test_case(8, 3; "times eight is three shifts")]
fn test_byte_multiply_power_of_two_shifts(multiplier: i64, shifts: usize) {
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let v = fx.t.lit(multiplier, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Mul, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert_eq!(asm.matches("asl  main.start.x").count(), shifts);
    assert!(!asm.contains("multiply"));
}

#[test_case(3; "three")]
#[test_case(10; "ten")]
#[test_case(40; "forty")]
fn test_byte_multiply_small_table(multiplier: i64) {
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let v = fx.t.lit(multiplier, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Mul, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains(&format!("jsr  math.mul_byte_{}", multiplier)));
}

#[test]
fn test_byte_multiply_general_routine() {
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let v = fx.t.lit(23, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Mul, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("jsr  math.multiply_bytes"));
}

#[test]
fn test_byte_division_unsigned_routine() {
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let v = fx.t.lit(7, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Div, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("jsr  math.divmod_ub_asm"));
    assert!(asm.contains("sty  main.start.x"));
}

#[test]
fn test_byte_division_signed_routine() {
    let mut fx = fixture();
    let sb = fx.t.var(fx.start, "sb", DataType::Byte);
    let target = fx.t.target_var("sb", Some(sb));
    let v = fx.t.lit(7, DataType::Byte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Div, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("jsr  math.divmod_b_asm"));
}

#[test]
fn test_byte_division_by_power_of_two_uses_lsr() {
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let v = fx.t.lit(4, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Div, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert_eq!(asm.matches("lsr  main.start.x").count(), 2);
    assert!(!asm.contains("divmod"));
}

#[test]
fn test_byte_remainder_power_of_two_masks() {
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let v = fx.t.lit(8, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Remainder, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("and  #7"));
}

#[test]
fn test_byte_bitwise_ops() {
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let v = fx.t.lit(0x0f, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::BitAnd, v);
    let target = fx.t.target_var("x", Some(fx.x));
    let v = fx.t.lit(0x10, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::BitOr, v);
    let target = fx.t.target_var("x", Some(fx.x));
    let v = fx.t.lit(0x55, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::BitXor, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("and  #15"));
    assert!(asm.contains("ora  #16"));
    assert!(asm.contains("eor  #85"));
}

// ============================================================================
// Shifts
// ============================================================================

#[test]
fn test_byte_shift_by_nine_clears() {
    // x <<= 9 zeroes an unsigned byte, it does not loop.
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let v = fx.t.lit(9, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::ShiftLeft, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(!asm.contains("asl  main.start.x"));
    assert!(asm.contains("lda  #0\n\t\tsta  main.start.x"));
}

#[test]
fn test_byte_shift_small_count_unrolled() {
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let v = fx.t.lit(3, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::ShiftLeft, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert_eq!(asm.matches("asl  main.start.x").count(), 3);
}

#[test]
fn test_word_shift_by_sixteen_clears_both_bytes() {
    let mut fx = fixture();
    let target = fx.t.target_var("w", Some(fx.w));
    let v = fx.t.lit(16, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::ShiftLeft, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("sta  main.start.w"));
    assert!(asm.contains("sta  main.start.w+1"));
    assert!(!asm.contains("asl  main.start.w"));
}

#[test]
fn test_word_shift_by_eight_moves_bytes() {
    let mut fx = fixture();
    let target = fx.t.target_var("w", Some(fx.w));
    let v = fx.t.lit(8, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::ShiftLeft, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("lda  main.start.w\n\t\tsta  main.start.w+1"));
}

#[test]
fn test_shift_by_word_count_is_an_error() {
    let mut fx = fixture();
    let count = fx.t.var(fx.start, "count", DataType::Uword);
    let target = fx.t.target_var("x", Some(fx.x));
    let cref = fx.t.ident_to("count", count);
    fx.t.assign_aug(fx.start, target, BinaryOperator::ShiftLeft, cref);
    fx.t.ret(fx.start);

    compile_expecting_error(fx.t, DiagnosticCode::ShiftCountNotByte);
}

// ============================================================================
// Word Variables
// ============================================================================

#[test]
fn test_word_add_high_byte_idiom() {
    // w += $0200 touches only the high byte, twice.
    let mut fx = fixture();
    let target = fx.t.target_var("w", Some(fx.w));
    let v = fx.t.lit(0x0200, DataType::Uword);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert_eq!(asm.matches("inc  main.start.w+1").count(), 2);
    assert!(!asm.contains("adc"));
    assert!(!asm.contains("inc  main.start.w\n"));
}

#[test]
fn test_word_subtract_high_byte_idiom() {
    let mut fx = fixture();
    let target = fx.t.target_var("w", Some(fx.w));
    let v = fx.t.lit(0x0100, DataType::Uword);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Sub, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert_eq!(asm.matches("dec  main.start.w+1").count(), 1);
    assert!(!asm.contains("sbc"));
}

#[test]
fn test_word_add_small_constant_propagates_carry() {
    let mut fx = fixture();
    let target = fx.t.target_var("w", Some(fx.w));
    let v = fx.t.lit(40, DataType::Uword);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("adc  #40"));
    assert!(asm.contains("bcc  +"));
    assert!(asm.contains("inc  main.start.w+1"));
}

#[test]
fn test_word_add_full_constant() {
    let mut fx = fixture();
    let target = fx.t.target_var("w", Some(fx.w));
    let v = fx.t.lit(0x1234, DataType::Uword);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("adc  #<4660"));
    assert!(asm.contains("adc  #>4660"));
}

#[test]
fn test_word_multiply_table() {
    let mut fx = fixture();
    let target = fx.t.target_var("w", Some(fx.w));
    let v = fx.t.lit(320, DataType::Uword);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Mul, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("jsr  math.mul_word_320"));
}

#[test]
fn test_word_multiply_general_routine() {
    let mut fx = fixture();
    let target = fx.t.target_var("w", Some(fx.w));
    let v = fx.t.lit(123, DataType::Uword);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Mul, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("jsr  math.multiply_words"));
    assert!(asm.contains("sta  P8ZP_SCRATCH_W1"));
}

#[test]
fn test_word_division_routines() {
    let mut fx = fixture();
    let target = fx.t.target_var("w", Some(fx.w));
    let v = fx.t.lit(100, DataType::Uword);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Div, v);
    let sw = fx.t.var(fx.start, "sw", DataType::Word);
    let target = fx.t.target_var("sw", Some(sw));
    let v = fx.t.lit(100, DataType::Word);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Div, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("jsr  math.divmod_uw_asm"));
    assert!(asm.contains("jsr  math.divmod_w_asm"));
}

#[test]
fn test_word_and_with_byte_mask_zeroes_high_byte() {
    let mut fx = fixture();
    let target = fx.t.target_var("w", Some(fx.w));
    let v = fx.t.lit(0x0f, DataType::Uword);
    fx.t.assign_aug(fx.start, target, BinaryOperator::BitAnd, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("and  #15"));
    assert!(asm.contains("lda  #0\n\t\tsta  main.start.w+1"));
}

#[test]
fn test_word_or_with_byte_value_keeps_high_byte() {
    let mut fx = fixture();
    let target = fx.t.target_var("w", Some(fx.w));
    let v = fx.t.lit(0x0f, DataType::Uword);
    fx.t.assign_aug(fx.start, target, BinaryOperator::BitOr, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("ora  #15"));
    let high_byte_stores = asm.matches("sta  main.start.w+1").count();
    assert_eq!(high_byte_stores, 0);
}

// ============================================================================
// Error Conditions
// ============================================================================

#[test]
fn test_division_by_literal_zero_is_an_error() {
    let mut fx = fixture();
    let target = fx.t.target_var("x", Some(fx.x));
    let zero = fx.t.lit(0, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Div, zero);
    fx.t.ret(fx.start);

    compile_expecting_error(fx.t, DiagnosticCode::DivisionByZeroLiteral);
}

#[test]
fn test_signed_remainder_is_an_error() {
    let mut fx = fixture();
    let sb = fx.t.var(fx.start, "sb", DataType::Byte);
    let target = fx.t.target_var("sb", Some(sb));
    let v = fx.t.lit(3, DataType::Byte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Remainder, v);
    fx.t.ret(fx.start);

    compile_expecting_error(fx.t, DiagnosticCode::SignedRemainder);
}

// ============================================================================
// Memory Targets
// ============================================================================

#[test]
fn test_memory_literal_address_target() {
    // @($d020) += 1
    let mut fx = fixture();
    let addr = fx.t.lit(0xd020, DataType::Uword);
    let target = fx.t.target_mem(addr);
    let one = fx.t.lit(1, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, one);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("inc  $d020"));
}

#[test]
fn test_memory_pointer_variable_target() {
    let mut fx = fixture();
    let ptr = fx.t.var(fx.start, "ptr", DataType::Uword);
    let pref = fx.t.ident_to("ptr", ptr);
    let target = fx.t.target_mem(pref);
    let v = fx.t.lit(5, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    // The pointer is copied to the zero page scratch and dereferenced.
    assert!(asm.contains("sta  P8ZP_SCRATCH_W2"));
    assert!(asm.contains("lda  (P8ZP_SCRATCH_W2),y"));
    assert!(asm.contains("sta  (P8ZP_SCRATCH_W2),y"));
}

#[test]
fn test_memory_computed_address_uses_stack_helpers() {
    let mut fx = fixture();
    let base = fx.t.var(fx.start, "base", DataType::Uword);
    let bref = fx.t.ident_to("base", base);
    let offset = fx.t.lit(40, DataType::Uword);
    let addr = fx.t.binary(bref, BinaryOperator::Add, offset);
    let target = fx.t.target_mem(addr);
    let v = fx.t.lit(2, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("jsr  prog8_lib.read_byte_from_address_on_stack"));
    assert!(asm.contains("jsr  prog8_lib.write_byte_to_address_on_stack"));
}

// ============================================================================
// Array Targets
// ============================================================================

#[test]
fn test_array_literal_index_folds_offset() {
    // arr[3] += 1 addresses arr+3 directly.
    let mut fx = fixture();
    let arr = fx.t.array_var(fx.start, "arr", DataType::ArrayUbyte, 10, None);
    let idx = fx.t.lit(3, DataType::Ubyte);
    let target = fx.t.target_array("arr", Some(arr), idx);
    let one = fx.t.lit(1, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, one);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("inc  main.start.arr+3"));
}

#[test]
fn test_word_array_literal_index_scales_offset() {
    let mut fx = fixture();
    let arr = fx.t.array_var(fx.start, "warr", DataType::ArrayUword, 10, None);
    let idx = fx.t.lit(3, DataType::Ubyte);
    let target = fx.t.target_array("warr", Some(arr), idx);
    let v = fx.t.lit(0x0100, DataType::Uword);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    // Element 3 of a word array starts at byte offset 6.
    assert!(asm.contains("inc  main.start.warr+6+1"));
}

#[test]
fn test_array_runtime_index_loads_through_y() {
    let mut fx = fixture();
    let arr = fx.t.array_var(fx.start, "arr", DataType::ArrayUbyte, 10, None);
    let i = fx.t.var(fx.start, "i", DataType::Ubyte);
    let iref = fx.t.ident_to("i", i);
    let target = fx.t.target_array("arr", Some(arr), iref);
    let v = fx.t.lit(5, DataType::Ubyte);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("lda  main.start.arr,y"));
    assert!(asm.contains("sta  main.start.arr,y"));
}

// ============================================================================
// Floats
// ============================================================================

#[test]
fn test_float_add_uses_library_sequence() {
    let mut fx = fixture();
    let target = fx.t.target_var("f", Some(fx.f));
    let v = fx.t.flit(1.5);
    fx.t.assign_aug(fx.start, target, BinaryOperator::Add, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("jsr  floats.MOVFM"));
    assert!(asm.contains("jsr  floats.FADD"));
    assert!(asm.contains("jsr  floats.MOVMF"));
    // The 1.5 literal landed in the constant pool.
    assert!(asm.contains("p8c_float_const_1"));
}

#[test_case(BinaryOperator::Sub, "floats.FSUB"; "subtract")]
#[test_case(BinaryOperator::Mul, "floats.FMULT"; "multiply")]
#[test_case(BinaryOperator::Div, "floats.FDIV"; "divide")]
#[test_case(BinaryOperator::Pow, "floats.FPWR"; "power")]
fn test_float_operator_routines(op: BinaryOperator, routine: &str) {
    let mut fx = fixture();
    let target = fx.t.target_var("f", Some(fx.f));
    let v = fx.t.flit(2.0);
    fx.t.assign_aug(fx.start, target, op, v);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains(&format!("jsr  {}", routine)));
}

#[test]
fn test_float_negation_flips_sign_bit() {
    // f = -f needs no library call at all.
    let mut fx = fixture();
    let fref = fx.t.ident_to("f", fx.f);
    let neg = fx.t.prefix(PrefixOperator::Minus, fref);
    let target = fx.t.target_var("f", Some(fx.f));
    fx.t.assign(fx.start, target, neg);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("lda  main.start.f+1"));
    assert!(asm.contains("eor  #$80"));
    assert!(asm.contains("sta  main.start.f+1"));
    assert!(!asm.contains("jsr  floats"));
}

// ============================================================================
// Prefix Operators In Place
// ============================================================================

#[test]
fn test_byte_negation_expands_to_zero_minus() {
    let mut fx = fixture();
    let sb = fx.t.var(fx.start, "sb", DataType::Byte);
    let sref = fx.t.ident_to("sb", sb);
    let neg = fx.t.prefix(PrefixOperator::Minus, sref);
    let target = fx.t.target_var("sb", Some(sb));
    fx.t.assign(fx.start, target, neg);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("lda  #0"));
    assert!(asm.contains("sbc  main.start.sb"));
}

#[test]
fn test_byte_invert_uses_eor() {
    let mut fx = fixture();
    let xref = fx.t.ident_to("x", fx.x);
    let inv = fx.t.prefix(PrefixOperator::BitInvert, xref);
    let target = fx.t.target_var("x", Some(fx.x));
    fx.t.assign(fx.start, target, inv);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("eor  #255"));
}

#[test]
fn test_boolean_not_uses_branch_and_eor() {
    let mut fx = fixture();
    let xref = fx.t.ident_to("x", fx.x);
    let not = fx.t.prefix(PrefixOperator::Not, xref);
    let target = fx.t.target_var("x", Some(fx.x));
    fx.t.assign(fx.start, target, not);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(asm.contains("eor  #1"));
    assert!(asm.contains("beq  +"));
}

// ============================================================================
// Redundant Casts
// ============================================================================

#[test]
fn test_redundant_cast_is_stripped() {
    // x = ubyte(x) emits nothing for x at all.
    let mut fx = fixture();
    let xref = fx.t.ident_to("x", fx.x);
    let cast = fx.t.cast(DataType::Ubyte, xref);
    let target = fx.t.target_var("x", Some(fx.x));
    fx.t.assign(fx.start, target, cast);
    fx.t.ret(fx.start);

    let asm = compile(fx.t);
    assert!(!asm.contains("lda  main.start.x"));
}

// ============================================================================
// Desugared Equivalence
// ============================================================================

#[test]
fn test_augmented_and_desugared_produce_identical_assembly() {
    // x += 5 versus x = x + 5
    let mut fx1 = fixture();
    let target = fx1.t.target_var("x", Some(fx1.x));
    let five = fx1.t.lit(5, DataType::Ubyte);
    fx1.t.assign_aug(fx1.start, target, BinaryOperator::Add, five);
    fx1.t.ret(fx1.start);
    let asm1 = compile(fx1.t);

    let mut fx2 = fixture();
    let xref = fx2.t.ident_to("x", fx2.x);
    let five = fx2.t.lit(5, DataType::Ubyte);
    let sum = fx2.t.binary(xref, BinaryOperator::Add, five);
    let target = fx2.t.target_var("x", Some(fx2.x));
    fx2.t.assign(fx2.start, target, sum);
    fx2.t.ret(fx2.start);
    let asm2 = compile(fx2.t);

    assert_eq!(asm1, asm2);
}
