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

//! P8C Compiler CLI
//!
//! The driver wires the library pipeline together. The parser front-end is
//! a separate program that hands over the parsed tree; until it is hooked
//! up, the driver compiles a built-in demo program so that the whole
//! back-end can be exercised end to end.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use p8c::ast::{BinaryOperator, DataType, TreeBuilder};
use p8c::codegen::CompilationTarget;

/// P8C - a cross-compiler for the P8 systems language
#[derive(Parser, Debug)]
#[command(name = "p8c")]
#[command(version)]
#[command(about = "Compiles P8 programs into 6502 assembly for the C64 and the Commander X16")]
struct Cli {
    /// Output file (.asm)
    #[arg(short, long, default_value = "out.asm")]
    output: PathBuf,

    /// Compilation target (c64 or cx16)
    #[arg(short, long, default_value = "c64")]
    target: String,

    /// Compile the built-in demo program
    #[arg(long)]
    demo: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// A small program exercising the pipeline: constants, augmented
/// assignments, a loop and a call.
fn demo_program() -> TreeBuilder {
    let mut t = TreeBuilder::new();
    let block = t.block("main", None);

    let three = t.lit(3, DataType::Ubyte);
    let four = t.lit(4, DataType::Ubyte);
    let product = t.binary(three, BinaryOperator::Mul, four);
    let two = t.lit(2, DataType::Ubyte);
    let sum = t.binary(two, BinaryOperator::Add, product);
    let n = t.const_var(block, "amount", DataType::Ubyte, sum);

    let start = t.subroutine(block, "start");
    let x = t.var(start, "x", DataType::Ubyte);
    let w = t.var(start, "w", DataType::Uword);

    let nref = t.ident_to("amount", n);
    let target = t.target_var("x", Some(x));
    t.assign(start, target, nref);

    let five = t.lit(5, DataType::Ubyte);
    let target = t.target_var("x", Some(x));
    t.assign_aug(start, target, BinaryOperator::Add, five);

    let step = t.lit(0x0200, DataType::Uword);
    let target = t.target_var("w", Some(w));
    t.assign_aug(start, target, BinaryOperator::Add, step);

    let shift = t.lit(2, DataType::Ubyte);
    let target = t.target_var("w", Some(w));
    t.assign_aug(start, target, BinaryOperator::ShiftLeft, shift);

    t.ret(start);
    t
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(target) = CompilationTarget::by_name(&cli.target) else {
        eprintln!("error: unknown target '{}' (use c64 or cx16)", cli.target);
        return ExitCode::from(2);
    };

    if !cli.demo {
        eprintln!("error: no front-end attached; run with --demo to compile the demo program");
        return ExitCode::from(2);
    }

    if cli.verbose {
        println!("{} v{}", p8c::NAME, p8c::VERSION);
        println!("target: {}", target.name);
        println!("compiling the built-in demo program");
    }

    let mut t = demo_program();
    let output = match p8c::compile(&mut t.ast, &target) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(1);
        }
    };

    for diagnostic in output.diagnostics.iter() {
        eprintln!("{}", diagnostic);
    }

    let Some(assembly) = output.assembly else {
        eprintln!("compilation failed, no output written");
        return ExitCode::from(1);
    };

    if let Err(e) = std::fs::write(&cli.output, assembly) {
        eprintln!("error: cannot write {}: {}", cli.output.display(), e);
        return ExitCode::from(3);
    }
    if cli.verbose {
        println!("wrote {}", cli.output.display());
    }
    ExitCode::SUCCESS
}
