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

//! The assembly line emitter.
//!
//! Collects the output as a list of 64tass source lines. Instructions are
//! indented with two tabs, labels start in the first column. The only CPU
//! dependent helper is [`Emitter::clear_byte`], which uses `stz` on a
//! 65C02 and the `lda #0` / `sta` pair on a stock 6502.

use super::target::CpuType;

/// Buffers the generated assembly text.
#[derive(Debug)]
pub struct Emitter {
    lines: Vec<String>,
    cpu: CpuType,
}

impl Emitter {
    /// Create an emitter for the given CPU.
    pub fn new(cpu: CpuType) -> Self {
        Self {
            lines: Vec::new(),
            cpu,
        }
    }

    /// The CPU this emitter targets.
    pub fn cpu(&self) -> CpuType {
        self.cpu
    }

    /// Emit a raw line, without indentation.
    pub fn raw(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Emit an instruction or directive line.
    pub fn ins(&mut self, text: impl AsRef<str>) {
        self.lines.push(format!("\t\t{}", text.as_ref()));
    }

    /// Emit a label line.
    pub fn label(&mut self, name: impl AsRef<str>) {
        self.lines.push(name.as_ref().to_string());
    }

    /// Emit a full-line comment.
    pub fn comment(&mut self, text: impl AsRef<str>) {
        self.lines.push(format!("\t\t; {}", text.as_ref()));
    }

    /// Emit an empty line.
    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Emit a subroutine call.
    pub fn jsr(&mut self, routine: impl AsRef<str>) {
        self.ins(format!("jsr  {}", routine.as_ref()));
    }

    /// Store zero into a byte location. The accumulator is clobbered on a
    /// stock 6502, untouched on a 65C02.
    pub fn clear_byte(&mut self, location: impl AsRef<str>) {
        if self.cpu == CpuType::Mos65c02 {
            self.ins(format!("stz  {}", location.as_ref()));
        } else {
            self.ins("lda  #0");
            self.ins(format!("sta  {}", location.as_ref()));
        }
    }

    /// Number of emitted lines so far.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Finish and return the assembled text.
    pub fn finish(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Format an address or value in 64tass hexadecimal syntax.
pub fn to_hex(value: u16) -> String {
    if value < 0x100 {
        format!("${:02x}", value)
    } else {
        format!("${:04x}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_indentation() {
        let mut e = Emitter::new(CpuType::Mos6502);
        e.label("start");
        e.ins("lda  #5");
        e.jsr("math.multiply_bytes");
        let text = e.finish();
        assert_eq!(text, "start\n\t\tlda  #5\n\t\tjsr  math.multiply_bytes\n");
    }

    #[test]
    fn test_clear_byte_gated_on_cpu() {
        let mut nmos = Emitter::new(CpuType::Mos6502);
        nmos.clear_byte("x");
        assert_eq!(nmos.finish(), "\t\tlda  #0\n\t\tsta  x\n");

        let mut cmos = Emitter::new(CpuType::Mos65c02);
        cmos.clear_byte("x");
        assert_eq!(cmos.finish(), "\t\tstz  x\n");
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(0xd020), "$d020");
        assert_eq!(to_hex(0x2a), "$2a");
        assert_eq!(to_hex(0x0400), "$0400");
    }
}
