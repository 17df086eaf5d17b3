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

//! Compilation targets.
//!
//! The emitter queries the active target for the CPU kind (65C02-only
//! idioms like `stz` are gated on it), the program load address, and the
//! zero-page layout of the scratch registers and the sixteen virtual
//! registers.

/// The CPU flavor of a target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuType {
    /// The original NMOS 6502/6510.
    Mos6502,
    /// The CMOS 65C02 with `stz`, `bra` and friends.
    Mos65c02,
}

/// A target machine description.
#[derive(Debug, Clone)]
pub struct CompilationTarget {
    /// Target name as used on the command line.
    pub name: &'static str,
    /// CPU flavor.
    pub cpu: CpuType,
    /// Program load address.
    pub load_address: u16,
    /// Zero-page address of the byte scratch register.
    pub zp_scratch_b1: u8,
    /// Zero-page address of the register scratch.
    pub zp_scratch_reg: u8,
    /// Zero-page address of the first word scratch.
    pub zp_scratch_w1: u8,
    /// Zero-page address of the second word scratch.
    pub zp_scratch_w2: u8,
    /// Zero-page address of virtual register r0; r1..r15 follow as words.
    pub virtual_registers: u8,
}

/// Label of the byte scratch register.
pub const SCRATCH_B1: &str = "P8ZP_SCRATCH_B1";
/// Label of the register scratch byte.
pub const SCRATCH_REG: &str = "P8ZP_SCRATCH_REG";
/// Label of the first word scratch.
pub const SCRATCH_W1: &str = "P8ZP_SCRATCH_W1";
/// Label of the second word scratch.
pub const SCRATCH_W2: &str = "P8ZP_SCRATCH_W2";

impl CompilationTarget {
    /// The Commodore-64 target.
    pub fn c64() -> Self {
        Self {
            name: "c64",
            cpu: CpuType::Mos6502,
            load_address: 0x0801,
            zp_scratch_b1: 0xfa,
            zp_scratch_reg: 0xfb,
            zp_scratch_w1: 0xfc,
            zp_scratch_w2: 0xfe,
            virtual_registers: 0x04,
        }
    }

    /// The Commander-X16 target.
    pub fn cx16() -> Self {
        Self {
            name: "cx16",
            cpu: CpuType::Mos65c02,
            load_address: 0x0801,
            zp_scratch_b1: 0x7a,
            zp_scratch_reg: 0x7b,
            zp_scratch_w1: 0x7c,
            zp_scratch_w2: 0x7e,
            // The X16 kernal reserves $02-$21 for the virtual registers.
            virtual_registers: 0x02,
        }
    }

    /// Look a target up by its command line name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "c64" => Some(Self::c64()),
            "cx16" => Some(Self::cx16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_lookup() {
        assert_eq!(CompilationTarget::by_name("c64").unwrap().cpu, CpuType::Mos6502);
        assert_eq!(
            CompilationTarget::by_name("cx16").unwrap().cpu,
            CpuType::Mos65c02
        );
        assert!(CompilationTarget::by_name("apple2").is_none());
    }

    #[test]
    fn test_load_addresses() {
        assert_eq!(CompilationTarget::c64().load_address, 0x0801);
        assert_eq!(CompilationTarget::cx16().load_address, 0x0801);
    }
}
