//! PLL register map.
//!
//! | addr | register | meaning            |
//! |------|----------|--------------------|
//! | 0x00 | N        | input divider      |
//! | 0x04 | M        | feedback multiplier|
//! | 0x08 | OD       | output divider     |
//! | 0x0C | CTRL     | 1 = start locking  |

use pllsim_common::Dividers;
use serde::Serialize;

/// One of the four 32-bit PLL registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PllRegister {
    /// Input divider.
    N,
    /// Feedback multiplier.
    M,
    /// Output divider.
    Od,
    /// Control; writing 1 enables the PLL.
    Ctrl,
}

impl PllRegister {
    /// All registers in address order.
    pub const ALL: [PllRegister; 4] = [Self::N, Self::M, Self::Od, Self::Ctrl];

    /// Bus address of the register.
    pub fn addr(self) -> u32 {
        self.index() * 4
    }

    /// Word index of the register (`addr / 4`).
    pub fn index(self) -> u32 {
        match self {
            Self::N => 0,
            Self::M => 1,
            Self::Od => 2,
            Self::Ctrl => 3,
        }
    }

    /// Decodes a bus address. Unaligned or out-of-range addresses are `None`.
    pub fn from_addr(addr: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|reg| reg.addr() == addr)
    }

    /// Register name as written in the datasheet.
    pub fn name(self) -> &'static str {
        match self {
            Self::N => "N",
            Self::M => "M",
            Self::Od => "OD",
            Self::Ctrl => "CTRL",
        }
    }
}

/// Register contents, written verbatim by the bus decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterFile {
    values: [u32; 4],
}

impl RegisterFile {
    /// Reads a register.
    pub fn read(&self, reg: PllRegister) -> u32 {
        self.values[reg.index() as usize]
    }

    /// Stores `value` in `reg`.
    pub fn write(&mut self, reg: PllRegister, value: u32) {
        self.values[reg.index() as usize] = value;
    }

    /// Zeroes every register.
    pub fn clear(&mut self) {
        self.values = [0; 4];
    }

    /// The `(N, M, OD)` triple currently programmed.
    pub fn dividers(&self) -> Dividers {
        Dividers::new(
            self.read(PllRegister::N),
            self.read(PllRegister::M),
            self.read(PllRegister::Od),
        )
    }

    /// A named copy for reports.
    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            n: self.read(PllRegister::N),
            m: self.read(PllRegister::M),
            od: self.read(PllRegister::Od),
            ctrl: self.read(PllRegister::Ctrl),
        }
    }
}

/// Register values at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegisterSnapshot {
    /// N register.
    pub n: u32,
    /// M register.
    pub m: u32,
    /// OD register.
    pub od: u32,
    /// CTRL register.
    pub ctrl: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_decode() {
        assert_eq!(PllRegister::from_addr(0x00), Some(PllRegister::N));
        assert_eq!(PllRegister::from_addr(0x04), Some(PllRegister::M));
        assert_eq!(PllRegister::from_addr(0x08), Some(PllRegister::Od));
        assert_eq!(PllRegister::from_addr(0x0C), Some(PllRegister::Ctrl));
        assert_eq!(PllRegister::from_addr(0x02), None);
        assert_eq!(PllRegister::from_addr(0x10), None);
    }

    #[test]
    fn file_stores_verbatim() {
        let mut regs = RegisterFile::default();
        regs.write(PllRegister::M, 0xDEAD_BEEF);
        regs.write(PllRegister::Ctrl, 7);
        assert_eq!(regs.read(PllRegister::M), 0xDEAD_BEEF);
        assert_eq!(regs.snapshot().ctrl, 7);
        regs.clear();
        assert_eq!(regs, RegisterFile::default());
    }

    #[test]
    fn dividers_from_file() {
        let mut regs = RegisterFile::default();
        regs.write(PllRegister::N, 1);
        regs.write(PllRegister::M, 32);
        regs.write(PllRegister::Od, 1);
        assert_eq!(regs.dividers(), Dividers::new(1, 32, 1));
    }
}
