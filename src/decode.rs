//! ZPU opcode space: constants and category resolution.
//!
//! The opcode space is a single byte carved into four categories. The
//! categories are only disjoint because they are resolved in order: the
//! immediate-load bit first, then the ADDSP nibble, then the LOADSP/STORESP
//! 3-bit patterns, and finally an exact-match table covering 0x00..=0x0F and
//! 0x20..=0x3F.

use serde::{Deserialize, Serialize};

/// Opcode constants for the ZPU instruction set.
///
/// Programs are pre-compiled against these values; they must not change.
pub mod opcode {
    /// Immediate-load marker (bit 7).
    pub const IM: u8 = 0x80;
    /// ADDSP category base; low nibble is the word offset.
    pub const ADDSP: u8 = 0x10;
    /// LOADSP category base; low 5 bits select the stack slot.
    pub const LOADSP: u8 = 0x60;
    /// STORESP category base; low 5 bits select the stack slot.
    pub const STORESP: u8 = 0x40;

    pub const BREAKPOINT: u8 = 0;
    pub const PUSHSP: u8 = 2;
    pub const POPPC: u8 = 4;
    pub const ADD: u8 = 5;
    pub const AND: u8 = 6;
    pub const OR: u8 = 7;
    pub const LOAD: u8 = 8;
    pub const NOT: u8 = 9;
    pub const FLIP: u8 = 10;
    pub const NOP: u8 = 11;
    pub const STORE: u8 = 12;
    pub const POPSP: u8 = 13;
    pub const LOADH: u8 = 34;
    pub const STOREH: u8 = 35;
    pub const LESSTHAN: u8 = 36;
    pub const LESSTHANOREQUAL: u8 = 37;
    pub const ULESSTHAN: u8 = 38;
    pub const ULESSTHANOREQUAL: u8 = 39;
    pub const SWAP: u8 = 40;
    pub const MULT: u8 = 41;
    pub const LSHIFTRIGHT: u8 = 42;
    pub const ASHIFTLEFT: u8 = 43;
    pub const ASHIFTRIGHT: u8 = 44;
    pub const CALL: u8 = 45;
    pub const EQ: u8 = 46;
    pub const NEQ: u8 = 47;
    pub const NEG: u8 = 48;
    pub const SUB: u8 = 49;
    pub const XOR: u8 = 50;
    pub const LOADB: u8 = 51;
    pub const STOREB: u8 = 52;
    pub const DIV: u8 = 53;
    pub const MOD: u8 = 54;
    pub const EQBRANCH: u8 = 55;
    pub const NEQBRANCH: u8 = 56;
    pub const POPPCREL: u8 = 57;
    pub const CONFIG: u8 = 58;
    pub const PUSHPC: u8 = 59;
    pub const SYSCALL: u8 = 60;
    pub const PUSHSPADD: u8 = 61;
    pub const MULT16X16: u8 = 62;
    pub const CALLPCREL: u8 = 63;
}

/// An instruction byte resolved to its dispatch category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decoded {
    /// Immediate-load byte; `payload` is the low 7 bits.
    Im { payload: u8 },
    /// ADDSP; `offset` is the byte offset from SP (low nibble times 4).
    AddSp { offset: u32 },
    /// LOADSP; `index` is the stack-slot index ((bits & 0x1F) ^ 0x10).
    LoadSp { index: u32 },
    /// STORESP; `index` as for LOADSP.
    StoreSp { index: u32 },
    /// Exact-match opcode.
    Op(u8),
}

impl Decoded {
    /// Resolve an instruction byte to its category.
    ///
    /// The tests must stay in this order; each later pattern is only
    /// unambiguous because the earlier ones have already claimed their bits.
    /// The LOADSP/STORESP index XOR inverts the slot order so that small
    /// opcode values address slots near the top of the stack.
    pub fn classify(instruction: u8) -> Self {
        if instruction & opcode::IM != 0 {
            Decoded::Im {
                payload: instruction & 0x7F,
            }
        } else if instruction & 0xF0 == opcode::ADDSP {
            Decoded::AddSp {
                offset: u32::from(instruction & 0x0F) * 4,
            }
        } else if instruction & 0xE0 == opcode::LOADSP {
            Decoded::LoadSp {
                index: u32::from((instruction & 0x1F) ^ 0x10),
            }
        } else if instruction & 0xE0 == opcode::STORESP {
            Decoded::StoreSp {
                index: u32::from((instruction & 0x1F) ^ 0x10),
            }
        } else {
            Decoded::Op(instruction)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_wins_over_everything() {
        for byte in 0x80..=0xFFu8 {
            assert_eq!(
                Decoded::classify(byte),
                Decoded::Im {
                    payload: byte & 0x7F
                }
            );
        }
    }

    #[test]
    fn test_addsp_nibble_range() {
        assert_eq!(Decoded::classify(0x10), Decoded::AddSp { offset: 0 });
        assert_eq!(Decoded::classify(0x11), Decoded::AddSp { offset: 4 });
        assert_eq!(Decoded::classify(0x1F), Decoded::AddSp { offset: 60 });
        // 0x0F and 0x20 sit just outside the nibble range
        assert_eq!(Decoded::classify(0x0F), Decoded::Op(0x0F));
        assert_eq!(Decoded::classify(0x20), Decoded::Op(0x20));
    }

    #[test]
    fn test_loadsp_storesp_index_inversion() {
        assert_eq!(Decoded::classify(0x60), Decoded::LoadSp { index: 0x10 });
        assert_eq!(Decoded::classify(0x70), Decoded::LoadSp { index: 0x00 });
        assert_eq!(Decoded::classify(0x7F), Decoded::LoadSp { index: 0x0F });
        assert_eq!(Decoded::classify(0x40), Decoded::StoreSp { index: 0x10 });
        assert_eq!(Decoded::classify(0x51), Decoded::StoreSp { index: 0x01 });
    }

    #[test]
    fn test_exact_match_table() {
        assert_eq!(Decoded::classify(opcode::BREAKPOINT), Decoded::Op(0));
        assert_eq!(Decoded::classify(opcode::NOP), Decoded::Op(11));
        assert_eq!(Decoded::classify(opcode::CALLPCREL), Decoded::Op(63));
    }
}
