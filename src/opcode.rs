//! Instruction set of the machine.

use crate::types::Word;

/// Instruction representation for the interpreter.
///
/// An instruction occupies one to three words: the opcode word itself plus
/// up to two in-line operand words. Operands are register indices unless a
/// mnemonic says otherwise (`UIMM`/`FIMM` carry a raw 64-bit immediate,
/// `BT`/`BF` a signed word offset). `$pc` advances by the instruction
/// width on fall-through; control-flow opcodes overwrite `$pc` directly.
///
/// All integer arithmetic wraps on overflow. The wide multiplications and
/// the divisions report their second result through `$overflow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum Opcode {
    /// `U[a] = mem[U[b]]`
    ULD = 0x00,
    /// `F[a] = bitcast mem[U[b]]`
    FLD = 0x01,
    /// `mem[U[a]] = U[b]`
    UST = 0x02,
    /// `mem[U[a]] = bitcast F[b]`
    FST = 0x03,
    /// `U[a] = imm`
    UIMM = 0x04,
    /// `F[a] = bitcast imm`
    FIMM = 0x05,
    /// `U[a] = U[b]`
    UMOV = 0x06,
    /// `F[a] = F[b]`
    FMOV = 0x07,
    /// `F[a] = U[b] as unsigned`, numeric conversion
    U2F = 0x08,
    /// `F[a] = U[b] as signed`, numeric conversion
    I2F = 0x09,
    /// `U[a] = F[b]` truncated toward zero
    F2U = 0x0a,
    /// `U[a] = bitcast (F[b] as signed)` truncated toward zero
    F2I = 0x0b,
    /// `$pc += op1` when `$cond` holds, else fall through
    BT = 0x0c,
    /// `$pc += op1` when `$cond` is clear, else fall through
    BF = 0x0d,
    /// `$cond = U[a] == U[b]`
    UEQ = 0x0e,
    /// `$cond = F[a] == F[b]`
    FEQ = 0x0f,
    /// `$cond = U[a] > U[b]`
    UGT = 0x10,
    /// `$cond = U[a] > U[b]`, signed
    IGT = 0x11,
    /// `$cond = F[a] > F[b]`
    FGT = 0x12,
    /// `$cond = U[a] < U[b]`
    ULT = 0x13,
    /// `$cond = U[a] < U[b]`, signed
    ILT = 0x14,
    /// `$cond = F[a] < F[b]`
    FLT = 0x15,
    /// `U[a] += U[b]`
    UADD = 0x16,
    /// `F[a] += F[b]`
    FADD = 0x17,
    /// `U[a] -= U[b]`
    USUB = 0x18,
    /// `F[a] -= F[b]`
    FSUB = 0x19,
    /// 128-bit product: `U[a]` takes the low word, `$overflow` the high
    UMUL = 0x1a,
    /// 128-bit signed product, both halves bit-cast
    IMUL = 0x1b,
    /// `F[a] *= F[b]`
    FMUL = 0x1c,
    /// `U[a] /= U[b]`; `$overflow` takes the pre-division remainder
    UDIV = 0x1d,
    /// Signed quotient and remainder, bit-cast into `U[a]` and `$overflow`
    IDIV = 0x1e,
    /// `F[a] /= F[b]`
    FDIV = 0x1f,
    /// Invoke the host function whose pointer word is `U[b]`; the returned
    /// word lands in `U[a]`. `$pc` already points past the instruction
    /// when the host function runs.
    CALL = 0x20,
    /// Stop the machine and return `U[a]` to the caller of `execute`.
    STOP = 0x21,
}

impl Opcode {
    /// Instruction width in words, operands included.
    ///
    /// `STOP` never falls through; its width only matters to decoders.
    pub const fn width(self) -> Word {
        match self {
            Self::BT | Self::BF | Self::STOP => 2,
            _ => 3,
        }
    }

    /// Decode a fetched word into an opcode.
    pub const fn from_word(word: Word) -> Option<Self> {
        use Opcode::*;

        Some(match word {
            0x00 => ULD,
            0x01 => FLD,
            0x02 => UST,
            0x03 => FST,
            0x04 => UIMM,
            0x05 => FIMM,
            0x06 => UMOV,
            0x07 => FMOV,
            0x08 => U2F,
            0x09 => I2F,
            0x0a => F2U,
            0x0b => F2I,
            0x0c => BT,
            0x0d => BF,
            0x0e => UEQ,
            0x0f => FEQ,
            0x10 => UGT,
            0x11 => IGT,
            0x12 => FGT,
            0x13 => ULT,
            0x14 => ILT,
            0x15 => FLT,
            0x16 => UADD,
            0x17 => FADD,
            0x18 => USUB,
            0x19 => FSUB,
            0x1a => UMUL,
            0x1b => IMUL,
            0x1c => FMUL,
            0x1d => UDIV,
            0x1e => IDIV,
            0x1f => FDIV,
            0x20 => CALL,
            0x21 => STOP,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_roundtrip() {
        for word in 0x00..=0x21 {
            let op = Opcode::from_word(word).expect("opcode in range");
            assert_eq!(op as Word, word);
        }
    }

    #[test]
    fn out_of_range_words_are_rejected() {
        assert_eq!(Opcode::from_word(0x22), None);
        assert_eq!(Opcode::from_word(Word::MAX), None);
    }

    #[test]
    fn widths() {
        assert_eq!(Opcode::UADD.width(), 3);
        assert_eq!(Opcode::BT.width(), 2);
        assert_eq!(Opcode::BF.width(), 2);
        assert_eq!(Opcode::STOP.width(), 2);
        assert_eq!(Opcode::CALL.width(), 3);
    }
}
