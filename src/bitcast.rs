//! Bit-preserving reinterpretations of the machine word.
//!
//! A word may be viewed as unsigned, two's-complement signed, or an
//! IEEE-754 double. None of these functions change the bit pattern; the
//! numeric casts live in the `U2F`/`I2F`/`F2U`/`F2I` opcodes instead.

use crate::types::Word;

/// View a word as a double.
#[inline]
pub const fn f64_from_word(w: Word) -> f64 {
    f64::from_bits(w)
}

/// View a double as a word.
#[inline]
pub const fn word_from_f64(f: f64) -> Word {
    f.to_bits()
}

/// View a word as a signed integer.
#[inline]
pub const fn i64_from_word(w: Word) -> i64 {
    w as i64
}

/// View a signed integer as a word.
#[inline]
pub const fn word_from_i64(i: i64) -> Word {
    i as Word
}

#[cfg(test)]
mod tests {
    use super::*;

    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn word_float_word_is_identity(w: Word) -> bool {
        word_from_f64(f64_from_word(w)) == w
    }

    #[quickcheck]
    fn word_int_word_is_identity(w: Word) -> bool {
        word_from_i64(i64_from_word(w)) == w
    }

    #[quickcheck]
    fn finite_float_survives_word_form(f: f64) -> bool {
        !f.is_finite() || f64_from_word(word_from_f64(f)) == f
    }

    #[test]
    fn nan_payload_is_not_normalized() {
        let payload = 0x7ff8_dead_beef_cafe;
        assert_eq!(word_from_f64(f64_from_word(payload)), payload);
    }

    #[test]
    fn negative_one_is_all_ones() {
        assert_eq!(word_from_i64(-1), Word::MAX);
    }
}
