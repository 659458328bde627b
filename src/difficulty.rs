//! Leading-zero-bit difficulty checks.

/// Check that the top `difficulty_bits` bits of a big-endian hex digest are zero.
///
/// Whole nibbles are compared as `'0'` characters; a trailing partial nibble
/// must be below `2^(4 - difficulty_bits % 4)`. A digest too short to carry the
/// requested bits never passes.
pub fn meets_difficulty(hash_hex: &str, difficulty_bits: u32) -> bool {
    let required_nibbles = (difficulty_bits / 4) as usize;
    let remaining_bits = difficulty_bits % 4;
    let digits = hash_hex.as_bytes();

    let needed = required_nibbles + usize::from(remaining_bits > 0);
    if digits.len() < needed {
        return false;
    }
    if !digits[..required_nibbles].iter().all(|d| *d == b'0') {
        return false;
    }
    if remaining_bits == 0 {
        return true;
    }

    match (digits[required_nibbles] as char).to_digit(16) {
        Some(nibble) => nibble < (1 << (4 - remaining_bits)),
        None => false,
    }
}

/// Count leading zero bits of a raw digest.
pub fn leading_zero_bits(hash: &[u8]) -> u32 {
    let mut count = 0u32;
    for byte in hash {
        if *byte == 0 {
            count += 8;
            continue;
        }
        count += (*byte).leading_zeros();
        break;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 256-bit digest with exactly `zeros` leading zero bits, rest set.
    fn digest_with_leading_zeros(zeros: u32) -> [u8; 32] {
        let mut out = [0xffu8; 32];
        for bit in 0..zeros.min(256) {
            let byte = (bit / 8) as usize;
            out[byte] &= !(0x80u8 >> (bit % 8));
        }
        if zeros < 256 {
            let byte = (zeros / 8) as usize;
            out[byte] |= 0x80u8 >> (zeros % 8);
        }
        out
    }

    #[test]
    fn zero_difficulty_always_passes() {
        assert!(meets_difficulty("ffff", 0));
        assert!(meets_difficulty("", 0));
    }

    #[test]
    fn partial_nibble_thresholds() {
        // 18 bits: four '0' digits, then a nibble < 4.
        assert!(meets_difficulty("00003fff", 18));
        assert!(!meets_difficulty("00004fff", 18));
        assert!(meets_difficulty("00001", 19));
        assert!(!meets_difficulty("00002", 19));
        assert!(meets_difficulty("00007", 17));
        assert!(!meets_difficulty("00008", 17));
    }

    #[test]
    fn whole_nibble_difficulty_ignores_next_digit() {
        assert!(meets_difficulty("00f", 8));
        assert!(!meets_difficulty("0f0", 8));
    }

    #[test]
    fn short_or_garbage_digest_fails() {
        assert!(!meets_difficulty("000", 16));
        assert!(!meets_difficulty("0000", 18));
        assert!(!meets_difficulty("0000g", 18));
    }

    #[test]
    fn agrees_with_bit_count_around_threshold() {
        for d in 0..=32u32 {
            for zeros in [d.saturating_sub(1), d, d + 1] {
                let digest = digest_with_leading_zeros(zeros);
                assert_eq!(leading_zero_bits(&digest), zeros);
                let hex = hex::encode(digest);
                assert_eq!(
                    meets_difficulty(&hex, d),
                    zeros >= d,
                    "difficulty {d}, zeros {zeros}, digest {hex}"
                );
            }
        }
    }

    #[test]
    fn partial_nibble_is_judged_by_value() {
        assert!(meets_difficulty("0003", 14));
        assert!(!meets_difficulty("0004", 14));
        assert!(!meets_difficulty("000C", 14));
        assert!(meets_difficulty("0007", 13));
        assert!(!meets_difficulty("0008", 13));
    }

    #[test]
    fn hex_letter_case_does_not_matter() {
        for bits in 12..=16 {
            assert_eq!(
                meets_difficulty("000A", bits),
                meets_difficulty("000a", bits),
                "bits {bits}"
            );
        }
        assert!(meets_difficulty("000A", 12));
        assert!(!meets_difficulty("000A", 13));
    }
}
