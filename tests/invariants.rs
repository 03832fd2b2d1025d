//! Property-based tests for the bit-buffer's universal invariants and the
//! "a decoder never panics" contract, using `proptest` the way
//! `ArrEssJay-chimera`'s test suite does for its own wire-format types.
//! Unlike the scenario-specific unit tests beside each decoder, these don't
//! assert a particular decoded value — they assert properties that must
//! hold for *any* input.

use proptest::prelude::*;
use pulse_sentinel::bitbuffer::{BitBuffer, MAX_BITS_PER_ROW};
use pulse_sentinel::data::Value;
use pulse_sentinel::decoders::build_registry;

/// Build a single-row bit buffer from an arbitrary bit vector via the
/// public `add_bit` API only (never touches private fields).
fn buffer_from_bits(bits: &[bool]) -> BitBuffer {
    let mut bb = BitBuffer::new();
    for &b in bits {
        bb.add_bit(b);
    }
    bb
}

proptest! {
    /// Inverting twice must return to the original encoding, for any
    /// bit pattern up to a couple of bytes.
    #[test]
    fn invert_is_its_own_inverse(bits in prop::collection::vec(any::<bool>(), 0..64)) {
        let mut bb = buffer_from_bits(&bits);
        let before = bb.to_code();
        bb.invert();
        bb.invert();
        prop_assert_eq!(bb.to_code(), before);
    }

    /// `extract_bytes` never reports live data past a row's declared
    /// length, and a read that runs past the end always fails cleanly
    /// (returns 0) rather than panicking or returning garbage.
    #[test]
    fn extract_bytes_never_overruns(bits in prop::collection::vec(any::<bool>(), 0..64), extra in 0usize..16) {
        let bb = buffer_from_bits(&bits);
        let len = bb.bits_per_row(0);
        let mut out = vec![0u8; (len + extra).div_ceil(8).max(1)];
        let n = bb.extract_bytes(0, 0, &mut out, len + extra);
        if extra == 0 {
            prop_assert_eq!(n, len.div_ceil(8));
        } else {
            prop_assert_eq!(n, 0);
        }
    }

    /// A pattern placed at a known offset is always found at that offset,
    /// and the bytes extracted from the match position equal the pattern.
    #[test]
    fn search_finds_a_planted_pattern(prefix in prop::collection::vec(any::<bool>(), 0..32), pattern_byte in any::<u8>()) {
        let mut bb = buffer_from_bits(&prefix);
        for shift in (0..8).rev() {
            bb.add_bit((pattern_byte >> shift) & 1 != 0);
        }
        // Search starting exactly at the planted offset, so an incidental
        // earlier occurrence of the same byte in `prefix` can't shadow it.
        let idx = bb.search(0, prefix.len(), &[pattern_byte], 8);
        prop_assert_eq!(idx, prefix.len());
        let mut out = [0u8; 1];
        bb.extract_bytes(0, idx, &mut out, 8);
        prop_assert_eq!(out[0], pattern_byte);
    }

    /// A row repeated `n` times is always found by `find_repeated_row`
    /// with a matching or lower repeat threshold.
    #[test]
    fn find_repeated_row_detects_planted_repeats(bits in prop::collection::vec(any::<bool>(), 8..32), copies in 2usize..5) {
        let mut code = String::new();
        let one = buffer_from_bits(&bits).to_code();
        for i in 0..copies {
            if i > 0 {
                code.push('/');
            }
            code.push_str(&one);
        }
        let bb = BitBuffer::parse(&code).unwrap();
        let found = bb.find_repeated_row(copies, bits.len());
        prop_assert_eq!(found, Some(0));
    }

    /// `parse` followed by `to_code` reproduces the exact same textual
    /// fixture for any bit count up to a couple of rows.
    #[test]
    fn parse_to_code_round_trips(bits in prop::collection::vec(any::<bool>(), 1..40)) {
        let bb = buffer_from_bits(&bits);
        let code = bb.to_code();
        let reparsed = BitBuffer::parse(&code).unwrap();
        prop_assert_eq!(reparsed.to_code(), code);
    }

    /// `clear` always yields an empty buffer regardless of prior state,
    /// and clearing twice in a row is the same as clearing once.
    #[test]
    fn clear_always_empties_regardless_of_history(bits in prop::collection::vec(any::<bool>(), 0..80)) {
        let mut bb = buffer_from_bits(&bits);
        bb.clear();
        prop_assert_eq!(bb.num_rows(), 0);
        bb.clear();
        prop_assert_eq!(bb.num_rows(), 0);
    }

    /// No registered decoder ever panics on arbitrary bits, and every
    /// field it emits (when it emits anything) passes the crate-wide
    /// field-name convention.
    #[test]
    fn no_decoder_panics_on_arbitrary_bits(bits in prop::collection::vec(any::<bool>(), 0..200)) {
        let registry = build_registry();
        let bb = buffer_from_bits(&bits);
        for descriptor in registry.iter() {
            let mut records = Vec::new();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                descriptor.decoder.decode(&bb, descriptor.context.as_ref(), &mut |r| records.push(r))
            }));
            prop_assert!(outcome.is_ok(), "decoder {} panicked", descriptor.name());
            for record in &records {
                for (name, _label, _format, value) in record.iter() {
                    prop_assert!(is_valid_field_name(name), "{} emitted bad field name {name:?}", descriptor.name());
                    match value {
                        Value::Str(_) | Value::Int(_) | Value::Double(_) | Value::Bytes(_) | Value::Record(_) | Value::Array(_) => {}
                    }
                }
            }
        }
    }
}

/// Mirrors `data::is_valid_field_name`'s convention (lowercase snake_case,
/// allowing a trailing unit-suffix uppercase letter) without depending on
/// that private helper directly.
fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[test]
fn max_bits_per_row_matches_the_published_constant() {
    assert_eq!(MAX_BITS_PER_ROW, 2560);
}
