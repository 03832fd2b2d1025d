//! Illustrative rolling-code keypad transmitter, OOK PWM, split across two
//! half-frames (component H; worked example for the §9 Open Question on
//! global caches).
//!
//! Real two-half rolling-code remotes (the source's Security+ v1 decoders
//! are the canonical case) send a 16-bit identity and a short counter as
//! two separate button-press transmissions rather than one frame, and rely
//! on the receiver to pair them up within a short window. This decoder
//! works the same way but with a frame layout invented for this crate
//! (no received protocol is named "Secplus-V1" here): a 3-byte, byte-aligned
//! frame carries a sync nibble, a half-index bit, 3 bits of rolling counter,
//! a data byte (half of the 16-bit id), and an XOR checksum. The pairing
//! itself is delegated to [`RollingCache`], owned by the registry per the
//! design note in §9 ("replace [the static cache] with an explicit,
//! per-decoder context object owned by the registry").

use crate::bitbuffer::BitBuffer;
use crate::crc::xor_bytes;
use crate::data::Record;
use crate::demod::{DemodParams, Modulation};
use crate::registry::{DecodeOutcome, Decoder, DecoderContext};
use std::any::Any;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const MIN_BITS: usize = 24;
const SYNC_NIBBLE: u8 = 0b1010;
/// Maximum age of a first half before its second half is considered a
/// fresh, unpaired transmission instead (§9: "document the expiry (<=800ms)
/// as part of the decoder's contract").
const PAIRING_EXPIRY: Duration = Duration::from_millis(800);

#[derive(Clone, Copy)]
struct PendingHalf {
    id_hi: u8,
    counter_hi: u8,
    seen_at: Instant,
}

/// Per-decoder cross-call cache holding at most one pending first-half
/// transmission, owned by the registry and handed back to this decoder on
/// every call (never a decoder-local `static`).
pub struct RollingCache {
    pending: Mutex<Option<PendingHalf>>,
}

impl RollingCache {
    fn new() -> Self {
        Self { pending: Mutex::new(None) }
    }

    /// Feed one half-frame; returns the reassembled `(id, counter)` once
    /// both halves of a pair have arrived within [`PAIRING_EXPIRY`] of each
    /// other, `None` otherwise (including when this half is itself only the
    /// first of a new pair).
    fn pair(&self, is_second_half: bool, id_part: u8, counter_part: u8, now: Instant) -> Option<(u32, u32)> {
        let mut slot = self.pending.lock().expect("rolling cache mutex poisoned");
        if !is_second_half {
            *slot = Some(PendingHalf {
                id_hi: id_part,
                counter_hi: counter_part,
                seen_at: now,
            });
            return None;
        }
        match slot.take() {
            Some(first) if now.saturating_duration_since(first.seen_at) <= PAIRING_EXPIRY => {
                let id = ((first.id_hi as u32) << 8) | id_part as u32;
                let counter = ((first.counter_hi as u32) << 3) | counter_part as u32;
                Some((id, counter))
            }
            _ => None,
        }
    }
}

impl DecoderContext for RollingCache {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct SecplusV1;

impl Decoder for SecplusV1 {
    fn name(&self) -> &'static str {
        "Secplus-V1"
    }

    fn modulation(&self) -> Modulation {
        Modulation::OokPulsePwm
    }

    fn timing(&self) -> DemodParams {
        DemodParams {
            short_width: 200,
            long_width: 400,
            sync_width: 0,
            reset_limit: 3000,
            gap_limit: 800,
            tolerance: 60,
            invert_bits: false,
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        &["model", "id", "counter", "mic"]
    }

    fn make_context(&self) -> Box<dyn DecoderContext> {
        Box::new(RollingCache::new())
    }

    fn decode(&self, bb: &BitBuffer, ctx: &dyn DecoderContext, emit: &mut dyn FnMut(Record)) -> DecodeOutcome {
        if bb.num_rows() == 0 {
            return DecodeOutcome::AbortEarly;
        }
        if bb.bits_per_row(0) < MIN_BITS {
            return DecodeOutcome::AbortLength;
        }

        let mut b = [0u8; 3];
        if bb.extract_bytes(0, 0, &mut b, MIN_BITS) == 0 {
            return DecodeOutcome::AbortLength;
        }

        if (b[0] >> 4) != SYNC_NIBBLE {
            return DecodeOutcome::FailSanity;
        }
        if xor_bytes(&b[0..2]) != b[2] {
            return DecodeOutcome::FailMic;
        }

        let is_second_half = (b[0] >> 3) & 1 != 0;
        let counter_part = b[0] & 0x07;
        let id_part = b[1];

        let cache = ctx
            .as_any()
            .downcast_ref::<RollingCache>()
            .expect("Secplus-V1 must be registered with its own RollingCache context");

        match cache.pair(is_second_half, id_part, counter_part, Instant::now()) {
            Some((id, counter)) => {
                let mut r = Record::new();
                r.push("model", "Secplus-V1");
                r.push("id", id);
                r.push("counter", counter);
                r.push("mic", "CHECKSUM");
                emit(r);
                DecodeOutcome::Events(1)
            }
            None => DecodeOutcome::AbortLength,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoContext;

    fn frame(is_second_half: bool, counter_part: u8, id_part: u8) -> BitBuffer {
        let half_bit = if is_second_half { 1u8 } else { 0u8 };
        let byte0 = (SYNC_NIBBLE << 4) | (half_bit << 3) | (counter_part & 0x07);
        let byte2 = xor_bytes(&[byte0, id_part]);
        BitBuffer::parse(&format!("{{24}}{:02X}{:02X}{:02X}", byte0, id_part, byte2)).unwrap()
    }

    #[test]
    fn first_half_alone_is_incomplete() {
        let bb = frame(false, 0b010, 0xAB);
        let decoder = SecplusV1;
        let ctx = decoder.make_context();
        let outcome = decoder.decode(&bb, ctx.as_ref(), &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::AbortLength);
    }

    #[test]
    fn pairs_two_halves_into_one_record() {
        let decoder = SecplusV1;
        let ctx = decoder.make_context();

        let first = frame(false, 0b010, 0xAB);
        let outcome = decoder.decode(&first, ctx.as_ref(), &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::AbortLength);

        let second = frame(true, 0b011, 0xCD);
        let mut records = Vec::new();
        let outcome = decoder.decode(&second, ctx.as_ref(), &mut |r| records.push(r));
        assert_eq!(outcome, DecodeOutcome::Events(1));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("id").unwrap(), &crate::data::Value::Int(0xABCD));
        // counter = (0b010 << 3) | 0b011 = 0b010011 = 19
        assert_eq!(records[0].get("counter").unwrap(), &crate::data::Value::Int(19));
    }

    #[test]
    fn second_half_without_a_pending_first_is_incomplete() {
        let decoder = SecplusV1;
        let ctx = decoder.make_context();
        let bb = frame(true, 0b001, 0xCD);
        let outcome = decoder.decode(&bb, ctx.as_ref(), &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::AbortLength);
    }

    #[test]
    fn bad_sync_nibble_fails_sanity() {
        let decoder = SecplusV1;
        let ctx = decoder.make_context();
        let bb = BitBuffer::parse("{24}0011FF").unwrap();
        let outcome = decoder.decode(&bb, ctx.as_ref(), &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::FailSanity);
    }

    #[test]
    fn bad_checksum_fails_mic() {
        let decoder = SecplusV1;
        let ctx = decoder.make_context();
        let bb = BitBuffer::parse("{24}A2AB00").unwrap();
        let outcome = decoder.decode(&bb, ctx.as_ref(), &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::FailMic);
    }

    #[test]
    fn no_context_type_mismatch_in_default_path() {
        // Sanity: a decoder using NoContext (the common case) never touches
        // RollingCache's downcast path — exercised elsewhere, asserted here
        // only to document that `ctx` is decoder-specific, not global.
        let _ = NoContext;
    }
}
