//! Linear/Megacode OOK PCM access-control transmitter (component H,
//! scenario 5).
//!
//! 148-bit frame: a 4-bit fixed header followed by 24 six-bit windows, each
//! carrying exactly one set bit whose position within the window (first
//! half vs second half) encodes one data bit — a pulse-position code with
//! built-in redundancy against jitter. The 24 recovered bits reassemble
//! into `facility(8) | id(12) | button(4)`.

use crate::bitbuffer::BitBuffer;
use crate::data::Record;
use crate::demod::{DemodParams, Modulation};
use crate::registry::{DecodeOutcome, Decoder, DecoderContext};

const HEADER_BITS: usize = 4;
const WINDOW_BITS: usize = 6;
const NUM_WINDOWS: usize = 24;
const MIN_BITS: usize = HEADER_BITS + WINDOW_BITS * NUM_WINDOWS;
const HEADER_VALUE: u8 = 0b1010;

pub struct Megacode;

impl Decoder for Megacode {
    fn name(&self) -> &'static str {
        "Megacode"
    }

    fn modulation(&self) -> Modulation {
        Modulation::OokPulsePcm
    }

    fn timing(&self) -> DemodParams {
        DemodParams {
            short_width: 400,
            long_width: 400,
            sync_width: 0,
            reset_limit: 10_000,
            gap_limit: 2000,
            tolerance: 100,
            invert_bits: false,
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        &["model", "facility", "id", "button"]
    }

    fn decode(&self, bb: &BitBuffer, _ctx: &dyn DecoderContext, emit: &mut dyn FnMut(Record)) -> DecodeOutcome {
        if bb.num_rows() == 0 {
            return DecodeOutcome::AbortEarly;
        }
        if bb.bits_per_row(0) < MIN_BITS {
            return DecodeOutcome::AbortLength;
        }

        let mut header = 0u8;
        for i in 0..HEADER_BITS {
            header = (header << 1) | bb.bit(0, i) as u8;
        }
        if header != HEADER_VALUE {
            return DecodeOutcome::FailSanity;
        }

        let mut code: u32 = 0;
        for w in 0..NUM_WINDOWS {
            let window_start = HEADER_BITS + w * WINDOW_BITS;
            let mut ones = 0usize;
            let mut pos = None;
            for i in 0..WINDOW_BITS {
                if bb.bit(0, window_start + i) {
                    ones += 1;
                    pos = Some(i);
                }
            }
            if ones != 1 {
                return DecodeOutcome::FailSanity;
            }
            let bit = if pos.unwrap() < WINDOW_BITS / 2 { 0 } else { 1 };
            code = (code << 1) | bit;
        }

        let facility = (code >> 16) & 0xFF;
        let id = (code >> 4) & 0xFFF;
        let button = code & 0xF;

        let mut r = Record::new();
        r.push("model", "Megacode");
        r.push("facility", facility);
        r.push("id", id);
        r.push("button", button);
        emit(r);
        DecodeOutcome::Events(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoContext;

    const FIXTURE: &str = "{148}A820820104820120804820120120804820104";

    #[test]
    fn decodes_worked_example() {
        let bb = BitBuffer::parse(FIXTURE).unwrap();
        let decoder = Megacode;
        let ctx = NoContext;
        let mut records = Vec::new();
        let outcome = decoder.decode(&bb, &ctx, &mut |r| records.push(r));
        assert_eq!(outcome, DecodeOutcome::Events(1));
        let r = &records[0];
        assert_eq!(r.get("facility").unwrap(), &crate::data::Value::Int(12));
        assert_eq!(r.get("id").unwrap(), &crate::data::Value::Int(2345));
        assert_eq!(r.get("button").unwrap(), &crate::data::Value::Int(3));
    }

    #[test]
    fn rejects_short_row() {
        let bb = BitBuffer::parse("{8}ab").unwrap();
        let decoder = Megacode;
        let ctx = NoContext;
        let outcome = decoder.decode(&bb, &ctx, &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::AbortLength);
    }

    #[test]
    fn non_one_hot_window_fails_sanity() {
        // Flips on a second bit inside the first 6-bit window (only bit 4
        // is set in the worked example), violating the one-hot rule while
        // leaving the 4-bit header intact.
        let bb = BitBuffer::parse("{148}AC20820104820120804820120120804820104").unwrap();
        let decoder = Megacode;
        let ctx = NoContext;
        let outcome = decoder.decode(&bb, &ctx, &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::FailSanity);
    }
}
