//! LaCrosse TX141TH-Bv2 OOK PWM thermo-hygrometer (component H, scenario 4).
//!
//! 40-bit frame, `id/flags(8) | temperature raw(12, offset 500, 1/10 °C) |
//! humidity(8) | LFSR digest(8)`. The digest covers the first 4 bytes and
//! is verified against the 5th, per the teacher's reflected-bit LFSR
//! pattern in `crc.rs` (`lfsr_digest8_reflect`).

use crate::bitbuffer::BitBuffer;
use crate::crc::lfsr_digest8_reflect;
use crate::data::Record;
use crate::demod::{DemodParams, Modulation};
use crate::registry::{DecodeOutcome, Decoder, DecoderContext};

const MIN_BITS: usize = 40;
const DIGEST_GEN: u8 = 0x31;
const DIGEST_KEY: u8 = 0xF4;

pub struct LaCrosseTx141THBv2;

impl Decoder for LaCrosseTx141THBv2 {
    fn name(&self) -> &'static str {
        "LaCrosse-TX141THBv2"
    }

    fn modulation(&self) -> Modulation {
        Modulation::OokPulsePwm
    }

    fn timing(&self) -> DemodParams {
        DemodParams {
            short_width: 208,
            long_width: 417,
            sync_width: 833,
            reset_limit: 4600,
            gap_limit: 1200,
            tolerance: 90,
            invert_bits: false,
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        &["model", "id", "temperature_C", "humidity", "mic"]
    }

    fn decode(&self, bb: &BitBuffer, _ctx: &dyn DecoderContext, emit: &mut dyn FnMut(Record)) -> DecodeOutcome {
        if bb.num_rows() == 0 {
            return DecodeOutcome::AbortEarly;
        }
        if bb.bits_per_row(0) < MIN_BITS {
            return DecodeOutcome::AbortLength;
        }

        let mut b = [0u8; 5];
        if bb.extract_bytes(0, 0, &mut b, MIN_BITS) == 0 {
            return DecodeOutcome::AbortLength;
        }

        let digest = lfsr_digest8_reflect(&b[0..4], DIGEST_GEN, DIGEST_KEY);
        if digest != b[4] {
            return DecodeOutcome::FailMic;
        }

        let id = b[0] as u32;
        let temp_raw = (((b[1] & 0x0F) as i32) << 8) | b[2] as i32;
        let temperature_c = (temp_raw - 500) as f64 / 10.0;
        let humidity = b[3] as u32;

        let mut r = Record::new();
        r.push("model", "LaCrosse-TX141THBv2");
        r.push("id", id);
        r.push("temperature_C", temperature_c);
        r.push("humidity", humidity);
        r.push("mic", "CRC");
        emit(r);
        DecodeOutcome::Events(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoContext;

    const FIXTURE: &str = "{40}00A2F12F7F";

    #[test]
    fn decodes_worked_example() {
        let bb = BitBuffer::parse(FIXTURE).unwrap();
        let decoder = LaCrosseTx141THBv2;
        let ctx = NoContext;
        let mut records = Vec::new();
        let outcome = decoder.decode(&bb, &ctx, &mut |r| records.push(r));
        assert_eq!(outcome, DecodeOutcome::Events(1));
        let r = &records[0];
        assert_eq!(r.get("temperature_C").unwrap(), &crate::data::Value::Double(25.3));
        assert_eq!(r.get("humidity").unwrap(), &crate::data::Value::Int(47));
    }

    #[test]
    fn bad_digest_fails_mic() {
        let bb = BitBuffer::parse("{40}00A2F12F00").unwrap();
        let decoder = LaCrosseTx141THBv2;
        let ctx = NoContext;
        let outcome = decoder.decode(&bb, &ctx, &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::FailMic);
    }
}
