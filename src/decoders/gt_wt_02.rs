//! Globaltronics GT-WT-02 OOK PPM weather sensor (component H, scenario 3).
//!
//! A 37-bit frame with no separate sync word: `id(8) | flags(8, bit7 =
//! battery_low) | temperature raw(8, unsigned, 1/10 °C) | channel(2) +
//! humidity raw(6, steps of 5%) | 5-bit trailer (fixed 0b01100)`.

use crate::bitbuffer::BitBuffer;
use crate::data::Record;
use crate::demod::{DemodParams, Modulation};
use crate::registry::{DecodeOutcome, Decoder, DecoderContext};

const MIN_BITS: usize = 37;
const TRAILER: u8 = 0b0_1100;

pub struct GtWt02;

impl Decoder for GtWt02 {
    fn name(&self) -> &'static str {
        "GT-WT-02"
    }

    fn modulation(&self) -> Modulation {
        Modulation::OokPulsePpm
    }

    fn timing(&self) -> DemodParams {
        DemodParams {
            short_width: 500,
            long_width: 1500,
            sync_width: 0,
            reset_limit: 6000,
            gap_limit: 1200,
            tolerance: 150,
            invert_bits: false,
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        &["model", "id", "channel", "temperature_C", "humidity", "battery"]
    }

    fn decode(&self, bb: &BitBuffer, _ctx: &dyn DecoderContext, emit: &mut dyn FnMut(Record)) -> DecodeOutcome {
        if bb.num_rows() == 0 {
            return DecodeOutcome::AbortEarly;
        }
        if bb.bits_per_row(0) < MIN_BITS {
            return DecodeOutcome::AbortLength;
        }

        let mut bytes = [0u8; 4];
        if bb.extract_bytes(0, 0, &mut bytes, 32) == 0 {
            return DecodeOutcome::AbortLength;
        }

        let mut trailer_buf = [0u8; 1];
        if bb.extract_bytes(0, 32, &mut trailer_buf, 5) == 0 {
            return DecodeOutcome::AbortLength;
        }
        if trailer_buf[0] != TRAILER << 3 {
            return DecodeOutcome::FailSanity;
        }

        let id = bytes[0] as u32;
        let battery_low = bytes[1] & 0x80 != 0;
        let temperature_c = bytes[2] as f64 / 10.0;
        let channel = ((bytes[3] >> 6) & 0x03) as u32;
        let humidity = (bytes[3] & 0x3F) as u32 * 5;

        let mut r = Record::new();
        r.push("model", "GT-WT-02");
        r.push("id", id);
        r.push("channel", channel);
        r.push("temperature_C", temperature_c);
        r.push("humidity", humidity);
        r.push("battery", if battery_low { "LOW" } else { "OK" });
        emit(r);
        DecodeOutcome::Events(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoContext;

    const FIXTURE: &str = "{37}3400ED4760";

    #[test]
    fn decodes_worked_example() {
        let bb = BitBuffer::parse(FIXTURE).unwrap();
        let decoder = GtWt02;
        let ctx = NoContext;
        let mut records = Vec::new();
        let outcome = decoder.decode(&bb, &ctx, &mut |r| records.push(r));
        assert_eq!(outcome, DecodeOutcome::Events(1));
        let r = &records[0];
        assert_eq!(r.get("id").unwrap(), &crate::data::Value::Int(52));
        assert_eq!(r.get("channel").unwrap(), &crate::data::Value::Int(1));
        assert_eq!(r.get("temperature_C").unwrap(), &crate::data::Value::Double(23.7));
        assert_eq!(r.get("humidity").unwrap(), &crate::data::Value::Int(35));
        assert_eq!(r.get("battery").unwrap(), &crate::data::Value::Str("OK".into()));
    }

    #[test]
    fn rejects_short_row() {
        let bb = BitBuffer::parse("{8}ab").unwrap();
        let decoder = GtWt02;
        let ctx = NoContext;
        let outcome = decoder.decode(&bb, &ctx, &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::AbortLength);
    }
}
