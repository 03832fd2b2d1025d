//! Bresser 5-in-1 FSK PCM weather station (component H, scenario 2).
//!
//! 26-byte payload following a 5-byte `AA AA AA 2D D4` sync word. The first
//! 13 bytes are the bitwise complement of the last 13 — Bresser's own
//! noise-immunity scheme doubling as the integrity check in place of a CRC
//! (no MIC byte exists in this protocol family).

use crate::bitbuffer::BitBuffer;
use crate::data::Record;
use crate::demod::{DemodParams, Modulation};
use crate::registry::{DecodeOutcome, Decoder, DecoderContext};

const PREAMBLE: [u8; 5] = [0xAA, 0xAA, 0xAA, 0x2D, 0xD4];
const PAYLOAD_BYTES: usize = 26;

pub struct Bresser5in1;

impl Decoder for Bresser5in1 {
    fn name(&self) -> &'static str {
        "Bresser-5in1"
    }

    fn modulation(&self) -> Modulation {
        Modulation::FskPulsePcm
    }

    fn timing(&self) -> DemodParams {
        DemodParams {
            short_width: 124,
            long_width: 124,
            sync_width: 0,
            reset_limit: 20_000,
            gap_limit: 2000,
            tolerance: 40,
            invert_bits: false,
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        &["model", "id", "temperature_C", "humidity", "wind_dir_deg", "battery"]
    }

    fn decode(&self, bb: &BitBuffer, _ctx: &dyn DecoderContext, emit: &mut dyn FnMut(Record)) -> DecodeOutcome {
        if bb.num_rows() == 0 {
            return DecodeOutcome::AbortEarly;
        }
        let start = bb.search(0, 0, &PREAMBLE, PREAMBLE.len() * 8);
        if start >= bb.bits_per_row(0) {
            return DecodeOutcome::AbortEarly;
        }
        let payload_start = start + PREAMBLE.len() * 8;
        if bb.bits_per_row(0) < payload_start + PAYLOAD_BYTES * 8 {
            return DecodeOutcome::AbortLength;
        }

        let mut msg = [0u8; PAYLOAD_BYTES];
        if bb.extract_bytes(0, payload_start, &mut msg, PAYLOAD_BYTES * 8) == 0 {
            return DecodeOutcome::AbortLength;
        }

        for i in 0..13 {
            if msg[i] != !msg[13 + i] {
                return DecodeOutcome::FailMic;
            }
        }

        let id = msg[14] as u32;
        let temperature_c = (msg[17] & 0x0F) as f64 + ((msg[17] >> 4) & 0x0F) as f64 * 0.1;
        let humidity_raw = u16::from_be_bytes([msg[20], msg[21]]);
        let humidity = humidity_raw as u32 * 5;
        let wind_dir_deg = msg[22] as f64 * 360.0 / 128.0;
        let battery = if msg[13] & 0x80 != 0 { "LOW" } else { "OK" };

        let mut r = Record::new();
        r.push("model", "Bresser-5in1");
        r.push("id", id);
        r.push("temperature_C", temperature_c);
        r.push("humidity", humidity);
        r.push("wind_dir_deg", wind_dir_deg);
        r.push("battery", battery);
        emit(r);
        DecodeOutcome::Events(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoContext;

    const FIXTURE: &str = "{248}AAAAAA2DD4FF93FFFF7FFFFFFFF7BFFFFFFF006C0000800000000840000000";

    #[test]
    fn decodes_worked_example() {
        let bb = BitBuffer::parse(FIXTURE).unwrap();
        let decoder = Bresser5in1;
        let ctx = NoContext;
        let mut records = Vec::new();
        let outcome = decoder.decode(&bb, &ctx, &mut |r| records.push(r));
        assert_eq!(outcome, DecodeOutcome::Events(1));
        let r = &records[0];
        assert_eq!(r.get("id").unwrap(), &crate::data::Value::Int(108));
        assert_eq!(r.get("temperature_C").unwrap(), &crate::data::Value::Double(0.8));
        assert_eq!(r.get("humidity").unwrap(), &crate::data::Value::Int(40));
        assert_eq!(r.get("wind_dir_deg").unwrap(), &crate::data::Value::Double(180.0));
        assert_eq!(r.get("battery").unwrap(), &crate::data::Value::Str("OK".into()));
    }

    #[test]
    fn missing_preamble_aborts_early() {
        let bb = BitBuffer::parse("{32}00000000").unwrap();
        let decoder = Bresser5in1;
        let ctx = NoContext;
        let outcome = decoder.decode(&bb, &ctx, &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::AbortEarly);
    }

    #[test]
    fn broken_inversion_fails_mic() {
        let corrupted = FIXTURE.replace("AAAAAA2DD4FF93", "AAAAAA2DD4FF00");
        let bb = BitBuffer::parse(&corrupted).unwrap();
        let decoder = Bresser5in1;
        let ctx = NoContext;
        let outcome = decoder.decode(&bb, &ctx, &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::FailMic);
    }
}
