//! Ecowitt WH53 soil/ambient OOK PWM sensor (component H, scenario 1).
//!
//! Frame layout (55 live bits, already preamble-aligned):
//! `byte0[6 fixed '1' bits][2-bit channel] | byte1 id | byte2 0xFF marker |
//! 7 bits pad | temperature raw (signed, 1/10 °C) starting mid byte3 |
//! byte5 checksum | 7-bit trailer (unused)`.
//!
//! Grounded on the teacher's `protocols/keeloq_common.rs` bit-slicing style
//! (extract fixed-width fields by hand-computed bit offset) and
//! `protocols/common.rs::crc8` for the integrity check.

use crate::bitbuffer::BitBuffer;
use crate::crc::crc8;
use crate::data::Record;
use crate::demod::{DemodParams, Modulation};
use crate::registry::{DecodeOutcome, Decoder, DecoderContext};

const MIN_BITS: usize = 55;
const CRC_POLY: u8 = 0x31;
const CRC_INIT: u8 = 0x86;

pub struct EcowittWh53;

impl Decoder for EcowittWh53 {
    fn name(&self) -> &'static str {
        "Ecowitt-WH53"
    }

    fn modulation(&self) -> Modulation {
        Modulation::OokPulsePwm
    }

    fn timing(&self) -> DemodParams {
        DemodParams {
            short_width: 232,
            long_width: 420,
            sync_width: 0,
            reset_limit: 4200,
            gap_limit: 1200,
            tolerance: 80,
            invert_bits: false,
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        &["model", "id", "channel", "temperature_C", "mic"]
    }

    fn decode(&self, bb: &BitBuffer, _ctx: &dyn DecoderContext, emit: &mut dyn FnMut(Record)) -> DecodeOutcome {
        if bb.num_rows() == 0 {
            return DecodeOutcome::AbortEarly;
        }
        if bb.bits_per_row(0) < MIN_BITS {
            return DecodeOutcome::AbortLength;
        }

        let mut bytes = [0u8; 6];
        if bb.extract_bytes(0, 0, &mut bytes, 48) == 0 {
            return DecodeOutcome::AbortLength;
        }

        if bytes[0] & 0xFC != 0xFC {
            return DecodeOutcome::FailSanity;
        }
        if bytes[2] != 0xFF {
            return DecodeOutcome::FailSanity;
        }

        let checksum = crc8(&bytes[0..5], CRC_POLY, CRC_INIT);
        if checksum != bytes[5] {
            return DecodeOutcome::FailMic;
        }

        let channel = (bytes[0] & 0x03) as u32;
        let id = bytes[1] as u32;

        let mut temp_raw_buf = [0u8; 1];
        if bb.extract_bytes(0, 25, &mut temp_raw_buf, 8) == 0 {
            return DecodeOutcome::AbortLength;
        }
        let temperature_c = (temp_raw_buf[0] as i8) as f64 / 10.0;

        let mut r = Record::new();
        r.push("model", "Ecowitt-WH53");
        r.push("id", id);
        r.push("channel", channel);
        r.push("temperature_C", temperature_c);
        r.push("mic", "CRC");
        emit(r);
        DecodeOutcome::Events(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoContext;

    #[test]
    fn decodes_worked_example() {
        let bb = BitBuffer::parse("{55}FEA6FF525A2380").unwrap();
        let decoder = EcowittWh53;
        let ctx = NoContext;
        let mut records = Vec::new();
        let outcome = decoder.decode(&bb, &ctx, &mut |r| records.push(r));
        assert_eq!(outcome, DecodeOutcome::Events(1));
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.get("model").unwrap(), &crate::data::Value::Str("Ecowitt-WH53".into()));
        assert_eq!(r.get("id").unwrap(), &crate::data::Value::Int(166));
        assert_eq!(r.get("channel").unwrap(), &crate::data::Value::Int(2));
        assert_eq!(r.get("temperature_C").unwrap(), &crate::data::Value::Double(-9.2));
        assert_eq!(r.get("mic").unwrap(), &crate::data::Value::Str("CRC".into()));
    }

    #[test]
    fn rejects_short_row() {
        let bb = BitBuffer::parse("{8}ab").unwrap();
        let decoder = EcowittWh53;
        let ctx = NoContext;
        let outcome = decoder.decode(&bb, &ctx, &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::AbortLength);
    }

    #[test]
    fn fails_mic_on_corrupted_checksum() {
        let bb = BitBuffer::parse("{55}FEA6FF525A0080").unwrap();
        let decoder = EcowittWh53;
        let ctx = NoContext;
        let outcome = decoder.decode(&bb, &ctx, &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::FailMic);
    }
}
