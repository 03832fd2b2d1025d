//! Cavius wireless smoke/heat alarm, FSK Manchester (component H,
//! scenario 6).
//!
//! An 11-byte payload follows the ASCII `Cavi` sync word. The first 7
//! bytes (6 data bytes plus a trailing checksum) satisfy the CRC-8
//! residue property under `crc8le(_, 0x31, 0x00)`; the remaining 4 bytes
//! are reserved padding. `net_id` is a single byte, `sender_id` a 16-bit
//! big-endian field, and the alarm flag is the top bit of the flags byte.

use crate::bitbuffer::BitBuffer;
use crate::crc::crc8le;
use crate::data::Record;
use crate::demod::{DemodParams, Modulation};
use crate::registry::{DecodeOutcome, Decoder, DecoderContext};

const SYNC: [u8; 4] = *b"Cavi";
const PAYLOAD_BYTES: usize = 11;
const CRC_CHECK_BYTES: usize = 7;

pub struct Cavius;

impl Decoder for Cavius {
    fn name(&self) -> &'static str {
        "Cavius"
    }

    fn modulation(&self) -> Modulation {
        Modulation::FskPulseManchesterZerobit
    }

    fn timing(&self) -> DemodParams {
        DemodParams {
            short_width: 250,
            long_width: 250,
            sync_width: 0,
            reset_limit: 5000,
            gap_limit: 1000,
            tolerance: 60,
            invert_bits: false,
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        &["model", "net_id", "sender_id", "alarm"]
    }

    fn decode(&self, bb: &BitBuffer, _ctx: &dyn DecoderContext, emit: &mut dyn FnMut(Record)) -> DecodeOutcome {
        if bb.num_rows() == 0 {
            return DecodeOutcome::AbortEarly;
        }
        let start = bb.search(0, 0, &SYNC, SYNC.len() * 8);
        if start >= bb.bits_per_row(0) {
            return DecodeOutcome::AbortEarly;
        }
        let payload_start = start + SYNC.len() * 8;
        if bb.bits_per_row(0) < payload_start + PAYLOAD_BYTES * 8 {
            return DecodeOutcome::AbortLength;
        }

        let mut b = [0u8; PAYLOAD_BYTES];
        if bb.extract_bytes(0, payload_start, &mut b, PAYLOAD_BYTES * 8) == 0 {
            return DecodeOutcome::AbortLength;
        }

        if crc8le(&b[0..CRC_CHECK_BYTES], 0x31, 0x00) != 0 {
            return DecodeOutcome::FailMic;
        }

        let net_id = b[0] as u32;
        let sender_id = u16::from_be_bytes([b[1], b[2]]) as u32;
        let alarm = (b[3] & 0x80) != 0;

        let mut r = Record::new();
        r.push("model", "Cavius");
        r.push("net_id", net_id);
        r.push("sender_id", sender_id);
        r.push("alarm", alarm as u32);
        emit(r);
        DecodeOutcome::Events(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoContext;

    const FIXTURE: &str = "{120}436176690710928000007D00000000";

    #[test]
    fn decodes_worked_example() {
        let bb = BitBuffer::parse(FIXTURE).unwrap();
        let decoder = Cavius;
        let ctx = NoContext;
        let mut records = Vec::new();
        let outcome = decoder.decode(&bb, &ctx, &mut |r| records.push(r));
        assert_eq!(outcome, DecodeOutcome::Events(1));
        let r = &records[0];
        assert_eq!(r.get("net_id").unwrap(), &crate::data::Value::Int(7));
        assert_eq!(r.get("sender_id").unwrap(), &crate::data::Value::Int(4242));
        assert_eq!(r.get("alarm").unwrap(), &crate::data::Value::Int(1));
    }

    #[test]
    fn missing_sync_aborts_early() {
        let bb = BitBuffer::parse("{32}00000000").unwrap();
        let decoder = Cavius;
        let ctx = NoContext;
        let outcome = decoder.decode(&bb, &ctx, &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::AbortEarly);
    }

    #[test]
    fn bad_crc_fails_mic() {
        let bb = BitBuffer::parse("{120}436176690710928000007C00000000").unwrap();
        let decoder = Cavius;
        let ctx = NoContext;
        let outcome = decoder.decode(&bb, &ctx, &mut |_| {});
        assert_eq!(outcome, DecodeOutcome::FailMic);
    }
}
