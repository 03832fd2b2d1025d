//! Device decoders (component H) and the registry builder that wires them
//! all up with their priorities and default-enabled flags.
//!
//! Each decoder lives in its own file, grounded independently in §8's
//! worked scenarios; `build_registry` is the only thing downstream code
//! (the dispatch loop, `main.rs`) needs to call.

mod bresser_5in1;
mod cavius;
mod ecowitt_wh53;
mod gt_wt_02;
mod lacrosse_tx141thbv2;
mod megacode;
mod secplus_v1;

use crate::registry::DecoderRegistry;

/// Build the registry with every compiled-in decoder registered in a fixed
/// order. Registration order determines `protocol_num` assignment, so it
/// must never be reordered once shipped — new decoders are appended.
pub fn build_registry() -> DecoderRegistry {
    let mut reg = DecoderRegistry::new();
    reg.register(Box::new(ecowitt_wh53::EcowittWh53), 0, true);
    reg.register(Box::new(bresser_5in1::Bresser5in1), 0, true);
    reg.register(Box::new(gt_wt_02::GtWt02), 0, true);
    reg.register(Box::new(lacrosse_tx141thbv2::LaCrosseTx141THBv2), 0, true);
    reg.register(Box::new(megacode::Megacode), 10, true);
    reg.register(Box::new(cavius::Cavius), 0, true);
    reg.register(Box::new(secplus_v1::SecplusV1), 0, false);
    reg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_all_seven_decoders() {
        let reg = build_registry();
        assert_eq!(reg.len(), 7);
    }
}
