//! Decoder descriptors and the registry that owns them (component D).
//!
//! Adapted from the teacher's `protocols::{ProtocolDecoder, ProtocolRegistry}`
//! (dynamic dispatch over a `Vec<Box<dyn Trait>>`, an immutable list built
//! once at startup) — generalized from KAT's car-keyfob
//! feed-pulse-at-a-time state machines to the spec's
//! demodulate-then-dispatch model: a decoder here receives a fully formed
//! [`BitBuffer`] rather than one pulse at a time, because in this design
//! the bit buffer (not the decoder) owns the demodulation state machine.

use crate::bitbuffer::BitBuffer;
use crate::data::Record;
use crate::demod::{DemodParams, Modulation};
use std::sync::atomic::{AtomicU32, Ordering};

/// The four named negative outcomes plus "N events emitted", exactly the
/// sum type the design notes call for in place of exceptions (§9):
/// "propagate the four decoder-error codes as a sum type with a single
/// `Events(n)` success carrying the event count."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Preamble/sync not found — this packet clearly isn't for this decoder.
    AbortEarly,
    /// Preamble matched but too few/many bits or rows to be a valid frame.
    AbortLength,
    /// Structure matched but the checksum/CRC (Message Integrity Check) failed.
    FailMic,
    /// Integrity passed but a fixed field or value range is inconsistent.
    FailSanity,
    /// Catch-all non-specific failure (`DECODE_FAIL_OTHER` in the wire contract).
    FailOther,
    /// `n` events were successfully decoded and emitted (`n >= 1`).
    Events(u32),
}

impl DecodeOutcome {
    /// The wire-contract integer (External Interfaces, §6): positive event
    /// counts, or one of the four named negative codes.
    pub fn as_code(self) -> i32 {
        match self {
            DecodeOutcome::FailOther => 0,
            DecodeOutcome::AbortLength => -1,
            DecodeOutcome::AbortEarly => -2,
            DecodeOutcome::FailMic => -3,
            DecodeOutcome::FailSanity => -4,
            DecodeOutcome::Events(n) => n as i32,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, DecodeOutcome::Events(n) if n > 0)
    }
}

/// Per-decoder running counters, updated only by the dispatch thread
/// (single-writer, per §5's resource model).
#[derive(Debug, Default)]
pub struct DecoderStats {
    pub decode_events: AtomicU32,
    pub decode_ok: AtomicU32,
    pub decode_messages: AtomicU32,
    pub abort_early: AtomicU32,
    pub abort_length: AtomicU32,
    pub fail_mic: AtomicU32,
    pub fail_sanity: AtomicU32,
    pub fail_other: AtomicU32,
}

impl DecoderStats {
    pub fn record(&self, outcome: DecodeOutcome) {
        match outcome {
            DecodeOutcome::Events(n) => {
                self.decode_events.fetch_add(n, Ordering::Relaxed);
                self.decode_ok.fetch_add(1, Ordering::Relaxed);
                self.decode_messages.fetch_add(n, Ordering::Relaxed);
            }
            DecodeOutcome::AbortEarly => {
                self.abort_early.fetch_add(1, Ordering::Relaxed);
            }
            DecodeOutcome::AbortLength => {
                self.abort_length.fetch_add(1, Ordering::Relaxed);
            }
            DecodeOutcome::FailMic => {
                self.fail_mic.fetch_add(1, Ordering::Relaxed);
            }
            DecodeOutcome::FailSanity => {
                self.fail_sanity.fetch_add(1, Ordering::Relaxed);
            }
            DecodeOutcome::FailOther => {
                self.fail_other.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> DecoderStatsSnapshot {
        DecoderStatsSnapshot {
            decode_events: self.decode_events.load(Ordering::Relaxed),
            decode_ok: self.decode_ok.load(Ordering::Relaxed),
            decode_messages: self.decode_messages.load(Ordering::Relaxed),
            abort_early: self.abort_early.load(Ordering::Relaxed),
            abort_length: self.abort_length.load(Ordering::Relaxed),
            fail_mic: self.fail_mic.load(Ordering::Relaxed),
            fail_sanity: self.fail_sanity.load(Ordering::Relaxed),
            fail_other: self.fail_other.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct DecoderStatsSnapshot {
    pub decode_events: u32,
    pub decode_ok: u32,
    pub decode_messages: u32,
    pub abort_early: u32,
    pub abort_length: u32,
    pub fail_mic: u32,
    pub fail_sanity: u32,
    pub fail_other: u32,
}

/// Per-decoder, per-call context a decoder may use for small, bounded,
/// protocol-legitimate caches (e.g. rolling-code two-half reassembly),
/// owned by the registry rather than a decoder-local `static` (§9 Open
/// Questions / DESIGN.md).
pub trait DecoderContext: Send + Sync {
    fn as_any(&self) -> &dyn std::any::Any;
}

/// A device decoder (component H's contract). Stateless between
/// invocations except through the optional [`DecoderContext`] the registry
/// hands back on every call.
pub trait Decoder: Send + Sync {
    fn name(&self) -> &'static str;
    fn modulation(&self) -> Modulation;
    fn timing(&self) -> DemodParams;
    /// Output field names, for schema-oriented sinks (e.g. CSV headers).
    fn fields(&self) -> &'static [&'static str];
    /// Decode a freshly demodulated bit buffer, emitting zero or more
    /// records via `emit`. Must never retain `bb` past this call, never
    /// perform I/O, and must bounds-check every bit read (an over-read is a
    /// bug, not a quirk to imitate — return `AbortLength` instead).
    fn decode(&self, bb: &BitBuffer, ctx: &dyn DecoderContext, emit: &mut dyn FnMut(Record)) -> DecodeOutcome;

    /// Build this decoder's private [`DecoderContext`], once, at
    /// registration time. Decoders that need no cross-call state (the
    /// overwhelming majority) can leave the default [`NoContext`] in place;
    /// decoders that need a small bounded cache (e.g. rolling-code two-half
    /// reassembly) override this and downcast it back via
    /// [`DecoderContext::as_any`] in [`Decoder::decode`] — see
    /// `decoders::secplus_v1` for the worked example.
    fn make_context(&self) -> Box<dyn DecoderContext> {
        Box::new(NoContext)
    }
}

/// An immutable, registry-owned descriptor: identity, modulation/timing,
/// scheduling hints, and the decoder implementation plus its live stats.
pub struct DecoderDescriptor {
    pub protocol_num: u32,
    pub priority: u8,
    pub default_enabled: bool,
    pub decoder: Box<dyn Decoder>,
    pub stats: DecoderStats,
    /// This decoder's own [`DecoderContext`], built once via
    /// [`Decoder::make_context`] at registration time and handed back to it
    /// on every [`Decoder::decode`] call — never shared across decoders.
    pub context: Box<dyn DecoderContext>,
    enabled: std::sync::atomic::AtomicBool,
}

impl DecoderDescriptor {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn name(&self) -> &'static str {
        self.decoder.name()
    }
}

/// A no-op context for decoders that don't need cross-call state.
pub struct NoContext;
impl DecoderContext for NoContext {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Append-only, immutable-after-startup registry of every compiled decoder.
/// Lookup is linear — a few hundred entries at most, scanned once per
/// packet, which is cheap next to the demodulation work each scan triggers.
pub struct DecoderRegistry {
    descriptors: Vec<DecoderDescriptor>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self { descriptors: Vec::new() }
    }

    /// Register a decoder, assigning it the next stable `protocol_num`.
    /// Registration is append-only — there is no way to unregister, only
    /// to disable.
    pub fn register(&mut self, decoder: Box<dyn Decoder>, priority: u8, default_enabled: bool) {
        let protocol_num = self.descriptors.len() as u32 + 1;
        let context = decoder.make_context();
        self.descriptors.push(DecoderDescriptor {
            protocol_num,
            priority,
            default_enabled,
            decoder,
            stats: DecoderStats::default(),
            context,
            enabled: std::sync::atomic::AtomicBool::new(default_enabled),
        });
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecoderDescriptor> {
        self.descriptors.iter()
    }

    pub fn by_protocol_num(&self, num: u32) -> Option<&DecoderDescriptor> {
        self.descriptors.iter().find(|d| d.protocol_num == num)
    }

    pub fn by_name(&self, name: &str) -> Option<&DecoderDescriptor> {
        self.descriptors.iter().find(|d| d.name().eq_ignore_ascii_case(name))
    }

    pub fn enable_by_num(&self, num: u32) -> bool {
        self.by_protocol_num(num).map(|d| d.set_enabled(true)).is_some()
    }

    pub fn disable_by_num(&self, num: u32) -> bool {
        self.by_protocol_num(num).map(|d| d.set_enabled(false)).is_some()
    }

    pub fn enable_by_name(&self, name: &str) -> bool {
        self.by_name(name).map(|d| d.set_enabled(true)).is_some()
    }

    pub fn disable_by_name(&self, name: &str) -> bool {
        self.by_name(name).map(|d| d.set_enabled(false)).is_some()
    }

    /// Decoders enabled for a given modulation class, sorted per the
    /// determinism rule in §9: `(priority asc, protocol_num asc)`.
    pub fn enabled_for(&self, class: crate::pulse::ModulationClass) -> Vec<&DecoderDescriptor> {
        let mut v: Vec<&DecoderDescriptor> = self
            .descriptors
            .iter()
            .filter(|d| d.is_enabled() && d.decoder.modulation().class() == class)
            .collect();
        v.sort_by_key(|d| (d.priority, d.protocol_num));
        v
    }

    /// The largest `reset_limit` among enabled decoders for `class` — the
    /// packet-boundary gap threshold the pulse extractor uses (§4.B).
    pub fn max_reset_limit(&self, class: crate::pulse::ModulationClass) -> u32 {
        self.enabled_for(class)
            .iter()
            .map(|d| d.decoder.timing().reset_limit)
            .max()
            .unwrap_or(0)
    }

    /// Half the smallest `short_width` among enabled decoders for `class`,
    /// with tolerance folded in — the glitch-filter floor (§4.B).
    pub fn min_glitch_floor(&self, class: crate::pulse::ModulationClass) -> u32 {
        self.enabled_for(class)
            .iter()
            .map(|d| {
                let t = d.decoder.timing();
                (t.short_width / 2).saturating_sub(t.tolerance)
            })
            .min()
            .unwrap_or(0)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
