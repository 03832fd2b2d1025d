//! The dispatch loop (component E): pulse packets in, [`data::Record`]s out.
//!
//! Single dispatch thread, bounded SPSC queues between stages, drop-oldest
//! backpressure — ported from the teacher's channel-based pipeline between
//! its capture and UI threads (`app.rs`'s `mpsc` wiring), swapped for
//! `crossbeam-channel` because the queues here need `try_send` semantics the
//! std channel doesn't offer. No stage ever blocks on a full downstream
//! queue; a full queue drops its oldest entry and counts the loss instead,
//! so a slow sink can never stall the radio-facing stages (§5).

use crate::bitbuffer::BitBuffer;
use crate::data::Record;
use crate::demod::demodulate;
use crate::pulse::{ModulationClass, PulsePacket};
use crate::registry::{DecodeOutcome, DecoderRegistry};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// A bounded queue that drops its oldest entry rather than block the
/// producer, counting losses for the stats report.
pub struct DropOldestQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    dropped: std::sync::atomic::AtomicU64,
}

impl<T> DropOldestQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Push `item`, dropping the oldest queued item if the queue is full.
    pub fn push(&self, item: T) {
        let mut item = item;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    // Make room by discarding the oldest entry, then retry.
                    if self.rx.try_recv().is_ok() {
                        self.dropped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    }
                    item = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Block for up to `timeout` waiting for an item; `None` on timeout.
    pub fn pop_timeout(&self, timeout: std::time::Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// What happens after a decoder at a given priority tier succeeds: keep
/// offering the packet to lower-priority decoders, or stop (the usual rtl_433
/// convention — first successful decode at a priority tier wins the packet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterSuccess {
    StopAtTier,
    Continue,
}

/// Run every enabled decoder (sorted by `(priority, protocol_num)`) in
/// `registry` whose modulation class matches `packet.modulation` against a
/// freshly demodulated bit buffer, emitting records via `emit`. Returns the
/// number of decoders that produced at least one event.
///
/// Each decoder gets its own freshly demodulated [`BitBuffer`] — per the
/// registry's "re-run demodulation per decoder, never share a post-invert
/// buffer" rule, because one decoder's `invert()`/NRZ-decode call would
/// otherwise corrupt another decoder's view of the same packet.
pub fn dispatch_packet(
    registry: &DecoderRegistry,
    packet: &PulsePacket,
    after_success: AfterSuccess,
    emit: &mut dyn FnMut(Record),
) -> usize {
    let mut successes = 0;
    let mut current_tier: Option<u8> = None;
    let mut tier_succeeded = false;

    for descriptor in registry.enabled_for(packet.modulation) {
        if current_tier != Some(descriptor.priority) {
            if after_success == AfterSuccess::StopAtTier && tier_succeeded {
                break;
            }
            current_tier = Some(descriptor.priority);
            tier_succeeded = false;
        }

        let bb = demodulate_for(descriptor, packet);
        let timestamp = packet.timestamp.to_rfc3339();
        let protocol_num = descriptor.protocol_num;
        let outcome = descriptor.decoder.decode(&bb, descriptor.context.as_ref(), &mut |mut record| {
            record.prepend("protocol", protocol_num);
            record.prepend("time", timestamp.clone());
            emit(record);
        });
        descriptor.stats.record(outcome);
        if outcome.is_success() {
            successes += 1;
            tier_succeeded = true;
        }
    }
    successes
}

fn demodulate_for(descriptor: &crate::registry::DecoderDescriptor, packet: &PulsePacket) -> BitBuffer {
    let params = descriptor.decoder.timing();
    demodulate(descriptor.decoder.modulation(), &packet.pulses, &params)
}

/// The dispatch thread's run loop: pop packets from `inbox`, dispatch each,
/// and forward emitted records to `outbox`, until `input_done` is set and
/// `inbox` is drained. Runs on its own thread in `main.rs`; never touches
/// the SDR-facing extractor thread's state.
///
/// `inbox` is a [`DropOldestQueue`] shared with the extractor thread rather
/// than a channel the extractor's `Sender` half can be dropped to signal
/// end-of-input, so end-of-input is instead signalled by `input_done`: the
/// loop keeps polling with a short timeout and only exits once `input_done`
/// is set and a poll comes back empty, so no packet pushed just before
/// shutdown is lost.
pub fn run(
    registry: &DecoderRegistry,
    inbox: &DropOldestQueue<PulsePacket>,
    outbox: &DropOldestQueue<Record>,
    after_success: AfterSuccess,
    input_done: &std::sync::atomic::AtomicBool,
) {
    loop {
        match inbox.pop_timeout(std::time::Duration::from_millis(50)) {
            Some(packet) => {
                if packet.pulses.is_empty() {
                    continue;
                }
                dispatch_packet(registry, &packet, after_success, &mut |record| {
                    outbox.push(record);
                });
            }
            None => {
                if input_done.load(std::sync::atomic::Ordering::SeqCst) {
                    return;
                }
            }
        }
    }
}
