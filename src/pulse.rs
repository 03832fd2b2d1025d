//! Pulse/gap extraction from raw samples (component B).
//!
//! Two adaptive level-crossing demodulators run over the raw sample stream:
//! [`OokExtractor`] does AM envelope detection, [`FskExtractor`] does FM
//! phase-discrimination. Both convert a level+duration stream into
//! alternating (pulse, gap) microsecond pairs and flush a [`PulsePacket`]
//! once a gap exceeds the caller-supplied `reset_limit_us` (the largest
//! `reset_limit` of any decoder enabled for this modulation class, per
//! §4.B). The adaptive-threshold/hysteresis/debounce state machine is
//! ported from the teacher's `radio::demodulator::{Demodulator,
//! FmDemodulator}` — same shape, generalized so the reset/glitch
//! thresholds come from the decoder registry instead of fixed constants.

use chrono::{DateTime, Utc};
use num_complex::Complex;

/// OOK or FSK, the two top-level modulation classes pulse packets and
/// decoder descriptors are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationClass {
    Ook,
    Fsk,
}

/// A bounded pulse/gap list plus the metadata a demodulator and decoder
/// need: carrier frequency, sample rate, an approximate signal-quality
/// estimate, the modulation hint, and when the first pulse was observed.
#[derive(Debug, Clone)]
pub struct PulsePacket {
    /// Alternating (pulse_us, gap_us) pairs, in capture order.
    pub pulses: Vec<(u32, u32)>,
    pub modulation: ModulationClass,
    pub freq_hz: u32,
    pub sample_rate_hz: u32,
    pub rssi_db: f32,
    pub snr_db: f32,
    /// Wall-clock time of the first pulse.
    pub timestamp: DateTime<Utc>,
}

impl PulsePacket {
    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }
}

/// One accumulated level run plus its magnitude-average, shared between the
/// OOK and FSK extractors' debounce state machines.
#[derive(Debug, Clone, Copy, Default)]
struct LevelRun {
    high: bool,
    samples: u64,
}

/// Shared debounce / hysteresis state machine: confirms a level transition
/// only once the new level has persisted for at least `min_duration_us`,
/// absorbing shorter flips as noise.
struct Debouncer {
    current: LevelRun,
    pending: Option<LevelRun>,
    samples_since_edge: u64,
    min_duration_us: u32,
    samples_per_us: f64,
}

impl Debouncer {
    fn new(sample_rate_hz: u32, min_duration_us: u32) -> Self {
        Self {
            current: LevelRun::default(),
            pending: None,
            samples_since_edge: 0,
            min_duration_us,
            samples_per_us: sample_rate_hz as f64 / 1_000_000.0,
        }
    }

    fn us(&self, samples: u64) -> u32 {
        (samples as f64 / self.samples_per_us) as u32
    }

    /// Feed one sample's level decision. Returns a confirmed (level,
    /// duration_us) pair whenever a transition is confirmed.
    fn feed(&mut self, is_high: bool) -> Option<(bool, u32)> {
        let mut confirmed = None;
        match &mut self.pending {
            Some(p) if p.high == is_high => {
                p.samples += 1;
                if self.us(p.samples) >= self.min_duration_us {
                    let prev = self.current;
                    confirmed = Some((prev.high, self.us(prev.samples)));
                    self.current = *p;
                    self.pending = None;
                    self.samples_since_edge = 0;
                }
            }
            Some(_) => {
                // Flipped back before confirmation: absorb as noise.
                let pending_samples = self.pending.take().map(|p| p.samples).unwrap_or(0);
                self.current.samples += pending_samples + 1;
            }
            None => {
                if is_high != self.current.high && self.current.samples > 0 {
                    self.pending = Some(LevelRun { high: is_high, samples: 1 });
                } else {
                    self.current.samples += 1;
                    self.samples_since_edge += 1;
                }
            }
        }
        confirmed
    }

    fn flush(&mut self) -> Vec<(bool, u32)> {
        let mut out = Vec::new();
        if let Some(p) = self.pending.take() {
            out.push((self.current.high, self.us(self.current.samples)));
            self.current = p;
        }
        out.push((self.current.high, self.us(self.current.samples)));
        self.reset();
        out
    }

    fn reset(&mut self) {
        self.current = LevelRun::default();
        self.pending = None;
        self.samples_since_edge = 0;
    }
}

/// Accumulates a confirmed level stream into alternating (pulse, gap)
/// microsecond pairs plus a diagnostic histogram, and turns it into a
/// [`PulsePacket`] once the extractor detects a long gap.
struct PulseAccumulator {
    levels: Vec<(bool, u32)>,
    first_pulse: Option<DateTime<Utc>>,
    /// Diagnostic histogram of short/long/sync-ish bucket durations.
    pub histogram: Histogram,
}

#[derive(Debug, Default, Clone)]
pub struct Histogram {
    pub short_sum_us: u64,
    pub short_count: u64,
    pub long_sum_us: u64,
    pub long_count: u64,
}

impl Histogram {
    fn observe(&mut self, duration_us: u32, short_width_us: u32) {
        if duration_us <= short_width_us {
            self.short_sum_us += duration_us as u64;
            self.short_count += 1;
        } else {
            self.long_sum_us += duration_us as u64;
            self.long_count += 1;
        }
    }

    pub fn short_centroid_us(&self) -> Option<u32> {
        (self.short_count > 0).then(|| (self.short_sum_us / self.short_count) as u32)
    }

    pub fn long_centroid_us(&self) -> Option<u32> {
        (self.long_count > 0).then(|| (self.long_sum_us / self.long_count) as u32)
    }
}

impl PulseAccumulator {
    fn new() -> Self {
        Self {
            levels: Vec::with_capacity(2048),
            first_pulse: None,
            histogram: Histogram::default(),
        }
    }

    /// Glitch filter: a confirmed level run shorter than `min_pulse_us` is
    /// folded into the surrounding gap instead of recorded as its own
    /// pulse (§4.B: "absorbed into the surrounding gap").
    fn push(&mut self, level: bool, duration_us: u32, min_pulse_us: u32, short_width_us: u32) {
        if level && duration_us < min_pulse_us && !self.levels.is_empty() {
            // Merge this short spurious HIGH into the previous LOW run.
            if let Some(last) = self.levels.last_mut() {
                if !last.0 {
                    last.1 += duration_us;
                    return;
                }
            }
        }
        // Defensive merge: if the previous run is the same level (can
        // happen once a glitch above has been absorbed), extend it rather
        // than violate the no-consecutive-same-level invariant.
        if let Some(last) = self.levels.last_mut() {
            if last.0 == level {
                last.1 += duration_us;
                return;
            }
        }
        if self.first_pulse.is_none() && level {
            self.first_pulse = Some(Utc::now());
        }
        self.histogram.observe(duration_us, short_width_us);
        self.levels.push((level, duration_us));
    }

    /// Convert the accumulated level stream into (pulse, gap) pairs. The
    /// stream always starts with a HIGH run; a leading LOW run (if any) is
    /// dropped as pre-signal noise/silence.
    fn to_pulse_pairs(&self) -> Vec<(u32, u32)> {
        let mut pairs = Vec::new();
        let mut iter = self.levels.iter().peekable();
        if let Some((false, _)) = iter.peek() {
            iter.next();
        }
        while let Some(&(high, pulse_us)) = iter.next() {
            if !high {
                continue;
            }
            let gap_us = match iter.peek() {
                Some(&&(false, g)) => {
                    iter.next();
                    g
                }
                _ => 0,
            };
            pairs.push((pulse_us, gap_us));
        }
        pairs
    }

    fn take(&mut self, modulation: ModulationClass, freq_hz: u32, sample_rate_hz: u32) -> PulsePacket {
        let pulses = self.to_pulse_pairs();
        let timestamp = self.first_pulse.unwrap_or_else(Utc::now);
        self.levels.clear();
        self.first_pulse = None;
        self.histogram = Histogram::default();
        PulsePacket {
            pulses,
            modulation,
            freq_hz,
            sample_rate_hz,
            rssi_db: 0.0,
            snr_db: 0.0,
            timestamp,
        }
    }
}

/// OOK/AM pulse extractor: adaptive-threshold envelope detector with
/// hysteresis and transition-based threshold updates (avoids the
/// duty-cycle bias a per-sample update would introduce).
pub struct OokExtractor {
    sample_rate_hz: u32,
    freq_hz: u32,
    threshold: f32,
    high_level: f32,
    low_level: f32,
    hysteresis: f32,
    mag_smooth: f32,
    total_samples: u64,
    debounce: Debouncer,
    acc: PulseAccumulator,
    gap_samples_since_edge: u64,
    overflow_dropped: u64,
    overflow_warned: bool,
}

impl OokExtractor {
    pub fn new(sample_rate_hz: u32, freq_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            freq_hz,
            threshold: 0.08,
            high_level: 0.15,
            low_level: 0.02,
            hysteresis: 0.02,
            mag_smooth: 0.0,
            total_samples: 0,
            debounce: Debouncer::new(sample_rate_hz, 40),
            acc: PulseAccumulator::new(),
            gap_samples_since_edge: 0,
            overflow_dropped: 0,
            overflow_warned: false,
        }
    }

    /// Number of in-progress packets discarded because the accumulator hit
    /// its row cap before a reset gap ever closed the packet out (§5: a
    /// full-queue-style loss, counted rather than silently dropped).
    pub fn overflow_dropped(&self) -> u64 {
        self.overflow_dropped
    }

    fn recalc_threshold(&mut self) {
        self.threshold = ((self.low_level + self.high_level) / 2.0).clamp(0.02, 0.5);
        self.hysteresis = ((self.high_level - self.low_level) * 0.10).clamp(0.01, 0.08);
    }

    /// Feed raw interleaved I/Q samples (i8). `reset_limit_us` is the
    /// largest `reset_limit` among decoders enabled for OOK; `min_pulse_us`
    /// is half the smallest matching `short_width` (the glitch floor).
    pub fn process_samples(
        &mut self,
        samples: &[i8],
        reset_limit_us: u32,
        min_pulse_us: u32,
        short_width_us: u32,
    ) -> Option<PulsePacket> {
        for chunk in samples.chunks(2) {
            if chunk.len() < 2 {
                continue;
            }
            let sample = Complex::new(chunk[0] as f32 / 128.0, chunk[1] as f32 / 128.0);
            let magnitude = sample.norm();
            self.mag_smooth = self.mag_smooth * 0.9 + magnitude * 0.1;

            if self.total_samples < 10_000 {
                let alpha = 0.01f32;
                if self.mag_smooth > self.threshold {
                    self.high_level = self.high_level * (1.0 - alpha) + self.mag_smooth * alpha;
                } else {
                    self.low_level = self.low_level * (1.0 - alpha) + self.mag_smooth * alpha;
                }
                self.recalc_threshold();
            }
            self.total_samples += 1;

            let is_high = if self.debounce.current.high {
                self.mag_smooth > (self.threshold - self.hysteresis)
            } else {
                self.mag_smooth > (self.threshold + self.hysteresis)
            };

            if let Some((level, duration_us)) = self.debounce.feed(is_high) {
                self.acc.push(level, duration_us, min_pulse_us, short_width_us);
                self.gap_samples_since_edge = 0;
                if self.total_samples >= 10_000 {
                    let avg = self.mag_smooth;
                    let alpha = 0.3f32;
                    if level {
                        self.high_level = self.high_level * (1.0 - alpha) + avg * alpha;
                    } else {
                        self.low_level = self.low_level * (1.0 - alpha) + avg * alpha;
                    }
                    self.recalc_threshold();
                }
            } else {
                self.gap_samples_since_edge += 1;
            }
        }

        let gap_us = self.debounce.us(self.gap_samples_since_edge);
        if !self.acc.levels.is_empty() && gap_us > reset_limit_us {
            for (level, duration_us) in self.debounce.flush() {
                self.acc.push(level, duration_us, min_pulse_us, short_width_us);
            }
            self.gap_samples_since_edge = 0;
            return Some(self.acc.take(ModulationClass::Ook, self.freq_hz, self.sample_rate_hz));
        }

        if self.acc.levels.len() > 4096 {
            self.acc.take(ModulationClass::Ook, self.freq_hz, self.sample_rate_hz);
            self.overflow_dropped += 1;
            if !self.overflow_warned {
                tracing::warn!("pulse accumulator exhausted: dropping in-progress packet past capacity");
                self.overflow_warned = true;
            }
        }
        None
    }
}

/// FSK/2FSK pulse extractor: phase-discriminator frequency estimate fed
/// through the same debounce/gap logic, yielding mark/space intervals that
/// downstream code treats exactly like OOK pulses.
pub struct FskExtractor {
    sample_rate_hz: u32,
    freq_hz: u32,
    prev: Complex<f32>,
    have_prev: bool,
    freq_smooth: f32,
    threshold_hz: f32,
    hysteresis_hz: f32,
    debounce: Debouncer,
    acc: PulseAccumulator,
    gap_samples_since_edge: u64,
    overflow_dropped: u64,
    overflow_warned: bool,
}

impl FskExtractor {
    pub fn new(sample_rate_hz: u32, freq_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            freq_hz,
            prev: Complex::new(0.0, 0.0),
            have_prev: false,
            freq_smooth: 0.0,
            threshold_hz: 0.0,
            hysteresis_hz: 500.0,
            debounce: Debouncer::new(sample_rate_hz, 40),
            acc: PulseAccumulator::new(),
            gap_samples_since_edge: 0,
            overflow_dropped: 0,
            overflow_warned: false,
        }
    }

    /// See [`OokExtractor::overflow_dropped`].
    pub fn overflow_dropped(&self) -> u64 {
        self.overflow_dropped
    }

    pub fn process_samples(
        &mut self,
        samples: &[i8],
        reset_limit_us: u32,
        min_pulse_us: u32,
        short_width_us: u32,
    ) -> Option<PulsePacket> {
        let rad_to_hz = self.sample_rate_hz as f32 / std::f32::consts::TAU;
        for chunk in samples.chunks(2) {
            if chunk.len() < 2 {
                continue;
            }
            let sample = Complex::new(chunk[0] as f32 / 128.0, chunk[1] as f32 / 128.0);
            if !self.have_prev {
                self.prev = sample;
                self.have_prev = true;
                continue;
            }
            let phase_diff = (sample * self.prev.conj()).arg();
            self.prev = sample;

            let freq_hz = phase_diff * rad_to_hz;
            self.freq_smooth = self.freq_smooth * 0.9 + freq_hz * 0.1;

            let is_high = if self.debounce.current.high {
                self.freq_smooth > (self.threshold_hz - self.hysteresis_hz)
            } else {
                self.freq_smooth > (self.threshold_hz + self.hysteresis_hz)
            };

            if let Some((level, duration_us)) = self.debounce.feed(is_high) {
                self.acc.push(level, duration_us, min_pulse_us, short_width_us);
                self.gap_samples_since_edge = 0;
            } else {
                self.gap_samples_since_edge += 1;
            }
        }

        let gap_us = self.debounce.us(self.gap_samples_since_edge);
        if !self.acc.levels.is_empty() && gap_us > reset_limit_us {
            for (level, duration_us) in self.debounce.flush() {
                self.acc.push(level, duration_us, min_pulse_us, short_width_us);
            }
            self.gap_samples_since_edge = 0;
            return Some(self.acc.take(ModulationClass::Fsk, self.freq_hz, self.sample_rate_hz));
        }

        if self.acc.levels.len() > 4096 {
            self.acc.take(ModulationClass::Fsk, self.freq_hz, self.sample_rate_hz);
            self.overflow_dropped += 1;
            if !self.overflow_warned {
                tracing::warn!("pulse accumulator exhausted: dropping in-progress packet past capacity");
                self.overflow_warned = true;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ook_burst(pulse_us: u32, gap_us: u32, sample_rate_hz: u32) -> Vec<i8> {
        let spus = sample_rate_hz as f64 / 1_000_000.0;
        let mut buf = Vec::new();
        for _ in 0..((pulse_us as f64 * spus) as usize) {
            buf.push(115i8);
            buf.push(0i8);
        }
        for _ in 0..((gap_us as f64 * spus) as usize) {
            buf.push(1i8);
            buf.push(0i8);
        }
        buf
    }

    #[test]
    fn ook_extractor_flushes_on_long_gap() {
        let sr = 2_000_000;
        let mut ext = OokExtractor::new(sr, 433_920_000);
        let mut samples = Vec::new();
        for _ in 0..20 {
            samples.extend(ook_burst(300, 300, sr));
        }
        let _ = ext.process_samples(&samples, 10_000, 100, 300);
        let gap = ook_burst(0, 20_000, sr);
        let packet = ext.process_samples(&gap, 10_000, 100, 300);
        assert!(packet.is_some());
        let packet = packet.unwrap();
        assert!(!packet.is_empty());
        assert_eq!(packet.modulation, ModulationClass::Ook);
    }

    #[test]
    fn glitch_filter_absorbs_short_spike() {
        let mut acc = PulseAccumulator::new();
        acc.push(false, 300, 100, 300);
        acc.push(true, 20, 100, 300); // glitch, shorter than min_pulse_us
        acc.push(false, 300, 100, 300);
        // the 20us HIGH spike should have been merged into the surrounding LOW
        assert_eq!(acc.levels.len(), 1);
        assert_eq!(acc.levels[0], (false, 620));
    }

    #[test]
    fn pulse_pairing_drops_leading_low() {
        let mut acc = PulseAccumulator::new();
        acc.push(false, 5000, 0, 300); // leading silence
        acc.push(true, 300, 300, 300);
        acc.push(false, 300, 0, 300);
        acc.push(true, 300, 300, 300);
        let pairs = acc.to_pulse_pairs();
        assert_eq!(pairs, vec![(300, 300), (300, 0)]);
    }
}
