//! Demodulators: pulse/gap list -> [`BitBuffer`] (component C).
//!
//! One function per modulation tag in [`Modulation`], each seeded by a
//! decoder's own timing parameters ([`DemodParams`]) per §4.C. All of them
//! take the same `&[(u32, u32)]` pulse/gap list the extractor in
//! [`crate::pulse`] produces and populate a fresh [`BitBuffer`] — never the
//! other way around, and never sharing one bit buffer across decoders (see
//! the Open Questions note in §9 of the design: re-run demodulation per
//! decoder rather than reusing a post-invert buffer).

use crate::bitbuffer::BitBuffer;

/// Stable integer modulation tags (External Interfaces, §6). OOK tags are
/// `< FSK_DEMOD_MIN_VAL`; everything at or above it is FSK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Modulation {
    OokPulseManchesterZerobit = 3,
    OokPulsePcm = 4,
    OokPulsePpm = 5,
    OokPulsePwm = 6,
    OokPulsePiwmRaw = 8,
    OokPulseDmc = 9,
    OokPulsePwmOsv1 = 10,
    OokPulsePiwmDc = 11,
    OokPulseNrzs = 12,
    FskPulsePcm = 16,
    FskPulsePwm = 17,
    FskPulseManchesterZerobit = 18,
}

pub const FSK_DEMOD_MIN_VAL: u8 = 16;

impl Modulation {
    pub fn is_fsk(self) -> bool {
        (self as u8) >= FSK_DEMOD_MIN_VAL
    }

    pub fn class(self) -> crate::pulse::ModulationClass {
        if self.is_fsk() {
            crate::pulse::ModulationClass::Fsk
        } else {
            crate::pulse::ModulationClass::Ook
        }
    }
}

/// Canonical pulse/gap timings a decoder contributes to demodulation, all
/// in microseconds; `tolerance` is the `±` match window.
#[derive(Debug, Clone, Copy)]
pub struct DemodParams {
    pub short_width: u32,
    pub long_width: u32,
    pub sync_width: u32,
    pub reset_limit: u32,
    pub gap_limit: u32,
    pub tolerance: u32,
    /// PWM/PIWM polarity flag: when true, short=1/long=0 is swapped to
    /// short=0/long=1.
    pub invert_bits: bool,
}

impl DemodParams {
    /// A width `w` "matches" canonical `c` when `|w - c| <= tolerance`.
    fn matches(&self, w: u32, c: u32) -> bool {
        w.abs_diff(c) <= self.tolerance
    }

    /// Classify `w` against `short_width`/`long_width`; ties (within
    /// tolerance of both) prefer the shorter canonical value. Returns
    /// `None` if it matches neither.
    fn classify_short_long(&self, w: u32) -> Option<bool> {
        let short = self.matches(w, self.short_width);
        let long = self.matches(w, self.long_width);
        match (short, long) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }
}

/// Run a modulation's demodulator over `pulses`, producing a fresh bit
/// buffer. `invert_level` flips which half of each (pulse, gap) pair is
/// treated as "high" first, mirroring decoders that need the opposite
/// capture polarity.
pub fn demodulate(modulation: Modulation, pulses: &[(u32, u32)], params: &DemodParams) -> BitBuffer {
    let mut bb = BitBuffer::new();
    match modulation {
        Modulation::OokPulsePcm | Modulation::FskPulsePcm => pcm(pulses, params, &mut bb),
        Modulation::OokPulsePwm | Modulation::OokPulsePwmOsv1 => pwm(pulses, params, &mut bb),
        Modulation::FskPulsePwm => fsk_pwm(pulses, params, &mut bb),
        Modulation::OokPulsePpm => ppm(pulses, params, &mut bb),
        Modulation::OokPulseManchesterZerobit | Modulation::FskPulseManchesterZerobit => {
            manchester_zerobit(pulses, params, &mut bb)
        }
        Modulation::OokPulseDmc => dmc(pulses, params, &mut bb),
        Modulation::OokPulsePiwmRaw | Modulation::OokPulsePiwmDc => piwm(pulses, params, &mut bb),
        Modulation::OokPulseNrzs => nrzs(pulses, params, &mut bb),
    }
    bb
}

/// Pulse-code modulation (run-length coded): each pulse or gap wider than
/// `tolerance` from a single bit width is emitted as that many 1s or 0s.
fn pcm(pulses: &[(u32, u32)], params: &DemodParams, bb: &mut BitBuffer) {
    let unit = params.short_width.max(1);
    for &(pulse_us, gap_us) in pulses {
        let n = ((pulse_us as f64 / unit as f64).round() as usize).max(1);
        for _ in 0..n {
            bb.add_bit(true);
        }
        if gap_us == 0 {
            continue;
        }
        let n = ((gap_us as f64 / unit as f64).round() as usize).max(1);
        if gap_us >= params.reset_limit {
            bb.add_row();
            continue;
        }
        for _ in 0..n {
            bb.add_bit(false);
        }
    }
}

/// Pulse-width modulation: pulse close to `short_width` -> bit 1; close to
/// `long_width` -> bit 0 (swapped when `invert_bits`). Gap close to
/// `sync_width` starts a new row; gap >= `reset_limit` ends the row.
fn pwm(pulses: &[(u32, u32)], params: &DemodParams, bb: &mut BitBuffer) {
    for &(pulse_us, gap_us) in pulses {
        if let Some(is_short) = params.classify_short_long(pulse_us) {
            let bit = if params.invert_bits { !is_short } else { is_short };
            bb.add_bit(bit);
        }
        if gap_us >= params.reset_limit {
            bb.add_row();
        } else if params.matches(gap_us, params.sync_width) {
            bb.add_sync();
        }
    }
}

/// FSK PWM: short mark -> 1, long mark -> 0. The "gap" here is the space
/// interval between marks, which never itself carries sync semantics.
fn fsk_pwm(pulses: &[(u32, u32)], params: &DemodParams, bb: &mut BitBuffer) {
    for &(mark_us, space_us) in pulses {
        if let Some(is_short) = params.classify_short_long(mark_us) {
            bb.add_bit(is_short);
        }
        if space_us >= params.reset_limit {
            bb.add_row();
        }
    }
}

/// Pulse-position modulation: gap close to `short_width` -> 0; close to
/// `long_width` -> 1. Pulse width is carrier and ignored.
fn ppm(pulses: &[(u32, u32)], params: &DemodParams, bb: &mut BitBuffer) {
    for &(_pulse_us, gap_us) in pulses {
        if gap_us >= params.reset_limit {
            bb.add_row();
            continue;
        }
        if let Some(is_short) = params.classify_short_long(gap_us) {
            bb.add_bit(!is_short); // short -> 0, long -> 1
        }
    }
}

/// Manchester with a hardcoded leading zero bit: rising edge -> 0, falling
/// edge -> 1, under a clock derived from `short_width` (half bit period).
fn manchester_zerobit(pulses: &[(u32, u32)], params: &DemodParams, bb: &mut BitBuffer) {
    bb.add_bit(false); // hardcoded leading 0 bit
    let half = params.short_width.max(1);
    for &(pulse_us, gap_us) in pulses {
        if gap_us >= params.reset_limit {
            bb.add_row();
            continue;
        }
        // A full bit period is either one pulse/gap half each (short mark,
        // short space: a single transition mid-bit) or a long run spanning
        // two half-periods (no transition -> same bit repeated).
        let pulse_halves = ((pulse_us as f64 / half as f64).round() as i64).max(1);
        let gap_halves = ((gap_us as f64 / half as f64).round() as i64).max(1);
        for _ in 0..pulse_halves {
            bb.add_bit(false); // rising edge region -> 0
        }
        for _ in 0..gap_halves {
            bb.add_bit(true); // falling edge region -> 1
        }
    }
}

/// Differential Manchester Coding: no level-shift within the clock cycle
/// means 1, one shift means 0. Approximated here from pulse/gap widths:
/// a half-period-length run (~`short_width`) signals a mid-cycle shift
/// (bit 0); a full-period-length run (~`long_width`) signals no shift
/// (bit 1).
fn dmc(pulses: &[(u32, u32)], params: &DemodParams, bb: &mut BitBuffer) {
    for &(pulse_us, gap_us) in pulses {
        if gap_us >= params.reset_limit {
            bb.add_row();
            continue;
        }
        if let Some(is_short) = params.classify_short_long(pulse_us) {
            bb.add_bit(!is_short); // short (mid-cycle shift) -> 0, long (no shift) -> 1
        }
    }
}

/// Pulse-interval/width modulation (raw or duty-cycle variants): level
/// shift per bit; short interval -> 1, long -> 0.
fn piwm(pulses: &[(u32, u32)], params: &DemodParams, bb: &mut BitBuffer) {
    for &(pulse_us, gap_us) in pulses {
        if let Some(is_short) = params.classify_short_long(pulse_us) {
            bb.add_bit(is_short);
        }
        if gap_us >= params.reset_limit {
            bb.add_row();
        }
    }
}

/// Raw NRZ-Space over OOK: each unit-width run of pulse/gap is one bit, no
/// run-length coalescing (unlike PCM, widths are not divided into units).
fn nrzs(pulses: &[(u32, u32)], params: &DemodParams, bb: &mut BitBuffer) {
    for &(pulse_us, gap_us) in pulses {
        bb.add_bit(true);
        if gap_us >= params.reset_limit {
            bb.add_row();
        } else {
            bb.add_bit(false);
        }
    }
    bb.nrzs_decode();
    let _ = params;
}
