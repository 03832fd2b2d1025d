//! CLI flags and optional INI config file (component J) — the minimum
//! surface needed to drive the core end to end per §6 of the spec: input
//! selection, frequency/sample-rate/ppm/gain, enable/disable protocol,
//! output sink selection, verbosity, stats interval.
//!
//! Grounded on the teacher's `storage::Config` (INI file under a per-app
//! config directory, `configparser` + `dirs`, CLI-overrides-file precedence)
//! generalized from KAT's fixed `[general]`/`[radio]`/`[export]` sections to
//! this crate's radio/decoder/output concerns, and on `chimera-cli`'s
//! `clap::Parser` derive struct for the flag surface itself.

use crate::error::ConfigError;
use clap::{Parser, ValueEnum};
use configparser::ini::Ini;
use std::path::PathBuf;

/// Which of the two pulse-extractor front ends (§4.B) to run the input
/// stream through: AM-envelope level crossing, or FM phase-discriminator
/// level crossing. Selects between [`crate::pulse::OokExtractor`] and
/// [`crate::pulse::FskExtractor`] in `main.rs`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemodMode {
    Ook,
    Fsk,
}

/// Pulse Sentinel: ISM-band pulse demodulation and device-decoder dispatch.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// SDR device index or serial (mutually exclusive with --read-file).
    #[arg(short = 'd', long)]
    pub device: Option<String>,

    /// Read raw i8 I/Q samples from a file instead of a live device (for
    /// offline replay and the scenario fixtures in this crate's test suite).
    #[arg(short = 'r', long, value_name = "PATH")]
    pub read_file: Option<PathBuf>,

    /// Frequency in Hz. May be repeated to scan multiple frequencies.
    #[arg(short = 'f', long = "frequency", value_name = "HZ")]
    pub frequencies: Vec<u32>,

    /// Sample rate in Hz.
    #[arg(short = 's', long, default_value_t = 2_000_000)]
    pub sample_rate: u32,

    /// Crystal/PPM correction applied at the device.
    #[arg(short = 'p', long, default_value_t = 0)]
    pub ppm_error: i32,

    /// Tuner gain in dB, or "auto".
    #[arg(short = 'g', long)]
    pub gain: Option<String>,

    /// Enable a protocol by number or name (repeatable). When given at all,
    /// only explicitly enabled protocols run; otherwise each decoder's own
    /// default-enabled flag applies.
    #[arg(short = 'R', long = "enable")]
    pub enable: Vec<String>,

    /// Disable a protocol by number or name (repeatable); applied after
    /// `--enable`.
    #[arg(short = 'X', long = "disable")]
    pub disable: Vec<String>,

    /// Output sink: currently only the stdout-JSON dev sink (`json`) is
    /// built in; MQTT/InfluxDB/HTTP sinks are external collaborators.
    #[arg(short = 'F', long = "output", default_value = "json")]
    pub output: String,

    /// Which pulse extractor front end to run the input stream through.
    #[arg(long, value_enum, default_value = "ook")]
    pub demod: DemodMode,

    /// Verbosity: 0=events only, 1=+MIC/sanity fails, 2=+length/early
    /// aborts and bit-buffer dumps, 3=+per-sample demodulator traces.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Seconds between stats-snapshot log lines (0 disables periodic stats).
    #[arg(long, default_value_t = 0)]
    pub stats_interval: u64,

    /// Path to an INI config file. Defaults to the platform config directory
    /// (`~/.config/pulse-sentinel/config.ini` on Linux) if present.
    #[arg(short = 'c', long)]
    pub config_file: Option<PathBuf>,
}

/// Resolved configuration: CLI flags layered over an optional INI file,
/// CLI always wins on a per-field basis (`storage::Config`'s
/// load-then-override pattern, generalized).
#[derive(Debug, Clone)]
pub struct Settings {
    pub device: Option<String>,
    pub read_file: Option<PathBuf>,
    pub frequencies: Vec<u32>,
    pub sample_rate: u32,
    pub ppm_error: i32,
    pub gain: Option<String>,
    pub enable: Vec<String>,
    pub disable: Vec<String>,
    pub output: String,
    pub demod: DemodMode,
    pub verbose: u8,
    pub stats_interval: u64,
}

impl Settings {
    /// Build settings from parsed CLI flags, layering an INI file (explicit
    /// `--config-file`, or the default config directory if present) under
    /// them. File values fill in unset CLI defaults for frequency/sample
    /// rate/gain; list flags (`--enable`/`--disable`) are additive.
    pub fn resolve(cli: Cli) -> Result<Self, ConfigError> {
        let ini_path = cli.config_file.clone().or_else(default_config_path);

        let file = match &ini_path {
            Some(path) if path.exists() => Some(FileDefaults::load(path)?),
            _ => None,
        };

        let mut frequencies = cli.frequencies;
        if frequencies.is_empty() {
            if let Some(f) = file.as_ref().and_then(|f| f.default_frequency) {
                frequencies.push(f);
            } else {
                frequencies.push(433_920_000);
            }
        }

        let mut enable = cli.enable;
        let mut disable = cli.disable;
        if let Some(f) = &file {
            enable.extend(f.enable.iter().cloned());
            disable.extend(f.disable.iter().cloned());
        }

        Ok(Settings {
            device: cli.device,
            read_file: cli.read_file,
            frequencies,
            sample_rate: cli.sample_rate,
            ppm_error: cli.ppm_error,
            gain: cli.gain.or_else(|| file.as_ref().and_then(|f| f.gain.clone())),
            enable,
            disable,
            output: cli.output,
            demod: cli.demod,
            verbose: cli.verbose,
            stats_interval: cli.stats_interval,
        })
    }
}

/// The handful of INI-sourceable defaults the CLI can fall back on.
/// Mirrors `storage::Config::load_from_ini`'s "missing key -> default"
/// tolerance rather than failing on a sparse file.
struct FileDefaults {
    default_frequency: Option<u32>,
    gain: Option<String>,
    enable: Vec<String>,
    disable: Vec<String>,
}

impl FileDefaults {
    fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut ini = Ini::new();
        ini.load(path).map_err(|reason| ConfigError::Malformed {
            path: path.display().to_string(),
            reason,
        })?;

        let default_frequency = ini
            .getuint("radio", "default_frequency")
            .ok()
            .flatten()
            .map(|v| v as u32);
        let gain = ini.get("radio", "gain");
        let enable = ini
            .get("protocols", "enable")
            .map(|s| split_list(&s))
            .unwrap_or_default();
        let disable = ini
            .get("protocols", "disable")
            .map(|s| split_list(&s))
            .unwrap_or_default();

        Ok(Self { default_frequency, gain, enable, disable })
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',').map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect()
}

/// `~/.config/pulse-sentinel/config.ini`, matching `storage::resolve_config_dir`
/// generalized to this crate's own directory name.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pulse-sentinel").join("config.ini"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            device: None,
            read_file: None,
            frequencies: vec![],
            sample_rate: 2_000_000,
            ppm_error: 0,
            gain: None,
            enable: vec![],
            disable: vec![],
            output: "json".into(),
            demod: DemodMode::Ook,
            verbose: 0,
            stats_interval: 0,
            config_file: None,
        }
    }

    #[test]
    fn defaults_to_433_92_mhz_with_no_frequency_flags_or_file() {
        let settings = Settings::resolve(base_cli()).unwrap();
        assert_eq!(settings.frequencies, vec![433_920_000]);
    }

    #[test]
    fn explicit_frequency_flag_wins() {
        let mut cli = base_cli();
        cli.frequencies = vec![868_300_000];
        let settings = Settings::resolve(cli).unwrap();
        assert_eq!(settings.frequencies, vec![868_300_000]);
    }

    #[test]
    fn split_list_trims_and_drops_empties() {
        assert_eq!(split_list(" 12, Ecowitt-WH53 ,,"), vec!["12", "Ecowitt-WH53"]);
    }
}
