//! Binary entry point: CLI/config, logging, decoder registry, the
//! extractor/dispatch/sink thread topology, and clean-shutdown draining.
//!
//! Thread topology is ported straight from the teacher's capture/UI split
//! in `main.rs` (a dedicated capture thread feeding the UI over an `mpsc`
//! channel) but widened to three stages, one [`DropOldestQueue`] between
//! each: extractor -> dispatch -> sink. `Ctrl-C` triggers the same
//! finish-current-packet-then-drain shutdown the teacher's panic hook
//! guards against tearing the terminal down mid-frame.

use anyhow::Context;
use clap::Parser;
use pulse_sentinel::config::{Cli, DemodMode, Settings};
use pulse_sentinel::decoders::build_registry;
use pulse_sentinel::dispatch::{self, AfterSuccess, DropOldestQueue};
use pulse_sentinel::error::{exit_code, DeviceError};
use pulse_sentinel::pulse::{FskExtractor, ModulationClass, OokExtractor, PulsePacket};
use pulse_sentinel::registry::DecoderRegistry;
use pulse_sentinel::stats::{log_snapshot, StatsTicker};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Deadline for draining in-flight packets/records after shutdown is
/// requested, per the external-interfaces contract's default.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(2);

fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    let settings = match Settings::resolve(cli) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(exit_code::CONFIG_ERROR);
        }
    };

    init_tracing(verbose);

    let registry = apply_protocol_flags(build_registry(), &settings);

    let code = match run(settings, registry) {
        Ok(()) => exit_code::OK,
        Err(err) => {
            tracing::error!(%err, "fatal error");
            match err.downcast_ref::<DeviceError>() {
                Some(_) => exit_code::DEVICE_OPEN_FAILURE,
                None => exit_code::CONFIG_ERROR,
            }
        }
    };
    std::process::exit(code);
}

/// Stderr-only structured logging; verbosity maps onto the spec's ladder
/// (0=events, 1=+fail detail, 2=+aborts/dumps, 3=+demod traces), following
/// the teacher's env-filter-driven `tracing_subscriber` setup generalized
/// from its file-appender sink to stderr (this crate's sink for data is
/// stdout, so logs must not share that stream).
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("pulse_sentinel={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn apply_protocol_flags(mut registry: DecoderRegistry, settings: &Settings) -> DecoderRegistry {
    for token in &settings.enable {
        let applied = match token.parse::<u32>() {
            Ok(num) => registry.enable_by_num(num),
            Err(_) => registry.enable_by_name(token),
        };
        if !applied {
            tracing::warn!(protocol = %token, "unknown protocol in --enable, ignored");
        }
    }
    for token in &settings.disable {
        let applied = match token.parse::<u32>() {
            Ok(num) => registry.disable_by_num(num),
            Err(_) => registry.disable_by_name(token),
        };
        if !applied {
            tracing::warn!(protocol = %token, "unknown protocol in --disable, ignored");
        }
    }
    registry
}

fn run(settings: Settings, registry: DecoderRegistry) -> anyhow::Result<()> {
    let freq_hz = *settings.frequencies.first().context("no frequency configured")?;
    let sample_rate_hz = settings.sample_rate;

    let mut input = open_input(&settings)?;

    let registry = Arc::new(registry);
    // No signal-handling crate is in this workspace's dependency stack, so
    // shutdown is driven by end-of-input (file mode) rather than a SIGINT
    // handler; `shutdown` still gates the sink thread's drain-then-exit.
    let shutdown = Arc::new(AtomicBool::new(false));
    let input_done = Arc::new(AtomicBool::new(false));

    let packet_queue = Arc::new(DropOldestQueue::new(256));
    let record_queue = Arc::new(DropOldestQueue::new(4096));

    let dispatch_registry = Arc::clone(&registry);
    let dispatch_inbox = Arc::clone(&packet_queue);
    let dispatch_queue = Arc::clone(&record_queue);
    let dispatch_input_done = Arc::clone(&input_done);
    let dispatch_handle = std::thread::spawn(move || {
        dispatch::run(
            &dispatch_registry,
            &dispatch_inbox,
            &dispatch_queue,
            AfterSuccess::Continue,
            &dispatch_input_done,
        );
    });

    let sink_queue = Arc::clone(&record_queue);
    let sink_shutdown = Arc::clone(&shutdown);
    let sink_handle = std::thread::spawn(move || {
        let mut stdout = std::io::stdout();
        pulse_sentinel::sink::run_stdout_json(&sink_queue, &mut stdout, &mut || {
            sink_shutdown.load(Ordering::SeqCst)
        });
    });

    let mut extractor = Extractor::new(settings.demod, sample_rate_hz, freq_hz);
    let modulation = extractor.modulation_class();
    let mut stats_ticker = StatsTicker::new(Duration::from_secs(settings.stats_interval));
    let mut buf = [0i8; 1 << 16];

    while !shutdown.load(Ordering::SeqCst) {
        let n = read_samples(&mut input, &mut buf)?;
        if n == 0 {
            break;
        }
        let reset_limit = registry.max_reset_limit(modulation);
        let min_pulse_us = registry.min_glitch_floor(modulation);
        let short_width_us = min_pulse_us.saturating_mul(2).max(1);
        if let Some(packet) = extractor.process_samples(&buf[..n], reset_limit, min_pulse_us, short_width_us) {
            packet_queue.push(packet);
        }
        if stats_ticker.tick() {
            log_snapshot(&registry);
        }
    }

    input_done.store(true, Ordering::SeqCst);
    let drained = wait_with_deadline(dispatch_handle, SHUTDOWN_DRAIN);
    shutdown.store(true, Ordering::SeqCst);
    let _ = wait_with_deadline(sink_handle, SHUTDOWN_DRAIN);
    if !drained {
        tracing::warn!("dispatch thread did not finish draining within the shutdown deadline");
    }
    if packet_queue.dropped() > 0 {
        tracing::warn!(dropped = packet_queue.dropped(), "pulse-packet queue dropped packets under backpressure");
    }
    Ok(())
}

/// Picks between the two §4.B front ends at startup; the rest of `run`'s
/// loop is identical either way since both yield the same [`PulsePacket`].
enum Extractor {
    Ook(OokExtractor),
    Fsk(FskExtractor),
}

impl Extractor {
    fn new(mode: DemodMode, sample_rate_hz: u32, freq_hz: u32) -> Self {
        match mode {
            DemodMode::Ook => Extractor::Ook(OokExtractor::new(sample_rate_hz, freq_hz)),
            DemodMode::Fsk => Extractor::Fsk(FskExtractor::new(sample_rate_hz, freq_hz)),
        }
    }

    fn modulation_class(&self) -> ModulationClass {
        match self {
            Extractor::Ook(_) => ModulationClass::Ook,
            Extractor::Fsk(_) => ModulationClass::Fsk,
        }
    }

    fn process_samples(
        &mut self,
        samples: &[i8],
        reset_limit_us: u32,
        min_pulse_us: u32,
        short_width_us: u32,
    ) -> Option<PulsePacket> {
        match self {
            Extractor::Ook(e) => e.process_samples(samples, reset_limit_us, min_pulse_us, short_width_us),
            Extractor::Fsk(e) => e.process_samples(samples, reset_limit_us, min_pulse_us, short_width_us),
        }
    }
}

fn open_input(settings: &Settings) -> anyhow::Result<Box<dyn Read>> {
    if let Some(path) = &settings.read_file {
        let file = std::fs::File::open(path)
            .map_err(|e| DeviceError::OpenFailed(path.display().to_string(), e.to_string()))?;
        return Ok(Box::new(file));
    }
    if settings.device.is_some() {
        // No physical SDR backend is wired into this crate: device mode is
        // accepted by the CLI surface but not yet implemented here.
        return Err(DeviceError::OpenFailed(
            settings.device.clone().unwrap_or_default(),
            "live device capture is not implemented in this build".into(),
        )
        .into());
    }
    Err(DeviceError::NoSource.into())
}

fn read_samples(input: &mut dyn Read, buf: &mut [i8]) -> std::io::Result<usize> {
    let mut scratch = vec![0u8; buf.len()];
    let n = input.read(&mut scratch)?;
    for (dst, src) in buf[..n].iter_mut().zip(scratch[..n].iter()) {
        *dst = *src as i8;
    }
    Ok(n)
}

fn wait_with_deadline(handle: std::thread::JoinHandle<()>, deadline: Duration) -> bool {
    let start = std::time::Instant::now();
    while !handle.is_finished() {
        if start.elapsed() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    let _ = handle.join();
    true
}
