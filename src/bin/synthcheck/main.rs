//! synthcheck entrypoint: list devices, talk to the synth, record and verify.

mod cli_utils;

use anyhow::{bail, Context, Result};
use std::process::ExitCode;
use std::time::Duration;
use synthcheck::logging::init_logging;
use synthcheck::{
    verify_recording, HarnessConfig, HarnessError, MidiStimulus, Recorder, SimilarityReport,
    Transport,
};
use tracing::info;

/// Length of the note-off gap after a capture finishes.
const NOTE_RELEASE: Duration = Duration::from_millis(50);

fn main() -> ExitCode {
    let config = match HarnessConfig::parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("synthcheck: {err:#}");
            return ExitCode::from(2);
        }
    };
    init_logging(&config);

    match run(&config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("synthcheck: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every requested check passed.
fn run(config: &HarnessConfig) -> Result<bool> {
    if config.list_devices {
        cli_utils::list_devices();
        return Ok(true);
    }

    let mut did_something = false;

    if let Some(command) = &config.send {
        did_something = true;
        let response =
            send_command(config, command).with_context(|| format!("sending {command:?}"))?;
        println!("{response}");
    }

    let mut passed = true;

    if let Some(filename) = &config.record {
        did_something = true;
        record(config, filename)?;
        passed &= report(filename, verify_recording(filename, &config.verify_settings()))?;
    }

    if let Some(filename) = &config.verify {
        did_something = true;
        passed &= report(filename, verify_recording(filename, &config.verify_settings()))?;
    }

    if !did_something {
        bail!("nothing to do; pass --list-devices, --send, --record or --verify (see --help)");
    }
    Ok(passed)
}

fn send_command(config: &HarnessConfig, command: &str) -> synthcheck::Result<String> {
    let mut transport = Transport::new();
    transport.discover_and_connect(&config.serial_filter)?;
    let response = transport.send_and_receive(command);
    transport.close();
    response
}

fn record(config: &HarnessConfig, filename: &str) -> Result<()> {
    let capture = config.capture_settings();
    let recorder = Recorder::resolve(&capture.device_hint, capture.channel)?
        .with_recordings_dir(&capture.recordings_dir);

    let mut stimulus = match config.note {
        Some(_) => Some(MidiStimulus::connect(&config.midi_port)?),
        None => None,
    };

    let handle = recorder.start_recording(
        filename,
        capture.duration,
        capture.sample_rate,
        capture.channel,
    )?;
    if let (Some(stimulus), Some(note)) = (stimulus.as_mut(), config.note) {
        stimulus.send_note_on(config.midi_channel, note, config.velocity)?;
    }
    let outcome = handle.await_completion()?;
    if let (Some(stimulus), Some(note)) = (stimulus.as_mut(), config.note) {
        std::thread::sleep(NOTE_RELEASE);
        stimulus.send_note_off(config.midi_channel, note)?;
    }

    info!(
        path = %outcome.path.display(),
        level_db = outcome.level_db,
        "capture finished"
    );
    println!(
        "recorded {} ({} frames @ {} Hz, {:.1} dBFS)",
        outcome.path.display(),
        outcome.frames,
        outcome.sample_rate,
        outcome.level_db
    );
    Ok(())
}

/// Print a verdict; only a similarity miss counts as a plain failure.
fn report(filename: &str, result: synthcheck::Result<SimilarityReport>) -> Result<bool> {
    match result {
        Ok(report) => {
            println!(
                "PASS {filename}: {:.2}% (threshold {}%)",
                report.percent, report.threshold
            );
            Ok(true)
        }
        Err(HarnessError::SimilarityBelowThreshold { percent, threshold }) => {
            println!("FAIL {filename}: {percent:.2}% (threshold {threshold}%)");
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}
