//! wav-play: plays an uncompressed PCM wave file on an output device.
//!
//! Thin caller of `pcm-player`: parses flags, plays one file, prints what happened, then drains
//! and closes the device. Ctrl-C stops playback cleanly; a second Ctrl-C quits at once.

mod cli;

use std::thread;

use anyhow::{Context, Result, bail};
use clap::Parser;
use pcm_player::cpal_backend::CpalBackend;
use pcm_player::{PlaybackEndReason, PlaybackSession, StopHandle, StopOutcome};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,pcm_player=info,wav_play=info")
        }))
        .init();

    let backend = CpalBackend::new(args.cpal_config());
    if args.list_devices {
        let names = backend.device_names().context("list output devices")?;
        for (i, name) in names.iter().enumerate() {
            println!("#{i}: {name}");
        }
        return Ok(());
    }
    let Some(path) = args.path.as_deref() else {
        bail!("no input file given");
    };

    let mut session = PlaybackSession::new(backend, args.player_config());
    stop_on_ctrlc(session.stop_handle())?;

    let played = session
        .play(path, None)
        .with_context(|| format!("play {}", path.display()));
    session.close_device();
    let report = played?;

    println!(
        "{}: {} periods played, {} dropped, {} faults recovered, {} bytes read ({:?})",
        path.display(),
        report.periods_written,
        report.periods_dropped,
        report.faults_recovered,
        report.bytes_read,
        report.end_reason,
    );
    if report.end_reason == PlaybackEndReason::Error {
        bail!("reading {} failed part way", path.display());
    }
    Ok(())
}

/// Forward Ctrl-C to a watcher thread: the first one stops playback, the second exits.
fn stop_on_ctrlc(stop: StopHandle) -> Result<()> {
    let (tx, rx) = crossbeam_channel::unbounded::<()>();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("install Ctrl-C handler")?;

    thread::Builder::new()
        .name("ctrlc".to_string())
        .spawn(move || {
            if rx.recv().is_err() {
                return;
            }
            tracing::info!("stopping playback, Ctrl-C again to quit");
            match stop.request_stop() {
                StopOutcome::Acknowledged => tracing::debug!("playback stopped"),
                StopOutcome::Idle => tracing::debug!("nothing playing"),
                StopOutcome::TimedOut => tracing::warn!("playback still winding down"),
            }
            if rx.recv().is_ok() {
                std::process::exit(130);
            }
        })
        .context("spawn Ctrl-C watcher")?;
    Ok(())
}
