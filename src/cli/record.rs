//! CLI handler for a recording session.
//!
//! Plays the front-end role: picks devices, starts the session, waits for
//! the user, stops on a blocking thread, and prints the status stream.

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::sync::oneshot;

use super::args::RecordCliArgs;
use crate::audio::DeviceCatalog;
use crate::config::Config;
use crate::session::{status, SessionController, SessionPhase, SessionSettings};

const FAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub async fn handle_record_command(args: RecordCliArgs) -> Result<()> {
    let config = Config::load()?;

    let savedir = match args.savedir {
        Some(dir) => dir,
        None => config.recording.savedir()?,
    };
    let sample_rate = args.sample_rate.unwrap_or(config.recording.sample_rate);
    let device1 = args.device1.or(config.recording.device1);
    let device2 = args.device2.or(config.recording.device2);
    let limit = args
        .duration
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .ok()
                .filter(|d| !d.is_zero())
                .with_context(|| format!("Invalid duration: {secs}"))
        })
        .transpose()?;

    let (status, events) = status::channel();
    let printer = std::thread::spawn(move || {
        for event in events.iter() {
            println!("{event}");
        }
    });

    status.info(SessionPhase::Idle, "duorec started");
    let mut controller = SessionController::new(
        DeviceCatalog::new(super::audio_host(args.synthetic)),
        SessionSettings::new(savedir).with_sample_rate(sample_rate),
        status,
    );
    controller.refresh_devices();

    if let Err(e) = controller.start_session(device1.as_deref(), device2.as_deref()) {
        drop(controller);
        let _ = printer.join();
        bail!("Recording not started: {e}");
    }

    wait_for_stop(&mut controller, limit).await;

    let (controller, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = controller.stop_session();
        (controller, outcome)
    })
    .await
    .context("Stop task panicked")?;

    drop(controller);
    let _ = printer.join();

    let outcome = outcome?;
    for track in &outcome.tracks {
        println!(
            "Saved {} ({:.1}s)",
            track.path.display(),
            track.duration_seconds()
        );
    }
    if let Some(mixed) = &outcome.mixed {
        println!("Mixed {}", mixed.path.display());
    }

    Ok(())
}

/// Resolve when the time limit passes, the user presses Enter, Ctrl-C
/// arrives, or every device has stopped delivering audio. Device faults are
/// announced on the status stream as they are noticed.
async fn wait_for_stop(controller: &mut SessionController, limit: Option<Duration>) {
    let requested = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => {
                println!("Recording. Press Enter or Ctrl-C to stop.");
                // A plain thread, so a pending stdin read never holds up runtime shutdown.
                let (tx, rx) = oneshot::channel();
                std::thread::spawn(move || {
                    let mut line = String::new();
                    let _ = std::io::stdin().read_line(&mut line);
                    let _ = tx.send(());
                });
                let _ = rx.await;
            }
        }
    };
    tokio::pin!(requested);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticks = tokio::time::interval(FAULT_POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut requested => break,
            _ = &mut ctrl_c => break,
            _ = ticks.tick() => {
                controller.check_faults();
                if controller.live_tracks() == 0 {
                    break;
                }
            }
        }
    }
}
