//! The periodic loop every mounted codelet runs on the mind's runtime.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task;
use tokio::time::{self, MissedTickBehavior};
use tracing::Instrument;

use crate::codelets::Codelet;
use crate::error::CodeletError;

/// Tick `codelet` at its cadence until the shutdown signal flips or its
/// memory is closed.
///
/// Each tick runs on the blocking pool, so a tick that never returns holds
/// one blocking thread and leaves every other codelet's loop running.
pub(crate) async fn run(
    codelet: Box<dyn Codelet>,
    mut shutdown: watch::Receiver<bool>,
    parent: tracing::Span,
) {
    let span = tracing::info_span!(
        parent: &parent,
        "codelet",
        id = %codelet.id(),
        role = %codelet.role()
    );

    async move {
        let cadence = codelet.cadence();
        let status = Arc::clone(codelet.status());
        let mut interval = time::interval(cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(cadence_ms = cadence.as_millis() as u64, "loop started");

        let mut idle = Some(codelet);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }
            let Some(mut codelet) = idle.take() else {
                break;
            };

            let tick_span = tracing::Span::current();
            let tick = task::spawn_blocking(move || {
                let _entered = tick_span.enter();
                let result = tick_once(codelet.as_mut());
                (codelet, result)
            });
            let (codelet, result) = tokio::select! {
                _ = shutdown.changed() => {
                    tracing::debug!("shutdown during a tick, abandoning it");
                    break;
                }
                joined = tick => match joined {
                    Ok(done) => done,
                    Err(e) => {
                        tracing::error!(error = %e, "tick task lost");
                        break;
                    }
                },
            };
            idle = Some(codelet);

            match result {
                Ok(()) => {}
                Err(e) if e.is_closed() => {
                    tracing::debug!("memory closed");
                    break;
                }
                Err(e @ CodeletError::Panicked { .. }) => {
                    tracing::error!(error = %e, "tick panicked");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "tick failed");
                }
            }
        }

        tracing::debug!(ticks = status.ticks(), failures = status.failures(), "loop stopped");
    }
    .instrument(span)
    .await
}

/// One tick with panics turned into errors and the counters updated.
pub(crate) fn tick_once(codelet: &mut dyn Codelet) -> Result<(), CodeletError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| codelet.tick()));
    let status = codelet.status();
    status.record_tick();

    let result = outcome.unwrap_or_else(|payload| {
        Err(CodeletError::Panicked {
            codelet: codelet.id().to_string(),
            message: panic_message(payload.as_ref()),
        })
    });
    if result.is_err() {
        status.record_failure();
    }
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
