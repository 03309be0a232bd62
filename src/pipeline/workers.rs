//! # Pipeline Workers
//!
//! Dispatcher and worker threads for the parallel policy.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::container::RawContainer;
use crate::output::NamingScheme;
use crate::scanner::FrameLocation;

use super::RunContext;
use super::events::TaskReport;
use super::task;

/// Feeds locations into the bounded job queue in index order. Stops
/// dispatching as soon as the token is set.
pub fn spawn_dispatcher(
    locations: Vec<FrameLocation>,
    job_tx: Sender<FrameLocation>,
    cancel: CancellationToken,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for location in locations {
            if cancel.is_cancelled() {
                debug!("dispatch stopped before frame {}", location.index + 1);
                break;
            }
            if job_tx.send(location).is_err() {
                break;
            }
        }
    })
}

/// Spawn extraction workers draining the job queue. Reports go back to the
/// orchestrator over `report_tx`.
pub fn spawn_extract_workers(
    workers: usize,
    ctx: Arc<RunContext>,
    container: Arc<RawContainer>,
    naming: NamingScheme,
    rx: Receiver<FrameLocation>,
    report_tx: Sender<TaskReport>,
) -> Vec<thread::JoinHandle<()>> {
    let mut handles = Vec::new();
    let worker_count = workers.max(1);

    for _ in 0..worker_count {
        let ctx = ctx.clone();
        let container = container.clone();
        let naming = naming.clone();
        let rx = rx.clone();
        let report_tx = report_tx.clone();

        handles.push(thread::spawn(move || {
            for location in rx {
                let report = task::run_task(&ctx, &container, &location, &naming);
                if report_tx.send(report).is_err() {
                    break;
                }
            }
        }));
    }

    handles
}
