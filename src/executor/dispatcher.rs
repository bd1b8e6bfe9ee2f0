use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;
use std::time::Instant;

use tracing::{trace, warn};

use super::channel::Command;

pub(super) fn run_worker(receiver: &Receiver<Command>) {
    // Shutdown is queued behind pending work, so everything submitted before it still runs.
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Shutdown => break,
            Command::Run { label, job } => {
                let started = Instant::now();
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!(op = label, "worker job panicked; its caller sees a dropped reply");
                }
                trace!(op = label, elapsed = ?started.elapsed(), "worker job finished");
            }
        }
    }
}
