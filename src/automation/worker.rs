//! Single-worker run pipeline.
//!
//! One dedicated thread executes at most one automation run at a time,
//! consuming run requests from a queue and posting results to a result
//! queue; the caller polls the result side. Everything inside a run is
//! sequential because every operation ultimately serializes on one
//! simulated mouse and keyboard.

use tokio::sync::mpsc;

use crate::automation::workflow::{RunOutcome, WorkflowManager};
use crate::slots::{Slot, TextureMap};

/// One queued automation job.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub slots: Vec<Slot>,
    pub previous_map: TextureMap,
    pub full_run: bool,
}

/// Helper function to create the worker channels.
pub fn create_worker_channels() -> (
    mpsc::Sender<RunRequest>,
    mpsc::Receiver<RunRequest>,
    mpsc::Sender<RunOutcome>,
    mpsc::Receiver<RunOutcome>,
) {
    let (request_tx, request_rx) = mpsc::channel(32);
    let (result_tx, result_rx) = mpsc::channel(32);
    (request_tx, request_rx, result_tx, result_rx)
}

/// Spawn the dedicated automation worker thread.
///
/// The worker re-arms the manager's cancel token before each run, so a stop
/// request only ever affects the run it was issued against. Dropping the
/// request sender shuts the worker down after the in-flight run.
pub fn spawn_worker(
    mut manager: WorkflowManager,
    mut request_rx: mpsc::Receiver<RunRequest>,
    result_tx: mpsc::Sender<RunOutcome>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        log::info!("Automation worker ready for jobs");
        while let Some(job) = request_rx.blocking_recv() {
            manager.cancel_token().reset();
            let outcome = manager.run(&job.slots, &job.previous_map, job.full_run);
            if result_tx.blocking_send(outcome).is_err() {
                break;
            }
        }
        log::info!("Automation worker shutting down");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::config::AutomationConfig;
    use crate::automation::workflow::RunStatus;
    use crate::cancel::CancelToken;
    use crate::logging::Logger;

    fn manager() -> WorkflowManager {
        WorkflowManager::new(
            "assets",
            AutomationConfig::default(),
            CancelToken::new(),
            Logger::stdout(),
        )
    }

    #[test]
    fn worker_processes_jobs_and_exits_when_the_queue_closes() {
        let (request_tx, request_rx, result_tx, mut result_rx) = create_worker_channels();
        let handle = spawn_worker(manager(), request_rx, result_tx);

        request_tx
            .blocking_send(RunRequest {
                slots: Vec::new(),
                previous_map: TextureMap::new(),
                full_run: true,
            })
            .unwrap();

        let outcome = result_rx.blocking_recv().expect("worker posts a result");
        assert_eq!(outcome.status, RunStatus::Success);

        drop(request_tx);
        handle.join().unwrap();
    }

    #[test]
    fn worker_rearms_the_token_between_runs() {
        let manager = manager();
        let token = manager.cancel_token();
        let (request_tx, request_rx, result_tx, mut result_rx) = create_worker_channels();
        let handle = spawn_worker(manager, request_rx, result_tx);

        // A stale stop request from a previous run must not poison the next
        token.request_stop();
        request_tx
            .blocking_send(RunRequest {
                slots: Vec::new(),
                previous_map: TextureMap::new(),
                full_run: true,
            })
            .unwrap();

        let outcome = result_rx.blocking_recv().expect("worker posts a result");
        assert_eq!(outcome.status, RunStatus::Success);

        drop(request_tx);
        handle.join().unwrap();
    }
}
