//! Dedicated planner worker thread.
//!
//! The search runs on its own thread so a time-bounded planning call never
//! blocks the periodic control loop. Hand-off uses one mutex/condvar pair
//! guarding the pending request, queued cost updates, and the latest
//! result: the worker waits while idle, the caller signals on new-goal or
//! resume. Cancellation is soft: a running search exits at its next budget
//! check and the best path found so far is kept.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{info, warn};
use parking_lot::{Condvar, Mutex};

use crate::config::PlannerConfig;
use crate::core::{GridCell, Pose2D};
use crate::error::{MargaError, Result};
use crate::search::{AdStarPlanner, PlanResult};

/// A planning request: start and goal in world coordinates.
#[derive(Clone, Copy, Debug)]
pub struct PlanRequest {
    pub start: Pose2D,
    pub goal: Pose2D,
}

#[derive(Default)]
struct WorkerState {
    pending: Option<PlanRequest>,
    last_request: Option<PlanRequest>,
    resume: bool,
    cost_updates: Vec<(GridCell, u8)>,
    latest: Option<PlanResult>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<WorkerState>,
    signal: Condvar,
}

/// Handle to the planner worker thread.
pub struct PlannerWorker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl PlannerWorker {
    /// Build the planner and spawn the worker thread.
    pub fn spawn(config: PlannerConfig) -> Result<Self> {
        // construct on the caller thread so configuration errors surface here
        let planner = AdStarPlanner::new(config)?;

        let shared = Arc::new(Shared {
            state: Mutex::new(WorkerState::default()),
            signal: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name("marga-plan".into())
            .spawn(move || run_worker(planner, worker_shared))
            .map_err(|e| MargaError::Worker(format!("Failed to spawn worker: {}", e)))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Request a plan to a (possibly new) goal. Wakes the worker; any
    /// not-yet-started previous request is superseded.
    pub fn set_goal(&self, start: Pose2D, goal: Pose2D) {
        let mut state = self.shared.state.lock();
        state.pending = Some(PlanRequest { start, goal });
        self.shared.signal.notify_one();
    }

    /// Re-run the last request, typically to tighten the suboptimality
    /// bound after a time-limited search. No-op before any request.
    pub fn resume(&self) {
        let mut state = self.shared.state.lock();
        if state.last_request.is_some() {
            state.resume = true;
            self.shared.signal.notify_one();
        }
    }

    /// Queue cell cost updates. They are applied by the worker strictly
    /// between searches, never concurrently with one.
    pub fn queue_cost_updates(&self, updates: &[(GridCell, u8)]) {
        let mut state = self.shared.state.lock();
        state.cost_updates.extend_from_slice(updates);
    }

    /// Latest finished result, if any.
    pub fn latest_result(&self) -> Option<PlanResult> {
        self.shared.state.lock().latest.clone()
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
        }
        self.shared.signal.notify_one();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("[PlannerWorker] worker thread panicked");
            }
        }
    }
}

impl Drop for PlannerWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop_and_join();
        }
    }
}

fn run_worker(mut planner: AdStarPlanner, shared: Arc<Shared>) {
    info!("[PlannerWorker] started");

    loop {
        // wait for a request, a resume signal, or shutdown
        let (request, updates) = {
            let mut state = shared.state.lock();
            let request = loop {
                if state.shutdown {
                    info!("[PlannerWorker] shutting down");
                    return;
                }
                if let Some(request) = state.pending.take() {
                    state.last_request = Some(request);
                    break request;
                }
                if state.resume {
                    state.resume = false;
                    if let Some(request) = state.last_request {
                        break request;
                    }
                }
                shared.signal.wait(&mut state);
            };
            (request, std::mem::take(&mut state.cost_updates))
        };

        // grid mutation happens here, strictly between searches
        if !updates.is_empty() && !planner.update_costs(&updates) {
            info!("[PlannerWorker] cost change scheduled a from-scratch search");
        }

        let result = planner.plan(request.start, request.goal);
        info!(
            "[PlannerWorker] plan finished: success={}, bound={:.2}, {} expansions",
            result.success, result.epsilon, result.expansions
        );

        let mut state = shared.state.lock();
        state.latest = Some(result);
    }
}
