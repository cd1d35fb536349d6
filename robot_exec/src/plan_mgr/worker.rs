//! Worker thread to allow planning to occur without blocking the control loop.

// -----------------------------------------------------------------------------------------------
// INCLUDES
// -----------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::Ordering,
        mpsc::{Receiver, Sender},
        Arc,
    },
    time::Instant,
};

use comms_if::goal::GoalSpec;
use log::{debug, warn};
use util::time::std_duration_to_seconds;

use crate::planning::{Plan, PlanRequest, Planner, PlanningError};

use super::{PlanMgrError, Shared};

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug)]
pub enum WorkerSignal {
    /// The worker should stop it's operations
    Stop,

    /// Plan for the request, tagged with its generation
    Plan(u64, Box<PlanRequest>),

    /// A plan was produced for the request of the given generation and goal
    Planned(u64, Box<Plan>, GoalSpec),

    /// Planning failed for the request of the given generation
    Failed(u64, PlanningError),
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

pub(super) fn worker_thread(
    shared: Arc<Shared>,
    mut planner: Planner,
    main_sender: Sender<WorkerSignal>,
    main_reciever: Receiver<WorkerSignal>,
) -> Result<(), PlanMgrError> {
    // Wait for commands from main
    while let Ok(signal) = main_reciever.recv() {
        match signal {
            WorkerSignal::Stop => break,
            WorkerSignal::Plan(generation, req) => {
                // A newer request was queued behind this one, so don't waste time on it
                if generation < shared.latest_generation.load(Ordering::SeqCst) {
                    debug!("Skipping superseded plan request {}", generation);
                    continue;
                }

                let start = Instant::now();
                let result = planner.plan(&req);
                debug!(
                    "Plan request {} took {:.4} s",
                    generation,
                    std_duration_to_seconds(start.elapsed())
                );

                match result {
                    Ok(plan) => main_sender.send(WorkerSignal::Planned(
                        generation,
                        Box::new(plan),
                        req.goal,
                    ))?,
                    Err(e) => main_sender.send(WorkerSignal::Failed(generation, e))?,
                }
            }
            s => warn!("Planning worker received unexpected signal {:?}", s),
        }
    }

    Ok(())
}
