//! # Plan manager
//!
//! Runs the planner on a worker thread so that a slow plan never holds up the control loop.
//!
//! Every request is stamped with a generation number. Results are only applied if they belong to
//! the most recent request, anything older is discarded, so a slow plan for an old goal can never
//! replace the plan for a newer one. Until a new result arrives the control loop keeps tracking
//! the active path, and if there has never been one it holds position.
//!
//! The active path is only ever replaced, never modified, so the control loop can't observe a
//! partially built path.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{channel, Receiver, RecvTimeoutError, SendError, Sender, TryRecvError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use comms_if::{
    goal::GoalSpec,
    robot::{MotionConstraints, RobotInstant, RotationConstraints},
};
use log::{error, info, warn};
use util::params::{self, LoadError};

use crate::{
    obstacle::ObstacleSet,
    path::{InterpolatedPath, Path, PathRef},
    planning::{
        Plan, PlanRequest, Planner, PlannerParams, PlanningError, PriorPlan,
        SingleRobotPathPlanner,
    },
};

use worker::worker_thread;
pub use worker::WorkerSignal;

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

mod worker;

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// Owns the planning worker and the active path of one robot.
#[derive(Debug)]
pub struct PlanMgr {
    shared: Arc<Shared>,

    worker_jh: Option<JoinHandle<Result<(), PlanMgrError>>>,

    worker_sender: Sender<WorkerSignal>,
    worker_reciever: Receiver<WorkerSignal>,

    /// Generation of the last request sent to the worker
    generation: u64,

    /// Generation of the last result applied
    applied_generation: u64,

    active: Option<ActivePlan>,

    /// Path used while there's no active plan, kept so the same path is tracked every cycle
    hold: Option<PathRef>,
}

/// The path currently being followed.
#[derive(Debug, Clone)]
pub struct ActivePlan {
    pub path: PathRef,

    /// Goal the path was planned for
    pub goal: GoalSpec,

    /// Strategy which planned the path
    pub planner: SingleRobotPathPlanner,

    /// Time at which the path starts
    pub started_at_s: f64,

    /// Generation of the request the path answered
    pub generation: u64,
}

/// What happened during one step of the manager.
#[derive(Debug, Default)]
pub struct PlanMgrOutput {
    /// True if the active path was replaced
    pub new_path: bool,

    /// Set if the most recent request failed
    pub failure: Option<PlanningError>,

    /// Number of results thrown away because a newer request had been made
    pub stale_discarded: usize,
}

#[derive(Debug)]
struct Shared {
    /// Generation of the most recent request, read by the worker to skip superseded requests
    pub latest_generation: AtomicU64,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlanMgrError {
    #[error("Couldn't load parameters: {0}")]
    ParamLoadError(LoadError),

    #[error("Couldn't start the planning worker: {0}")]
    WorkerSpawnError(std::io::Error),

    #[error("Failed to send signal {0:?} between threads")]
    SendError(Box<WorkerSignal>),

    #[error("The planning worker has stopped")]
    WorkerStopped,

    #[error("The planning worker panicked")]
    WorkerPanicked,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl PlanMgr {
    /// Create a new manager, loading the planner parameters from the given file relative to the
    /// parameters directory.
    pub fn init(params_path: &str) -> Result<Self, PlanMgrError> {
        let params: PlannerParams = params::load(params_path)?;
        Self::new(params)
    }

    /// Create a new manager and start its worker.
    pub fn new(params: PlannerParams) -> Result<Self, PlanMgrError> {
        let shared = Arc::new(Shared {
            latest_generation: AtomicU64::new(0),
        });
        let shared_worker = shared.clone();
        let planner = Planner::new(params);

        // Create channels
        let (worker_sender, rx) = channel();
        let (tx, worker_reciever) = channel();

        // Start worker thread
        let worker_jh = thread::Builder::new()
            .name("plan_mgr::worker".into())
            .spawn(move || worker_thread(shared_worker, planner, tx, rx))
            .map_err(PlanMgrError::WorkerSpawnError)?;

        Ok(Self {
            shared,
            worker_jh: Some(worker_jh),
            worker_sender,
            worker_reciever,
            generation: 0,
            applied_generation: 0,
            active: None,
            hold: None,
        })
    }

    /// Ask the worker for a new plan, superseding any request still in flight.
    ///
    /// The active path, if there is one, is offered to the planner for reuse. Returns the
    /// generation of the request.
    pub fn request(
        &mut self,
        start: RobotInstant,
        goal: GoalSpec,
        motion: MotionConstraints,
        rotation: RotationConstraints,
        obstacles: Arc<ObstacleSet>,
    ) -> Result<u64, PlanMgrError> {
        self.generation += 1;
        self.shared
            .latest_generation
            .store(self.generation, Ordering::SeqCst);

        let prior = self.active.as_ref().map(|a| PriorPlan {
            path: a.path.clone(),
            goal: a.goal,
            elapsed_s: start.stamp_s - a.started_at_s,
            planner: a.planner,
        });

        let req = PlanRequest {
            start,
            goal,
            motion,
            rotation,
            obstacles,
            prior,
        };

        self.worker_sender
            .send(WorkerSignal::Plan(self.generation, Box::new(req)))?;

        Ok(self.generation)
    }

    /// Apply any results the worker has produced, without blocking.
    pub fn step(&mut self) -> Result<PlanMgrOutput, PlanMgrError> {
        let mut output = PlanMgrOutput::default();

        loop {
            match self.worker_reciever.try_recv() {
                Ok(signal) => self.handle(signal, &mut output),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    error!("Planning worker has stopped");
                    return Err(PlanMgrError::WorkerStopped);
                }
            }
        }

        Ok(output)
    }

    /// Block until the most recent request has been answered or the timeout expires.
    pub fn wait(&mut self, timeout: Duration) -> Result<PlanMgrOutput, PlanMgrError> {
        let mut output = PlanMgrOutput::default();
        let deadline = Instant::now() + timeout;

        while self.applied_generation < self.generation {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.worker_reciever.recv_timeout(remaining) {
                Ok(signal) => self.handle(signal, &mut output),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Err(PlanMgrError::WorkerStopped),
            }
        }

        Ok(output)
    }

    /// The path to track this cycle and the time elapsed along it.
    ///
    /// Falls back to holding the given instant's position and heading if no plan has succeeded
    /// yet.
    pub fn path(&mut self, current: &RobotInstant) -> (PathRef, f64) {
        if let Some(a) = &self.active {
            return (a.path.clone(), current.stamp_s - a.started_at_s);
        }

        let hold = self
            .hold
            .get_or_insert_with(|| {
                warn!("No plan available, holding position");
                Arc::new(InterpolatedPath::hold(RobotInstant::stationary(
                    current.position_m,
                    current.heading_rad,
                    current.stamp_s,
                )))
            })
            .clone();

        (hold, 0.0)
    }

    pub fn active(&self) -> Option<&ActivePlan> {
        self.active.as_ref()
    }

    /// Drop the active path, for example once its goal has been reached and the robot should
    /// stay put.
    pub fn clear(&mut self) {
        self.active = None;
        self.hold = None;
    }

    /// Generation of the most recent request.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the worker and wait for it to finish.
    pub fn stop(&mut self) -> Result<(), PlanMgrError> {
        // The worker may already have gone, in which case there's nothing to stop
        let _ = self.worker_sender.send(WorkerSignal::Stop);

        match self.worker_jh.take() {
            Some(jh) => match jh.join() {
                Ok(r) => r,
                Err(_) => Err(PlanMgrError::WorkerPanicked),
            },
            None => Ok(()),
        }
    }

    fn handle(&mut self, signal: WorkerSignal, output: &mut PlanMgrOutput) {
        match signal {
            WorkerSignal::Planned(generation, _, _) | WorkerSignal::Failed(generation, _)
                if generation < self.generation =>
            {
                warn!(
                    "Discarding stale plan result {} (latest request is {})",
                    generation, self.generation
                );
                output.stale_discarded += 1;
            }
            WorkerSignal::Planned(generation, plan, goal) => {
                self.applied_generation = generation;
                self.apply(generation, *plan, goal, output);
            }
            WorkerSignal::Failed(generation, e) => {
                self.applied_generation = generation;
                warn!("Planning failed: {}", e);
                output.failure = Some(e);
            }
            s => warn!("Unexpected signal from planning worker: {:?}", s),
        }
    }

    fn apply(&mut self, generation: u64, plan: Plan, goal: GoalSpec, output: &mut PlanMgrOutput) {
        if plan.reused {
            if let Some(a) = self.active.as_mut() {
                a.generation = generation;
                a.goal = goal;
            }
            return;
        }

        info!(
            "New {:?} path of {:.3} s to ({:.3}, {:.3})",
            plan.planner,
            plan.path.duration(),
            plan.path.end().position_m.x,
            plan.path.end().position_m.y
        );

        self.active = Some(ActivePlan {
            started_at_s: plan.path.start().stamp_s,
            path: plan.path,
            goal,
            planner: plan.planner,
            generation,
        });
        self.hold = None;
        output.new_path = true;
    }
}

impl Drop for PlanMgr {
    fn drop(&mut self) {
        if self.worker_jh.is_some() {
            if let Err(e) = self.stop() {
                warn!("Error stopping planning worker: {}", e);
            }
        }
    }
}

impl From<LoadError> for PlanMgrError {
    fn from(e: LoadError) -> Self {
        Self::ParamLoadError(e)
    }
}

impl From<SendError<WorkerSignal>> for PlanMgrError {
    fn from(e: SendError<WorkerSignal>) -> Self {
        Self::SendError(Box::new(e.0))
    }
}
