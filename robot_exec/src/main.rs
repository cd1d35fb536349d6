//! Main robot-side executable entry point.
//!
//! # Architecture
//!
//! Runs a single robot through a scenario against a kinematic simulation:
//!
//!     - Initialise the session, logger and modules
//!     - Main loop:
//!         - Read the simulated robot state
//!         - Request a new plan periodically, when the goal changes, or after divergence
//!         - Apply any plan the worker has finished
//!         - Motion control processing
//!         - Step the simulation with the command
//!
//! Simulated time advances by one control period per cycle. With `--realtime` each cycle is
//! also padded out to the control period of wall clock time.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use nalgebra::Vector2;
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use comms_if::{cmd::MotionCmd, goal::GoalSpec, robot::RobotInstant};
use robot_lib::{
    motion_ctrl::{MotionCtrl, MotionCtrlError},
    plan_mgr::PlanMgr,
    scenario::ScenarioParams,
    sim::KinematicSim,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Time to wait for a plan before starting to move, and after each request when not running in
/// real time.
const PLAN_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

/// Goals closer than this to the last requested goal don't trigger a replan.
const GOAL_CHANGE_TOLERANCE: f64 = 1e-3;

/// Number of cycles between tracking status logs.
const STATUS_LOG_INTERVAL: u64 = 50;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "robot_exec", about = "Single robot motion planning and tracking")]
struct Opts {
    /// Scenario file, relative to the parameters directory
    #[structopt(default_value = "scenario.toml")]
    scenario: String,

    /// Minimum level of log records, at least `info`
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,

    /// Send the robot to this point instead of the scenario's goal
    #[structopt(long, number_of_values = 2, allow_hyphen_values = true)]
    goal: Option<Vec<f64>>,

    /// Pace each cycle to the control period
    #[structopt(long)]
    realtime: bool,
}

/// One recorded cycle, saved to the session at the end of the run.
#[derive(Debug, Serialize)]
struct TrajectorySample {
    state: RobotInstant,
    target: RobotInstant,
    cmd: MotionCmd,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("robot_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opts.log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Robot Motion Executable\n");
    info!(
        "Software root: {:?}",
        host::get_sw_root().wrap_err("Failed to get the software root")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut scenario: ScenarioParams = util::params::load(&opts.scenario)
        .wrap_err_with(|| format!("Failed to load the scenario from {}", opts.scenario))?;

    if let Some(g) = &opts.goal {
        if g.len() != 2 {
            return Err(eyre!("Expected an X and Y goal position, found {} values", g.len()));
        }
        info!("Overriding scenario goal with ({:.3}, {:.3})", g[0], g[1]);
        scenario.goal = GoalSpec::point(Vector2::new(g[0], g[1]));
    }

    info!("Scenario loaded from {}", opts.scenario);
    debug!("{:#?}", scenario);

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut motion_ctrl = MotionCtrl::init("motion_ctrl.toml", scenario.motion, scenario.rotation)
        .wrap_err("Failed to initialise MotionCtrl")?;
    info!("MotionCtrl init complete");

    let mut plan_mgr = PlanMgr::init("planner.toml").wrap_err("Failed to initialise PlanMgr")?;
    info!("PlanMgr init complete");

    let mut sim = KinematicSim::new(scenario.start_instant(), scenario.sim);
    info!("Simulation init complete");

    info!("Module initialisation complete\n");

    let cycle_period_s = motion_ctrl.params().cycle_period_s;
    let obstacles = scenario.obstacle_snapshot();

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut trajectory = Vec::new();
    let mut requested_goal: Option<GoalSpec> = None;
    let mut last_request_s = std::f64::NEG_INFINITY;
    let mut force_replan = false;
    let mut reached = false;
    let mut num_cycles: u64 = 0;

    while sim.state().stamp_s < scenario.run_time_s {
        let cycle_start_instant = Instant::now();
        let current = sim.state();

        // ---- PLANNING ----

        let goal_changed = requested_goal
            .map_or(true, |g| !g.same_as(&scenario.goal, GOAL_CHANGE_TOLERANCE));
        if goal_changed
            || force_replan
            || (!reached && current.stamp_s - last_request_s >= scenario.replan_period_s)
        {
            let generation = plan_mgr
                .request(
                    current,
                    scenario.goal,
                    scenario.motion,
                    scenario.rotation,
                    obstacles.clone(),
                )
                .wrap_err("Failed to request a plan")?;
            debug!("Requested plan {} at {:.3} s", generation, current.stamp_s);

            requested_goal = Some(scenario.goal);
            last_request_s = current.stamp_s;
            force_replan = false;

            // Without pacing the loop would outrun the worker, so wait for the answer
            if !opts.realtime || generation == 1 {
                report_plan(plan_mgr.wait(PLAN_WAIT_TIMEOUT).wrap_err("PlanMgr failed")?);
            }
        }

        report_plan(plan_mgr.step().wrap_err("PlanMgr failed")?);

        // ---- MOTION CONTROL ----

        let (path, elapsed_s) = plan_mgr.path(&current);
        let cmd = match motion_ctrl.tick(&current, &path, elapsed_s) {
            Ok((cmd, report)) => {
                if report.reached && !reached {
                    info!(
                        "Goal reached at {:.3} s, {:.3} m from the end of the path",
                        current.stamp_s, report.position_error_m
                    );
                }
                reached = report.reached;

                if num_cycles % STATUS_LOG_INTERVAL == 0 {
                    debug!(
                        "t = {:.3} s, error {:.3} m / {:.3} rad, {:.3} s remaining",
                        current.stamp_s,
                        report.position_error_m,
                        report.heading_error_rad,
                        report.remaining_s
                    );
                }

                trajectory.push(TrajectorySample {
                    state: current,
                    target: report.target,
                    cmd,
                });

                cmd
            }
            Err(MotionCtrlError::ControlDivergence { error_m, limit_m }) => {
                warn!(
                    "Robot has diverged {:.3} m from its path (limit {:.3} m), replanning",
                    error_m, limit_m
                );
                motion_ctrl.reset();
                force_replan = true;
                MotionCmd::stop()
            }
            Err(e) => return Err(e).wrap_err("Error during MotionCtrl processing"),
        };

        // ---- SIMULATION ----

        sim.step(&cmd, cycle_period_s);

        // ---- CYCLE MANAGEMENT ----

        if opts.realtime {
            let cycle_dur = Instant::now() - cycle_start_instant;

            match Duration::from_secs_f64(cycle_period_s).checked_sub(cycle_dur) {
                Some(d) => thread::sleep(d),
                None => warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period_s
                ),
            }
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    let end = sim.state();
    match scenario.goal.target_position() {
        Some(t) => info!(
            "Finished at ({:.3}, {:.3}), {:.3} m from the goal",
            end.position_m.x,
            end.position_m.y,
            (t - end.position_m).norm()
        ),
        None => info!(
            "Finished at ({:.3}, {:.3}) heading {:.3} rad",
            end.position_m.x, end.position_m.y, end.heading_rad
        ),
    }

    if !reached {
        warn!("Goal not reached within {:.1} s", scenario.run_time_s);
    }

    plan_mgr.stop().wrap_err("Failed to stop PlanMgr")?;

    session.save("trajectory.json", trajectory);
    session.exit();

    info!("End of execution");

    Ok(())
}

/// Log what happened to any plans applied this cycle.
fn report_plan(output: robot_lib::plan_mgr::PlanMgrOutput) {
    if let Some(e) = output.failure {
        warn!("Planning failed, keeping the previous path: {}", e);
    }
    if output.stale_discarded > 0 {
        debug!("{} stale plan(s) discarded", output.stale_discarded);
    }
}
