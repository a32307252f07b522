//! Closed-loop straight-line distance controller.
//!
//! Each control period the controller measures distance traveled from the
//! average of both wheels' rotation since the motion began, feeds the
//! remaining distance through the lateral compensator, and holds the heading
//! captured at the start with a second compensator. Once the remaining
//! distance first drops below the near-target threshold, the speed ceiling is
//! lowered for a smooth approach, direction and minimum-speed rules are
//! lifted, and heading correction is switched off.

use std::time::{Duration, Instant};

use spin_sleep::SpinSleeper;
use strider_core::TelemetrySnapshot;
use strider_kinematics::{DifferentialDrive, angle_difference};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::drivetrain::Drivetrain;
use crate::exit::ExitCondition;
use crate::pid::{Pid, slew};
use crate::request::MotionRequest;
use crate::settings::ControllerSettings;

/// Native sleep accuracy handed to the period sleeper (ns).
const SLEEP_ACCURACY_NS: u32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Init,
    Converging,
    NearTarget,
    Done,
    Cancelled,
    TimedOut,
}

impl ControllerPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ControllerPhase::Done | ControllerPhase::Cancelled | ControllerPhase::TimedOut
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    Done,
    Cancelled,
    TimedOut,
}

impl From<MotionOutcome> for ControllerPhase {
    fn from(outcome: MotionOutcome) -> Self {
        match outcome {
            MotionOutcome::Done => ControllerPhase::Done,
            MotionOutcome::Cancelled => ControllerPhase::Cancelled,
            MotionOutcome::TimedOut => ControllerPhase::TimedOut,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCommand {
    pub left: f64,
    pub right: f64,
}

/// Result of one control period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Drive(DriveCommand),
    Finished(MotionOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionReport {
    pub outcome: MotionOutcome,
    /// Effective signed target.
    pub target: f64,
    pub traveled: f64,
    /// `target - traveled` at exit.
    pub remaining: f64,
    /// Control periods executed.
    pub periods: u32,
    /// Period in which the near-target phase began, if it did.
    pub near_target_at: Option<u32>,
    pub elapsed: Duration,
}

/// Run state for one active motion request.
#[derive(Debug, Clone)]
pub struct DistanceController {
    geometry: DifferentialDrive,
    period: Duration,
    near_target_threshold: f64,
    near_target_floor: f64,
    heading_limit: f64,
    slew: f64,

    target: f64,
    direction: f64,
    min_speed: f64,
    max_speed: f64,
    early_exit_range: f64,

    start_rotations: Option<(f64, f64)>,
    start_heading: Option<f64>,
    traveled: f64,
    heading_drift: f64,
    prev_output: f64,
    phase: ControllerPhase,
    lateral: Pid,
    heading: Pid,
    small_exit: ExitCondition,
    large_exit: ExitCondition,
    periods: u32,
    near_target_at: Option<u32>,
    fault_logged: bool,
}

impl DistanceController {
    pub fn new(request: &MotionRequest, settings: &ControllerSettings, geometry: DifferentialDrive) -> Self {
        let target = request.target();
        Self {
            geometry,
            period: settings.period(),
            near_target_threshold: settings.near_target_threshold,
            near_target_floor: settings.near_target_floor,
            heading_limit: settings.heading_limit,
            slew: settings.slew,

            target,
            direction: if target < 0.0 { -1.0 } else { 1.0 },
            min_speed: request.min_speed.abs(),
            max_speed: request.max_speed.abs(),
            early_exit_range: request.early_exit_range.abs(),

            start_rotations: None,
            start_heading: None,
            traveled: 0.0,
            heading_drift: 0.0,
            prev_output: 0.0,
            phase: ControllerPhase::Init,
            lateral: Pid::new(settings.lateral),
            heading: Pid::new(settings.heading),
            small_exit: settings.small_exit.into(),
            large_exit: settings.large_exit.into(),
            periods: 0,
            near_target_at: None,
            fault_logged: false,
        }
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn traveled(&self) -> f64 {
        self.traveled
    }

    pub fn remaining(&self) -> f64 {
        self.target - self.traveled
    }

    /// Current speed ceiling, lowered on entering the near-target phase.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// Capture the start pose (wheel rotations and heading) and leave `Init`.
    pub fn begin(&mut self, telemetry: &TelemetrySnapshot) {
        if self.phase != ControllerPhase::Init {
            return;
        }
        self.start_rotations = telemetry.wheel_rotations();
        self.start_heading = telemetry.heading();
        self.phase = ControllerPhase::Converging;
    }

    /// Execute one control period against the given telemetry.
    ///
    /// Timeout and cancellation are not checked here; [`run`](Self::run)
    /// handles those before each step.
    pub fn step(&mut self, telemetry: &TelemetrySnapshot) -> Step {
        match self.phase {
            ControllerPhase::Done => return Step::Finished(MotionOutcome::Done),
            ControllerPhase::Cancelled => return Step::Finished(MotionOutcome::Cancelled),
            ControllerPhase::TimedOut => return Step::Finished(MotionOutcome::TimedOut),
            ControllerPhase::Init => self.begin(telemetry),
            ControllerPhase::Converging | ControllerPhase::NearTarget => {}
        }
        self.periods += 1;
        self.update_traveled(telemetry);

        let remaining = self.remaining();
        if self.phase == ControllerPhase::Converging && remaining.abs() < self.near_target_threshold {
            self.phase = ControllerPhase::NearTarget;
            self.near_target_at = Some(self.periods);
            self.max_speed = self
                .prev_output
                .abs()
                .max(self.near_target_floor)
                .min(self.max_speed);
            debug!(period = self.periods, remaining, ceiling = self.max_speed, "near target");
        }
        let near = self.phase == ControllerPhase::NearTarget;

        if self.early_exit_range > 0.0 && remaining.abs() < self.early_exit_range {
            return self.finish(MotionOutcome::Done);
        }
        let small = self.small_exit.update(remaining, self.period);
        let large = self.large_exit.update(remaining, self.period);
        if near && (small || large) {
            return self.finish(MotionOutcome::Done);
        }

        let linear = self.linear_output(remaining, near);
        let correction = self.heading_correction(telemetry, near);
        let command = self.mix(linear, correction);
        debug!(
            period = self.periods,
            remaining,
            linear,
            correction,
            left = command.left,
            right = command.right,
            "distance controller step"
        );
        Step::Drive(command)
    }

    /// Drive the motion to a terminal state.
    ///
    /// Every period checks, in order: timeout, cancellation, convergence.
    /// The loop sleeps one control period between steps, which bounds the
    /// latency of a cancellation to one period. Zero output is commanded on
    /// every exit path before returning. `on_period` receives the distance
    /// traveled after each driven period.
    pub fn run<D, F>(
        mut self,
        drivetrain: &D,
        timeout: Duration,
        cancel: &CancellationToken,
        mut on_period: F,
    ) -> MotionReport
    where
        D: Drivetrain + ?Sized,
        F: FnMut(f64),
    {
        let sleeper = SpinSleeper::new(SLEEP_ACCURACY_NS);
        let started = Instant::now();
        self.begin(&drivetrain.telemetry());

        let outcome = loop {
            if started.elapsed() >= timeout {
                warn!(target = self.target, traveled = self.traveled, ?timeout, "distance motion timed out");
                break MotionOutcome::TimedOut;
            }
            if cancel.is_cancelled() {
                info!(target = self.target, traveled = self.traveled, "distance motion cancelled");
                break MotionOutcome::Cancelled;
            }
            match self.step(&drivetrain.telemetry()) {
                Step::Drive(command) => {
                    drivetrain.drive(command.left, command.right);
                    on_period(self.traveled);
                }
                Step::Finished(outcome) => break outcome,
            }
            sleeper.sleep(self.period);
        };

        drivetrain.stop();
        self.phase = outcome.into();
        MotionReport {
            outcome,
            target: self.target,
            traveled: self.traveled,
            remaining: self.remaining(),
            periods: self.periods,
            near_target_at: self.near_target_at,
            elapsed: started.elapsed(),
        }
    }

    fn finish(&mut self, outcome: MotionOutcome) -> Step {
        self.phase = outcome.into();
        Step::Finished(outcome)
    }

    fn update_traveled(&mut self, telemetry: &TelemetrySnapshot) {
        match (telemetry.wheel_rotations(), self.start_rotations) {
            (Some((left, right)), Some((left0, right0))) => {
                self.traveled = self.geometry.average_travel(left - left0, right - right0);
            }
            (Some(rotations), None) => self.start_rotations = Some(rotations),
            (None, _) => {
                if !self.fault_logged {
                    warn!(period = self.periods, "wheel rotation unavailable, holding distance traveled");
                    self.fault_logged = true;
                }
            }
        }
    }

    fn linear_output(&mut self, remaining: f64, near: bool) -> f64 {
        let raw = self
            .lateral
            .update(remaining)
            .clamp(-self.max_speed, self.max_speed);
        let mut out = slew(raw, self.prev_output, self.slew);

        if !near {
            // no reversal while far from the target
            out = if self.direction > 0.0 { out.max(0.0) } else { out.min(0.0) };
            if out != 0.0 && out.abs() < self.min_speed {
                out = self.min_speed * self.direction;
            }
        }
        self.prev_output = out;
        out
    }

    fn heading_correction(&mut self, telemetry: &TelemetrySnapshot, near: bool) -> f64 {
        if let Some(heading) = telemetry.heading() {
            let start = *self.start_heading.get_or_insert(heading);
            self.heading_drift = angle_difference(heading, start);
        }
        let correction = self
            .heading
            .update(self.heading_drift.to_degrees())
            .clamp(-self.heading_limit, self.heading_limit);
        if near { 0.0 } else { correction }
    }

    fn mix(&self, linear: f64, correction: f64) -> DriveCommand {
        let mut left = linear + correction;
        let mut right = linear - correction;
        let ratio = left.abs().max(right.abs()) / self.max_speed;
        if ratio > 1.0 {
            left /= ratio;
            right /= ratio;
        }
        DriveCommand { left, right }
    }
}
