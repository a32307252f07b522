//! Simulated drivetrain and landmark sensor used by the demo binary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use spin_sleep::SpinSleeper;
use strider_core::{Blackboard, TelemetrySnapshot, TelemetrySource};
use strider_kinematics::{ChassisSpeeds, DifferentialDrive, Pose, WheelSpeeds};
use strider_localization::{LandmarkMap, LandmarkObservation, ObservationSource};
use strider_motion::Drivetrain;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Plant {
    pose: Pose,
    command: WheelSpeeds,
    left_rotation: f64,
    right_rotation: f64,
    sequence: u64,
}

/// A differential drivetrain with ideal wheel-speed tracking.
///
/// Per-side commands are scaled so that `max_command` maps to the ground
/// speed of a wheel turning at `max_wheel_speed`, then resolved into wheel
/// speeds through the drive's inverse kinematics.
/// [`run`](Self::run) integrates the plant once per period and publishes
/// telemetry to the blackboard.
#[derive(Debug)]
pub struct SimDrivetrain {
    geometry: DifferentialDrive,
    max_wheel_speed: f64,
    max_command: f64,
    blackboard: Arc<Blackboard>,
    plant: Mutex<Plant>,
}

impl SimDrivetrain {
    pub fn new(
        geometry: DifferentialDrive,
        max_wheel_speed: f64,
        max_command: f64,
        start: Pose,
        blackboard: Arc<Blackboard>,
    ) -> Self {
        let sim = Self {
            geometry,
            max_wheel_speed,
            max_command,
            blackboard,
            plant: Mutex::new(Plant {
                pose: start,
                ..Plant::default()
            }),
        };
        sim.publish(&sim.plant.lock(), 0.0, 0.0);
        sim
    }

    /// Ground-truth pose of the simulated robot.
    pub fn true_pose(&self) -> Pose {
        self.plant.lock().pose
    }

    /// Ground speed of one side for a saturated command.
    fn side_speed(&self, command: f64) -> f64 {
        let fraction = command.clamp(-self.max_command, self.max_command) / self.max_command;
        fraction * self.max_wheel_speed * self.geometry.wheel_radius()
    }

    /// Wheel speeds that realize the given per-side ground speeds.
    fn wheel_speeds(&self, left: f64, right: f64) -> WheelSpeeds {
        let chassis = ChassisSpeeds::new((left + right) / 2.0, (right - left) / self.geometry.track_width());
        self.geometry.inverse_kinematics(chassis)
    }

    fn publish(&self, plant: &Plant, v: f64, omega: f64) {
        self.blackboard.telemetry.publish(TelemetrySnapshot {
            sequence: plant.sequence,
            left_rotation: Some(plant.left_rotation),
            right_rotation: Some(plant.right_rotation),
            forward_velocity: Some(v),
            yaw_rate: Some(omega),
            heading: Some(plant.pose.theta),
            captured_at: Instant::now(),
        });
    }

    fn advance(&self, dt: f64) {
        let mut plant = self.plant.lock();
        let command = plant.command;
        match self.geometry.update_pose(plant.pose, command, dt) {
            Ok(pose) => plant.pose = pose,
            Err(e) => {
                warn!(error = %e, "drivetrain integration skipped");
                return;
            }
        }
        plant.left_rotation += command.omega_l * dt;
        plant.right_rotation += command.omega_r * dt;
        plant.sequence += 1;

        let speeds = self.geometry.forward_kinematics(command);
        self.publish(&plant, speeds.v, speeds.omega);
    }

    /// Integrate and publish every `period` until cancelled.
    pub fn run(&self, period: Duration, cancel: &CancellationToken) {
        info!(?period, geometry = %self.geometry, "drivetrain simulation started");
        let sleeper = SpinSleeper::new(10_000);
        let mut last = Instant::now();
        while !cancel.is_cancelled() {
            sleeper.sleep(period);
            let now = Instant::now();
            self.advance((now - last).as_secs_f64());
            last = now;
        }
        info!(pose = %self.true_pose(), "drivetrain simulation stopped");
    }
}

impl TelemetrySource for SimDrivetrain {
    fn telemetry(&self) -> Arc<TelemetrySnapshot> {
        self.blackboard.telemetry()
    }
}

impl Drivetrain for SimDrivetrain {
    fn geometry(&self) -> DifferentialDrive {
        self.geometry
    }

    fn drive(&self, left: f64, right: f64) {
        let command = self.wheel_speeds(self.side_speed(left), self.side_speed(right));
        self.plant.lock().command = command;
    }
}

/// Landmark sensor that sees every landmark within range of the true pose,
/// with Gaussian noise on each coordinate.
#[derive(Debug)]
pub struct SimLandmarkSensor {
    drivetrain: Arc<SimDrivetrain>,
    map: Arc<LandmarkMap>,
    range: f64,
    noise_std: f64,
    rng: Mutex<StdRng>,
}

impl SimLandmarkSensor {
    pub fn new(
        drivetrain: Arc<SimDrivetrain>,
        map: Arc<LandmarkMap>,
        range: f64,
        noise_std: f64,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            drivetrain,
            map,
            range,
            noise_std,
            rng: Mutex::new(rng),
        }
    }
}

impl ObservationSource for SimLandmarkSensor {
    fn observations(&self) -> Vec<LandmarkObservation> {
        let pose = self.drivetrain.true_pose();
        let (s, c) = pose.theta.sin_cos();
        let mut rng = self.rng.lock();
        let observations: Vec<LandmarkObservation> = self
            .map
            .iter()
            .filter_map(|landmark| {
                let (dx, dy) = (landmark.x - pose.x, landmark.y - pose.y);
                let mut noise = || rng.sample::<f64, _>(StandardNormal) * self.noise_std;
                let observation = LandmarkObservation::new(c * dx + s * dy + noise(), -s * dx + c * dy + noise());
                (observation.range() <= self.range).then_some(observation)
            })
            .collect();
        debug!(count = observations.len(), "landmarks detected");
        observations
    }
}
