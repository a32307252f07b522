#![allow(dead_code)]

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use strider_core::{TelemetrySnapshot, TelemetrySource};
use strider_kinematics::DifferentialDrive;
use strider_motion::Drivetrain;

pub const TRACK_WIDTH: f64 = 11.5;

/// Unit wheel radius: one radian of wheel rotation is one unit of travel.
pub fn geometry() -> DifferentialDrive {
    DifferentialDrive::new(1.0, TRACK_WIDTH).unwrap()
}

#[derive(Debug, Default)]
struct Wheels {
    sequence: u64,
    left: f64,
    right: f64,
    heading: f64,
}

/// Drivetrain whose wheels move in proportion to the last command, one
/// control period per `drive` call.
#[derive(Debug)]
pub struct SimDrive {
    /// Travel per period per unit of command.
    gain: f64,
    wheels: Mutex<Wheels>,
    commands: Mutex<Vec<(f64, f64)>>,
}

impl SimDrive {
    pub fn new(gain: f64) -> Arc<Self> {
        Arc::new(Self {
            gain,
            wheels: Mutex::default(),
            commands: Mutex::default(),
        })
    }

    /// A drivetrain that never moves, whatever it is told.
    pub fn stuck() -> Arc<Self> {
        Self::new(0.0)
    }

    pub fn position(&self) -> f64 {
        let wheels = self.wheels.lock();
        (wheels.left + wheels.right) / 2.0
    }

    pub fn commands(&self) -> Vec<(f64, f64)> {
        self.commands.lock().clone()
    }

    pub fn last_command(&self) -> Option<(f64, f64)> {
        self.commands.lock().last().copied()
    }
}

impl TelemetrySource for SimDrive {
    fn telemetry(&self) -> Arc<TelemetrySnapshot> {
        let wheels = self.wheels.lock();
        Arc::new(TelemetrySnapshot {
            sequence: wheels.sequence,
            left_rotation: Some(wheels.left),
            right_rotation: Some(wheels.right),
            forward_velocity: None,
            yaw_rate: None,
            heading: Some(wheels.heading),
            captured_at: Instant::now(),
        })
    }
}

impl Drivetrain for SimDrive {
    fn geometry(&self) -> DifferentialDrive {
        geometry()
    }

    fn drive(&self, left: f64, right: f64) {
        self.commands.lock().push((left, right));
        let mut wheels = self.wheels.lock();
        let (dl, dr) = (left * self.gain, right * self.gain);
        wheels.left += dl;
        wheels.right += dr;
        wheels.heading = strider_kinematics::normalize_angle(wheels.heading + (dr - dl) / TRACK_WIDTH);
        wheels.sequence += 1;
    }
}

/// Telemetry that advances a fixed distance on every read, regardless of
/// the commanded output.
#[derive(Debug)]
pub struct ConveyorDrive {
    per_read: f64,
    reads: Mutex<u64>,
    commands: Mutex<Vec<(f64, f64)>>,
}

impl ConveyorDrive {
    pub fn new(per_read: f64) -> Arc<Self> {
        Arc::new(Self {
            per_read,
            reads: Mutex::new(0),
            commands: Mutex::default(),
        })
    }

    pub fn commands(&self) -> Vec<(f64, f64)> {
        self.commands.lock().clone()
    }
}

impl TelemetrySource for ConveyorDrive {
    fn telemetry(&self) -> Arc<TelemetrySnapshot> {
        let mut reads = self.reads.lock();
        let traveled = *reads as f64 * self.per_read;
        *reads += 1;
        Arc::new(TelemetrySnapshot {
            sequence: *reads,
            left_rotation: Some(traveled),
            right_rotation: Some(traveled),
            heading: Some(0.0),
            ..TelemetrySnapshot::default()
        })
    }
}

impl Drivetrain for ConveyorDrive {
    fn geometry(&self) -> DifferentialDrive {
        geometry()
    }

    fn drive(&self, left: f64, right: f64) {
        self.commands.lock().push((left, right));
    }
}
