//! Sequential Monte Carlo pose estimation against a landmark map.

use std::f64::consts::PI;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strider_core::PoseEstimate;
use strider_kinematics::{ChassisSpeeds, Pose};
use tracing::{debug, warn};

use crate::error::LocalizationError;
use crate::map::LandmarkMap;
use crate::observation::LandmarkObservation;
use crate::particle::{ParticleSet, PoseStd};

/// Per-axis standard deviation of the landmark measurement model.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkStd {
    pub x: f64,
    pub y: f64,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSettings {
    pub particles: usize,
    /// Cycle period; also the prediction time step.
    pub period_ms: u64,
    /// Spread of the initial particle cloud around the starting pose.
    pub initial_std: PoseStd,
    /// Noise injected into every particle on every prediction.
    pub motion_std: PoseStd,
    /// Observations farther than this are ignored.
    pub sensor_range: f64,
    pub landmark_std: LandmarkStd,
    /// Fixed RNG seed; `None` seeds from the operating system.
    pub seed: Option<u64>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            particles: 100,
            period_ms: 20,
            initial_std: PoseStd::new(1.0, 1.0, 0.05),
            motion_std: PoseStd::new(0.05, 0.05, 0.01),
            sensor_range: 50.0,
            landmark_std: LandmarkStd { x: 0.3, y: 0.3 },
            seed: None,
        }
    }
}

impl FilterSettings {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Prediction time step in seconds.
    pub fn dt(&self) -> f64 {
        self.period().as_secs_f64()
    }

    pub fn validate(&self) -> Result<(), LocalizationError> {
        if self.particles == 0 {
            return Err(LocalizationError::InvalidSettings("particle count must be positive"));
        }
        if self.period_ms == 0 {
            return Err(LocalizationError::InvalidSettings("cycle period must be positive"));
        }
        if !(self.initial_std.is_valid() && self.motion_std.is_valid()) {
            return Err(LocalizationError::InvalidSettings(
                "pose standard deviations must be finite and non-negative",
            ));
        }
        let LandmarkStd { x, y } = self.landmark_std;
        if !(x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0) {
            return Err(LocalizationError::InvalidSettings(
                "landmark standard deviations must be finite and positive",
            ));
        }
        if !(self.sensor_range.is_finite() && self.sensor_range > 0.0) {
            return Err(LocalizationError::InvalidSettings("sensor range must be positive"));
        }
        Ok(())
    }
}

/// Particle filter state: the particle set, its RNG and a cycle counter.
#[derive(Debug, Clone)]
pub struct ParticleFilter {
    settings: FilterSettings,
    particles: ParticleSet,
    rng: StdRng,
    cycle: u64,
    motion_fault_logged: bool,
}

impl ParticleFilter {
    /// Seed `settings.particles` particles around `start` using `settings.initial_std`.
    pub fn new(settings: FilterSettings, start: Pose) -> Result<Self, LocalizationError> {
        let std = settings.initial_std;
        Self::with_initial_std(settings, start, std)
    }

    pub fn with_initial_std(settings: FilterSettings, start: Pose, std: PoseStd) -> Result<Self, LocalizationError> {
        settings.validate()?;
        if !std.is_valid() {
            return Err(LocalizationError::InvalidSettings(
                "pose standard deviations must be finite and non-negative",
            ));
        }
        let mut rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let particles = ParticleSet::sample(start, std, settings.particles, &mut rng)?;
        Ok(Self {
            settings,
            particles,
            rng,
            cycle: 0,
            motion_fault_logged: false,
        })
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Advance every particle by the measured chassis motion over one period,
    /// then perturb it with the motion noise.
    ///
    /// Missing motion telemetry is treated as standing still; the noise is
    /// still applied.
    pub fn predict(&mut self, motion: Option<ChassisSpeeds>) {
        let speeds = match motion {
            Some(speeds) => {
                self.motion_fault_logged = false;
                speeds
            }
            None => {
                if !self.motion_fault_logged {
                    warn!(cycle = self.cycle, "motion telemetry unavailable, predicting no motion");
                    self.motion_fault_logged = true;
                }
                ChassisSpeeds::new(0.0, 0.0)
            }
        };
        let dt = self.settings.dt();
        let noise = self.settings.motion_std;
        for particle in self.particles.iter_mut() {
            let moved = particle.pose.integrate(speeds, dt);
            particle.pose = noise.perturb(moved, &mut self.rng);
        }
    }

    /// Multiply each particle's weight by the likelihood of the observations.
    ///
    /// Observations out of sensor range or with non-finite coordinates are
    /// dropped first. Returns how many observations were used; with none, the
    /// weights are left untouched.
    pub fn update_weights(&mut self, observations: &[LandmarkObservation], map: &LandmarkMap) -> usize {
        let range = self.settings.sensor_range;
        let valid: Vec<LandmarkObservation> = observations.iter().copied().filter(|o| o.is_valid(range)).collect();
        if valid.is_empty() || map.is_empty() {
            return 0;
        }

        let LandmarkStd { x: sx, y: sy } = self.settings.landmark_std;
        let norm = 1.0 / (2.0 * PI * sx * sy);
        for particle in self.particles.iter_mut() {
            let mut likelihood = 1.0;
            for observation in &valid {
                let (wx, wy) = particle.pose.to_world(observation.x, observation.y);
                if let Some(landmark) = map.nearest(wx, wy) {
                    let dx = wx - landmark.x;
                    let dy = wy - landmark.y;
                    likelihood *= norm * (-(dx * dx / (2.0 * sx * sx) + dy * dy / (2.0 * sy * sy))).exp();
                }
            }
            particle.weight *= likelihood;
        }
        valid.len()
    }

    /// Run one full cycle: predict, weigh, normalize, estimate, resample.
    ///
    /// The returned estimate is taken from the weighted set before
    /// resampling flattens the weights.
    pub fn step(
        &mut self,
        motion: Option<ChassisSpeeds>,
        observations: &[LandmarkObservation],
        map: &LandmarkMap,
    ) -> PoseEstimate {
        self.predict(motion);
        let used = self.update_weights(observations, map);
        if !self.particles.normalize() {
            warn!(cycle = self.cycle, observations = used, "particle weights collapsed, reset to uniform");
        }
        let (pose, best) = self.particles.estimate();
        self.particles.resample(&mut self.rng);
        self.cycle += 1;
        debug!(cycle = self.cycle, observations = used, %pose, %best, "filter cycle");

        PoseEstimate {
            pose,
            best,
            cycle: self.cycle,
            observations: used,
            published_at: Instant::now(),
        }
    }
}
