use rand::Rng;
use rand_distr::StandardNormal;
use strider_kinematics::Pose;

use crate::error::LocalizationError;

/// Total weight below which a set is treated as collapsed.
pub const COLLAPSED_WEIGHT: f64 = 1e-300;

/// Per-axis standard deviations of a pose distribution.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseStd {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl PoseStd {
    pub const ZERO: PoseStd = PoseStd::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    pub(crate) fn is_valid(&self) -> bool {
        [self.x, self.y, self.theta].iter().all(|s| s.is_finite() && *s >= 0.0)
    }

    /// Draw a pose around `mean`.
    pub fn perturb<R: Rng + ?Sized>(&self, mean: Pose, rng: &mut R) -> Pose {
        Pose::new(
            mean.x + gaussian(rng, self.x),
            mean.y + gaussian(rng, self.y),
            mean.theta + gaussian(rng, self.theta),
        )
    }
}

fn gaussian<R: Rng + ?Sized>(rng: &mut R, std: f64) -> f64 {
    if std == 0.0 {
        return 0.0;
    }
    let n: f64 = rng.sample(StandardNormal);
    n * std
}

/// A weighted pose hypothesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub pose: Pose,
    pub weight: f64,
}

impl Particle {
    pub fn new(pose: Pose, weight: f64) -> Self {
        Self { pose, weight }
    }
}

/// A fixed-cardinality set of particles.
///
/// No operation changes the number of particles.
#[derive(Debug, Clone)]
pub struct ParticleSet {
    particles: Vec<Particle>,
}

impl ParticleSet {
    pub fn from_particles(particles: Vec<Particle>) -> Result<Self, LocalizationError> {
        if particles.is_empty() {
            return Err(LocalizationError::EmptyParticleSet);
        }
        Ok(Self { particles })
    }

    /// Seed `count` equally weighted particles around `mean`.
    pub fn sample<R: Rng + ?Sized>(
        mean: Pose,
        std: PoseStd,
        count: usize,
        rng: &mut R,
    ) -> Result<Self, LocalizationError> {
        let weight = 1.0 / count as f64;
        let particles = (0..count)
            .map(|_| Particle::new(std.perturb(mean, rng), weight))
            .collect();
        Self::from_particles(particles)
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.particles.iter_mut()
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    pub fn total_weight(&self) -> f64 {
        self.particles.iter().map(|p| p.weight).sum()
    }

    fn set_uniform(&mut self) {
        let weight = 1.0 / self.particles.len() as f64;
        for p in &mut self.particles {
            p.weight = weight;
        }
    }

    /// Scale weights to sum to one.
    ///
    /// A set whose total weight has collapsed (or is not finite) is reset to
    /// uniform weights instead. Returns `false` when that happened.
    pub fn normalize(&mut self) -> bool {
        for p in &mut self.particles {
            if !(p.weight.is_finite() && p.weight > 0.0) {
                p.weight = 0.0;
            }
        }
        let total = self.total_weight();
        if !total.is_finite() || total <= COLLAPSED_WEIGHT {
            self.set_uniform();
            return false;
        }
        for p in &mut self.particles {
            p.weight /= total;
        }
        true
    }

    /// Low-variance (systematic) resampling.
    ///
    /// One uniform draw places `N` evenly spaced pointers over the cumulative
    /// weight; each pointer selects the particle whose span it lands in. The
    /// resampled set carries uniform weights.
    pub fn resample<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let n = self.particles.len();
        let total = self.total_weight();
        if !total.is_finite() || total <= COLLAPSED_WEIGHT {
            self.set_uniform();
            return;
        }
        let step = total / n as f64;
        let offset = rng.random::<f64>() * step;

        let mut resampled = Vec::with_capacity(n);
        let mut index = 0;
        let mut cumulative = self.particles[0].weight;
        for m in 0..n {
            let pointer = offset + m as f64 * step;
            while pointer > cumulative && index + 1 < n {
                index += 1;
                cumulative += self.particles[index].weight;
            }
            resampled.push(Particle::new(self.particles[index].pose, 1.0 / n as f64));
        }
        self.particles = resampled;
    }

    /// Weighted mean pose (circular mean for heading) and the highest-weight
    /// particle's pose.
    pub fn estimate(&self) -> (Pose, Pose) {
        let total = self.total_weight();
        let uniform = 1.0 / self.particles.len() as f64;
        let weight_of = |p: &Particle| {
            if total.is_finite() && total > COLLAPSED_WEIGHT {
                p.weight / total
            } else {
                uniform
            }
        };

        let (mut x, mut y, mut sin, mut cos) = (0.0, 0.0, 0.0, 0.0);
        for p in &self.particles {
            let w = weight_of(p);
            x += w * p.pose.x;
            y += w * p.pose.y;
            sin += w * p.pose.theta.sin();
            cos += w * p.pose.theta.cos();
        }
        let mean = Pose::new(x, y, sin.atan2(cos));

        let best = self
            .particles
            .iter()
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
            .map_or(mean, |p| p.pose);
        (mean, best)
    }
}
