#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A landmark detection relative to the robot: `x` ahead, `y` to the left.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkObservation {
    pub x: f64,
    pub y: f64,
}

impl LandmarkObservation {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn range(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Finite and no farther than `sensor_range`.
    pub fn is_valid(&self, sensor_range: f64) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.range() <= sensor_range
    }
}

/// Producer of the landmark detections for one filter cycle.
///
/// Each call hands over the detections made since the previous call; an
/// empty vector means nothing was seen.
pub trait ObservationSource: Send + Sync {
    fn observations(&self) -> Vec<LandmarkObservation>;
}

impl<F> ObservationSource for F
where
    F: Fn() -> Vec<LandmarkObservation> + Send + Sync,
{
    fn observations(&self) -> Vec<LandmarkObservation> {
        self()
    }
}

/// A sensor that never sees anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObservations;

impl ObservationSource for NoObservations {
    fn observations(&self) -> Vec<LandmarkObservation> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_gating() {
        assert!(LandmarkObservation::new(30.0, 40.0).is_valid(50.0));
        assert!(!LandmarkObservation::new(30.0, 40.1).is_valid(50.0));
        assert!(!LandmarkObservation::new(f64::NAN, 1.0).is_valid(50.0));
        assert!(!LandmarkObservation::new(1.0, f64::INFINITY).is_valid(50.0));
    }

    #[test]
    fn test_closure_source() {
        let source = || vec![LandmarkObservation::new(1.0, 2.0)];
        assert_eq!(source.observations().len(), 1);
        assert!(NoObservations.observations().is_empty());
    }
}
