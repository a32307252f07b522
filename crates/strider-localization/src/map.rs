#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A known landmark position in the world frame.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(id: u32, x: f64, y: f64) -> Self {
        Self { id, x, y }
    }

    fn distance_sq(&self, x: f64, y: f64) -> f64 {
        let (dx, dy) = (self.x - x, self.y - y);
        dx * dx + dy * dy
    }
}

/// The fixed set of landmarks the filter associates observations with.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkMap {
    landmarks: Vec<Landmark>,
}

impl LandmarkMap {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.iter()
    }

    /// Nearest landmark to a world-frame point, `None` for an empty map.
    pub fn nearest(&self, x: f64, y: f64) -> Option<&Landmark> {
        self.landmarks
            .iter()
            .min_by(|a, b| a.distance_sq(x, y).total_cmp(&b.distance_sq(x, y)))
    }
}

impl FromIterator<Landmark> for LandmarkMap {
    fn from_iter<I: IntoIterator<Item = Landmark>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_picks_closest_landmark() {
        let map: LandmarkMap = [
            Landmark::new(1, 10.0, 0.0),
            Landmark::new(2, 0.0, 10.0),
            Landmark::new(3, -10.0, -10.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(map.nearest(8.0, 1.0).map(|l| l.id), Some(1));
        assert_eq!(map.nearest(1.0, 7.0).map(|l| l.id), Some(2));
        assert_eq!(map.nearest(-4.0, -6.0).map(|l| l.id), Some(3));
    }

    #[test]
    fn test_empty_map_has_no_nearest() {
        assert!(LandmarkMap::default().nearest(0.0, 0.0).is_none());
    }
}
