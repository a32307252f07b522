//! Particle-filter localization against a fixed landmark map.
//!
//! [`ParticleFilter`] holds a fixed number of weighted pose hypotheses. Each
//! cycle it predicts with the measured chassis motion plus Gaussian noise,
//! weighs the hypotheses by how well they explain the landmark observations,
//! normalizes, publishes a pose estimate and resamples. [`LocalizationEngine`]
//! runs that cycle on its own thread at a fixed rate.

pub mod engine;
pub mod error;
pub mod filter;
pub mod map;
pub mod observation;
pub mod particle;

pub use engine::LocalizationEngine;
pub use error::LocalizationError;
pub use filter::{FilterSettings, LandmarkStd, ParticleFilter};
pub use map::{Landmark, LandmarkMap};
pub use observation::{LandmarkObservation, NoObservations, ObservationSource};
pub use particle::{Particle, ParticleSet, PoseStd};
