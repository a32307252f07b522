use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use strider_kinematics::{DifferentialDrive, KinematicsError, Pose};
use strider_localization::{FilterSettings, LandmarkMap};
use strider_motion::ControllerSettings;
use tracing::{error, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct DrivetrainSettings {
    pub wheel_diameter: f64,
    pub track_width: f64,
    /// Wheel speed at full command.
    pub max_rpm: f64,
    /// Command magnitude that maps to `max_rpm`.
    pub max_command: f64,
}

impl DrivetrainSettings {
    pub fn geometry(&self) -> Result<DifferentialDrive, KinematicsError> {
        DifferentialDrive::new(self.wheel_diameter / 2.0, self.track_width)
    }

    /// Wheel angular speed (rad/s) at full command.
    pub fn max_wheel_speed(&self) -> f64 {
        self.max_rpm * std::f64::consts::TAU / 60.0
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// True starting pose of the simulated robot.
    pub start: Pose,
    pub period_ms: u64,
    /// Noise on each landmark detection coordinate.
    pub observation_std: f64,
    pub seed: Option<u64>,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            start: Pose::default(),
            period_ms: 10,
            observation_std: 0.2,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub drivetrain: DrivetrainSettings,
    #[serde(default)]
    pub motion: ControllerSettings,
    #[serde(default)]
    pub localization: FilterSettings,
    #[serde(default)]
    pub landmarks: LandmarkMap,
    #[serde(default)]
    pub sim: SimSettings,
}

/// Load settings from `path`, overridable by `STRIDER__SECTION__KEY`
/// environment variables.
pub fn load_settings(path: &str) -> Result<Settings, ConfigError> {
    info!("Attempting to load configuration from {}", path);

    let settings: Result<Settings, ConfigError> = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(true))
        .add_source(Environment::with_prefix("STRIDER").prefix_separator("__").separator("__"))
        .build()
        .and_then(|config| config.try_deserialize());

    match settings {
        Ok(settings) => {
            info!(landmarks = settings.landmarks.len(), "Successfully loaded configuration");
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}
