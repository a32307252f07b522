use std::time::Duration;

use crate::settings::ExitSettings;

/// Hysteresis exit detector.
///
/// Declares convergence once the error has stayed within `range` continuously
/// for `dwell`. Dwell is measured from the first in-band sample and advanced
/// by the caller's sample interval, so a zero dwell fires on the first
/// in-band sample. Once declared, the detector stays latched until reset.
#[derive(Debug, Clone)]
pub struct ExitCondition {
    range: f64,
    dwell: Duration,
    in_band_for: Option<Duration>,
    done: bool,
}

impl ExitCondition {
    pub fn new(range: f64, dwell: Duration) -> Self {
        Self {
            range,
            dwell,
            in_band_for: None,
            done: false,
        }
    }

    pub fn update(&mut self, error: f64, interval: Duration) -> bool {
        if self.done {
            return true;
        }
        if error.abs() > self.range {
            self.in_band_for = None;
            return false;
        }
        let in_band_for = match self.in_band_for {
            None => Duration::ZERO,
            Some(t) => t + interval,
        };
        self.in_band_for = Some(in_band_for);
        self.done = in_band_for >= self.dwell;
        self.done
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn reset(&mut self) {
        self.in_band_for = None;
        self.done = false;
    }
}

impl From<ExitSettings> for ExitCondition {
    fn from(settings: ExitSettings) -> Self {
        ExitCondition::new(settings.range, settings.dwell())
    }
}
