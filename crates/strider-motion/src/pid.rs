use crate::settings::PidGains;

/// Discrete PID compensator stepped once per control period.
///
/// Gains are per period: the derivative term is the change in error since the
/// previous update, the integral term is the running sum of errors.
#[derive(Copy, Clone, Debug)]
pub struct Pid {
    pub gains: PidGains,
    prev_error: Option<f64>,
    integral: f64,
}

impl Pid {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            prev_error: None,
            integral: 0.0,
        }
    }

    pub fn update(&mut self, error: f64) -> f64 {
        let PidGains {
            kp,
            ki,
            kd,
            windup_range,
            sign_flip_reset,
        } = self.gains;

        self.integral += error;
        if let Some(prev) = self.prev_error
            && sign_flip_reset
            && prev.signum() != error.signum()
        {
            self.integral = 0.0;
        }
        if windup_range > 0.0 && error.abs() > windup_range {
            self.integral = 0.0;
        }

        let derivative = match self.prev_error {
            Some(prev) => error - prev,
            None => 0.0,
        };
        self.prev_error = Some(error);

        kp * error + ki * self.integral + kd * derivative
    }

    pub fn reset(&mut self) {
        self.prev_error = None;
        self.integral = 0.0;
    }
}

/// Move `current` toward `target` by at most `max_change`.
///
/// A `max_change` of zero disables limiting.
pub fn slew(target: f64, current: f64, max_change: f64) -> f64 {
    if max_change <= 0.0 {
        return target;
    }
    current + (target - current).clamp(-max_change, max_change)
}
