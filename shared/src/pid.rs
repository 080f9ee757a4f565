/// Reusable PID block. Holds the integral and previous-error state; the
/// caller supplies the timestep and clamps the output to its own actuator
/// range.
#[derive(Debug, Clone)]
pub struct Pid {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    integral: f32,
    prev_error: f32,
}

impl Pid {
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            prev_error: 0.0,
        }
    }

    /// One control step: Kp·e + Ki·∫e·dt + Kd·Δe/dt.
    pub fn compute(&mut self, error: f32, dt: f32) -> f32 {
        if dt <= 0.0 {
            return self.kp * error;
        }
        self.integral += error * dt;
        let derivative = (error - self.prev_error) / dt;
        self.prev_error = error;
        self.kp * error + self.ki * self.integral + self.kd * derivative
    }

    /// Drop accumulated state, e.g. when retargeting.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportional_only_is_linear() {
        let mut pid = Pid::new(2.0, 0.0, 0.0);
        assert_eq!(pid.compute(0.5, 0.1), 1.0);
        assert_eq!(pid.compute(-0.25, 0.1), -0.5);
    }

    #[test]
    fn test_integral_accumulates() {
        let mut pid = Pid::new(0.0, 1.0, 0.0);
        let dt = 0.5;
        assert_eq!(pid.compute(1.0, dt), 0.5);
        assert_eq!(pid.compute(1.0, dt), 1.0);
        assert_eq!(pid.compute(1.0, dt), 1.5);
    }

    #[test]
    fn test_derivative_tracks_error_change() {
        let mut pid = Pid::new(0.0, 0.0, 1.0);
        let dt = 0.1;
        // First step: derivative measured against an initial error of zero.
        assert!((pid.compute(1.0, dt) - 10.0).abs() < 1e-5);
        // Unchanged error: no derivative contribution.
        assert!((pid.compute(1.0, dt)).abs() < 1e-5);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut pid = Pid::new(1.0, 1.0, 1.0);
        pid.compute(3.0, 0.1);
        pid.reset();
        assert_eq!(pid.compute(0.0, 0.1), 0.0);
    }
}
