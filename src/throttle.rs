use crate::settings::Settings;

/// Throttle fraction per second for an engine of `max_thrust` kN on a vessel
/// of `vessel_mass` tonnes. Bigger engines on heavier vessels respond slower.
pub fn response_rate(settings: &Settings, vessel_mass: f64, max_thrust: f64) -> f64 {
    let scale = (vessel_mass.max(0.0) * max_thrust * max_thrust).sqrt();
    let denom = scale.max(settings.throttling_clamp).ln();
    if denom <= 0.0 {
        return f64::INFINITY;
    }
    settings.throttling_rate / denom
}

/// Delivered throttle, lagging behind the commanded value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThrottleResponse {
    current: f64,
}

impl ThrottleResponse {
    pub fn new() -> Self {
        Self { current: 0.0 }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Jump straight to `request`.
    pub fn snap(&mut self, request: f64) -> f64 {
        self.current = request.clamp(0.0, 1.0);
        self.current
    }

    pub fn reset(&mut self) {
        self.current = 0.0;
    }

    /// Move toward `request` for `dt` seconds at `base_rate`.
    ///
    /// Below the ignite level the engine is starting or stopping, which runs
    /// at the much faster startup rate.
    pub fn advance(&mut self, request: f64, base_rate: f64, settings: &Settings, dt: f64) -> f64 {
        let request = request.clamp(0.0, 1.0);
        let diff = request - self.current;
        if diff == 0.0 || dt <= 0.0 {
            return self.current;
        }

        let mut rate = base_rate * if diff > 0.0 { settings.throttle_accel_mult } else { settings.throttle_decel_mult };
        if self.current < settings.ignite_level {
            rate *= settings.startup_rate_mult;
        }
        let step = rate * dt;

        self.current = if diff > 0.0 {
            (self.current + step).min(request)
        } else {
            (self.current - step).max(request)
        };
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heavier_engines_respond_slower() {
        let settings = Settings::default();
        let small = response_rate(&settings, 2.0, 50.0);
        let large = response_rate(&settings, 400.0, 7000.0);
        assert!(small > large);
        assert!(large > 0.0);
    }

    #[test]
    fn test_clamp_bounds_tiny_engines() {
        let settings = Settings::default();
        let tiny = response_rate(&settings, 0.01, 0.1);
        let expected = settings.throttling_rate / settings.throttling_clamp.ln();
        assert!((tiny - expected).abs() < 1e-9);
    }

    #[test]
    fn test_advance_never_overshoots() {
        let settings = Settings::default();
        let mut t = ThrottleResponse::new();
        for _ in 0..1000 {
            t.advance(0.6, 2.0, &settings, 0.02);
            assert!(t.current() <= 0.6);
        }
        assert!((t.current() - 0.6).abs() < 1e-12);
        for _ in 0..1000 {
            t.advance(0.2, 2.0, &settings, 0.02);
            assert!(t.current() >= 0.2);
        }
        assert!((t.current() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_decel_faster_than_accel() {
        let settings = Settings::default();
        let mut up = ThrottleResponse::new();
        up.snap(0.5);
        let mut down = up;
        let gained = up.advance(1.0, 1.0, &settings, 0.1) - 0.5;
        let lost = 0.5 - down.advance(0.0, 1.0, &settings, 0.1);
        assert!(lost > gained);
    }

    #[test]
    fn test_startup_band_is_faster() {
        let settings = Settings::default();
        let mut cold = ThrottleResponse::new();
        let first = cold.advance(1.0, 0.1, &settings, 0.001);
        let mut warm = ThrottleResponse::new();
        warm.snap(0.5);
        let second = warm.advance(1.0, 0.1, &settings, 0.001) - 0.5;
        assert!(first > second);
    }

    #[test]
    fn test_snap_clamps() {
        let mut t = ThrottleResponse::new();
        assert_eq!(t.snap(1.4), 1.0);
        assert_eq!(t.snap(-0.3), 0.0);
    }
}
