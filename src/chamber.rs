use crate::balance::MACH_HEATING_PER_MACH;

/// Temperature the chamber heads toward while combusting at `power`.
pub fn target_temperature(nominal: f64, power: f64, mach: f64, floor: f64) -> f64 {
    nominal * (power.max(floor) + mach.max(0.0) * MACH_HEATING_PER_MACH)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChamberState {
    pub temperature: f64,
}

impl ChamberState {
    pub fn new(ambient: f64) -> Self {
        Self { temperature: ambient }
    }

    /// Exponential approach to `target` at `rate` per second.
    pub fn advance(&mut self, target: f64, rate: f64, dt: f64) -> f64 {
        let blend = 1.0 - (-rate.max(0.0) * dt.max(0.0)).exp();
        self.temperature += (target - self.temperature) * blend;
        self.temperature
    }
}
