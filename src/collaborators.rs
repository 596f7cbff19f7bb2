/// The vessel's propellant plumbing.
pub trait PropellantNetwork {
    /// Draw up to `amount` units of `id`. Returns the amount actually supplied.
    fn request_resource(&mut self, id: &str, amount: f64) -> f64;

    /// `(amount, capacity)` of `id` reachable from this part.
    fn connected_resource_totals(&self, id: &str) -> (f64, f64);

    /// Reachable fraction of `id`, or 0 when there is no capacity at all.
    fn connected_fraction(&self, id: &str) -> f64 {
        let (amount, capacity) = self.connected_resource_totals(id);
        if capacity > 0.0 {
            (amount / capacity).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Research and economy state deciding which tech is available.
pub trait ResearchGate {
    fn is_unlocked(&self, name: &str) -> bool;
    fn entry_cost(&self, name: &str) -> f64;
    /// Attempt to buy `name`. Returns whether it is now unlocked.
    fn purchase(&mut self, name: &str) -> bool;
}

/// Propellant settling state for the tanks feeding this engine.
pub trait UllageModel {
    /// Feed stability in `[0, 1]`; 1 is fully settled.
    fn stability(&self) -> f64;
    /// Whether feed pressure is sufficient for a pressure-fed engine.
    fn pressure_ok(&self) -> bool;
}

/// Receives per-tick output for plume and thermal effects. Purely a sink.
pub trait EffectsSink {
    fn receive(&mut self, thrust_fraction: f64, chamber_temp: f64);
}

/// Everything the solver needs from outside for one tick.
pub struct TickContext<'a> {
    pub network: &'a mut dyn PropellantNetwork,
    pub ullage: &'a dyn UllageModel,
    pub effects: &'a mut dyn EffectsSink,
}

// ==========================================
// Simple Implementations
// ==========================================

/// Ullage model with fixed readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedUllage {
    pub stability: f64,
    pub pressure_ok: bool,
}

impl FixedUllage {
    /// Fully settled propellant with good feed pressure.
    pub fn settled() -> Self {
        Self { stability: 1.0, pressure_ok: true }
    }
}

impl Default for FixedUllage {
    fn default() -> Self {
        Self::settled()
    }
}

impl UllageModel for FixedUllage {
    fn stability(&self) -> f64 {
        self.stability.clamp(0.0, 1.0)
    }

    fn pressure_ok(&self) -> bool {
        self.pressure_ok
    }
}

/// Effects sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEffects;

impl EffectsSink for NoEffects {
    fn receive(&mut self, _thrust_fraction: f64, _chamber_temp: f64) {}
}

/// Effects sink that remembers the last sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EffectsRecorder {
    pub thrust_fraction: f64,
    pub chamber_temp: f64,
    pub samples: u64,
}

impl EffectsSink for EffectsRecorder {
    fn receive(&mut self, thrust_fraction: f64, chamber_temp: f64) {
        self.thrust_fraction = thrust_fraction;
        self.chamber_temp = chamber_temp;
        self.samples += 1;
    }
}
