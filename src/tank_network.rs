use std::collections::BTreeMap;

use crate::collaborators::PropellantNetwork;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tank {
    amount: f64,
    capacity: f64,
}

impl Tank {
    fn new(amount: f64, capacity: f64) -> Self {
        let capacity = capacity.max(0.0);
        Self { amount: amount.clamp(0.0, capacity), capacity }
    }
}

/// Named tanks reachable from an engine, keyed by resource name.
#[derive(Debug, Clone, Default)]
pub struct TankNetwork {
    tanks: BTreeMap<String, Tank>,
}

impl TankNetwork {
    pub fn new() -> Self {
        Self { tanks: BTreeMap::new() }
    }

    /// Builder-style tank registration.
    pub fn with_tank(mut self, resource: &str, amount: f64, capacity: f64) -> Self {
        self.add_tank(resource, amount, capacity);
        self
    }

    /// Add a tank. A second tank for the same resource adds to the first.
    pub fn add_tank(&mut self, resource: &str, amount: f64, capacity: f64) {
        let tank = self.tanks.entry(resource.to_string()).or_insert(Tank::new(0.0, 0.0));
        tank.capacity += capacity.max(0.0);
        tank.amount = (tank.amount + amount.max(0.0)).min(tank.capacity);
    }

    /// Amount of a resource stored
    pub fn stored(&self, resource: &str) -> f64 {
        self.tanks.get(resource).map(|t| t.amount).unwrap_or(0.0)
    }

    /// Withdraw, capped by amount stored. Returns actual amount withdrawn.
    pub fn withdraw(&mut self, resource: &str, amount: f64) -> f64 {
        match self.tanks.get_mut(resource) {
            Some(tank) => {
                let actual = amount.min(tank.amount).max(0.0);
                tank.amount -= actual;
                if tank.amount < 1e-12 {
                    tank.amount = 0.0;
                }
                actual
            }
            None => 0.0,
        }
    }
}

impl PropellantNetwork for TankNetwork {
    fn request_resource(&mut self, id: &str, amount: f64) -> f64 {
        self.withdraw(id, amount)
    }

    fn connected_resource_totals(&self, id: &str) -> (f64, f64) {
        self.tanks.get(id).map(|t| (t.amount, t.capacity)).unwrap_or((0.0, 0.0))
    }
}
