use log::debug;

use crate::collaborators::PropellantNetwork;
use crate::config::ResourceAmount;
use crate::engine::limits::UNLIMITED_IGNITIONS;
use crate::error::IgnitionDenied;

/// Take one ignition credit from `remaining`.
///
/// Nothing is consumed when ignitions are not limited, the pool is
/// unlimited, or the vessel is clamped to a launch support.
pub fn consume_ignition(remaining: &mut i32, limited: bool, clamped: bool) -> Result<(), IgnitionDenied> {
    if !limited || *remaining == UNLIMITED_IGNITIONS || clamped {
        return Ok(());
    }
    if *remaining <= 0 {
        return Err(IgnitionDenied::NoIgnitionsLeft);
    }
    *remaining -= 1;
    Ok(())
}

/// Draw every ignitor resource from the network and return the worst
/// supplied fraction. A shortfall gets exactly one top-up request.
pub fn draw_ignitor_resources(resources: &[ResourceAmount], network: &mut dyn PropellantNetwork) -> f64 {
    let mut fraction: f64 = 1.0;
    for resource in resources.iter().filter(|r| r.amount > 0.0) {
        let mut supplied = network.request_resource(&resource.name, resource.amount);
        if supplied < resource.amount {
            supplied += network.request_resource(&resource.name, resource.amount - supplied);
        }
        let got = (supplied / resource.amount).max(0.0);
        debug!("ignitor {}: {:.3} of {:.3}", resource.name, supplied, resource.amount);
        fraction = fraction.min(got);
    }
    fraction
}

/// Ignition succeeds when `roll` lands under the supplied fraction, so full
/// supply always lights and partial supply sometimes fails.
pub fn ignition_trial(supplied_fraction: f64, roll: f64) -> Result<(), IgnitionDenied> {
    if roll < supplied_fraction.min(1.0) {
        Ok(())
    } else {
        Err(IgnitionDenied::InsufficientResources { supplied_fraction })
    }
}

/// Feed holds when `roll` lands under `stability^exponent`.
pub fn ullage_trial(stability: f64, exponent: f64, roll: f64) -> bool {
    roll < stability.clamp(0.0, 1.0).powf(exponent)
}
