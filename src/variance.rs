use rand_distr::{Distribution, LogNormal};

use crate::balance::{VarianceProfile, NOISE_CHANNEL_OFFSETS, NOISE_FREQUENCY_HZ, RESIDUAL_LOG_SIGMA, RESIDUAL_MAX};
use crate::noise::CoherentNoise;
use crate::seed::InstanceSeed;

/// Draw the unusable-propellant fraction for one engine instance.
///
/// `base + variance * exp(N(0, sigma))`: never below the base, with a thin
/// upper tail. Drawn from the instance seed so a given part always gets the
/// same value.
pub fn draw_residual_threshold(profile: &VarianceProfile, seed: &InstanceSeed) -> f64 {
    let mut rng = seed.stream("residuals");
    let link = match LogNormal::new(0.0, RESIDUAL_LOG_SIGMA) {
        Ok(dist) => dist.sample(&mut rng),
        Err(_) => 1.0,
    };
    (profile.residuals_base + profile.residuals_variance * link).clamp(0.0, RESIDUAL_MAX)
}

/// Multipliers for one tick. All 1.0 means no variance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseSample {
    pub flow: f64,
    pub isp: f64,
    pub mixture_ratio: f64,
}

impl NoiseSample {
    pub fn neutral() -> Self {
        Self { flow: 1.0, isp: 1.0, mixture_ratio: 1.0 }
    }
}

impl Default for NoiseSample {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Time-keyed performance perturbation, continuous across ticks.
#[derive(Debug, Clone)]
pub struct PerformanceNoise {
    noise: CoherentNoise,
}

impl PerformanceNoise {
    pub fn new(noise: CoherentNoise) -> Self {
        Self { noise }
    }

    /// Sample at `curve_time` seconds of burn.
    pub fn sample(&self, profile: &VarianceProfile, curve_time: f64) -> NoiseSample {
        let x = curve_time * NOISE_FREQUENCY_HZ;
        let channel = |i: usize| self.noise.sample(x + NOISE_CHANNEL_OFFSETS[i]);
        NoiseSample {
            flow: 1.0 + profile.flow * channel(0),
            isp: 1.0 + profile.isp * channel(1),
            mixture_ratio: 1.0 + profile.mixture_ratio * channel(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::{variance_profile, PropulsionClass};

    #[test]
    fn test_residual_is_stable_per_seed() {
        let profile = variance_profile(PropulsionClass::Liquid);
        let seed = InstanceSeed::new(1234);
        let a = draw_residual_threshold(&profile, &seed);
        let b = draw_residual_threshold(&profile, &seed);
        assert_eq!(a, b);
        assert!(a >= profile.residuals_base);
        assert!(a <= RESIDUAL_MAX);
    }

    #[test]
    fn test_residuals_vary_between_instances() {
        let profile = variance_profile(PropulsionClass::PressureFed);
        let draws: Vec<f64> = (0..20)
            .map(|i| draw_residual_threshold(&profile, &InstanceSeed::new(i)))
            .collect();
        let distinct = draws.windows(2).filter(|w| w[0] != w[1]).count();
        assert!(distinct > 0);
        assert!(draws.iter().all(|d| *d >= profile.residuals_base));
    }

    #[test]
    fn test_noise_stays_within_variance() {
        let profile = variance_profile(PropulsionClass::Solid);
        let noise = PerformanceNoise::new(CoherentNoise::new(5));
        for i in 0..500 {
            let s = noise.sample(&profile, i as f64 * 0.37);
            assert!((s.flow - 1.0).abs() <= profile.flow + 1e-12);
            assert!((s.isp - 1.0).abs() <= profile.isp + 1e-12);
            assert_eq!(s.mixture_ratio, 1.0);
        }
    }

    #[test]
    fn test_noise_is_continuous_in_time() {
        let profile = variance_profile(PropulsionClass::Liquid);
        let noise = PerformanceNoise::new(CoherentNoise::new(9));
        let mut prev = noise.sample(&profile, 0.0);
        for i in 1..2000 {
            let next = noise.sample(&profile, i as f64 * 0.02);
            assert!((next.flow - prev.flow).abs() < 0.001);
            prev = next;
        }
    }
}
