use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One key on a [`FloatCurve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub time: f64,
    pub value: f64,
    pub in_tangent: f64,
    pub out_tangent: f64,
}

/// Piecewise cubic Hermite curve. Evaluation clamps to the first/last key
/// outside the keyed range.
///
/// Keys are written as `[time, value]` or `[time, value, in, out]`. When
/// tangents are omitted they are derived from neighbouring keys, which keeps a
/// two-key curve exactly linear.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct FloatCurve {
    keys: Vec<Keyframe>,
}

impl FloatCurve {
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Build a curve from `(time, value)` pairs with automatic tangents.
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        let mut curve = Self::new();
        for &(time, value) in points {
            curve.insert(time, value, None);
        }
        curve.smooth_tangents();
        curve
    }

    /// A constant curve: a single key at time 0.
    pub fn constant(value: f64) -> Self {
        Self::from_points(&[(0.0, value)])
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Add a key with explicit tangents, keeping keys sorted by time.
    pub fn add_key(&mut self, time: f64, value: f64, in_tangent: f64, out_tangent: f64) {
        self.insert(time, value, Some((in_tangent, out_tangent)));
    }

    fn insert(&mut self, time: f64, value: f64, tangents: Option<(f64, f64)>) {
        let (in_tangent, out_tangent) = tangents.unwrap_or((f64::NAN, f64::NAN));
        let key = Keyframe { time, value, in_tangent, out_tangent };
        let pos = self.keys.partition_point(|k| k.time <= time);
        self.keys.insert(pos, key);
    }

    /// Fill NaN tangents with finite-difference slopes.
    fn smooth_tangents(&mut self) {
        let n = self.keys.len();
        for i in 0..n {
            let slope = if n < 2 {
                0.0
            } else if i == 0 {
                secant(&self.keys[0], &self.keys[1])
            } else if i == n - 1 {
                secant(&self.keys[n - 2], &self.keys[n - 1])
            } else {
                let left = secant(&self.keys[i - 1], &self.keys[i]);
                let right = secant(&self.keys[i], &self.keys[i + 1]);
                (left + right) * 0.5
            };
            let key = &mut self.keys[i];
            if key.in_tangent.is_nan() {
                key.in_tangent = slope;
            }
            if key.out_tangent.is_nan() {
                key.out_tangent = slope;
            }
        }
    }

    /// Evaluate the curve at `time`. An empty curve evaluates to 0.
    pub fn evaluate(&self, time: f64) -> f64 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return 0.0,
        };
        if time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        let idx = self.keys.partition_point(|k| k.time <= time);
        let a = &self.keys[idx - 1];
        let b = &self.keys[idx];
        let dt = b.time - a.time;
        if dt <= 0.0 {
            return b.value;
        }
        let t = (time - a.time) / dt;
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * a.value + h10 * dt * a.out_tangent + h01 * b.value + h11 * dt * b.in_tangent
    }

    /// A new curve with every key value (and tangent) passed through `f`,
    /// where `f` receives the key time and value.
    pub fn map_values<F>(&self, mut f: F) -> Self
    where
        F: FnMut(f64, f64) -> f64,
    {
        let keys = self
            .keys
            .iter()
            .map(|k| {
                let value = f(k.time, k.value);
                let scale = if k.value.abs() > f64::EPSILON { value / k.value } else { 1.0 };
                Keyframe {
                    time: k.time,
                    value,
                    in_tangent: k.in_tangent * scale,
                    out_tangent: k.out_tangent * scale,
                }
            })
            .collect();
        Self { keys }
    }
}

fn secant(a: &Keyframe, b: &Keyframe) -> f64 {
    let dt = b.time - a.time;
    if dt.abs() < f64::EPSILON {
        0.0
    } else {
        (b.value - a.value) / dt
    }
}

impl TryFrom<Vec<Vec<f64>>> for FloatCurve {
    type Error = ConfigError;

    fn try_from(raw: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        let mut curve = FloatCurve::new();
        for (index, key) in raw.iter().enumerate() {
            match key.as_slice() {
                [time, value] => curve.insert(*time, *value, None),
                [time, value, in_t, out_t] => curve.insert(*time, *value, Some((*in_t, *out_t))),
                other => {
                    return Err(ConfigError::MalformedCurveKey { index, found: other.len() });
                }
            }
        }
        curve.smooth_tangents();
        Ok(curve)
    }
}

impl From<FloatCurve> for Vec<Vec<f64>> {
    fn from(curve: FloatCurve) -> Self {
        curve
            .keys
            .iter()
            .map(|k| vec![k.time, k.value, k.in_tangent, k.out_tangent])
            .collect()
    }
}
