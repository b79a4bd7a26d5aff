//! Failure and repair time distributions
//!
//! Every device class draws its time to failure (or to repair) from a
//! [`Lifetime`]. Times are hours.

use crate::error::SimError;
use crate::Result;
use rand::Rng;
use serde::Deserialize;

/// A distribution of durations
pub trait FailureDistribution {
    /// Draw one duration
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64;

    /// Instantaneous failure rate at age `t`
    fn hazard_rate(&self, t: f64) -> f64;
}

/// Three-parameter Weibull distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weibull {
    shape: f64,
    scale: f64,
    location: f64,
}

impl Weibull {
    pub fn new(shape: f64, scale: f64, location: f64) -> Result<Self> {
        if !(shape > 0.0 && scale > 0.0) || location < 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "weibull needs shape > 0, scale > 0, location >= 0 (got {shape}, {scale}, {location})"
            )));
        }
        Ok(Self {
            shape,
            scale,
            location,
        })
    }

    pub fn shape(&self) -> f64 {
        self.shape
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn location(&self) -> f64 {
        self.location
    }

    pub fn pdf(&self, x: f64) -> f64 {
        if x < 0.0 || x < self.location {
            return 0.0;
        }
        let z = (x - self.location) / self.scale;
        (self.shape / self.scale) * z.powf(self.shape - 1.0) * (-z.powf(self.shape)).exp()
    }

    pub fn cdf(&self, x: f64) -> f64 {
        if x < self.location {
            return 0.0;
        }
        let z = (x - self.location) / self.scale;
        1.0 - (-z.powf(self.shape)).exp()
    }
}

impl FailureDistribution for Weibull {
    /// Inverse transform sampling
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        // (0, 1], so ln never sees zero
        let u = 1.0 - rng.gen::<f64>();
        self.scale * (-u.ln()).powf(1.0 / self.shape) + self.location
    }

    fn hazard_rate(&self, t: f64) -> f64 {
        if t < self.location {
            return 0.0;
        }
        if self.shape == 1.0 {
            return 1.0 / self.scale;
        }
        (self.pdf(t) / (1.0 - self.cdf(t))).abs()
    }
}

/// Serialisable lifetime description
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Lifetime {
    Weibull {
        shape: f64,
        scale: f64,
        #[serde(default)]
        location: f64,
    },
    /// Always the same duration; handy for deterministic scenarios
    Constant { value: f64 },
}

impl Lifetime {
    pub fn weibull(shape: f64, scale: f64, location: f64) -> Self {
        Lifetime::Weibull {
            shape,
            scale,
            location,
        }
    }

    pub fn constant(value: f64) -> Self {
        Lifetime::Constant { value }
    }

    /// Check the parameters without building anything
    pub fn validate(&self) -> Result<()> {
        match *self {
            Lifetime::Weibull {
                shape,
                scale,
                location,
            } => Weibull::new(shape, scale, location).map(|_| ()),
            Lifetime::Constant { value } if value > 0.0 => Ok(()),
            Lifetime::Constant { value } => Err(SimError::InvalidConfig(format!(
                "constant lifetime must be positive (got {value})"
            ))),
        }
    }
}

impl FailureDistribution for Lifetime {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Lifetime::Weibull {
                shape,
                scale,
                location,
            } => Weibull {
                shape,
                scale,
                location,
            }
            .draw(rng),
            Lifetime::Constant { value } => value,
        }
    }

    fn hazard_rate(&self, t: f64) -> f64 {
        match *self {
            Lifetime::Weibull {
                shape,
                scale,
                location,
            } => Weibull {
                shape,
                scale,
                location,
            }
            .hazard_rate(t),
            Lifetime::Constant { value } if t >= value => f64::INFINITY,
            Lifetime::Constant { .. } => 0.0,
        }
    }
}

/// Lifetimes of every device class
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FailureModel {
    pub node_fail: Lifetime,
    pub node_transient_fail: Lifetime,
    pub node_transient_repair: Lifetime,
    pub disk_fail: Lifetime,
    /// Unused: disk repairs are timed by repair bandwidth
    pub disk_repair: Option<Lifetime>,
    pub rack_fail: Lifetime,
    pub rack_repair: Lifetime,
}

impl Default for FailureModel {
    fn default() -> Self {
        Self {
            node_fail: Lifetime::weibull(1.0, 91250.0, 0.0),
            node_transient_fail: Lifetime::weibull(1.0, 2890.8, 0.0),
            node_transient_repair: Lifetime::weibull(1.0, 0.25, 0.0),
            disk_fail: Lifetime::weibull(1.12, 87600.0, 0.0),
            disk_repair: None,
            rack_fail: Lifetime::weibull(1.0, 87600.0, 0.0),
            rack_repair: Lifetime::weibull(1.0, 24.0, 10.0),
        }
    }
}

impl FailureModel {
    /// Every lifetime at the same constant duration
    pub fn constant(value: f64) -> Self {
        let lifetime = Lifetime::constant(value);
        Self {
            node_fail: lifetime,
            node_transient_fail: lifetime,
            node_transient_repair: lifetime,
            disk_fail: lifetime,
            disk_repair: None,
            rack_fail: lifetime,
            rack_repair: lifetime,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.node_fail.validate()?;
        self.node_transient_fail.validate()?;
        self.node_transient_repair.validate()?;
        self.disk_fail.validate()?;
        if let Some(repair) = &self.disk_repair {
            repair.validate()?;
        }
        self.rack_fail.validate()?;
        self.rack_repair.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_weibull_draws_respect_location() {
        let weibull = Weibull::new(1.0, 24.0, 10.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1000 {
            assert!(weibull.draw(&mut rng) >= 10.0);
        }
    }

    #[test]
    fn test_weibull_mean() {
        // shape 1 is exponential with mean `scale`
        let weibull = Weibull::new(1.0, 100.0, 0.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let n = 20_000;
        let mean = (0..n).map(|_| weibull.draw(&mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 100.0).abs() < 5.0, "mean was {mean}");
    }

    #[test]
    fn test_hazard_rate() {
        let exponential = Weibull::new(1.0, 91250.0, 0.0).unwrap();
        assert_eq!(exponential.hazard_rate(5.0), 1.0 / 91250.0);

        let shifted = Weibull::new(2.0, 10.0, 5.0).unwrap();
        assert_eq!(shifted.hazard_rate(4.0), 0.0);
        // k/λ * (t/λ)^(k-1)
        let expected = 2.0 / 10.0 * (5.0 / 10.0);
        assert!((shifted.hazard_rate(10.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_cdf_pdf() {
        let weibull = Weibull::new(1.0, 1.0, 0.0).unwrap();
        assert_eq!(weibull.cdf(0.0), 0.0);
        assert!((weibull.cdf(1.0) - (1.0 - (-1.0f64).exp())).abs() < 1e-12);
        assert_eq!(weibull.pdf(-1.0), 0.0);
    }

    #[test]
    fn test_invalid_weibull() {
        assert!(Weibull::new(0.0, 1.0, 0.0).is_err());
        assert!(Weibull::new(1.0, -1.0, 0.0).is_err());
        assert!(Lifetime::weibull(1.0, 1.0, -3.0).validate().is_err());
        assert!(Lifetime::constant(-1.0).validate().is_err());
    }

    #[test]
    fn test_zero_constant_lifetime_rejected() {
        // zero-length lifetimes would pin a trial to one timestamp
        assert!(Lifetime::constant(0.0).validate().is_err());

        let mut model = FailureModel::constant(10.0);
        model.validate().unwrap();
        model.node_transient_fail = Lifetime::constant(0.0);
        assert!(matches!(model.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_constant_lifetime() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let lifetime = Lifetime::constant(42.0);
        assert_eq!(lifetime.draw(&mut rng), 42.0);
        assert_eq!(lifetime.hazard_rate(1.0), 0.0);
    }

    #[test]
    fn test_lifetime_from_toml() {
        let model: FailureModel = toml::from_str(
            r#"
            disk_fail = { kind = "weibull", shape = 1.12, scale = 87600.0 }
            rack_repair = { kind = "constant", value = 24.0 }
            "#,
        )
        .unwrap();
        assert_eq!(model.disk_fail, Lifetime::weibull(1.12, 87600.0, 0.0));
        assert_eq!(model.rack_repair, Lifetime::constant(24.0));
        assert_eq!(model.node_fail, FailureModel::default().node_fail);
        model.validate().unwrap();
    }
}
