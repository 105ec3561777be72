//! Pseudo-random draws from the fixed set of distributions used by the
//! weather and financial samplers.
//!
//! Every sampler is a small parameter struct implementing
//! [`rand_distr::Distribution`], so it can be driven by any `Rng`; the
//! simulation uses a seeded `ChaCha20Rng` per iteration. The algorithms are
//! fixed: Gamma by Marsaglia–Tsang, Beta as a ratio of two Gammas, Weibull by
//! inverse CDF, Normal by Box–Muller, Poisson by Knuth's multiplicative method.

use rand::Rng;
use rand_distr::Distribution;
use thiserror::Error;

/// Above this λ, `exp(-λ)` in Knuth's method loses all precision.
pub const MAX_POISSON_LAMBDA: f64 = 500.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplingError {
    #[error("{distribution}: parameter `{name}` must be finite and positive, got {value}")]
    NonPositive { distribution: &'static str, name: &'static str, value: f64 },

    #[error("{distribution}: parameter `{name}` must be finite, got {value}")]
    NonFinite { distribution: &'static str, name: &'static str, value: f64 },

    #[error("{distribution}: bounds must be finite with {lower} <= {upper}")]
    InvalidBounds { distribution: &'static str, lower: f64, upper: f64 },

    #[error("Poisson: lambda {0} exceeds the supported maximum of {MAX_POISSON_LAMBDA}")]
    LambdaTooLarge(f64),
}

fn positive(distribution: &'static str, name: &'static str, value: f64) -> Result<f64, SamplingError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SamplingError::NonPositive { distribution, name, value })
    }
}

/// Uniform draw on (0, 1]; safe to take the logarithm of.
fn open_unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    1.0 - rng.random::<f64>()
}

/// One standard-normal draw via the Box–Muller transform. The paired sine
/// draw is discarded so no sampler carries state between calls.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = open_unit(rng);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normal {
    mean: f64,
    std_dev: f64,
}

impl Normal {
    pub fn new(mean: f64, std_dev: f64) -> Result<Self, SamplingError> {
        if !mean.is_finite() {
            return Err(SamplingError::NonFinite { distribution: "Normal", name: "mean", value: mean });
        }
        if !std_dev.is_finite() || std_dev < 0.0 {
            return Err(SamplingError::NonPositive {
                distribution: "Normal",
                name: "std_dev",
                value: std_dev,
            });
        }
        Ok(Normal { mean, std_dev })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }
}

impl Distribution<f64> for Normal {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.mean + self.std_dev * standard_normal(rng)
    }
}

/// Gamma(shape k, scale θ). E[X] = kθ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gamma {
    shape: f64,
    scale: f64,
}

impl Gamma {
    pub fn new(shape: f64, scale: f64) -> Result<Self, SamplingError> {
        Ok(Gamma {
            shape: positive("Gamma", "shape", shape)?,
            scale: positive("Gamma", "scale", scale)?,
        })
    }

    pub fn mean(&self) -> f64 {
        self.shape * self.scale
    }
}

/// Marsaglia–Tsang squeeze for shape ≥ 1, unit scale.
fn marsaglia_tsang<R: Rng + ?Sized>(shape: f64, rng: &mut R) -> f64 {
    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let x = standard_normal(rng);
        let v = 1.0 + c * x;
        if v <= 0.0 {
            continue;
        }
        let v = v * v * v;
        let u = open_unit(rng);
        let x2 = x * x;
        if u < 1.0 - 0.0331 * x2 * x2 {
            return d * v;
        }
        if u.ln() < 0.5 * x2 + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}

impl Distribution<f64> for Gamma {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let unit = if self.shape < 1.0 {
            // Boost to shape + 1, then correct with U^(1/shape).
            let boosted = marsaglia_tsang(self.shape + 1.0, rng);
            boosted * open_unit(rng).powf(1.0 / self.shape)
        } else {
            marsaglia_tsang(self.shape, rng)
        };
        unit * self.scale
    }
}

/// Beta(α, β) on [0, 1], sampled as X / (X + Y) with X ~ Gamma(α), Y ~ Gamma(β).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beta {
    x: Gamma,
    y: Gamma,
}

impl Beta {
    pub fn new(alpha: f64, beta: f64) -> Result<Self, SamplingError> {
        Ok(Beta {
            x: Gamma::new(positive("Beta", "alpha", alpha)?, 1.0)?,
            y: Gamma::new(positive("Beta", "beta", beta)?, 1.0)?,
        })
    }

    pub fn mean(&self) -> f64 {
        self.x.shape / (self.x.shape + self.y.shape)
    }
}

impl Distribution<f64> for Beta {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let x = self.x.sample(rng);
        let y = self.y.sample(rng);
        let sum = x + y;
        if sum > 0.0 { x / sum } else { self.mean() }
    }
}

/// Weibull(shape k, scale λ), inverse-CDF sampled: λ(−ln(1−U))^(1/k).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weibull {
    shape: f64,
    scale: f64,
}

impl Weibull {
    pub fn new(shape: f64, scale: f64) -> Result<Self, SamplingError> {
        Ok(Weibull {
            shape: positive("Weibull", "shape", shape)?,
            scale: positive("Weibull", "scale", scale)?,
        })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// E[X] = λ·Γ(1 + 1/k).
    pub fn mean(&self) -> f64 {
        self.scale * gamma_fn(1.0 + 1.0 / self.shape)
    }
}

impl Distribution<f64> for Weibull {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.random();
        self.scale * (-(1.0 - u).ln()).powf(1.0 / self.shape)
    }
}

/// Poisson(λ) counts via Knuth: multiply uniforms until the product drops
/// below e^(−λ).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Poisson {
    lambda: f64,
    threshold: f64,
}

impl Poisson {
    pub fn new(lambda: f64) -> Result<Self, SamplingError> {
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(SamplingError::NonPositive {
                distribution: "Poisson",
                name: "lambda",
                value: lambda,
            });
        }
        if lambda > MAX_POISSON_LAMBDA {
            return Err(SamplingError::LambdaTooLarge(lambda));
        }
        Ok(Poisson { lambda, threshold: (-lambda).exp() })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl Distribution<u64> for Poisson {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let mut k = 0u64;
        let mut p = 1.0;
        loop {
            p *= rng.random::<f64>();
            if p <= self.threshold {
                return k;
            }
            k += 1;
        }
    }
}

/// Γ(x) for x > 0 by the Lanczos approximation (g = 7, n = 9). Used for
/// closed-form moments, never inside a sampling loop.
pub fn gamma_fn(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        // Reflection formula.
        return std::f64::consts::PI / ((std::f64::consts::PI * x).sin() * gamma_fn(1.0 - x));
    }
    let x = x - 1.0;
    let t = x + G + 0.5;
    let series = COEF[1..]
        .iter()
        .enumerate()
        .fold(COEF[0], |acc, (i, c)| acc + c / (x + i as f64 + 1.0));
    (2.0 * std::f64::consts::PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * series
}
