//! Probability distributions attached to random-variable symbols.

use num_traits::{One, Signed, ToPrimitive, Zero};
use rand::distributions::{Distribution as _, WeightedIndex};
use serde::{Deserialize, Serialize};
use termwit_core::errors::{ErrorInfo, TermwitError};
use termwit_core::parse::{rational_serde, rational_vec_serde};
use termwit_core::{rational, Rational, RngHandle};

/// Resolution of the grid used to sample continuous uniforms exactly.
const UNIFORM_GRID: u64 = 1 << 20;

/// Distribution governing the per-iteration value of a random variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Distribution {
    /// `1` with probability `p`, else `0`.
    Bernoulli {
        /// Success probability.
        #[serde(with = "rational_serde")]
        p: Rational,
    },
    /// Finitely many values, uniformly weighted unless `weights` is given.
    Categorical {
        /// Possible outcomes.
        #[serde(with = "rational_vec_serde")]
        values: Vec<Rational>,
        /// Relative weights, one per value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weights: Option<Vec<f64>>,
    },
    /// Continuous uniform on `[low, high]`.
    Uniform {
        /// Lower end.
        #[serde(with = "rational_serde")]
        low: Rational,
        /// Upper end.
        #[serde(with = "rational_serde")]
        high: Rational,
    },
    /// Uniform over the integers `low..=high`.
    DiscreteUniform {
        /// Smallest outcome.
        low: i64,
        /// Largest outcome.
        high: i64,
    },
    /// Laplace with location `mu` and scale `b`.
    Laplace {
        /// Location.
        mu: f64,
        /// Scale.
        b: f64,
    },
    /// Gaussian with the given mean and standard deviation.
    Normal {
        /// Mean.
        mean: f64,
        /// Standard deviation.
        std: f64,
    },
}

/// Set of values a distribution can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Support {
    /// Finitely many values.
    Finite(Vec<Rational>),
    /// Every value in the closed interval.
    Interval(Rational, Rational),
    /// The whole real line.
    Unbounded,
}

fn distribution_error(code: &str, message: &str, dist: &Distribution) -> TermwitError {
    TermwitError::Input(
        ErrorInfo::new(code, message).with_context("distribution", format!("{dist:?}")),
    )
}

impl Distribution {
    /// Values the distribution can take.
    pub fn support(&self) -> Support {
        match self {
            Distribution::Bernoulli { .. } => {
                Support::Finite(vec![Rational::zero(), Rational::one()])
            }
            Distribution::Categorical { values, .. } => Support::Finite(values.clone()),
            Distribution::Uniform { low, high } => Support::Interval(low.clone(), high.clone()),
            Distribution::DiscreteUniform { low, high } => {
                Support::Interval(rational(*low), rational(*high))
            }
            Distribution::Laplace { .. } | Distribution::Normal { .. } => Support::Unbounded,
        }
    }

    /// Checks parameter ranges.
    pub fn validate(&self) -> Result<(), TermwitError> {
        match self {
            Distribution::Bernoulli { p } => {
                if p.is_negative() || p > &Rational::one() {
                    return Err(distribution_error("bad-probability", "p must lie in [0, 1]", self));
                }
            }
            Distribution::Categorical { values, weights } => {
                if values.is_empty() {
                    return Err(distribution_error("empty-support", "no categorical values", self));
                }
                if let Some(weights) = weights {
                    let valid = weights.len() == values.len()
                        && weights.iter().all(|w| w.is_finite() && *w >= 0.0)
                        && weights.iter().sum::<f64>() > 0.0;
                    if !valid {
                        return Err(distribution_error(
                            "bad-weights",
                            "weights must be non-negative, finite and match the values",
                            self,
                        ));
                    }
                }
            }
            Distribution::Uniform { low, high } => {
                if low > high {
                    return Err(distribution_error("empty-support", "low exceeds high", self));
                }
            }
            Distribution::DiscreteUniform { low, high } => {
                if low > high {
                    return Err(distribution_error("empty-support", "low exceeds high", self));
                }
            }
            Distribution::Laplace { mu, b } => {
                if !(mu.is_finite() && b.is_finite() && *b > 0.0) {
                    return Err(distribution_error("bad-scale", "scale must be positive", self));
                }
            }
            Distribution::Normal { mean, std } => {
                if !(mean.is_finite() && std.is_finite() && *std > 0.0) {
                    return Err(distribution_error("bad-scale", "std must be positive", self));
                }
            }
        }
        Ok(())
    }

    /// Draws one outcome. Continuous distributions are sampled on a fine
    /// rational grid so trajectories stay exact.
    pub fn sample(&self, rng: &mut RngHandle) -> Rational {
        match self {
            Distribution::Bernoulli { p } => {
                let threshold = p.to_f64().unwrap_or(0.0);
                if rng.unit() < threshold {
                    Rational::one()
                } else {
                    Rational::zero()
                }
            }
            Distribution::Categorical { values, weights } => {
                let idx = match weights {
                    Some(weights) => weighted_index(weights, values.len(), rng),
                    None => rng.choose_index(values.len()),
                };
                values[idx].clone()
            }
            Distribution::Uniform { low, high } => {
                let step = rng.choose_index(UNIFORM_GRID as usize + 1) as u64;
                let fraction = Rational::new(step.into(), UNIFORM_GRID.into());
                low + (high - low) * fraction
            }
            Distribution::DiscreteUniform { low, high } => {
                let span = usize::try_from(high - low).unwrap_or(usize::MAX - 1) + 1;
                rational(*low + rng.choose_index(span) as i64)
            }
            Distribution::Laplace { mu, b } => {
                let u = rng.unit() - 0.5;
                let magnitude = -(1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE).ln();
                to_rational(mu + b * u.signum() * magnitude)
            }
            Distribution::Normal { mean, std } => {
                let u1 = rng.unit().max(f64::MIN_POSITIVE);
                let u2 = rng.unit();
                let radius = (-2.0 * u1.ln()).sqrt();
                to_rational(mean + std * radius * (2.0 * std::f64::consts::PI * u2).cos())
            }
        }
    }
}

/// Index below `len` drawn proportionally to `weights`; weights that fail
/// validation fall back to a uniform pick.
fn weighted_index(weights: &[f64], len: usize, rng: &mut RngHandle) -> usize {
    match WeightedIndex::new(weights) {
        Ok(index) if weights.len() == len => index.sample(rng),
        _ => rng.choose_index(len),
    }
}

fn to_rational(value: f64) -> Rational {
    Rational::from_float(value).unwrap_or_else(Rational::zero)
}
