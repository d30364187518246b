//! Statistical samplers for reward quantities.

use rand::Rng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::numbers::round_f64_to_i64;

/// Clamped gaussian sampler for reward quantities.
///
/// `mean` and `std_dev` are required whenever the range is used; bounds are
/// optional and clamp the sampled value when present. Immutable once
/// attached to a reward; editing flows replace it wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaussianRange {
    pub mean: f64,
    pub std_dev: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl GaussianRange {
    /// Draw one value from `N(mean, std_dev)` clamped into `[min, max]`
    /// when bounds are present.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        // Box-Muller transform; u1 is kept away from zero so ln() is finite.
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.r#gen();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        let mut value = self.std_dev.mul_add(z, self.mean);
        if let Some(min) = self.min {
            value = value.max(min);
        }
        if let Some(max) = self.max {
            value = value.min(max);
        }
        value
    }

    /// Draw one value and round it to the nearest integer.
    pub fn sample_rounded<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        round_f64_to_i64(self.sample(rng))
    }
}

/// Inclusive integer range.
///
/// Serializes as a bare number when the bounds are equal and as a
/// `"min-max"` string otherwise; deserializes from either form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountRange {
    pub min: i64,
    pub max: i64,
}

impl AmountRange {
    /// Fixed amount with equal bounds.
    #[must_use]
    pub const fn fixed(amount: i64) -> Self {
        Self {
            min: amount,
            max: amount,
        }
    }

    /// Construct from bounds, normalizing an inverted pair.
    #[must_use]
    pub const fn new(min: i64, max: i64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Draw uniformly from the range. Equal bounds make no RNG call.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        if self.min >= self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }
}

impl Default for AmountRange {
    fn default() -> Self {
        Self::fixed(1)
    }
}

impl Serialize for AmountRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.min == self.max {
            serializer.serialize_i64(self.min)
        } else {
            serializer.serialize_str(&format!("{}-{}", self.min, self.max))
        }
    }
}

impl<'de> Deserialize<'de> for AmountRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Single(i64),
            Span(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Single(amount) => Ok(Self::fixed(amount)),
            Repr::Span(text) => parse_span(&text)
                .map(|(min, max)| Self::new(min, max))
                .ok_or_else(|| D::Error::custom(format!("invalid amount range '{text}'"))),
        }
    }
}

/// Inclusive floating-point range with the same wire flexibility as
/// [`AmountRange`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoneyRange {
    pub min: f64,
    pub max: f64,
}

impl MoneyRange {
    /// Fixed amount with equal bounds.
    #[must_use]
    pub const fn fixed(amount: f64) -> Self {
        Self {
            min: amount,
            max: amount,
        }
    }

    /// Draw uniformly from the range. Equal bounds make no RNG call.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.min >= self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }
}

impl Default for MoneyRange {
    fn default() -> Self {
        Self::fixed(0.0)
    }
}

impl Serialize for MoneyRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if (self.min - self.max).abs() < f64::EPSILON {
            serializer.serialize_f64(self.min)
        } else {
            serializer.serialize_str(&format!("{}-{}", self.min, self.max))
        }
    }
}

impl<'de> Deserialize<'de> for MoneyRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Single(f64),
            Span(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Single(amount) => Ok(Self::fixed(amount)),
            Repr::Span(text) => parse_money_span(&text)
                .ok_or_else(|| D::Error::custom(format!("invalid money range '{text}'"))),
        }
    }
}

fn parse_span(text: &str) -> Option<(i64, i64)> {
    let (min, max) = split_span(text)?;
    Some((min.parse().ok()?, max.parse().ok()?))
}

fn parse_money_span(text: &str) -> Option<MoneyRange> {
    let (min, max) = split_span(text)?;
    let min: f64 = min.parse().ok()?;
    let max: f64 = max.parse().ok()?;
    Some(MoneyRange {
        min: min.min(max),
        max: min.max(max),
    })
}

// Amounts are non-negative on the wire, so the first '-' is the separator.
fn split_span(text: &str) -> Option<(&str, &str)> {
    let (min, max) = text.trim().split_once('-')?;
    let (min, max) = (min.trim(), max.trim());
    if min.is_empty() || max.is_empty() {
        return None;
    }
    Some((min, max))
}
