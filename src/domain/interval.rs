//! Metric interval parsing.
//!
//! Canary analysis configures its polling period as a duration string
//! such as `"1m"`, `"30s"` or `"1h30m"`. The grammar is the one used
//! by Kubernetes-style manifests: an optional sign followed by one or
//! more `<number><unit>` components, where the number may carry a
//! fraction and the unit is one of `ns`, `us` (`µs`), `ms`, `s`, `m`, `h`.
//! The bare string `"0"` is also accepted.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::error::{ProviderError, ProviderResult};

/// Unit suffixes and their length in nanoseconds.
const UNITS: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("\u{00b5}s", 1_000),
    ("\u{03bc}s", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60_000_000_000),
    ("h", 3_600_000_000_000),
];

/// Fractional digits beyond this are below nanosecond precision.
const MAX_FRACTION_DIGITS: usize = 18;

/// A parsed, non-negative metric interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricInterval {
    raw: String,
    duration: Duration,
}

impl MetricInterval {
    /// Parse a duration string into a metric interval.
    ///
    /// # Errors
    /// Returns `ProviderError::InvalidInterval` carrying the parse failure.
    pub fn parse(input: &str) -> ProviderResult<Self> {
        let duration =
            parse_duration(input).map_err(|reason| ProviderError::InvalidInterval {
                interval: input.to_string(),
                reason,
            })?;

        Ok(Self {
            raw: input.to_string(),
            duration,
        })
    }

    /// The interval as a `Duration`.
    pub const fn as_duration(&self) -> Duration {
        self.duration
    }

    /// Lookback window in whole seconds: `multiplier × interval`, truncated.
    #[allow(clippy::cast_possible_truncation)]
    pub fn lookback_seconds(&self, multiplier: u32) -> i64 {
        (f64::from(multiplier) * self.duration.as_secs_f64()) as i64
    }
}

impl FromStr for MetricInterval {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MetricInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse a duration string, returning a human-readable reason on failure.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let (negative, mut rest) = if let Some(r) = input.strip_prefix('-') {
        (true, r)
    } else if let Some(r) = input.strip_prefix('+') {
        (false, r)
    } else {
        (false, input)
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(format!("invalid duration \"{input}\""));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, after) = rest.split_at(int_len);

        let (frac_part, after) = match after.strip_prefix('.') {
            Some(a) => {
                let n = a.bytes().take_while(u8::is_ascii_digit).count();
                a.split_at(n)
            }
            None => ("", after),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("invalid duration \"{input}\""));
        }

        let unit_len = after
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after.len());
        let (unit, after) = after.split_at(unit_len);
        if unit.is_empty() {
            return Err(format!("missing unit in duration \"{input}\""));
        }

        let scale = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| format!("unknown unit \"{unit}\" in duration \"{input}\""))?;

        let overflow = || format!("invalid duration \"{input}\": out of range");

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;

        if !frac_part.is_empty() {
            let digits = &frac_part[..frac_part.len().min(MAX_FRACTION_DIGITS)];
            let frac: u128 = digits.parse().map_err(|_| overflow())?;
            let denom = 10u128.pow(u32::try_from(digits.len()).map_err(|_| overflow())?);
            nanos = nanos
                .checked_add(frac * scale / denom)
                .ok_or_else(overflow)?;
        }

        total = total.checked_add(nanos).ok_or_else(overflow)?;
        rest = after;
    }

    // Durations beyond ~292 years are rejected like any other overflow.
    let total = u64::try_from(total)
        .ok()
        .filter(|n| i64::try_from(*n).is_ok())
        .ok_or_else(|| format!("invalid duration \"{input}\": out of range"))?;

    if negative && total != 0 {
        return Err(format!("negative duration \"{input}\" is not a valid interval"));
    }

    Ok(Duration::from_nanos(total))
}
