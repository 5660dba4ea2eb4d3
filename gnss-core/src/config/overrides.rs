//! `key=value` overrides layered on top of an [`AcquisitionConfig`].
//!
//! Accepted keys: `attempts`, `timeout-ticks`, `poll`, `threshold`, `floor`,
//! `idle`. Durations take an `ms` or `s` suffix (`poll=250ms`, `idle=10s`).
//! Tokens are separated by whitespace and applied left to right.

use core::{fmt, time::Duration};

use winnow::ascii::{digit1, multispace0};
use winnow::combinator::alt;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_while;

use super::AcquisitionConfig;

/// Configuration field addressed by an override token.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OverrideKey {
    Attempts,
    TimeoutTicks,
    Poll,
    Threshold,
    Floor,
    Idle,
}

impl OverrideKey {
    /// Every key, in the order they are listed in help output.
    pub const ALL: [OverrideKey; 6] = [
        OverrideKey::Attempts,
        OverrideKey::TimeoutTicks,
        OverrideKey::Poll,
        OverrideKey::Threshold,
        OverrideKey::Floor,
        OverrideKey::Idle,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OverrideKey::Attempts => "attempts",
            OverrideKey::TimeoutTicks => "timeout-ticks",
            OverrideKey::Poll => "poll",
            OverrideKey::Threshold => "threshold",
            OverrideKey::Floor => "floor",
            OverrideKey::Idle => "idle",
        }
    }

    /// Case-insensitive lookup by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(name))
    }
}

/// Errors raised while applying override tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverrideError<'a> {
    /// Token at `offset` is not of the form `key=value`.
    Syntax { offset: usize },
    /// Key is not one of [`OverrideKey::ALL`].
    UnknownKey(&'a str),
    /// Value could not be parsed for the given key.
    InvalidValue { key: OverrideKey, value: &'a str },
}

impl fmt::Display for OverrideError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideError::Syntax { offset } => {
                write!(f, "expected key=value at offset {offset}")
            }
            OverrideError::UnknownKey(key) => write!(f, "unknown key `{key}`"),
            OverrideError::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for `{}`", key.name())
            }
        }
    }
}

/// Applies whitespace-separated `key=value` tokens to `base`.
pub fn apply_overrides(
    base: AcquisitionConfig,
    input: &str,
) -> Result<AcquisitionConfig, OverrideError<'_>> {
    let mut config = base;
    let mut rest = input;

    loop {
        skip_whitespace(&mut rest);
        if rest.is_empty() {
            break;
        }

        let offset = input.len() - rest.len();
        let (name, value) = assignment
            .parse_next(&mut rest)
            .map_err(|_| OverrideError::Syntax { offset })?;
        let key = OverrideKey::from_name(name).ok_or(OverrideError::UnknownKey(name))?;
        apply_one(&mut config, key, value).ok_or(OverrideError::InvalidValue { key, value })?;
    }

    Ok(config)
}

fn apply_one(config: &mut AcquisitionConfig, key: OverrideKey, value: &str) -> Option<()> {
    match key {
        OverrideKey::Attempts => config.max_attempts = value.parse().ok()?,
        OverrideKey::TimeoutTicks => config.wait_timeout_ticks = value.parse().ok()?,
        OverrideKey::Poll => config.poll_interval = parse_duration(value)?,
        OverrideKey::Threshold => {
            let threshold: f32 = value.parse().ok()?;
            if !threshold.is_finite() {
                return None;
            }
            config.confidence_threshold = threshold;
        }
        OverrideKey::Floor => config.strong_signal_floor = value.parse().ok()?,
        OverrideKey::Idle => config.idle_between_cycles = parse_duration(value)?,
    }
    Some(())
}

/// Parses `<digits>ms` or `<digits>s`.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let (amount, unit) = duration_parts.parse(value).ok()?;
    let amount: u64 = amount.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(amount)),
        _ => Some(Duration::from_secs(amount)),
    }
}

fn skip_whitespace(input: &mut &str) {
    let _: Result<&str, ContextError> = multispace0.parse_next(input);
}

fn assignment<'a>(input: &mut &'a str) -> Result<(&'a str, &'a str), ContextError> {
    let name = key.parse_next(input)?;
    equals.parse_next(input)?;
    let value = value.parse_next(input)?;
    Ok((name, value))
}

fn key<'a>(input: &mut &'a str) -> Result<&'a str, ContextError> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_').parse_next(input)
}

fn equals(input: &mut &str) -> Result<char, ContextError> {
    '='.parse_next(input)
}

fn value<'a>(input: &mut &'a str) -> Result<&'a str, ContextError> {
    take_while(1.., |c: char| !c.is_ascii_whitespace()).parse_next(input)
}

fn duration_parts<'a>(input: &mut &'a str) -> Result<(&'a str, &'a str), ContextError> {
    (digit1, alt(("ms", "s"))).parse_next(input)
}
