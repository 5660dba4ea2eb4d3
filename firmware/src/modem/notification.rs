//! Decoding of the modem's result codes and fix-ready notification.
//!
//! Final result codes (`OK`, `ERROR`, `+CME ERROR: <n>`) complete a command.
//! For the fix-ready line, only the fields the acquisition loop consumes are kept; the timestamp and
//! velocity components are skipped.
//!
//! ```text
//! +LPGNSSFIXREADY: 1,"2024-02-21T12:27:05",41000,"42.5","50.85","4.35","62.5","0.1","0.2","0.0",("17","33"),("23","28")
//! ```

use core::fmt;
use core::str::FromStr;

use gnss_core::fix::{FixRecord, SatelliteInfo};
use heapless::Vec;
use winnow::ascii::{dec_uint, space0};
use winnow::combinator::{delimited, opt, preceded, repeat, separated_pair};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_till;

/// Prefix of the unsolicited fix-ready line.
pub const FIX_READY_PREFIX: &str = "+LPGNSSFIXREADY:";

const CME_ERROR_PREFIX: &str = "+CME ERROR:";

/// Longest modem line retained by [`LineAssembler`].
pub const MAX_LINE_LEN: usize = 512;

/// Failures while decoding a fix-ready line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NotificationError {
    /// Line does not match the expected layout at `offset`.
    Malformed { offset: usize },
    /// More satellites than a fix can hold.
    TooManySatellites,
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationError::Malformed { offset } => {
                write!(f, "malformed fix notification at offset {offset}")
            }
            NotificationError::TooManySatellites => f.write_str("too many satellites in fix"),
        }
    }
}

/// Final result code closing an AT command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FinalResult {
    Ok,
    Error,
    /// Extended error. The code is absent when the modem reports it verbosely.
    CmeError(Option<u16>),
}

impl fmt::Display for FinalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalResult::Ok => f.write_str("OK"),
            FinalResult::Error => f.write_str("ERROR"),
            FinalResult::CmeError(Some(code)) => write!(f, "+CME ERROR: {code}"),
            FinalResult::CmeError(None) => f.write_str("+CME ERROR"),
        }
    }
}

/// Recognises a final result line. Echoes, intermediate responses and
/// unsolicited lines yield `None`.
#[must_use]
pub fn final_result(line: &str) -> Option<FinalResult> {
    match line.trim() {
        "OK" => Some(FinalResult::Ok),
        "ERROR" => Some(FinalResult::Error),
        other => other
            .strip_prefix(CME_ERROR_PREFIX)
            .map(|code| FinalResult::CmeError(code.trim().parse().ok())),
    }
}

#[must_use]
pub fn is_fix_ready(line: &str) -> bool {
    line.starts_with(FIX_READY_PREFIX)
}

/// Decodes a complete fix-ready line (without the trailing CR/LF).
pub fn decode_fix_ready(line: &str) -> Result<FixRecord, NotificationError> {
    let mut input = line.trim_end();
    let malformed = |rest: &str| NotificationError::Malformed {
        offset: line.len() - rest.len(),
    };

    let mut fix = fix_header.parse_next(&mut input).map_err(|_| malformed(input))?;

    while let Some(satellite) = next_satellite
        .parse_next(&mut input)
        .map_err(|_| malformed(input))?
    {
        fix.push_satellite(satellite)
            .map_err(|_| NotificationError::TooManySatellites)?;
    }

    if input.is_empty() {
        Ok(fix)
    } else {
        Err(malformed(input))
    }
}

fn fix_header(input: &mut &str) -> Result<FixRecord, ContextError> {
    let (fix_id, _timestamp, time_to_fix_ms, confidence, latitude, longitude, height) = (
        preceded((FIX_READY_PREFIX, space0), dec_uint),
        preceded(',', quoted),
        preceded(',', dec_uint),
        preceded(',', quoted_number::<f32>),
        preceded(',', quoted_number::<f64>),
        preceded(',', quoted_number::<f64>),
        preceded(',', quoted_number::<f32>),
    )
        .parse_next(input)?;

    // Velocity components.
    let (): () = repeat(0.., preceded(',', quoted)).parse_next(input)?;

    Ok(FixRecord::new(fix_id, confidence, latitude, longitude)
        .with_time_to_fix(time_to_fix_ms)
        .with_height(height))
}

fn next_satellite(input: &mut &str) -> Result<Option<SatelliteInfo>, ContextError> {
    opt(preceded(',', satellite)).parse_next(input)
}

fn satellite(input: &mut &str) -> Result<SatelliteInfo, ContextError> {
    delimited(
        '(',
        separated_pair(quoted_number::<u8>, ',', quoted_number::<u8>),
        ')',
    )
    .map(|(number, signal_strength)| SatelliteInfo::new(number, signal_strength))
    .parse_next(input)
}

fn quoted<'a>(input: &mut &'a str) -> Result<&'a str, ContextError> {
    delimited('"', take_till(0.., '"'), '"').parse_next(input)
}

fn quoted_number<T: FromStr>(input: &mut &str) -> Result<T, ContextError> {
    quoted
        .verify_map(|text: &str| text.parse::<T>().ok())
        .parse_next(input)
}

/// Collects modem bytes into CR/LF terminated lines.
pub struct LineAssembler {
    buffer: Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
    line_ready: bool,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflowed: false,
            line_ready: false,
        }
    }

    /// Feeds one byte; returns the completed line on LF.
    ///
    /// Lines longer than [`MAX_LINE_LEN`] or not valid UTF-8 are dropped.
    pub fn push(&mut self, byte: u8) -> Option<&str> {
        if self.line_ready {
            self.buffer.clear();
            self.line_ready = false;
        }

        match byte {
            b'\n' => {
                self.line_ready = true;
                if core::mem::replace(&mut self.overflowed, false) {
                    return None;
                }
                let text = core::str::from_utf8(&self.buffer).ok()?;
                (!text.is_empty()).then_some(text)
            }
            b'\r' => None,
            _ => {
                if self.buffer.push(byte).is_err() {
                    self.overflowed = true;
                }
                None
            }
        }
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}
