//! Remote commands written to the telemetry characteristic.
//!
//! The peer writes a decimal ASCII integer (optionally signed): the pace
//! marker interval in seconds, where values ≤ 0 disable the marker.
//! Input is clamped to the local decode buffer before parsing and any
//! malformed payload is rejected rather than read as zero.

use crate::config::COMMAND_BUFFER_SIZE;
use crate::error::ParseError;
use crate::marker::PaceMarker;

/// Longest input considered; anything beyond is ignored.
pub const MAX_COMMAND_LEN: usize = COMMAND_BUFFER_SIZE - 1;

/// Control command decoded from a characteristic write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Set the pace marker period in seconds (≤ 0 stops it).
    SetMarkerInterval(i32),
}

/// Parse a raw characteristic write.
pub fn parse(raw: &[u8]) -> Result<Command, ParseError> {
    let clamped = &raw[..raw.len().min(MAX_COMMAND_LEN)];
    parse_decimal(clamped.trim_ascii()).map(Command::SetMarkerInterval)
}

/// Parse a write and forward it to the marker. Nothing is forwarded on
/// error.
pub fn on_write(raw: &[u8], marker: &PaceMarker) -> Result<Command, ParseError> {
    let command = parse(raw)?;
    match command {
        Command::SetMarkerInterval(seconds) => marker.set_interval(seconds),
    }
    Ok(command)
}

fn parse_decimal(text: &[u8]) -> Result<i32, ParseError> {
    let (negative, digits) = match text.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some((b'+', rest)) => (false, rest),
        _ => (false, text),
    };
    if digits.is_empty() {
        return Err(ParseError::Empty);
    }

    // Accumulate towards the sign so i32::MIN parses.
    let mut value: i32 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(ParseError::InvalidDigit);
        }
        let digit = i32::from(b - b'0');
        value = value.checked_mul(10).ok_or(ParseError::Overflow)?;
        value = if negative {
            value.checked_sub(digit)
        } else {
            value.checked_add(digit)
        }
        .ok_or(ParseError::Overflow)?;
    }
    Ok(value)
}
