//! Unified error types for pulsepace.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

use embedded_hal_async::i2c::ErrorKind;

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Sensor bus transaction failed.
    Bus(BusError),

    /// A remote command could not be parsed.
    Parse(ParseError),

    /// The wireless transport refused an operation.
    Transport(TransportError),
}

/// Sensor bus failures. A timeout is a bus error, not a hang.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// The device did not acknowledge its address or a data byte.
    NoAcknowledge,
    /// Lost arbitration to another bus master.
    ArbitrationLoss,
    /// Misplaced start/stop condition or similar bus fault.
    Bus,
    /// Data was lost because it was not read in time.
    Overrun,
    /// The transaction did not finish within `BUS_TIMEOUT_MS`.
    Timeout,
    /// Any other HAL-reported failure.
    Other,
}

impl From<ErrorKind> for BusError {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NoAcknowledge(_) => BusError::NoAcknowledge,
            ErrorKind::ArbitrationLoss => BusError::ArbitrationLoss,
            ErrorKind::Bus => BusError::Bus,
            ErrorKind::Overrun => BusError::Overrun,
            _ => BusError::Other,
        }
    }
}

/// Malformed pace-marker command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Nothing but whitespace (or a bare sign) was written.
    Empty,
    /// A byte that is not an ASCII digit.
    InvalidDigit,
    /// The value does not fit an `i32`.
    Overflow,
}

/// Wireless transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Advertising could not be started (raw SoftDevice code when known).
    AdvertisingFailed(u32),
    /// A notification was rejected by the stack.
    NotifyFailed,
}

// Convenience conversions

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Error::Bus(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}
