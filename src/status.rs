//! Protocol status codes and the `Status` value carried by `error`/`ack`
//! instructions.

use std::fmt;

/// A closed enumeration of protocol status codes.
///
/// The numeric values are part of the wire format and must not be
/// renumbered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum StatusCode {
    Success,
    Unsupported,
    ServerError,
    ServerBusy,
    UpstreamTimeout,
    UpstreamError,
    ResourceNotFound,
    ResourceConflict,
    ResourceClosed,
    UpstreamNotFound,
    UpstreamUnavailable,
    SessionConflict,
    SessionTimeout,
    SessionClosed,
    ClientBadRequest,
    ClientUnauthorized,
    ClientForbidden,
    ClientTimeout,
    ClientOverrun,
    ClientBadType,
    ClientTooMany,
    /// A code outside the closed enumeration above. The protocol tolerates
    /// unknown codes arriving from a newer gateway; they round-trip as-is.
    Other(u16),
}

impl StatusCode {
    pub fn code(self) -> u16 {
        use StatusCode::*;
        match self {
            Success => 0x0000,
            Unsupported => 0x0100,
            ServerError => 0x0200,
            ServerBusy => 0x0201,
            UpstreamTimeout => 0x0202,
            UpstreamError => 0x0203,
            ResourceNotFound => 0x0204,
            ResourceConflict => 0x0205,
            ResourceClosed => 0x0206,
            UpstreamNotFound => 0x0207,
            UpstreamUnavailable => 0x0208,
            SessionConflict => 0x0209,
            SessionTimeout => 0x020A,
            SessionClosed => 0x020B,
            ClientBadRequest => 0x0300,
            ClientUnauthorized => 0x0301,
            ClientForbidden => 0x0303,
            ClientTimeout => 0x0308,
            ClientOverrun => 0x030D,
            ClientBadType => 0x030F,
            ClientTooMany => 0x031D,
            Other(c) => c,
        }
    }

    pub fn from_code(code: u16) -> Self {
        use StatusCode::*;
        match code {
            0x0000 => Success,
            0x0100 => Unsupported,
            0x0200 => ServerError,
            0x0201 => ServerBusy,
            0x0202 => UpstreamTimeout,
            0x0203 => UpstreamError,
            0x0204 => ResourceNotFound,
            0x0205 => ResourceConflict,
            0x0206 => ResourceClosed,
            0x0207 => UpstreamNotFound,
            0x0208 => UpstreamUnavailable,
            0x0209 => SessionConflict,
            0x020A => SessionTimeout,
            0x020B => SessionClosed,
            0x0300 => ClientBadRequest,
            0x0301 => ClientUnauthorized,
            0x0303 => ClientForbidden,
            0x0308 => ClientTimeout,
            0x030D => ClientOverrun,
            0x030F => ClientBadType,
            0x031D => ClientTooMany,
            other => Other(other),
        }
    }

    /// Whether an ack/ack-like response carrying this code indicates success.
    pub fn is_success(self) -> bool {
        self.code() == StatusCode::Success.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.code())
    }
}

/// `(code, message)` as carried by `error` and `ack` instructions.
#[derive(Clone, Debug, PartialEq)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn success() -> Self {
        Self::new(StatusCode::Success, String::new())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_codes() {
        for code in [
            StatusCode::Success,
            StatusCode::Unsupported,
            StatusCode::ServerError,
            StatusCode::SessionClosed,
            StatusCode::ClientTooMany,
        ] {
            assert_eq!(StatusCode::from_code(code.code()), code);
        }
    }

    #[test]
    fn unknown_code_round_trips_as_other() {
        assert_eq!(StatusCode::from_code(0x0042), StatusCode::Other(0x0042));
        assert_eq!(StatusCode::Other(0x0042).code(), 0x0042);
    }

    #[test]
    fn success_is_zero() {
        assert!(StatusCode::Success.is_success());
        assert!(!StatusCode::ServerError.is_success());
    }
}
