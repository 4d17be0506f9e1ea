//! Mapping from domain error codes to HTTP-like statuses.
//!
//! Codes look like `<PREFIX>_<NNN>`. Known prefixes resolve through a fixed
//! per-family table:
//!
//! | Prefix | Default | Exceptions |
//! |--------|---------|------------|
//! | `AUTH` | 401 | `005`, `006` → 403 |
//! | `USER`, `ADMIN` | 400 | `001` → 404, `002`/`003` → 409, `004` → 403 |
//! | `BOOK` | 400 | `001` → 404, `002` → 409 |
//! | `COURSE` | 404 | `007` → 400 |
//! | `VAL` | 400 | |
//! | `EXT` | 502 | `001` → 503, `002` → 504 |
//! | `DB` | 500 | `001` → 409, `002` → 404, `003` → 400, `004` → 503 |
//! | `SYS` | 500 | `002`/`005` → 503, `003` → 408, `004` → 429 |
//!
//! Anything else falls back to substring matching on the code and message
//! text, for producers that still emit free-form errors.

use http::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorFamily {
    Auth,
    User,
    Admin,
    Booking,
    Course,
    Validation,
    External,
    Database,
    System,
}

impl ErrorFamily {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "AUTH" => Some(ErrorFamily::Auth),
            "USER" => Some(ErrorFamily::User),
            "ADMIN" => Some(ErrorFamily::Admin),
            "BOOK" => Some(ErrorFamily::Booking),
            "COURSE" => Some(ErrorFamily::Course),
            "VAL" => Some(ErrorFamily::Validation),
            "EXT" => Some(ErrorFamily::External),
            "DB" => Some(ErrorFamily::Database),
            "SYS" => Some(ErrorFamily::System),
            _ => None,
        }
    }

    pub fn default_status(self) -> StatusCode {
        match self {
            ErrorFamily::Auth => StatusCode::UNAUTHORIZED,
            ErrorFamily::User | ErrorFamily::Admin => StatusCode::BAD_REQUEST,
            ErrorFamily::Booking => StatusCode::BAD_REQUEST,
            ErrorFamily::Course => StatusCode::NOT_FOUND,
            ErrorFamily::Validation => StatusCode::BAD_REQUEST,
            ErrorFamily::External => StatusCode::BAD_GATEWAY,
            ErrorFamily::Database => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorFamily::System => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Status for condition `number` within this family.
    pub fn status_for(self, number: u16) -> StatusCode {
        use ErrorFamily::*;

        match (self, number) {
            (Auth, 5 | 6) => StatusCode::FORBIDDEN,

            (User | Admin, 1) => StatusCode::NOT_FOUND,
            (User | Admin, 2 | 3) => StatusCode::CONFLICT,
            (User | Admin, 4) => StatusCode::FORBIDDEN,

            (Booking, 1) => StatusCode::NOT_FOUND,
            (Booking, 2) => StatusCode::CONFLICT,

            (Course, 7) => StatusCode::BAD_REQUEST,

            (External, 1) => StatusCode::SERVICE_UNAVAILABLE,
            (External, 2) => StatusCode::GATEWAY_TIMEOUT,

            (Database, 1) => StatusCode::CONFLICT,
            (Database, 2) => StatusCode::NOT_FOUND,
            (Database, 3) => StatusCode::BAD_REQUEST,
            (Database, 4) => StatusCode::SERVICE_UNAVAILABLE,

            (System, 2 | 5) => StatusCode::SERVICE_UNAVAILABLE,
            (System, 3) => StatusCode::REQUEST_TIMEOUT,
            (System, 4) => StatusCode::TOO_MANY_REQUESTS,

            _ => self.default_status(),
        }
    }
}

/// Split a code into its family and condition number.
///
/// Only the exact `<KNOWN_PREFIX>_<digits>` form parses; `USER_NOT_FOUND` or
/// `FOO_001` return `None`.
pub fn parse_code(code: &str) -> Option<(ErrorFamily, u16)> {
    let (prefix, suffix) = code.split_once('_')?;
    let family = ErrorFamily::from_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number = suffix.parse().ok()?;
    Some((family, number))
}

/// Substring rules for codes outside the table, checked in order.
const HEURISTICS: &[(&[&str], StatusCode)] = &[
    (&["NOT_FOUND"], StatusCode::NOT_FOUND),
    (&["UNAUTHORIZED"], StatusCode::UNAUTHORIZED),
    (&["DUPLICATE", "ALREADY_EXISTS"], StatusCode::CONFLICT),
    (&["TIMEOUT"], StatusCode::REQUEST_TIMEOUT),
    (&["UNAVAILABLE"], StatusCode::SERVICE_UNAVAILABLE),
];

fn heuristic_status(code: &str, message: &str) -> StatusCode {
    let haystack = format!("{} {}", code, message).to_ascii_uppercase();

    HEURISTICS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| haystack.contains(n)))
        .map(|(_, status)| *status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Resolve the status for a declared error.
///
/// The table wins whenever the code parses; the message is only consulted by
/// the fallback rules.
pub fn status_for_code(code: &str, message: &str) -> StatusCode {
    match parse_code(code) {
        Some((family, number)) => family.status_for(number),
        None => heuristic_status(code, message),
    }
}
