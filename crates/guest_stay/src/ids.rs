//! Identifiers for guest stays.

use core::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use folio_core::{DomainError, StreamId};

/// Wire/URL format of a stay date.
pub const STAY_DATE_FORMAT: &str = "%Y-%m-%d";

macro_rules! impl_string_id {
    ($t:ident, $name:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $t(String);

        impl $t {
            /// Parse an identifier; surrounding whitespace is dropped and blanks are rejected.
            pub fn new(value: impl AsRef<str>) -> Result<Self, DomainError> {
                let trimmed = value.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(concat!($name, ": cannot be empty")));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

impl_string_id!(GuestId, "GuestId");
impl_string_id!(RoomId, "RoomId");

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_stay_date(value: &str) -> Result<NaiveDate, DomainError> {
    let trimmed = value.trim();
    // chrono accepts unpadded fields; the wire format is fixed-width.
    if trimmed.len() != 10 {
        return Err(DomainError::validation(format!(
            "stay date must be YYYY-MM-DD (got '{value}')"
        )));
    }
    NaiveDate::parse_from_str(trimmed, STAY_DATE_FORMAT).map_err(|e| {
        DomainError::validation(format!("stay date must be YYYY-MM-DD (got '{value}'): {e}"))
    })
}

/// Identifier of a guest stay account (folio).
///
/// Derived deterministically from guest, room and the calendar day of check-in,
/// so every request naming the same stay resolves to the same event stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestStayAccountId(StreamId);

impl GuestStayAccountId {
    pub const CATEGORY: &'static str = "guest_stay_account";

    pub fn new(guest_id: &GuestId, room_id: &RoomId, stay_start: NaiveDate) -> Self {
        Self(StreamId::with_category(
            Self::CATEGORY,
            format_args!("{guest_id}-{room_id}-{}", stay_start.format(STAY_DATE_FORMAT)),
        ))
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl core::fmt::Display for GuestStayAccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<GuestStayAccountId> for StreamId {
    fn from(value: GuestStayAccountId) -> Self {
        value.0
    }
}
