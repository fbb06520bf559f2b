#![warn(missing_docs, missing_debug_implementations)]
#![doc = r" Utilities shared across the sanalpos crates: cryptographic"]
#![doc = r" primitives, field-level encryption, parsing helpers and the"]
#![doc = r" outbound request model."]

pub mod card;
pub mod consts;
pub mod crypto;
pub mod encryption;
pub mod errors;
pub mod ext_traits;
pub mod request;
pub mod types;

/// Date-time utilities.
pub mod date_time {
    use time::{
        format_description::FormatItem, macros::format_description, OffsetDateTime,
        PrimitiveDateTime,
    };

    /// Compact datetime stamp: 20240314151623
    const YYYYMMDDHHMMSS: &[FormatItem<'static>] =
        format_description!("[year][month][day][hour][minute][second]");

    /// Create a new [`OffsetDateTime`] with the current date and time in UTC.
    pub fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    /// Current UTC time as `YYYYMMDDHHmmss`, the compact stamp legacy
    /// acquirer protocols expect.
    pub fn now_yyyymmddhhmmss() -> String {
        let utc = now();
        PrimitiveDateTime::new(utc.date(), utc.time())
            .format(&YYYYMMDDHHMMSS)
            .unwrap_or_default()
    }

    /// Current unix timestamp in seconds.
    pub fn unix_timestamp() -> i64 {
        now().unix_timestamp()
    }

    #[cfg(test)]
    mod tests {
        #[test]
        fn compact_stamp_is_fourteen_digits() {
            let stamp = super::now_yyyymmddhhmmss();
            assert_eq!(stamp.len(), 14);
            assert!(stamp.chars().all(|c| c.is_ascii_digit()));
        }
    }
}

/// Generate a v4 uuid in simple (un-hyphenated) format, used for
/// transaction and order identifiers.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub use uuid;
