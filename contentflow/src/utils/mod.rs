//! Utility helpers for timestamps and text handling.

pub mod text;
pub mod timestamps;

pub use text::{identity_hash, is_url, slugify, strip_tags, truncate_chars};
pub use timestamps::{format_iso8601, iso_timestamp, parse_feed_date, Timestamp};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.contains(':'));
    }
}
