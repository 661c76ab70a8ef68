//! Utility functions for batch ids and timestamps.

use chrono::Utc;
use uuid::Uuid;

/// Returns the current UTC time as an RFC 3339 string with microseconds.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Generates a time-ordered id for a batch run.
#[must_use]
pub fn generate_batch_id() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_id_is_v7() {
        let id = generate_batch_id();
        assert_eq!(id.get_version_num(), 7);
    }

    #[test]
    fn test_batch_ids_are_unique() {
        assert_ne!(generate_batch_id(), generate_batch_id());
    }

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with("+00:00"));
    }
}
