//! Timestamp utilities

use chrono::Local;

/// Current local time in ISO 8601 form without a zone offset
/// (e.g. `2020-06-01T12:00:00.123456`)
pub fn now_iso() -> String {
    Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Convert a run timestamp into the site-local datetime recorded with traits
///
/// A bare date gets a noon time appended. A trailing zone offset introduced by a
/// `-` after the time separator is removed; site definitions carry their own
/// offsets. Positive offsets (`+hh:mm`) are left as given.
pub fn local_datetime(timestamp: &str) -> String {
    let mut timestamp = timestamp.to_string();
    if !timestamp.contains('T') {
        timestamp.push_str("T12:00:00");
    }

    match (timestamp.find('T'), timestamp.rfind('-')) {
        (Some(t_pos), Some(dash_pos)) if t_pos > 0 && t_pos < dash_pos => {
            timestamp[..dash_pos].to_string()
        }
        _ => timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_only_gets_noon() {
        assert_eq!(local_datetime("2020-06-01"), "2020-06-01T12:00:00");
    }

    #[test]
    fn test_negative_offset_removed() {
        assert_eq!(
            local_datetime("2020-06-01T08:15:00-07:00"),
            "2020-06-01T08:15:00"
        );
    }

    #[test]
    fn test_no_offset_unchanged() {
        assert_eq!(local_datetime("2020-06-01T08:15:00"), "2020-06-01T08:15:00");
    }

    #[test]
    fn test_positive_offset_kept() {
        assert_eq!(
            local_datetime("2020-06-01T08:15:00+02:00"),
            "2020-06-01T08:15:00+02:00"
        );
    }

    #[test]
    fn test_now_iso_shape() {
        let now = now_iso();
        assert_eq!(now.find('T'), Some(10));
        assert!(!now.contains('+'));
        // Should be a reasonable timestamp (after year 2000)
        assert!(now.as_str() > "2000-01-01");
    }
}
