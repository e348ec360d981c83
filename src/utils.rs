use chrono::{DateTime, Utc};

/// Current Unix timestamp in seconds
pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

/// Format a Unix timestamp as an ISO date string (YYYY-MM-DD)
pub fn iso_date(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}

/// Current time as an RFC 3339 string, for `generated_at` fields
pub fn rfc3339_now() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_date_formats_utc() {
        assert_eq!(iso_date(0), "1970-01-01");
        assert_eq!(iso_date(1_700_000_000), "2023-11-14");
    }

    #[test]
    fn iso_date_out_of_range_falls_back() {
        assert_eq!(iso_date(i64::MAX), "1970-01-01");
    }
}
