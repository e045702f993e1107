//! HTTP-date parsing and formatting.

use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
/// Obsolete RFC 850 form, e.g. `Sunday, 06-Nov-94 08:49:37 GMT`.
const RFC_850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
/// ANSI C asctime() form, e.g. `Sun Nov  6 08:49:37 1994`.
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

/// Parse an HTTP-date. All forms are interpreted as UTC.
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    let value = value.trim();
    [IMF_FIXDATE, RFC_850, ASCTIME]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| SystemTime::from(naive.and_utc()))
}

/// Format a timestamp as an IMF-fixdate.
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(IMF_FIXDATE).to_string()
}
