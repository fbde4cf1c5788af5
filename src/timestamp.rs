use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;

/// Timezone the derived timestamps are expressed in.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::US::Eastern;

/// Fixed-offset filename layout: a date slice, a time slice, and the
/// chrono format the concatenation parses under. The byte at offset 8
/// (the separator in `20230615_143000`) is never inspected.
#[derive(Debug, Clone)]
pub struct NameLayout {
    pub date_span: (usize, usize),
    pub time_span: (usize, usize),
    pub format: &'static str,
}

impl Default for NameLayout {
    fn default() -> Self {
        Self {
            date_span: (0, 8),
            time_span: (9, 15),
            format: "%Y%m%d%H%M%S",
        }
    }
}

/// Derive the capture instant encoded in a filename.
///
/// The sliced digits are parsed as naive UTC and converted to `tz`.
/// Returns None when the name is too short, a slice lands on a
/// non-ASCII boundary, or the digits do not form a valid datetime.
/// No alternate layouts are tried.
pub fn derive_timestamp(filename: &str, layout: &NameLayout, tz: Tz) -> Option<DateTime<Tz>> {
    let date = filename.get(layout.date_span.0..layout.date_span.1)?;
    let time = filename.get(layout.time_span.0..layout.time_span.1)?;
    let naive = NaiveDateTime::parse_from_str(&format!("{date}{time}"), layout.format).ok()?;
    Some(naive.and_utc().with_timezone(&tz))
}
