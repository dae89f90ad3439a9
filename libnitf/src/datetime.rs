use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::file_type::FileType;

/// Width of every date/time field (`FDT`, `IDATIM`, `TXTDT`)
pub const DATE_TIME_WIDTH: usize = 14;

const NITF20_MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// A fixed-width date/time field
///
/// The source text is what gets written back; `parsed` is a convenience view that is `None`
/// when the text does not hold a (possibly partial) valid date.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NitfDateTime {
    source: String,
    parsed: Option<NaiveDateTime>,
}

impl NitfDateTime {
    /// Interprets `source` in the date layout of `file_type`
    #[must_use]
    pub fn parse(source: &str, file_type: FileType) -> Self {
        let parsed = if file_type.is_nitf20() {
            parse_nitf20(source)
        } else {
            parse_nitf21(source)
        };
        if parsed.is_none() && !source.trim_matches(|c| c == ' ' || c == '-').is_empty() {
            warn!("unable to interpret date/time {source:?}");
        }
        Self {
            source: source.to_owned(),
            parsed,
        }
    }

    /// Formats `value` in the date layout of `file_type`
    #[must_use]
    pub fn from_datetime(value: NaiveDateTime, file_type: FileType) -> Self {
        let source = if file_type.is_nitf20() {
            let month = NITF20_MONTHS[value.month0() as usize];
            format!(
                "{}Z{month}{}",
                value.format("%d%H%M%S"),
                value.format("%y")
            )
        } else {
            value.format("%Y%m%d%H%M%S").to_string()
        };
        Self {
            source,
            parsed: Some(value),
        }
    }

    /// The text as read
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The interpreted date/time, if the text held one
    #[must_use]
    pub const fn value(&self) -> Option<NaiveDateTime> {
        self.parsed
    }
}

// CCYYMMDDhhmmss, with unknown trailing parts replaced by '-'.
fn parse_nitf21(source: &str) -> Option<NaiveDateTime> {
    let known = source.trim_end_matches(['-', ' ']);
    if known.len() < 4 || known.len() % 2 != 0 || !known.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = |range: std::ops::Range<usize>, default: u32| {
        known.get(range).map_or(Some(default), |s| s.parse().ok())
    };
    let year = known.get(0..4)?.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4..6, 1)?, field(6..8, 1)?)?;
    date.and_hms_opt(field(8..10, 0)?, field(10..12, 0)?, field(12..14, 0)?)
}

// DDhhmmssZMONYY
fn parse_nitf20(source: &str) -> Option<NaiveDateTime> {
    if source.len() != DATE_TIME_WIDTH || source.as_bytes().get(8) != Some(&b'Z') {
        return None;
    }
    let number = |range: std::ops::Range<usize>| source.get(range)?.parse::<u32>().ok();
    let month = NITF20_MONTHS
        .iter()
        .position(|m| source.get(9..12) == Some(*m))?;
    let short_year = i32::try_from(number(12..14)?).ok()?;
    // two digit years pivot at 1970
    let year = if short_year < 70 {
        2000 + short_year
    } else {
        1900 + short_year
    };
    let date = NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()? + 1, number(0..2)?)?;
    date.and_hms_opt(number(2..4)?, number(4..6)?, number(6..8)?)
}
