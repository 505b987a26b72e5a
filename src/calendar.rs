//! Month window and date wording used by the booking pages

use std::fmt;

use chrono::{Datelike, Local, NaiveDate};

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Weeks of the month a booking can ask for.
pub const WEEKS: [u8; 4] = [1, 2, 3, 4];

/// English name of a month numbered 1 to 12.
pub fn month_name(month: u32) -> Option<&'static str> {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i as usize))
        .copied()
}

/// A calendar month in a specific year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    /// 1 to 12
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month containing today's local date.
    pub fn current() -> Self {
        Self::of(Local::now().date_naive())
    }

    pub fn plus_months(self, n: u32) -> Self {
        let zero_based = self.year as i64 * 12 + (self.month as i64 - 1) + n as i64;
        Self {
            year: zero_based.div_euclid(12) as i32,
            month: zero_based.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn name(&self) -> &'static str {
        // month is kept in 1..=12 by every constructor
        MONTH_NAMES[(self.month as usize - 1) % 12]
    }

    /// Finds the month in `window` matching `input`, given either as a bare
    /// month name ("March") or with its year ("March 2026"). Case-insensitive.
    pub fn parse_name_in(window: &[YearMonth], input: &str) -> Option<YearMonth> {
        let input = input.trim();
        window.iter().copied().find(|ym| {
            ym.name().eq_ignore_ascii_case(input) || ym.to_string().eq_ignore_ascii_case(input)
        })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.year)
    }
}

/// The month of `today` followed by the next `ahead` months.
pub fn lookahead_months(today: NaiveDate, ahead: u32) -> Vec<YearMonth> {
    let start = YearMonth::of(today);
    (0..=ahead).map(|i| start.plus_months(i)).collect()
}

/// `1` becomes `1st`, `12` becomes `12th`, `22` becomes `22nd`.
pub fn ordinal(n: u32) -> String {
    let suffix = match (n % 100, n % 10) {
        (11..=13, _) => "th",
        (_, 1) => "st",
        (_, 2) => "nd",
        (_, 3) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_within_year() {
        let window = lookahead_months(date(2026, 3, 15), 3);
        let names: Vec<_> = window.iter().map(|m| m.name()).collect();
        assert_eq!(names, ["March", "April", "May", "June"]);
        assert!(window.iter().all(|m| m.year == 2026));
    }

    #[test]
    fn window_rolls_over_year() {
        let window = lookahead_months(date(2026, 11, 30), 3);
        assert_eq!(
            window,
            vec![
                YearMonth { year: 2026, month: 11 },
                YearMonth { year: 2026, month: 12 },
                YearMonth { year: 2027, month: 1 },
                YearMonth { year: 2027, month: 2 },
            ]
        );
    }

    #[test]
    fn parse_names() {
        let window = lookahead_months(date(2026, 12, 1), 3);
        assert_eq!(
            YearMonth::parse_name_in(&window, "january"),
            Some(YearMonth { year: 2027, month: 1 })
        );
        assert_eq!(
            YearMonth::parse_name_in(&window, "December 2026"),
            Some(YearMonth { year: 2026, month: 12 })
        );
        assert_eq!(YearMonth::parse_name_in(&window, "December 2027"), None);
        assert_eq!(YearMonth::parse_name_in(&window, "July"), None);
    }

    #[test]
    fn month_names() {
        assert_eq!(month_name(1), Some("January"));
        assert_eq!(month_name(12), Some("December"));
        assert_eq!(month_name(0), None);
        assert_eq!(month_name(13), None);
        assert!(YearMonth::new(2026, 13).is_none());
        assert_eq!(YearMonth::new(2026, 7).unwrap().to_string(), "July 2026");
    }

    #[test]
    fn ordinals() {
        let cases = [
            (1, "1st"),
            (2, "2nd"),
            (3, "3rd"),
            (4, "4th"),
            (11, "11th"),
            (12, "12th"),
            (13, "13th"),
            (21, "21st"),
            (22, "22nd"),
            (101, "101st"),
            (111, "111th"),
        ];
        for (n, expected) in cases {
            assert_eq!(ordinal(n), expected);
        }
    }
}
