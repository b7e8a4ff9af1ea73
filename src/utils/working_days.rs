use chrono::{Datelike, NaiveDate, Weekday};

pub fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Number of Monday–Friday dates in `[start, end]`, both ends included.
///
/// Constant time: whole weeks contribute five days each, then the leftover
/// days are walked from `start`'s weekday.
pub fn count_working_days(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return 0;
    }

    let days = (end - start).num_days() + 1;
    let first = i64::from(start.weekday().num_days_from_monday());
    let leftover = (0..days % 7)
        .filter(|offset| (first + offset) % 7 < 5)
        .count() as i64;

    days / 7 * 5 + leftover
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn counts_whole_month() {
        assert_eq!(count_working_days(date(2024, 6, 1), date(2024, 6, 30)), 20);
    }

    #[test]
    fn counts_monday_to_wednesday() {
        assert_eq!(count_working_days(date(2024, 6, 3), date(2024, 6, 5)), 3);
    }

    #[test]
    fn weekend_only_and_inverted_ranges_are_empty() {
        assert_eq!(count_working_days(date(2024, 6, 1), date(2024, 6, 2)), 0);
        assert_eq!(count_working_days(date(2024, 6, 5), date(2024, 6, 3)), 0);
    }

    #[test]
    fn single_day() {
        assert_eq!(count_working_days(date(2024, 6, 3), date(2024, 6, 3)), 1);
        assert!(is_weekend(date(2024, 6, 2)));
        assert!(!is_weekend(date(2024, 6, 3)));
    }

    fn counted_day_by_day(start: NaiveDate, end: NaiveDate) -> i64 {
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .filter(|day| !is_weekend(*day))
            .count() as i64
    }

    #[test]
    fn agrees_with_walking_every_day() {
        let origin = date(2024, 5, 27);
        for from in 0..14 {
            for len in 0..40 {
                let start = origin + chrono::Duration::days(from);
                let end = start + chrono::Duration::days(len);
                assert_eq!(
                    count_working_days(start, end),
                    counted_day_by_day(start, end),
                    "{start}..={end}"
                );
            }
        }
    }

    #[test]
    fn wide_ranges_are_counted_without_walking() {
        let (start, end) = (date(1900, 1, 1), date(2099, 12, 31));
        assert_eq!(count_working_days(start, end), counted_day_by_day(start, end));

        // NaiveDate::MIN..=MAX spans about 190 million days
        let all = count_working_days(NaiveDate::MIN, NaiveDate::MAX);
        let span = (NaiveDate::MAX - NaiveDate::MIN).num_days() + 1;
        assert!((span / 7 * 5..=span / 7 * 5 + 5).contains(&all));
    }
}
