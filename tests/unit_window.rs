use couch_percentiles::{TimeWindow, unix_now};
use std::time::Duration;

const fn window(start: i64, end: i64) -> TimeWindow {
    TimeWindow { start, end }
}

#[test]
fn test_trailing_window_default_bounds() {
    let lookback = Duration::from_secs(90);
    let lag = Duration::from_secs(30);
    let window = TimeWindow::trailing(1_700_000_000, lookback, lag);
    assert_eq!(window.start, 1_699_999_910);
    assert_eq!(window.end, 1_699_999_970);
    assert_eq!(window.len_secs(), 60);
}

#[test]
fn test_trailing_window_ignores_subsecond_parts() {
    let lookback = Duration::from_millis(90_900);
    let lag = Duration::from_millis(30_500);
    assert_eq!(TimeWindow::trailing(1000, lookback, lag), window(910, 970));
}

#[test]
fn test_since_window() {
    let since = TimeWindow::since(5000, Duration::from_secs(600));
    assert_eq!(since, window(4400, 5000));
}

#[test]
fn test_huge_durations_saturate() {
    let huge = Duration::from_secs(u64::MAX);
    assert_eq!(TimeWindow::trailing(-10, huge, huge), window(i64::MIN, i64::MIN));
    assert_eq!(TimeWindow::since(-10, huge), window(i64::MIN, -10));
    assert_eq!(window(i64::MIN, i64::MAX).len_secs(), i64::MAX);
}

#[test]
fn test_unix_now_is_recent() {
    // 2020-09-13 as a floor
    assert!(unix_now() > 1_600_000_000);
}
