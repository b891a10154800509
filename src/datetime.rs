use chrono::{Duration, Local, NaiveDateTime, ParseResult, Timelike};

/// ledger上のタイムスタンプの書式。
///
/// 12時間表記でAM/PMを明示する。例: `2023/07/30 10:01:12 AM`
pub const TIME_FORMAT: &str = "%Y/%m/%d %I:%M:%S %p";

/// タイムスタンプをledgerの書式で文字列にする。
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIME_FORMAT).to_string()
}

/// ledgerの書式のタイムスタンプをパースする。
pub fn parse_timestamp(s: &str) -> ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIME_FORMAT)
}

/// 時間を`H:MM:SS`形式の文字列にする。
///
/// 24時間を超える場合も日には繰り上げない。
pub fn format_duration(duration: &Duration) -> String {
    let seconds = duration.num_seconds();
    let sign = if seconds < 0 { "-" } else { "" };
    let seconds = seconds.abs();
    format!(
        "{}{}:{:02}:{:02}",
        sign,
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}

/// 時間を時間単位の小数にする。
pub fn total_hours(duration: &Duration) -> f64 {
    duration.num_seconds() as f64 / 3600.0
}

/// 秒未満を切り捨てる。
fn truncate_subsec(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}

#[cfg(not(test))]
/// 現在のLocal時間を秒単位で取得する。
pub fn now() -> NaiveDateTime {
    truncate_subsec(Local::now().naive_local())
}


#[cfg(test)]
pub use mock_datetime::now;
