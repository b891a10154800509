use std::io::Write;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::datetime::{self, format_duration, total_hours};
use crate::directive::Metadata;
use crate::logfile::LogFile;

/// Consoleにledgerの内容を表示するためのtrait。
pub trait LogPresenter {
    /// ledgerの内容を表示する。
    ///
    /// # Arguments
    ///
    /// * `log` - 表示するledger
    fn show_log(&mut self, log: &LogFile) -> Result<()>;
}

/// ledgerを人が読むための一覧形式で表示する。
///
/// 日が変わるごとに小計を、最後に合計時間を表示する。pendingの作業は現在時刻までの時間で集計する。
pub struct RegisterPresenter<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> RegisterPresenter<'a, W> {
    /// 新しい`RegisterPresenter`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }

    fn write_line(
        &mut self,
        timestamp: &NaiveDateTime,
        duration: &str,
        account: &str,
        task: &str,
    ) -> Result<()> {
        writeln!(
            self.writer,
            "{}\t{}\t{}: {}",
            timestamp.format("%b %d @ %I:%M %p"),
            duration,
            account,
            task
        )
        .with_context(|| format!("Failed to write register line: {}", task))
    }

    fn write_subtotal(&mut self, date: &NaiveDate, duration: &Duration) -> Result<()> {
        writeln!(
            self.writer,
            "{} SUBTOTAL\t\t({})",
            date.format("%b %d"),
            format_duration(duration)
        )
        .with_context(|| format!("Failed to write subtotal for {}", date))
    }

    /// 日毎の小計に加算する。日が変わった場合は前日の小計を表示する。
    fn accumulate(
        &mut self,
        day_total: &mut Option<(NaiveDate, Duration)>,
        timestamp: &NaiveDateTime,
        duration: Duration,
    ) -> Result<()> {
        let date = timestamp.date();
        if let Some((day, subtotal)) = day_total.take() {
            if day == date {
                *day_total = Some((day, subtotal + duration));
                return Ok(());
            }
            self.write_subtotal(&day, &subtotal)?;
        }
        *day_total = Some((date, duration));

        Ok(())
    }
}

impl<'a, W: Write> LogPresenter for RegisterPresenter<'a, W> {
    fn show_log(&mut self, log: &LogFile) -> Result<()> {
        let mut total = log.total_duration();
        let mut day_total: Option<(NaiveDate, Duration)> = None;

        for entry in log.entries() {
            self.accumulate(&mut day_total, &entry.timestamp(), entry.duration())?;
            self.write_line(
                &entry.timestamp(),
                &format_duration(&entry.duration()),
                entry.account(),
                entry.task(),
            )?;
        }

        if let Some(pending) = log.pending() {
            let elapsed = datetime::now() - pending.timestamp;
            total = total + elapsed;
            self.accumulate(&mut day_total, &pending.timestamp, elapsed)?;
            self.write_line(
                &pending.timestamp,
                &format!("{}*", format_duration(&elapsed)),
                &pending.account,
                &pending.task,
            )?;
        }

        if let Some((day, subtotal)) = day_total {
            self.write_subtotal(&day, &subtotal)?;
        }

        writeln!(self.writer, "TOTAL TIME: {:.2}h", total_hours(&total))
            .context("Failed to write total time")?;

        Ok(())
    }
}

/// JSON出力用のentry。
#[derive(Debug, Serialize)]
struct JsonEntry<'a> {
    start: NaiveDateTime,
    end: NaiveDateTime,
    duration_seconds: i64,
    account: &'a str,
    task: &'a str,
    metadata: Metadata,
}

/// JSON出力用のpending。
#[derive(Debug, Serialize)]
struct JsonPending<'a> {
    start: NaiveDateTime,
    account: &'a str,
    task: &'a str,
    metadata: &'a Metadata,
}

#[derive(Debug, Serialize)]
struct JsonLog<'a> {
    entries: Vec<JsonEntry<'a>>,
    pending: Option<JsonPending<'a>>,
}

/// ledgerをJSONで表示する。
pub struct JsonPresenter<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> JsonPresenter<'a, W> {
    /// 新しい`JsonPresenter`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> LogPresenter for JsonPresenter<'a, W> {
    fn show_log(&mut self, log: &LogFile) -> Result<()> {
        let json = JsonLog {
            entries: log
                .entries()
                .iter()
                .map(|entry| JsonEntry {
                    start: entry.timestamp(),
                    end: entry.check_out().timestamp,
                    duration_seconds: entry.duration().num_seconds(),
                    account: entry.account(),
                    task: entry.task(),
                    metadata: entry.metadata(),
                })
                .collect(),
            pending: log.pending().map(|pending| JsonPending {
                start: pending.timestamp,
                account: &pending.account,
                task: &pending.task,
                metadata: &pending.metadata,
            }),
        };

        serde_json::to_writer_pretty(&mut *self.writer, &json)
            .context("Failed to serialize ledger to JSON")?;
        writeln!(self.writer).context("Failed to write JSON")?;

        Ok(())
    }
}
