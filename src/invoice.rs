use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::console::LogPresenter;
use crate::datetime::{self, total_hours};
use crate::entry::Entry;
use crate::logfile::LogFile;

const HTML_TEMPLATE: &str = include_str!("invoice_template.html");

/// `csv`、`html`サブコマンドの引数。
#[derive(Debug, Clone, clap::Args)]
pub struct InvoiceArgs {
    #[clap(short = 'r', long = "rate", help = "Hourly rate to bill")]
    rate: f64,

    #[clap(
        long = "allow-rate-override",
        help = "Use the Rate metadata of an entry instead of --rate when present"
    )]
    allow_rate_override: bool,
}

#[cfg(test)]
impl InvoiceArgs {
    pub fn new(rate: f64, allow_rate_override: bool) -> Self {
        Self {
            rate,
            allow_rate_override,
        }
    }
}

/// 請求書の1行。
#[derive(Debug, Clone, PartialEq)]
struct InvoiceLine {
    date: NaiveDate,
    seconds: i64,
    rate: f64,
    cost: f64,
    description: String,
}

/// 完了したentryから請求書の行を計算する。pendingは対象外とする。
///
/// 時間単価は`Rate`メタデータ(上書きを許可した場合)または`--rate`に、`Multiplier`メタデータを掛けたもの。
fn invoice_lines(log: &LogFile, args: &InvoiceArgs) -> Result<Vec<InvoiceLine>> {
    log.entries()
        .iter()
        .map(|entry| {
            let rate = effective_rate(entry, args)?;
            Ok(InvoiceLine {
                date: entry.timestamp().date(),
                seconds: entry.duration().num_seconds(),
                rate,
                cost: total_hours(&entry.duration()) * rate,
                description: entry.task().to_string(),
            })
        })
        .collect()
}

fn effective_rate(entry: &Entry, args: &InvoiceArgs) -> Result<f64> {
    let metadata = entry.metadata();
    let base_rate = match metadata.get("Rate") {
        Some(rate) if args.allow_rate_override => parse_number(rate, "Rate", entry)?,
        _ => args.rate,
    };
    let multiplier = match metadata.get("Multiplier") {
        Some(multiplier) => parse_number(multiplier, "Multiplier", entry)?,
        None => 1.0,
    };

    Ok(base_rate * multiplier)
}

fn parse_number(value: &str, key: &str, entry: &Entry) -> Result<f64> {
    value.trim().parse::<f64>().with_context(|| {
        format!(
            "Invalid {} `{}` for entry `{}` at {}",
            key,
            value,
            entry.task(),
            datetime::format_timestamp(&entry.timestamp())
        )
    })
}

/// 請求書をCSVで表示する。
pub struct CsvInvoice<'a, W: Write> {
    writer: &'a mut W,
    args: InvoiceArgs,
}

impl<'a, W: Write> CsvInvoice<'a, W> {
    /// 新しい`CsvInvoice`を返す。
    pub fn new(writer: &'a mut W, args: InvoiceArgs) -> Self {
        Self { writer, args }
    }

    fn write_record(&mut self, fields: &[&str]) -> Result<()> {
        let record = fields
            .iter()
            .map(|field| csv_field(field))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(self.writer, "{}", record)
            .with_context(|| format!("Failed to write CSV record: {}", record))
    }
}

impl<'a, W: Write> LogPresenter for CsvInvoice<'a, W> {
    fn show_log(&mut self, log: &LogFile) -> Result<()> {
        let lines = invoice_lines(log, &self.args)?;

        self.write_record(&["Date", "Duration", "Rate", "Cost", "Description"])?;
        let mut total_cost = 0.0;
        for line in &lines {
            total_cost += line.cost;
            let date = line.date.format("%Y/%m/%d").to_string();
            let duration = format!(
                "{}:{}:{:02}",
                line.seconds / 3600,
                (line.seconds / 60) % 60,
                line.seconds % 60
            );
            let rate = format!("${:.2}", line.rate);
            let cost = format!("${:.2}", line.cost);
            self.write_record(&[
                date.as_str(),
                duration.as_str(),
                rate.as_str(),
                cost.as_str(),
                line.description.as_str(),
            ])?;
        }
        let total = format!("${:.2}", total_cost);
        self.write_record(&["", "", "", total.as_str(), "TOTAL COST"])?;

        Ok(())
    }
}

/// 必要な場合にCSVのフィールドをクォートする。
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// 請求書をHTMLで表示する。
pub struct HtmlInvoice<'a, W: Write> {
    writer: &'a mut W,
    args: InvoiceArgs,
}

impl<'a, W: Write> HtmlInvoice<'a, W> {
    /// 新しい`HtmlInvoice`を返す。
    pub fn new(writer: &'a mut W, args: InvoiceArgs) -> Self {
        Self { writer, args }
    }
}

impl<'a, W: Write> LogPresenter for HtmlInvoice<'a, W> {
    fn show_log(&mut self, log: &LogFile) -> Result<()> {
        let lines = invoice_lines(log, &self.args)?;
        let total_cost: f64 = lines.iter().map(|line| line.cost).sum();

        let tasks: String = lines
            .iter()
            .map(|line| {
                format!(
                    "        <tr>\n          <td>{}</td>\n          <td>{}</td>\n          \
                     <td class=\"number\">{:02}:{:02}:{:02}</td>\n          \
                     <td class=\"number\">${:.2}</td>\n          \
                     <td class=\"number\">${:.2}</td>\n        </tr>\n",
                    line.date.format("%Y/%m/%d"),
                    escape_html(&line.description),
                    line.seconds / 3600,
                    (line.seconds / 60) % 60,
                    line.seconds % 60,
                    line.rate,
                    line.cost,
                )
            })
            .collect();

        // tasksには利用者の入力が含まれるため最後に置換する
        let html = HTML_TEMPLATE
            .replace(
                "{{date}}",
                &datetime::now().date().format("%Y/%m/%d").to_string(),
            )
            .replace("{{cost}}", &format!("${}", format_thousands(total_cost)))
            .replace("{{tasks}}", &tasks);

        self.writer
            .write_all(html.as_bytes())
            .context("Failed to write HTML invoice")?;

        Ok(())
    }
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 3桁ごとにカンマを入れ、小数点以下2桁で表示する。
fn format_thousands(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (integer, fraction) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let digits: Vec<char> = integer.chars().collect();
    let grouped = digits
        .rchunks(3)
        .rev()
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",");
    let sign = if value < 0.0 { "-" } else { "" };

    format!("{}{}.{}", sign, grouped, fraction)
}
