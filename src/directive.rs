use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::datetime::{format_timestamp, parse_timestamp};
use crate::error::LedgerError;

/// directiveに付随するkey-valueのメタデータ。
pub type Metadata = BTreeMap<String, String>;

static CHECK_IN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^i ([^ ]+ [^ ]+ (?:AM|PM)) (.+?) {2}(.+?)$").expect("valid check-in pattern")
});

static CHECK_OUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^o ([^ ]+ [^ ]+ (?:AM|PM))$").expect("valid check-out pattern"));

static METADATA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {4}; ([^:]+):(.+)$").expect("valid metadata pattern"));

/// 作業の開始を表すdirective。
///
/// `i 2023/07/30 10:01:12 AM TestAccount  Test task`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckIn {
    pub timestamp: NaiveDateTime,
    pub account: String,
    pub task: String,
    pub metadata: Metadata,
}

impl CheckIn {
    /// メタデータを持たない新しい`CheckIn`を返す。
    pub fn new(timestamp: NaiveDateTime, account: &str, task: &str) -> Self {
        Self {
            timestamp,
            account: account.to_string(),
            task: task.to_string(),
            metadata: Metadata::new(),
        }
    }

    /// 1行を`CheckIn`としてパースする。
    ///
    /// 文法に一致しない場合は`None`を返す。文法に一致してタイムスタンプが不正な場合はエラーとする。
    ///
    /// # Arguments
    ///
    /// * `line` - 改行を除いた1行
    /// * `line_no` - エラー報告用の行番号(1始まり)
    pub fn parse(line: &str, line_no: usize) -> Result<Option<Self>, LedgerError> {
        let Some(captures) = CHECK_IN_RE.captures(line) else {
            return Ok(None);
        };

        Ok(Some(Self {
            timestamp: timestamp_from(&captures, line_no)?,
            account: captures[2].to_string(),
            task: captures[3].to_string(),
            metadata: Metadata::new(),
        }))
    }

    /// ledgerに書き込む1行(改行なし)を返す。
    pub fn to_line(&self) -> String {
        format!(
            "i {} {}  {}",
            format_timestamp(&self.timestamp),
            self.account,
            self.task
        )
    }
}

/// 作業の終了を表すdirective。
///
/// `o 2023/07/30 11:01:12 AM`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckOut {
    pub timestamp: NaiveDateTime,
    pub metadata: Metadata,
}

impl CheckOut {
    /// メタデータを持たない新しい`CheckOut`を返す。
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            metadata: Metadata::new(),
        }
    }

    /// 1行を`CheckOut`としてパースする。
    pub fn parse(line: &str, line_no: usize) -> Result<Option<Self>, LedgerError> {
        let Some(captures) = CHECK_OUT_RE.captures(line) else {
            return Ok(None);
        };

        Ok(Some(Self::new(timestamp_from(&captures, line_no)?)))
    }

    /// ledgerに書き込む1行(改行なし)を返す。
    pub fn to_line(&self) -> String {
        format!("o {}", format_timestamp(&self.timestamp))
    }
}

/// ledgerの1行から認識されたdirective。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    CheckIn(CheckIn),
    CheckOut(CheckOut),
}

impl Directive {
    /// 1行をdirectiveとしてパースする。
    ///
    /// `CheckIn`、`CheckOut`の順に試し、最初に一致したものを返す。
    /// 空行やヘッダなど、どちらにも一致しない行は`None`とする。
    pub fn parse(line: &str, line_no: usize) -> Result<Option<Self>, LedgerError> {
        if let Some(check_in) = CheckIn::parse(line, line_no)? {
            return Ok(Some(Self::CheckIn(check_in)));
        }
        if let Some(check_out) = CheckOut::parse(line, line_no)? {
            return Ok(Some(Self::CheckOut(check_out)));
        }

        Ok(None)
    }

    /// directiveのメタデータへの可変参照を返す。
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        match self {
            Self::CheckIn(check_in) => &mut check_in.metadata,
            Self::CheckOut(check_out) => &mut check_out.metadata,
        }
    }
}

/// メタデータ行(`    ; Key:Value`)をパースする。
pub fn parse_metadata(line: &str) -> Option<(String, String)> {
    METADATA_RE
        .captures(line)
        .map(|captures| (captures[1].to_string(), captures[2].to_string()))
}

fn timestamp_from(captures: &Captures, line_no: usize) -> Result<NaiveDateTime, LedgerError> {
    let value = &captures[1];
    parse_timestamp(value).map_err(|source| LedgerError::MalformedTimestamp {
        line: line_no,
        value: value.to_string(),
        source,
    })
}
