use std::io;

use thiserror::Error;

/// ledgerの読み込み時に発生するエラー。
///
/// いずれもledgerが構造的に壊れていることを表すため、読み込みを中断する。
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("line {line}: malformed timestamp `{value}`: {source}")]
    MalformedTimestamp {
        line: usize,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("line {line}: unexpected check-in, the previous check-in was never checked out")]
    UnexpectedCheckIn { line: usize },

    #[error("line {line}: unexpected check-out, there is no check-in to close")]
    UnexpectedCheckOut { line: usize },

    #[error("failed to read ledger: {0}")]
    Io(#[from] io::Error),
}
