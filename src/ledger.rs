use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

/// ledgerのテキストを読み書きするためのtrait。
#[cfg_attr(test, mockall::automock)]
pub trait LedgerStore {
    /// ledger全体を読み込む。ledgerが存在しない場合は空文字列を返す。
    fn read(&self) -> Result<String>;

    /// ledgerの末尾にテキストを追記する。ledgerが存在しない場合は作成する。
    fn append(&self, text: &str) -> Result<()>;

    /// ledger全体を書き換える。
    fn replace(&self, contents: &str) -> Result<()>;
}

/// ローカルファイルをledgerとして扱う。
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    /// 新しい`FileLedger`を返す。
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for FileLedger {
    fn read(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("Ledger {} does not exist yet", self.path.display());
                Ok(String::new())
            }
            Err(err) => Err(err)
                .with_context(|| format!("Failed to read ledger: {}", self.path.display())),
        }
    }

    fn append(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open ledger: {}", self.path.display()))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("Failed to append to ledger: {}", self.path.display()))?;

        Ok(())
    }

    fn replace(&self, contents: &str) -> Result<()> {
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write ledger: {}", self.path.display()))
    }
}
