use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

/// ledgerのファイル名。
pub const LEDGER_FILE_NAME: &str = "ledger.dat";

/// ledgerを置くディレクトリを指定する環境変数。
pub const HOME_ENV: &str = "TIMCOL_HOME";

/// 起動元のカレントディレクトリを指定する環境変数。ラッパースクリプトから起動された場合に利用する。
pub const ORIGINAL_CWD_ENV: &str = "TIMCOL_ORIGINAL_CWD";

/// ledgerのパスを決定する。
///
/// `--file`、`$TIMCOL_HOME/ledger.dat`、カレントディレクトリの`ledger.dat`の順に優先する。
pub fn resolve_ledger_path(explicit: Option<&Path>) -> Result<PathBuf> {
    let cwd = match env::var_os(ORIGINAL_CWD_ENV) {
        Some(original_cwd) => PathBuf::from(original_cwd),
        None => env::current_dir().context("Failed to get current directory")?,
    };
    let path = resolve_with(explicit, env::var_os(HOME_ENV), &cwd);
    debug!("Using ledger: {}", path.display());

    Ok(path)
}

fn resolve_with(explicit: Option<&Path>, home: Option<OsString>, cwd: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return cwd.join(path);
    }

    match home {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(LEDGER_FILE_NAME),
        _ => cwd.join(LEDGER_FILE_NAME),
    }
}

/// ledgerの編集に利用するエディタ。`$VISUAL`、`$EDITOR`、`vi`の順に優先する。
pub fn editor() -> OsString {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(env::var_os)
        .find(|editor| !editor.is_empty())
        .unwrap_or_else(|| OsString::from("vi"))
}
