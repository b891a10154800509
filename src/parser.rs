use std::io::BufRead;

use log::debug;

use crate::directive::{parse_metadata, CheckIn, Directive};
use crate::entry::Entry;
use crate::error::LedgerError;
use crate::logfile::LogFile;

/// ledgerを読み込み、`LogFile`を返す。
///
/// # Arguments
///
/// * `reader` - ファイル順に行を返すreader
pub fn parse_log<R: BufRead>(reader: R) -> Result<LogFile, LedgerError> {
    let directives = parse_directives(reader)?;
    let log = pair_entries(directives)?;
    debug!(
        "Parsed {} entries, pending: {}",
        log.entries().len(),
        log.pending().is_some()
    );

    Ok(log)
}

/// 文字列としてのledgerを読み込み、`LogFile`を返す。
pub fn parse_str(contents: &str) -> Result<LogFile, LedgerError> {
    parse_log(contents.as_bytes())
}

/// 行ごとにdirectiveを認識し、後続のメタデータ行を直前のdirectiveに付与する。
///
/// 認識できない行は読み飛ばす。行番号とdirectiveの組をファイル順に返す。
fn parse_directives<R: BufRead>(reader: R) -> Result<Vec<(usize, Directive)>, LedgerError> {
    let mut directives: Vec<(usize, Directive)> = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;

        if let Some(directive) = Directive::parse(&line, line_no)? {
            directives.push((line_no, directive));
            continue;
        }

        if let Some((key, value)) = parse_metadata(&line) {
            match directives.last_mut() {
                Some((_, directive)) => {
                    directive.metadata_mut().insert(key, value);
                }
                None => debug!("Ignoring metadata before any directive at line {}", line_no),
            }
        }
    }

    Ok(directives)
}

/// check-inとcheck-outを順に組にしてentryにする。
///
/// 末尾の閉じられていないcheck-inはpendingとする。
/// check-inが2回続く、もしくは対応するcheck-inの無いcheck-outはエラーとする。
fn pair_entries<I>(directives: I) -> Result<LogFile, LedgerError>
where
    I: IntoIterator<Item = (usize, Directive)>,
{
    let mut entries = Vec::new();
    let mut awaiting: Option<CheckIn> = None;

    for (line, directive) in directives {
        match (awaiting.take(), directive) {
            (None, Directive::CheckIn(check_in)) => awaiting = Some(check_in),
            (Some(_), Directive::CheckIn(_)) => {
                return Err(LedgerError::UnexpectedCheckIn { line });
            }
            (Some(check_in), Directive::CheckOut(check_out)) => {
                entries.push(Entry::new(check_in, check_out));
            }
            (None, Directive::CheckOut(_)) => {
                return Err(LedgerError::UnexpectedCheckOut { line });
            }
        }
    }

    Ok(LogFile::new(entries, awaiting))
}
