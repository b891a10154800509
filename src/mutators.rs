use std::fmt;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use crate::datetime;
use crate::directive::{parse_metadata, CheckIn, CheckOut, Directive};
use crate::ledger::LedgerStore;
use crate::logfile::LogFile;
use crate::parser::parse_str;

/// ledgerの状態と矛盾する操作。
///
/// ユーザーに表示するだけで、ledgerは変更しない。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conflict {
    AlreadyPending,
    NothingToStop,
    NothingToResume,
    NothingToCancel,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::AlreadyPending => "Task already pending.",
            Self::NothingToStop => "No task to stop.",
            Self::NothingToResume => "No task to resume.",
            Self::NothingToCancel => "No task to cancel.",
        };
        f.write_str(message)
    }
}

/// 操作の結果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// 追記した行(改行なし)
    Appended(String),
    /// 削除したdirectiveの行(改行なし)
    Removed(String),
    Conflict(Conflict),
}

impl Outcome {
    /// ledgerを変更した場合に`true`を返す。
    pub fn is_applied(&self) -> bool {
        !matches!(self, Self::Conflict(_))
    }
}

/// ledgerに対する開始、終了、再開、取り消しの操作。
///
/// 操作のたびにledgerを読み直してから判断し、1回だけ書き込む。
pub struct Mutator<'a, S: LedgerStore> {
    ledger: &'a S,
}

impl<'a, S: LedgerStore> Mutator<'a, S> {
    /// 新しい`Mutator`を返す。
    ///
    /// # Arguments
    ///
    /// * `ledger` - 操作対象のledger
    pub fn new(ledger: &'a S) -> Self {
        Self { ledger }
    }

    /// 作業を開始する。
    ///
    /// すでにpendingがある場合は何もしない。
    /// ledgerから読み戻せないaccount、taskはエラーとする。
    pub fn start(&self, account: &str, task: &str) -> Result<Outcome> {
        validate_check_in(account, task)?;
        let (contents, log) = self.load()?;
        if log.pending().is_some() {
            return Ok(Outcome::Conflict(Conflict::AlreadyPending));
        }

        let line = CheckIn::new(datetime::now(), account, task).to_line();
        self.append_line(&contents, &line)?;
        info!("Checked in: {}", line);

        Ok(Outcome::Appended(line))
    }

    /// pendingの作業を終了する。
    pub fn stop(&self) -> Result<Outcome> {
        let (contents, log) = self.load()?;
        if log.pending().is_none() {
            return Ok(Outcome::Conflict(Conflict::NothingToStop));
        }

        let line = CheckOut::new(datetime::now()).to_line();
        self.append_line(&contents, &line)?;
        info!("Checked out: {}", line);

        Ok(Outcome::Appended(line))
    }

    /// pendingの作業を終了し、続けて新しい作業を開始する。
    ///
    /// 終了できなかった場合は開始しない。
    pub fn swap(&self, account: &str, task: &str) -> Result<Outcome> {
        validate_check_in(account, task)?;
        let stopped = self.stop()?;
        if !stopped.is_applied() {
            return Ok(stopped);
        }

        self.start(account, task)
    }

    /// 最後に完了したentryと同じaccount、taskで作業を開始する。
    ///
    /// 完了したentryが無い場合と、pendingがある場合は何もしない。
    pub fn resume(&self) -> Result<Outcome> {
        let (contents, log) = self.load()?;
        let Some(last_entry) = log.last_entry() else {
            return Ok(Outcome::Conflict(Conflict::NothingToResume));
        };
        if log.pending().is_some() {
            warn!("Refusing to resume while a task is pending");
            return Ok(Outcome::Conflict(Conflict::AlreadyPending));
        }

        let line =
            CheckIn::new(datetime::now(), last_entry.account(), last_entry.task()).to_line();
        self.append_line(&contents, &line)?;
        info!("Resumed: {}", line);

        Ok(Outcome::Appended(line))
    }

    /// pendingのcheck-inを取り消す。
    ///
    /// check-inの行と直後のメタデータ行、末尾の空行を削除してledgerを書き直す。
    /// それ以外の行はそのまま残す。
    pub fn cancel(&self) -> Result<Outcome> {
        let (contents, log) = self.load()?;
        if log.pending().is_none() {
            return Ok(Outcome::Conflict(Conflict::NothingToCancel));
        }

        let lines: Vec<&str> = contents.split_inclusive('\n').collect();
        let Some(index) = lines
            .iter()
            .enumerate()
            .rev()
            .find(|(index, line)| {
                matches!(Directive::parse(strip_eol(line), index + 1), Ok(Some(_)))
            })
            .map(|(index, _)| index)
        else {
            bail!("Pending check-in not found in ledger");
        };

        let removed = strip_eol(lines[index]).to_string();
        let mut tail: Vec<&str> = lines[index + 1..]
            .iter()
            .copied()
            .skip_while(|line| parse_metadata(strip_eol(line)).is_some())
            .collect();
        while matches!(tail.last(), Some(line) if line.trim().is_empty()) {
            tail.pop();
        }
        let remaining: String = [&lines[..index], tail.as_slice()].concat().concat();

        self.ledger
            .replace(&remaining)
            .context("Failed to rewrite ledger")?;
        info!("Cancelled: {}", removed);

        Ok(Outcome::Removed(removed))
    }

    /// ledgerを読み込み、元のテキストとパース結果を返す。
    fn load(&self) -> Result<(String, LogFile)> {
        let contents = self.ledger.read()?;
        let log = parse_str(&contents).context("Failed to parse ledger")?;

        Ok((contents, log))
    }

    /// 1行を追記する。ledgerが改行で終わっていない場合は先に改行を入れる。
    fn append_line(&self, contents: &str, line: &str) -> Result<()> {
        let mut text = String::with_capacity(line.len() + 2);
        if !contents.is_empty() && !contents.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(line);
        text.push('\n');

        self.ledger.append(&text)
    }
}

/// check-inの行としてledgerに書き込み、同じaccount、taskで読み戻せることを検証する。
fn validate_check_in(account: &str, task: &str) -> Result<()> {
    if account.trim().is_empty() {
        bail!("Account must not be empty");
    }
    if task.trim().is_empty() {
        bail!("Task description must not be empty");
    }
    if account.contains(['\n', '\r']) || task.contains(['\n', '\r']) {
        bail!("Account and task description must be a single line");
    }
    if account.contains("  ") || account.ends_with(' ') {
        bail!(
            "Account `{}` must not contain two consecutive spaces or end with a space",
            account
        );
    }

    Ok(())
}

fn strip_eol(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use rstest::rstest;

    use super::{Conflict, Mutator, Outcome};
    use crate::datetime::mock_datetime;
    use crate::ledger::{FileLedger, LedgerStore, MockLedgerStore};
    use crate::parser::parse_str;

    fn start_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 7, 30)
            .unwrap()
            .and_hms_opt(10, 1, 12)
            .unwrap()
    }

    /// 読み込みだけを許可し、書き込みが呼ばれないことを検証するledgerを作成する。
    fn read_only_ledger(contents: &'static str) -> MockLedgerStore {
        let mut ledger = MockLedgerStore::new();
        ledger
            .expect_read()
            .returning(move || Ok(contents.to_string()));
        ledger.expect_append().times(0);
        ledger.expect_replace().times(0);
        ledger
    }

    const COMPLETED: &str = "\
i 2023/07/30 09:00:00 AM Acme  Write report
    ; Rate:20
o 2023/07/30 09:30:00 AM
";

    const PENDING: &str = "\
i 2023/07/30 09:00:00 AM Acme  Write report
o 2023/07/30 09:30:00 AM
i 2023/07/30 09:45:00 AM Globex  Review
";

    /// 空のledgerで開始して1時間後に終了した時の内容を確認する。
    #[test]
    fn test_task_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.dat");
        let ledger = FileLedger::new(&path);
        let mutator = Mutator::new(&ledger);

        mock_datetime::set_mock_time(start_time());
        let started = mutator.start("TestAccount", "Test task").unwrap();
        mock_datetime::advance_mock_time(3600);
        let stopped = mutator.stop().unwrap();

        assert!(started.is_applied());
        assert!(stopped.is_applied());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "i 2023/07/30 10:01:12 AM TestAccount  Test task\no 2023/07/30 11:01:12 AM\n"
        );

        let log = parse_str(&ledger.read().unwrap()).unwrap();
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].account(), "TestAccount");
        assert_eq!(log.entries()[0].task(), "Test task");
        assert_eq!(log.entries()[0].duration(), Duration::hours(1));
        assert!(log.pending().is_none());
    }

    /// pendingがある時に開始してもledgerが変わらないことを確認する。
    #[test]
    fn test_start_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.dat");
        let ledger = FileLedger::new(&path);
        let mutator = Mutator::new(&ledger);

        mock_datetime::set_mock_time(start_time());
        mutator.start("TestAccount", "Test task").unwrap();
        let before = fs::read_to_string(&path).unwrap();
        mock_datetime::advance_mock_time(60);
        let outcome = mutator.start("TestAccount", "Other task").unwrap();

        assert_eq!(outcome, Outcome::Conflict(Conflict::AlreadyPending));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    /// ledgerの状態と矛盾する操作は書き込みを行わないことを確認する。
    #[rstest]
    #[case::start_with_pending(PENDING, "start", Conflict::AlreadyPending)]
    #[case::stop_on_empty("", "stop", Conflict::NothingToStop)]
    #[case::stop_without_pending(COMPLETED, "stop", Conflict::NothingToStop)]
    #[case::swap_without_pending(COMPLETED, "swap", Conflict::NothingToStop)]
    #[case::resume_on_empty("", "resume", Conflict::NothingToResume)]
    #[case::resume_with_pending(PENDING, "resume", Conflict::AlreadyPending)]
    #[case::cancel_on_empty("", "cancel", Conflict::NothingToCancel)]
    #[case::cancel_without_pending(COMPLETED, "cancel", Conflict::NothingToCancel)]
    fn test_conflicts(
        #[case] contents: &'static str,
        #[case] operation: &str,
        #[case] expected: Conflict,
    ) {
        let ledger = read_only_ledger(contents);
        let mutator = Mutator::new(&ledger);

        let outcome = match operation {
            "start" => mutator.start("Acme", "Write report"),
            "stop" => mutator.stop(),
            "swap" => mutator.swap("Acme", "Write report"),
            "resume" => mutator.resume(),
            "cancel" => mutator.cancel(),
            _ => panic!("Invalid operation: {}", operation),
        }
        .unwrap();

        assert_eq!(outcome, Outcome::Conflict(expected));
    }

    /// pendingのみでentryが無い時の再開は、再開するものが無いとして扱うことを確認する。
    #[test]
    fn test_resume_pending_only() {
        let ledger = read_only_ledger("i 2023/07/30 09:45:00 AM Globex  Review\n");

        let outcome = Mutator::new(&ledger).resume().unwrap();

        assert_eq!(outcome, Outcome::Conflict(Conflict::NothingToResume));
    }

    /// 最後のentryのaccount、taskで再開することを確認する。
    #[test]
    fn test_resume() {
        let mut ledger = MockLedgerStore::new();
        ledger.expect_read().returning(|| {
            Ok(format!(
                "{}i 2023/07/30 10:00:00 AM Globex  Review\no 2023/07/30 10:30:00 AM\n",
                COMPLETED
            ))
        });
        ledger
            .expect_append()
            .withf(|text| text == "i 2023/07/30 10:01:12 AM Globex  Review\n")
            .times(1)
            .returning(|_| Ok(()));

        mock_datetime::set_mock_time(start_time());
        let outcome = Mutator::new(&ledger).resume().unwrap();

        assert_eq!(
            outcome,
            Outcome::Appended("i 2023/07/30 10:01:12 AM Globex  Review".to_string())
        );
    }

    /// 終了してから新しい作業を開始することを確認する。
    #[test]
    fn test_swap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.dat");
        fs::write(&path, PENDING).unwrap();
        let ledger = FileLedger::new(&path);

        mock_datetime::set_mock_time(start_time());
        let outcome = Mutator::new(&ledger).swap("Initech", "Fix printer").unwrap();

        assert!(outcome.is_applied());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!(
                "{}o 2023/07/30 10:01:12 AM\ni 2023/07/30 10:01:12 AM Initech  Fix printer\n",
                PENDING
            )
        );
    }

    /// 改行で終わっていないledgerへの追記は改行を補うことを確認する。
    #[test]
    fn test_append_adds_missing_newline() {
        let mut ledger = MockLedgerStore::new();
        ledger
            .expect_read()
            .returning(|| Ok("i 2023/07/30 09:45:00 AM Globex  Review".to_string()));
        ledger
            .expect_append()
            .withf(|text| text == "\no 2023/07/30 10:01:12 AM\n")
            .times(1)
            .returning(|_| Ok(()));

        mock_datetime::set_mock_time(start_time());
        let outcome = Mutator::new(&ledger).stop().unwrap();

        assert!(outcome.is_applied());
    }

    /// 取り消しはpendingのcheck-inとそのメタデータのみを削除することを確認する。
    #[rstest]
    #[case::plain(PENDING, COMPLETED_AFTER_CANCEL)]
    #[case::trailing_blank_lines(
        "i 2023/07/30 09:00:00 AM Acme  Write report\no 2023/07/30 09:30:00 AM\ni 2023/07/30 09:45:00 AM Globex  Review\n\n\n",
        COMPLETED_AFTER_CANCEL,
    )]
    #[case::with_metadata(
        "i 2023/07/30 09:00:00 AM Acme  Write report\no 2023/07/30 09:30:00 AM\ni 2023/07/30 09:45:00 AM Globex  Review\n    ; Rate:30\n",
        COMPLETED_AFTER_CANCEL,
    )]
    #[case::only_pending("; header\ni 2023/07/30 09:45:00 AM Globex  Review\n", "; header\n")]
    #[case::keeps_following_lines(
        "; header\ni 2023/07/30 09:45:00 AM Globex  Review\n    ; Rate:30\n; note a\n\n    ; Orphan:1\n; note b\n\n",
        "; header\n; note a\n\n    ; Orphan:1\n; note b\n",
    )]
    fn test_cancel(#[case] contents: &str, #[case] expected: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.dat");
        fs::write(&path, contents).unwrap();
        let ledger = FileLedger::new(&path);

        let outcome = Mutator::new(&ledger).cancel().unwrap();

        assert_eq!(
            outcome,
            Outcome::Removed("i 2023/07/30 09:45:00 AM Globex  Review".to_string())
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);
    }

    const COMPLETED_AFTER_CANCEL: &str =
        "i 2023/07/30 09:00:00 AM Acme  Write report\no 2023/07/30 09:30:00 AM\n";

    /// ledgerから読み戻せないaccount、taskはエラーとなり、ファイルが変わらないことを確認する。
    #[rstest]
    #[case::empty_account("", "Write report")]
    #[case::blank_account("   ", "Write report")]
    #[case::empty_task("Acme", "")]
    #[case::blank_task("Acme", "  ")]
    #[case::account_with_double_space("Client  A", "Design")]
    #[case::account_with_trailing_space("Acme ", "Design")]
    #[case::account_with_newline("Acme\nCorp", "Design")]
    #[case::task_with_newline("Acme", "fix\no 2023/07/30 11:00:00 AM")]
    #[case::task_with_carriage_return("Acme", "fix\r")]
    fn test_start_rejects_unreadable_input(#[case] account: &str, #[case] task: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.dat");
        fs::write(&path, COMPLETED).unwrap();
        let ledger = FileLedger::new(&path);
        let mutator = Mutator::new(&ledger);

        mock_datetime::set_mock_time(start_time());
        assert!(mutator.start(account, task).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), COMPLETED);

        fs::write(&path, PENDING).unwrap();
        assert!(mutator.swap(account, task).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), PENDING);
    }

    /// 空白を含むaccount、taskは書き込んだ値のまま読み戻せることを確認する。
    #[rstest]
    #[case::account_with_space("Client A", "Design")]
    #[case::task_with_double_space("Acme", "Write  report")]
    #[case::task_with_padding("Acme", " indented task ")]
    fn test_start_round_trip(#[case] account: &str, #[case] task: &str) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::new(dir.path().join("ledger.dat"));

        mock_datetime::set_mock_time(start_time());
        let outcome = Mutator::new(&ledger).start(account, task).unwrap();

        assert!(outcome.is_applied());
        let log = parse_str(&ledger.read().unwrap()).unwrap();
        let pending = log.pending().unwrap();
        assert_eq!(pending.account, account);
        assert_eq!(pending.task, task);
    }

    /// 取り消すものが無い場合はファイルが変わらないことを確認する。
    #[test]
    fn test_cancel_without_pending_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.dat");
        fs::write(&path, COMPLETED).unwrap();
        let ledger = FileLedger::new(&path);

        let outcome = Mutator::new(&ledger).cancel().unwrap();

        assert_eq!(outcome, Outcome::Conflict(Conflict::NothingToCancel));
        assert_eq!(fs::read_to_string(&path).unwrap(), COMPLETED);
    }

    /// 壊れたledgerに対する操作はエラーになり、書き込みを行わないことを確認する。
    #[test]
    fn test_corrupt_ledger_is_error() {
        let ledger = read_only_ledger("o 2023/07/30 09:30:00 AM\n");

        assert!(Mutator::new(&ledger).start("Acme", "Write report").is_err());
    }
}
