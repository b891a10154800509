use chrono::Duration;

use crate::directive::CheckIn;
use crate::entry::Entry;

/// パース済みのledger。
///
/// ledgerのファイルが唯一の正であり、この構造体は読み込みのたびに作り直す。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogFile {
    entries: Vec<Entry>,
    pending: Option<CheckIn>,
}

impl LogFile {
    pub(crate) fn new(entries: Vec<Entry>, pending: Option<CheckIn>) -> Self {
        Self { entries, pending }
    }

    /// ファイル順に並んだ完了済みのentry。
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// まだcheck-outされていない最後のcheck-in。
    pub fn pending(&self) -> Option<&CheckIn> {
        self.pending.as_ref()
    }

    /// 最も新しい完了済みのentry。
    pub fn last_entry(&self) -> Option<&Entry> {
        self.entries.last()
    }

    /// 完了済みのentryの作業時間の合計。pendingは含まない。
    pub fn total_duration(&self) -> Duration {
        self.entries
            .iter()
            .fold(Duration::zero(), |total, entry| total + entry.duration())
    }

    /// entryもpendingも無い場合に`true`を返す。
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.pending.is_none()
    }
}
