use chrono::{Duration, NaiveDateTime};

use crate::directive::{CheckIn, CheckOut, Metadata};

/// check-inとcheck-outの組からなる、完了した作業の記録。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    check_in: CheckIn,
    check_out: CheckOut,
}

impl Entry {
    /// 新しい`Entry`を返す。
    ///
    /// check-outがcheck-inより前であるかは検証しない。
    pub(crate) fn new(check_in: CheckIn, check_out: CheckOut) -> Self {
        Self {
            check_in,
            check_out,
        }
    }

    pub fn check_in(&self) -> &CheckIn {
        &self.check_in
    }

    pub fn check_out(&self) -> &CheckOut {
        &self.check_out
    }

    /// 作業の開始日時。
    pub fn timestamp(&self) -> NaiveDateTime {
        self.check_in.timestamp
    }

    /// 作業時間。
    pub fn duration(&self) -> Duration {
        self.check_out.timestamp - self.check_in.timestamp
    }

    pub fn account(&self) -> &str {
        &self.check_in.account
    }

    pub fn task(&self) -> &str {
        &self.check_in.task
    }

    /// check-inとcheck-outのメタデータをまとめたものを返す。
    ///
    /// 同じkeyがある場合はcheck-out側の値を優先する。
    pub fn metadata(&self) -> Metadata {
        let mut metadata = self.check_in.metadata.clone();
        metadata.extend(
            self.check_out
                .metadata
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        metadata
    }
}
