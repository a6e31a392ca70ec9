//! 中間コンテナの状態

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// コンテナ状態
///
/// `pending -> running -> {committed, failed} -> removed`。
/// `removed` は終端で、`running` に戻る遷移はありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// 作成済み・未実行
    Pending,
    /// 実行中
    Running,
    /// レイヤーとしてコミット済み
    Committed,
    /// 実行またはコミットに失敗
    Failed,
    /// 削除済み
    Removed,
}

impl ContainerStatus {
    pub fn can_transition_to(self, next: ContainerStatus) -> bool {
        use ContainerStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Running, Committed)
                | (Running, Failed)
                | (Committed, Removed)
                | (Failed, Removed)
        )
    }

    /// 遷移を検証して次の状態を返す
    pub fn transition(self, next: ContainerStatus) -> Result<ContainerStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_removed(self) -> bool {
        self == ContainerStatus::Removed
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerStatus::Pending => "pending",
            ContainerStatus::Running => "running",
            ContainerStatus::Committed => "committed",
            ContainerStatus::Failed => "failed",
            ContainerStatus::Removed => "removed",
        };
        f.write_str(s)
    }
}
