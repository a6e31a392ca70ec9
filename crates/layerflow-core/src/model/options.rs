//! ビルドオプションとクリーンアップポリシー

use super::id::ImageRef;
use super::outcome::BuildOutcome;
use serde::{Deserialize, Serialize};

/// BuildOptions - ビルド提出時のオプション
///
/// フィールド名はビルド API の `Remove` / `ForceRemove` / `NoCache` に対応します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildOptions {
    /// ベースイメージ（`FROM`）
    pub base_image: ImageRef,
    /// 成功時に中間コンテナを削除
    pub remove: bool,
    /// 成否に関わらず中間コンテナを削除
    pub force_remove: bool,
    /// レイヤーキャッシュを使用しない
    pub no_cache: bool,
    /// 完成イメージのタグ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl BuildOptions {
    pub fn new(base_image: impl Into<ImageRef>) -> Self {
        Self {
            base_image: base_image.into(),
            remove: false,
            force_remove: false,
            no_cache: false,
            tag: None,
        }
    }

    pub fn remove(mut self, remove: bool) -> Self {
        self.remove = remove;
        self
    }

    pub fn force_remove(mut self, force_remove: bool) -> Self {
        self.force_remove = force_remove;
        self
    }

    pub fn no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        CleanupPolicy {
            rm: self.remove,
            force_rm: self.force_remove,
        }
    }
}

/// CleanupPolicy - 中間コンテナの削除方針
///
/// `rm` は成功時のみ、`force_rm` は失敗時も含めて常に削除します。
/// 失敗後に効くのは `force_rm` だけです。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CleanupPolicy {
    pub rm: bool,
    pub force_rm: bool,
}

impl CleanupPolicy {
    pub fn new(rm: bool, force_rm: bool) -> Self {
        Self { rm, force_rm }
    }

    /// 成功したステップのコンテナをその場で削除するか
    pub fn remove_after_step(&self, job_failed: bool) -> bool {
        self.rm && !job_failed
    }

    /// ジョブ終了時に残っている中間コンテナを削除するか
    pub fn remove_remaining(&self, outcome: &BuildOutcome) -> bool {
        if outcome.is_success() {
            self.rm || self.force_rm
        } else {
            self.force_rm
        }
    }
}
