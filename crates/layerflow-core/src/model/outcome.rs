//! ビルド結果

use super::id::ImageRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ジョブの最終結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum BuildOutcome {
    /// 全命令が成功し、最終イメージが得られた
    Succeeded { image: ImageRef },
    /// `step` 番目の命令で失敗した
    Failed { step: usize, detail: FailureDetail },
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Succeeded { .. })
    }

    pub fn image(&self) -> Option<&ImageRef> {
        match self {
            BuildOutcome::Succeeded { image } => Some(image),
            BuildOutcome::Failed { .. } => None,
        }
    }
}

/// 失敗の詳細
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureDetail {
    /// 命令が非ゼロで終了した
    NonZeroExit { code: i64 },
    /// ランタイムがコンテナを作成/実行/コミットできなかった
    Runtime { message: String },
}

impl FailureDetail {
    pub fn exit_code(&self) -> Option<i64> {
        match self {
            FailureDetail::NonZeroExit { code } => Some(*code),
            FailureDetail::Runtime { .. } => None,
        }
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureDetail::NonZeroExit { code } => write!(f, "exit code {}", code),
            FailureDetail::Runtime { message } => write!(f, "runtime error: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let ok = BuildOutcome::Succeeded {
            image: ImageRef::new("sha256:feed"),
        };
        assert!(ok.is_success());
        assert_eq!(ok.image().map(|i| i.as_str()), Some("sha256:feed"));

        let ng = BuildOutcome::Failed {
            step: 2,
            detail: FailureDetail::NonZeroExit { code: 1 },
        };
        assert!(!ng.is_success());
        assert!(ng.image().is_none());
    }

    #[test]
    fn test_failure_detail_display() {
        assert_eq!(
            FailureDetail::NonZeroExit { code: 127 }.to_string(),
            "exit code 127"
        );
        assert_eq!(FailureDetail::NonZeroExit { code: 2 }.exit_code(), Some(2));
        assert_eq!(
            FailureDetail::Runtime {
                message: "boom".into()
            }
            .exit_code(),
            None
        );
    }
}
