//! 識別子定義

use serde::{Deserialize, Serialize};
use std::fmt;

/// Docker の short ID と同じ桁数
const SHORT_ID_LEN: usize = 12;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// コンテナID（ランタイムが作成時に割り当てる）
    ContainerId
);

string_id!(
    /// イメージ参照（`busybox:latest` や `sha256:...` など）
    ImageRef
);

string_id!(
    /// ビルドジョブID
    JobId
);

impl ContainerId {
    /// 表示用の短いID
    pub fn short(&self) -> &str {
        truncate(&self.0, SHORT_ID_LEN)
    }
}

impl ImageRef {
    /// `sha256:` プレフィックスを除いた短いID
    pub fn short(&self) -> &str {
        let id = self.0.strip_prefix("sha256:").unwrap_or(&self.0);
        truncate(id, SHORT_ID_LEN)
    }
}

impl JobId {
    /// ランダムなジョブIDを生成
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

fn truncate(value: &str, len: usize) -> &str {
    match value.char_indices().nth(len) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
