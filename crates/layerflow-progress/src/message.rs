//! 進捗メッセージ定義
//!
//! ワイヤ形式は Docker のビルド API が返す JSON メッセージと同じ形です:
//!
//! ```text
//! {"stream":"Step 1/2 : RUN exit 0\n"}
//! {"stream":" ---> Running in 4f3c2a1b0e9d\n"}
//! {"errorDetail":{"code":1,"message":"..."},"error":"..."}
//! {"aux":{"ID":"sha256:..."}}
//! ```

use layerflow_core::ImageRef;
use serde::{Deserialize, Serialize};

/// ワイヤ上の1レコード
///
/// 未知のフィールド（`progress` や `progressDetail` など）は無視します。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(
        rename = "errorDetail",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_detail: Option<WireErrorDetail>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<Aux>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aux {
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// 構造化エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub code: Option<i64>,
    pub message: String,
}

/// ProgressMessage - ストリームの1単位
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressMessage {
    /// 人が読む進捗テキスト（中間コンテナの告知もここに含まれる）
    Stream(String),
    /// pull 等のステータス行
    Status { id: Option<String>, status: String },
    /// ビルド失敗（終端）
    Error(ErrorDetail),
    /// ビルド成功と最終イメージ（終端）
    Finished { image: ImageRef },
}

impl ProgressMessage {
    pub fn stream(text: impl Into<String>) -> Self {
        ProgressMessage::Stream(text.into())
    }

    pub fn error(code: Option<i64>, message: impl Into<String>) -> Self {
        ProgressMessage::Error(ErrorDetail {
            code,
            message: message.into(),
        })
    }

    pub fn finished(image: impl Into<ImageRef>) -> Self {
        ProgressMessage::Finished {
            image: image.into(),
        }
    }

    /// 終端メッセージか（この後にメッセージは続かない）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressMessage::Error(_) | ProgressMessage::Finished { .. }
        )
    }

    pub fn as_stream(&self) -> Option<&str> {
        match self {
            ProgressMessage::Stream(text) => Some(text),
            _ => None,
        }
    }

    pub fn to_wire(&self) -> JsonMessage {
        match self {
            ProgressMessage::Stream(text) => JsonMessage {
                stream: Some(text.clone()),
                ..Default::default()
            },
            ProgressMessage::Status { id, status } => JsonMessage {
                status: Some(status.clone()),
                id: id.clone(),
                ..Default::default()
            },
            ProgressMessage::Error(detail) => JsonMessage {
                error: Some(detail.message.clone()),
                error_detail: Some(WireErrorDetail {
                    code: detail.code,
                    message: Some(detail.message.clone()),
                }),
                ..Default::default()
            },
            ProgressMessage::Finished { image } => JsonMessage {
                aux: Some(Aux {
                    id: Some(image.to_string()),
                }),
                ..Default::default()
            },
        }
    }

    /// ワイヤレコードから変換
    ///
    /// 認識できるフィールドを持たないレコード（keep-alive の `{}` など）は `None`。
    pub fn from_wire(wire: JsonMessage) -> Option<Self> {
        if wire.error.is_some() || wire.error_detail.is_some() {
            let code = wire.error_detail.as_ref().and_then(|d| d.code);
            let message = wire
                .error
                .or_else(|| wire.error_detail.and_then(|d| d.message))
                .unwrap_or_else(|| "Unknown build error".to_string());
            return Some(ProgressMessage::Error(ErrorDetail { code, message }));
        }

        if let Some(id) = wire.aux.and_then(|aux| aux.id) {
            return Some(ProgressMessage::Finished {
                image: ImageRef::new(id),
            });
        }

        if let Some(text) = wire.stream {
            return Some(ProgressMessage::Stream(text));
        }

        wire.status.map(|status| ProgressMessage::Status {
            id: wire.id,
            status,
        })
    }
}
