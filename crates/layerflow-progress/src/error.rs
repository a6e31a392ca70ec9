use serde_json::error::Category;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgressError {
    /// 壊れたメッセージ（構文エラー、型不一致、途中で切れたレコード）
    #[error("進捗メッセージのデコードに失敗しました: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("終端メッセージは finish() で書き込んでください")]
    TerminalViaSend,
}

impl ProgressError {
    pub fn is_decode(&self) -> bool {
        matches!(self, ProgressError::Decode(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self, ProgressError::Io(_))
    }
}

impl From<serde_json::Error> for ProgressError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Io => ProgressError::Io(err.into()),
            Category::Syntax | Category::Data | Category::Eof => ProgressError::Decode(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProgressError>;
