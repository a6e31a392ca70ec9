use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error("設定ファイルの解析に失敗しました: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("環境変数 {name} の値が不正です: {value}（true / false を指定してください）")]
    InvalidValue { name: String, value: String },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
