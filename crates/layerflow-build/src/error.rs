use layerflow_progress::ProgressError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Dockerfile is missing: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Build context is not a directory: {0}")]
    ContextNotFound(PathBuf),

    #[error("Docker daemon error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Progress stream error: {0}")]
    Progress(#[from] ProgressError),

    #[error("Daemon build did not complete: {0}")]
    BuildFailed(String),

    #[error("Invalid build input: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::DockerfileNotFound(path) => {
                format!(
                    "Dockerfileが見つかりません: {}\n\
                     \n\
                     Dockerfileのパスを確認してください。",
                    path.display()
                )
            }
            BuildError::BuildFailed(msg) => {
                format!(
                    "デーモンでのビルドが完了しませんでした: {}\n\
                     \n\
                     Docker デーモンのログを確認してください。",
                    msg
                )
            }
            BuildError::ContextNotFound(path) => {
                format!(
                    "ビルドコンテキストのディレクトリがありません: {}\n\
                     \n\
                     パスがディレクトリを指しているか確認してください。",
                    path.display()
                )
            }
            BuildError::Progress(e) => {
                format!(
                    "進捗ストリームへの書き込みに失敗しました: {}\n\
                     \n\
                     出力先（パイプ/接続）が閉じられていないか確認してください。",
                    e
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
