use layerflow_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(
        "コンテナランタイムに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • DOCKER_HOST の設定を確認してください"
    )]
    RuntimeUnavailable(String),

    #[error("コンテナ '{container}' が見つかりません")]
    NotFound { container: String },

    #[error(
        "イメージ '{image}' が見つかりません\n\nヒント:\n  • ベースイメージ名とタグを確認してください\n  • docker pull {image} でイメージをダウンロードしてください"
    )]
    ImageNotFound { image: String },

    #[error("無効な命令: {0}")]
    InvalidInstruction(#[source] CoreError),

    #[error("コンテナ '{container}' の実行に失敗しました: {message}")]
    ExecuteFailed { container: String, message: String },

    #[error("コンテナ '{container}' のコミットに失敗しました: {message}")]
    CommitFailed { container: String, message: String },

    #[error("コンテナ '{container}' の削除に失敗しました: {message}")]
    RemovalFailed { container: String, message: String },

    #[error("コンテナ '{container}': {source}")]
    InvalidTransition {
        container: String,
        #[source]
        source: CoreError,
    },

    #[error("このジョブが作成していないコンテナです: {container}")]
    UnknownContainer { container: String },

    #[error("Docker APIエラー: {0}")]
    DockerApiError(String),
}

impl ContainerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContainerError::NotFound { .. })
    }
}

impl From<bollard::errors::Error> for ContainerError {
    fn from(err: bollard::errors::Error) -> Self {
        match &err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => {
                // 404 はコンテナ/イメージのどちらかが呼び出し側で判断する
                ContainerError::DockerApiError(err.to_string())
            }
            _ => {
                let err_str = err.to_string();
                if err_str.contains("Connection refused")
                    || err_str.contains("No such file or directory")
                {
                    ContainerError::RuntimeUnavailable(err_str)
                } else {
                    ContainerError::DockerApiError(err_str)
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
