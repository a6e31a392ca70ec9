use crate::error::Result;
use layerflow_core::{ContainerId, ImageRef, Instruction};
use std::collections::HashMap;

/// ジョブIDを保持するラベル
pub const LABEL_JOB: &str = "layerflow.job";
/// 命令の序数を保持するラベル
pub const LABEL_STEP: &str = "layerflow.step";

/// コンテナランタイムのトレイト
///
/// 複数のビルドジョブから同時に呼ばれるため、すべて `&self` で動作します。
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime {
    /// ベースイメージ上に命令を実行するコンテナを作成
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerId>;
    /// コンテナを起動して終了コードを待つ
    async fn run(&self, id: &ContainerId) -> Result<i64>;
    /// コンテナのファイルシステムを新しいイメージとしてコミット
    async fn commit(&self, id: &ContainerId) -> Result<ImageRef>;
    /// コンテナを削除（存在しない場合は `ContainerError::NotFound`）
    async fn remove(&self, id: &ContainerId) -> Result<()>;
    /// フィルタに一致するコンテナを列挙
    async fn list(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>>;
}

/// コンテナ作成パラメータ
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: ImageRef,
    pub instruction: Instruction,
    pub labels: HashMap<String, String>,
}

impl ContainerSpec {
    pub fn new(image: ImageRef, instruction: Instruction) -> Self {
        Self {
            image,
            instruction,
            labels: HashMap::new(),
        }
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// コンテナ列挙のフィルタ
///
/// `ids` のいずれかに一致するコンテナを返します。空の `ids` は何にも一致しません。
/// `all = false` の場合は実行中のコンテナのみが対象です。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    pub ids: Vec<String>,
    pub all: bool,
}

impl ContainerFilter {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            all: false,
        }
    }

    pub fn all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    /// IDが一致するか（Docker と同様に前方一致も許可）
    pub fn matches_id(&self, id: &str) -> bool {
        self.ids
            .iter()
            .any(|wanted| !wanted.is_empty() && id.starts_with(wanted.as_str()))
    }

    pub fn matches_state(&self, state: ContainerState) -> bool {
        self.all || state == ContainerState::Running
    }
}

/// 列挙結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: ContainerId,
    pub image: ImageRef,
    pub state: ContainerState,
    pub labels: HashMap<String, String>,
}

/// コンテナの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Exited,
    Unknown,
}
