//! プロセス内で完結するコンテナランタイム
//!
//! Docker なしでビルドジョブを動かすためのランタイムです。
//! `exit <n>` は終了コード `n`、`false` は 1、それ以外は 0 で終了します。

use crate::error::{ContainerError, Result};
use crate::runtime::{
    ContainerFilter, ContainerRuntime, ContainerSpec, ContainerState, ContainerSummary,
};
use layerflow_core::{ContainerId, ImageRef};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct MemoryRuntime {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    containers: BTreeMap<String, MemoryContainer>,
    created: Vec<ContainerId>,
    removals: usize,
    fail_create: HashSet<String>,
    fail_execute: HashSet<String>,
    fail_commit: HashSet<String>,
    fail_remove: HashSet<String>,
}

struct MemoryContainer {
    image: ImageRef,
    command: String,
    labels: HashMap<String, String>,
    state: ContainerState,
    exit_code: Option<i64>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定コマンドのコンテナ作成を失敗させる
    pub fn fail_create_on(self, command: impl Into<String>) -> Self {
        self.lock().fail_create.insert(command.into());
        self
    }

    /// 指定コマンドの実行をランタイムエラーにする
    pub fn fail_execute_on(self, command: impl Into<String>) -> Self {
        self.lock().fail_execute.insert(command.into());
        self
    }

    /// 指定コマンドのコンテナのコミットを失敗させる
    pub fn fail_commit_on(self, command: impl Into<String>) -> Self {
        self.lock().fail_commit.insert(command.into());
        self
    }

    /// 指定コマンドのコンテナの削除を失敗させる
    pub fn fail_remove_on(self, command: impl Into<String>) -> Self {
        self.lock().fail_remove.insert(command.into());
        self
    }

    /// 現存するコンテナのID
    pub fn existing(&self) -> Vec<ContainerId> {
        self.lock()
            .containers
            .keys()
            .map(|id| ContainerId::new(id.clone()))
            .collect()
    }

    /// これまでに作成されたコンテナのID（作成順）
    pub fn created(&self) -> Vec<ContainerId> {
        self.lock().created.clone()
    }

    pub fn exists(&self, id: &ContainerId) -> bool {
        self.lock().containers.contains_key(id.as_str())
    }

    /// 成功した削除の回数
    pub fn removals(&self) -> usize {
        self.lock().removals
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// コマンド文字列から終了コードを決める
fn exit_code_for(command: &str) -> i64 {
    let mut tokens = command.split_whitespace();
    match tokens.next() {
        Some("exit") => tokens
            .next()
            .and_then(|code| code.trim_end_matches(';').parse().ok())
            .unwrap_or(0),
        Some("false") => 1,
        _ => 0,
    }
}

fn generate_id() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

impl ContainerRuntime for MemoryRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        let command = spec.instruction.command().to_string();
        let mut state = self.lock();

        if state.fail_create.contains(&command) {
            return Err(ContainerError::RuntimeUnavailable(format!(
                "cannot create container for `{}`",
                command
            )));
        }

        let id = ContainerId::new(generate_id());
        state.containers.insert(
            id.to_string(),
            MemoryContainer {
                image: spec.image.clone(),
                command,
                labels: spec.labels.clone(),
                state: ContainerState::Created,
                exit_code: None,
            },
        );
        state.created.push(id.clone());
        Ok(id)
    }

    async fn run(&self, id: &ContainerId) -> Result<i64> {
        {
            let mut state = self.lock();
            let fail_execute = state.fail_execute.clone();
            let container = state
                .containers
                .get_mut(id.as_str())
                .ok_or_else(|| ContainerError::NotFound {
                    container: id.to_string(),
                })?;

            if fail_execute.contains(&container.command) {
                return Err(ContainerError::ExecuteFailed {
                    container: id.to_string(),
                    message: "runtime refused to start the container".to_string(),
                });
            }
            container.state = ContainerState::Running;
        }

        // 他のジョブに実行を譲る
        tokio::task::yield_now().await;

        let mut state = self.lock();
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound {
                container: id.to_string(),
            })?;
        let code = exit_code_for(&container.command);
        container.state = ContainerState::Exited;
        container.exit_code = Some(code);
        Ok(code)
    }

    async fn commit(&self, id: &ContainerId) -> Result<ImageRef> {
        let state = self.lock();
        let container =
            state
                .containers
                .get(id.as_str())
                .ok_or_else(|| ContainerError::NotFound {
                    container: id.to_string(),
                })?;

        if state.fail_commit.contains(&container.command) {
            return Err(ContainerError::CommitFailed {
                container: id.to_string(),
                message: "layer store is read-only".to_string(),
            });
        }

        Ok(ImageRef::new(format!("sha256:{}", generate_id())))
    }

    async fn remove(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.lock();
        let command = match state.containers.get(id.as_str()) {
            Some(container) => container.command.clone(),
            None => {
                return Err(ContainerError::NotFound {
                    container: id.to_string(),
                });
            }
        };

        if state.fail_remove.contains(&command) {
            return Err(ContainerError::DockerApiError(format!(
                "device or resource busy: {}",
                id
            )));
        }

        state.containers.remove(id.as_str());
        state.removals += 1;
        Ok(())
    }

    async fn list(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>> {
        let state = self.lock();
        Ok(state
            .containers
            .iter()
            .filter(|(id, c)| filter.matches_id(id) && filter.matches_state(c.state))
            .map(|(id, c)| ContainerSummary {
                id: ContainerId::new(id.clone()),
                image: c.image.clone(),
                state: c.state,
                labels: c.labels.clone(),
            })
            .collect())
    }
}
