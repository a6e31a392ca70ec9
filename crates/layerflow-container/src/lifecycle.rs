//! 中間コンテナのライフサイクル管理
//!
//! 1つのビルドジョブが作成したコンテナだけを、ジョブ単位のテーブルで追跡します。
//! テーブルは追記のみで、クリーンアップが操作できる対象の唯一の情報源です。

use crate::error::{ContainerError, Result};
use crate::runtime::{ContainerRuntime, ContainerSpec, LABEL_JOB, LABEL_STEP};
use futures_util::future::join_all;
use layerflow_core::{ContainerId, ContainerStatus, ImageRef, Instruction, JobId};

/// 1命令分の中間コンテナ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateContainer {
    pub id: ContainerId,
    pub job: JobId,
    /// 命令の序数
    pub ordinal: usize,
    status: ContainerStatus,
}

impl IntermediateContainer {
    pub fn status(&self) -> ContainerStatus {
        self.status
    }

    pub fn is_removed(&self) -> bool {
        self.status.is_removed()
    }
}

/// 命令の実行結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Success,
    Failure(i64),
}

/// 削除に失敗したコンテナ
#[derive(Debug)]
pub struct RemovalFailure {
    pub container: ContainerId,
    pub error: ContainerError,
}

/// LifecycleManager - ジョブ単位の中間コンテナ管理
pub struct LifecycleManager<'r, R: ContainerRuntime> {
    runtime: &'r R,
    job: JobId,
    containers: Vec<IntermediateContainer>,
}

impl<'r, R: ContainerRuntime> LifecycleManager<'r, R> {
    pub fn new(runtime: &'r R, job: JobId) -> Self {
        Self {
            runtime,
            job,
            containers: Vec::new(),
        }
    }

    pub fn job(&self) -> &JobId {
        &self.job
    }

    /// 作成済みのコンテナ（作成順）
    pub fn containers(&self) -> &[IntermediateContainer] {
        &self.containers
    }

    pub fn created_ids(&self) -> Vec<ContainerId> {
        self.containers.iter().map(|c| c.id.clone()).collect()
    }

    /// 削除されていないコンテナ
    pub fn remaining(&self) -> Vec<ContainerId> {
        self.containers
            .iter()
            .filter(|c| !c.is_removed())
            .map(|c| c.id.clone())
            .collect()
    }

    pub fn status_of(&self, id: &ContainerId) -> Option<ContainerStatus> {
        self.containers
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.status)
    }

    /// 現在のイメージ上に命令用のコンテナを作成
    pub async fn create(&mut self, base: &ImageRef, instruction: &Instruction) -> Result<ContainerId> {
        instruction
            .validate()
            .map_err(ContainerError::InvalidInstruction)?;

        let spec = ContainerSpec::new(base.clone(), instruction.clone())
            .label(LABEL_JOB, self.job.as_str())
            .label(LABEL_STEP, instruction.index().to_string());

        let id = self.runtime.create(&spec).await?;
        tracing::debug!(job = %self.job, step = instruction.index(), container = %id, "container created");

        self.containers.push(IntermediateContainer {
            id: id.clone(),
            job: self.job.clone(),
            ordinal: instruction.index(),
            status: ContainerStatus::Pending,
        });
        Ok(id)
    }

    /// 命令を実行する（削除の判断はしない）
    ///
    /// 成功時は `running` のままコミットを待ち、非ゼロ終了は `failed` になります。
    pub async fn execute(&mut self, id: &ContainerId) -> Result<StepResult> {
        self.transition(id, ContainerStatus::Running)?;

        match self.runtime.run(id).await {
            Ok(0) => Ok(StepResult::Success),
            Ok(code) => {
                self.transition(id, ContainerStatus::Failed)?;
                tracing::debug!(container = %id, code, "instruction failed");
                Ok(StepResult::Failure(code))
            }
            Err(e) => {
                self.transition(id, ContainerStatus::Failed)?;
                Err(e)
            }
        }
    }

    /// 成功した実行結果を新しいレイヤーとしてコミット
    pub async fn commit(&mut self, id: &ContainerId) -> Result<ImageRef> {
        self.check_transition(id, ContainerStatus::Committed)?;

        match self.runtime.commit(id).await {
            Ok(image) => {
                self.transition(id, ContainerStatus::Committed)?;
                tracing::debug!(container = %id, image = %image, "container committed");
                Ok(image)
            }
            Err(e) => {
                self.transition(id, ContainerStatus::Failed)?;
                Err(match e {
                    e @ ContainerError::CommitFailed { .. } => e,
                    other => ContainerError::CommitFailed {
                        container: id.to_string(),
                        message: other.to_string(),
                    },
                })
            }
        }
    }

    /// コンテナを削除する（冪等）
    ///
    /// 削除済み・このジョブで未作成・ランタイム上に存在しないコンテナは成功扱いです。
    pub async fn remove(&mut self, id: &ContainerId) -> Result<()> {
        match self.status_of(id) {
            None => {
                tracing::debug!(container = %id, "remove: not created by this job, nothing to do");
                return Ok(());
            }
            Some(ContainerStatus::Removed) => return Ok(()),
            Some(_) => self.check_transition(id, ContainerStatus::Removed)?,
        }

        let result = self.runtime.remove(id).await;
        self.apply_removal(id, result)
    }

    /// 実行途中で打ち切られたコンテナ（`pending` / `running`）を `failed` にする
    ///
    /// 戻り値は状態を変えたコンテナの数です。
    pub fn fail_unfinished(&mut self) -> usize {
        let mut changed = 0;
        for container in &mut self.containers {
            if matches!(
                container.status,
                ContainerStatus::Pending | ContainerStatus::Running
            ) {
                tracing::debug!(container = %container.id, from = %container.status, "container abandoned");
                container.status = ContainerStatus::Failed;
                changed += 1;
            }
        }
        changed
    }

    /// 残っているコンテナをすべて削除する
    ///
    /// 削除は並行に行い、1つの失敗が他の削除を止めることはありません。
    /// 失敗はコンテナID順に並べて返します。
    pub async fn remove_remaining(&mut self) -> Vec<RemovalFailure> {
        let targets = self.remaining();
        let runtime = self.runtime;

        let results = join_all(targets.iter().map(|id| async move {
            let result = runtime.remove(id).await;
            (id.clone(), result)
        }))
        .await;

        let mut failures = Vec::new();
        for (id, result) in results {
            if let Err(error) = self.apply_removal(&id, result) {
                failures.push(RemovalFailure {
                    container: id,
                    error,
                });
            }
        }
        failures.sort_by(|a, b| a.container.cmp(&b.container));
        failures
    }

    fn apply_removal(&mut self, id: &ContainerId, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(container = %id, "container already gone");
            }
            Err(e) => {
                tracing::warn!(container = %id, error = %e, "failed to remove intermediate container");
                return Err(ContainerError::RemovalFailed {
                    container: id.to_string(),
                    message: e.to_string(),
                });
            }
        }

        self.transition(id, ContainerStatus::Removed)?;
        tracing::debug!(container = %id, "container removed");
        Ok(())
    }

    fn check_transition(&self, id: &ContainerId, next: ContainerStatus) -> Result<()> {
        let current = self
            .status_of(id)
            .ok_or_else(|| ContainerError::UnknownContainer {
                container: id.to_string(),
            })?;
        current
            .transition(next)
            .map(|_| ())
            .map_err(|source| ContainerError::InvalidTransition {
                container: id.to_string(),
                source,
            })
    }

    fn transition(&mut self, id: &ContainerId, next: ContainerStatus) -> Result<()> {
        let entry = self
            .containers
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ContainerError::UnknownContainer {
                container: id.to_string(),
            })?;
        entry.status = entry
            .status
            .transition(next)
            .map_err(|source| ContainerError::InvalidTransition {
                container: id.to_string(),
                source,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRuntime;

    fn base() -> ImageRef {
        ImageRef::new("busybox")
    }

    #[tokio::test]
    async fn test_successful_step_lifecycle() {
        let runtime = MemoryRuntime::new();
        let mut manager = LifecycleManager::new(&runtime, JobId::new("job-1"));

        let id = manager
            .create(&base(), &Instruction::run(1, "exit 0"))
            .await
            .unwrap();
        assert_eq!(manager.status_of(&id), Some(ContainerStatus::Pending));

        assert_eq!(manager.execute(&id).await.unwrap(), StepResult::Success);
        assert_eq!(manager.status_of(&id), Some(ContainerStatus::Running));

        manager.commit(&id).await.unwrap();
        assert_eq!(manager.status_of(&id), Some(ContainerStatus::Committed));

        manager.remove(&id).await.unwrap();
        assert_eq!(manager.status_of(&id), Some(ContainerStatus::Removed));
        assert!(manager.remaining().is_empty());
        assert_eq!(manager.created_ids(), vec![id]);
    }

    #[tokio::test]
    async fn test_failed_step_is_marked_failed() {
        let runtime = MemoryRuntime::new();
        let mut manager = LifecycleManager::new(&runtime, JobId::new("job-1"));

        let id = manager
            .create(&base(), &Instruction::run(1, "exit 1"))
            .await
            .unwrap();
        assert_eq!(manager.execute(&id).await.unwrap(), StepResult::Failure(1));
        assert_eq!(manager.status_of(&id), Some(ContainerStatus::Failed));

        // 失敗したコンテナはコミットできない
        let err = manager.commit(&id).await.unwrap_err();
        assert!(matches!(err, ContainerError::InvalidTransition { .. }));
        assert!(runtime.exists(&id));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let runtime = MemoryRuntime::new();
        let mut manager = LifecycleManager::new(&runtime, JobId::new("job-1"));

        let id = manager
            .create(&base(), &Instruction::run(1, "exit 0"))
            .await
            .unwrap();
        manager.execute(&id).await.unwrap();
        manager.commit(&id).await.unwrap();

        manager.remove(&id).await.unwrap();
        manager.remove(&id).await.unwrap();

        // このジョブで作成していないコンテナも no-op
        manager
            .remove(&ContainerId::new("never-created"))
            .await
            .unwrap();
        assert_eq!(runtime.removals(), 1);
    }

    #[tokio::test]
    async fn test_remove_tolerates_container_gone_from_runtime() {
        let runtime = MemoryRuntime::new();
        let mut manager = LifecycleManager::new(&runtime, JobId::new("job-1"));

        let id = manager
            .create(&base(), &Instruction::run(1, "exit 1"))
            .await
            .unwrap();
        manager.execute(&id).await.unwrap();

        // ランタイム側で先に消えている
        runtime.remove(&id).await.unwrap();
        manager.remove(&id).await.unwrap();
        assert_eq!(manager.status_of(&id), Some(ContainerStatus::Removed));
    }

    #[tokio::test]
    async fn test_remove_pending_container_is_rejected() {
        let runtime = MemoryRuntime::new();
        let mut manager = LifecycleManager::new(&runtime, JobId::new("job-1"));

        let id = manager
            .create(&base(), &Instruction::run(1, "exit 0"))
            .await
            .unwrap();
        let err = manager.remove(&id).await.unwrap_err();
        assert!(matches!(err, ContainerError::InvalidTransition { .. }));
        assert!(runtime.exists(&id));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_instruction() {
        let runtime = MemoryRuntime::new();
        let mut manager = LifecycleManager::new(&runtime, JobId::new("job-1"));

        let err = manager
            .create(&base(), &Instruction::run(1, " "))
            .await
            .unwrap_err();
        assert!(matches!(err, ContainerError::InvalidInstruction(_)));
        assert!(manager.containers().is_empty());
        assert!(runtime.created().is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_marks_container_failed() {
        let runtime = MemoryRuntime::new().fail_commit_on("exit 0");
        let mut manager = LifecycleManager::new(&runtime, JobId::new("job-1"));

        let id = manager
            .create(&base(), &Instruction::run(1, "exit 0"))
            .await
            .unwrap();
        manager.execute(&id).await.unwrap();

        let err = manager.commit(&id).await.unwrap_err();
        assert!(matches!(err, ContainerError::CommitFailed { .. }));
        assert_eq!(manager.status_of(&id), Some(ContainerStatus::Failed));
    }

    #[tokio::test]
    async fn test_remove_remaining_continues_after_failure() {
        let runtime = MemoryRuntime::new().fail_remove_on("exit 2");
        let mut manager = LifecycleManager::new(&runtime, JobId::new("job-1"));

        let mut ids = Vec::new();
        for (i, cmd) in ["exit 1", "exit 2", "exit 3"].iter().enumerate() {
            let id = manager
                .create(&base(), &Instruction::run(i + 1, *cmd))
                .await
                .unwrap();
            manager.execute(&id).await.unwrap();
            ids.push(id);
        }

        let failures = manager.remove_remaining().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].container, ids[1]);
        assert!(matches!(
            failures[0].error,
            ContainerError::RemovalFailed { .. }
        ));

        assert_eq!(manager.remaining(), vec![ids[1].clone()]);
        assert!(!runtime.exists(&ids[0]));
        assert!(runtime.exists(&ids[1]));
        assert!(!runtime.exists(&ids[2]));
    }

    #[tokio::test]
    async fn test_abandoned_pending_container_can_be_removed() {
        let runtime = MemoryRuntime::new();
        let mut manager = LifecycleManager::new(&runtime, JobId::new("job-1"));

        let done = manager
            .create(&base(), &Instruction::run(1, "exit 0"))
            .await
            .unwrap();
        manager.execute(&done).await.unwrap();
        manager.commit(&done).await.unwrap();
        let pending = manager
            .create(&base(), &Instruction::run(2, "exit 0"))
            .await
            .unwrap();

        assert_eq!(manager.fail_unfinished(), 1);
        assert_eq!(manager.status_of(&pending), Some(ContainerStatus::Failed));
        assert_eq!(manager.status_of(&done), Some(ContainerStatus::Committed));

        assert!(manager.remove_remaining().await.is_empty());
        assert!(runtime.existing().is_empty());
        assert!(manager.remaining().is_empty());
    }

    #[tokio::test]
    async fn test_containers_carry_job_labels() {
        let runtime = MemoryRuntime::new();
        let mut manager = LifecycleManager::new(&runtime, JobId::new("job-42"));

        let id = manager
            .create(&base(), &Instruction::run(3, "exit 0"))
            .await
            .unwrap();

        let listed = runtime
            .list(&crate::runtime::ContainerFilter::ids([id.to_string()]).all(true))
            .await
            .unwrap();
        assert_eq!(listed[0].labels.get(LABEL_JOB).map(String::as_str), Some("job-42"));
        assert_eq!(listed[0].labels.get(LABEL_STEP).map(String::as_str), Some("3"));
        assert_eq!(manager.containers()[0].ordinal, 3);
    }
}
