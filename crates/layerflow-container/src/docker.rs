//! Docker (bollard) によるコンテナランタイム実装

use crate::error::{ContainerError, Result};
use crate::runtime::{
    ContainerFilter, ContainerRuntime, ContainerSpec, ContainerState, ContainerSummary,
};
use bollard::Docker;
use bollard::models::{ContainerConfig, ContainerCreateBody, ContainerSummaryStateEnum};
use bollard::query_parameters::{
    CommitContainerOptions, CreateContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use futures_util::stream::StreamExt;
use layerflow_core::{ContainerId, ImageRef};
use std::collections::HashMap;

/// Docker接続を初期化
pub async fn init_docker() -> Result<Docker> {
    let docker = Docker::connect_with_local_defaults()
        .map_err(|e| ContainerError::RuntimeUnavailable(e.to_string()))?;

    // 接続テスト
    docker
        .ping()
        .await
        .map_err(|e| ContainerError::RuntimeUnavailable(e.to_string()))?;

    Ok(docker)
}

/// DockerRuntime - Docker Engine API 上の中間コンテナ操作
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// ローカルのDockerに接続して作成
    pub async fn connect() -> Result<Self> {
        Ok(Self::new(init_docker().await?))
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        let body = ContainerCreateBody {
            image: Some(spec.image.to_string()),
            cmd: Some(spec.instruction.shell_command()),
            labels: Some(spec.labels.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        match self
            .docker
            .create_container(None::<CreateContainerOptions>, body)
            .await
        {
            Ok(response) => {
                for warning in &response.warnings {
                    tracing::warn!("create_container: {}", warning);
                }
                Ok(ContainerId::new(response.id))
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(ContainerError::ImageNotFound {
                image: spec.image.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn run(&self, id: &ContainerId) -> Result<i64> {
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(|e| ContainerError::ExecuteFailed {
                container: id.to_string(),
                message: e.to_string(),
            })?;

        let mut wait = self
            .docker
            .wait_container(id.as_str(), None::<WaitContainerOptions>);

        match wait.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard は非ゼロ終了をエラーとして返す
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(ContainerError::ExecuteFailed {
                container: id.to_string(),
                message: e.to_string(),
            }),
            None => Err(ContainerError::ExecuteFailed {
                container: id.to_string(),
                message: "wait stream ended without a status".to_string(),
            }),
        }
    }

    async fn commit(&self, id: &ContainerId) -> Result<ImageRef> {
        let options = CommitContainerOptions {
            container: Some(id.to_string()),
            pause: true,
            ..Default::default()
        };

        let response = self
            .docker
            .commit_container(options, ContainerConfig::default())
            .await
            .map_err(|e| ContainerError::CommitFailed {
                container: id.to_string(),
                message: e.to_string(),
            })?;

        Ok(ImageRef::new(response.id))
    }

    async fn remove(&self, id: &ContainerId) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        match self
            .docker
            .remove_container(id.as_str(), Some(options))
            .await
        {
            Ok(_) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(ContainerError::NotFound {
                container: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>> {
        let Some(filters) = id_filters(filter) else {
            return Ok(Vec::new());
        };

        let options = ListContainersOptions {
            all: filter.all,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                Some(ContainerSummary {
                    id: ContainerId::new(id),
                    image: ImageRef::new(c.image.unwrap_or_default()),
                    state: convert_state(c.state),
                    labels: c.labels.unwrap_or_default(),
                })
            })
            .collect())
    }
}

/// `list_containers` に渡す id フィルタ
///
/// Docker は空の id を「全件に一致」と解釈するため取り除きます。
/// 有効な id が1つも無ければ `None`（何にも一致しない）。
fn id_filters(filter: &ContainerFilter) -> Option<HashMap<String, Vec<String>>> {
    let ids: Vec<String> = filter
        .ids
        .iter()
        .filter(|id| !id.is_empty())
        .cloned()
        .collect();
    if ids.is_empty() {
        return None;
    }
    Some(HashMap::from([("id".to_string(), ids)]))
}

fn convert_state(state: Option<ContainerSummaryStateEnum>) -> ContainerState {
    match state {
        Some(ContainerSummaryStateEnum::CREATED) => ContainerState::Created,
        Some(ContainerSummaryStateEnum::RUNNING)
        | Some(ContainerSummaryStateEnum::RESTARTING)
        | Some(ContainerSummaryStateEnum::PAUSED) => ContainerState::Running,
        Some(ContainerSummaryStateEnum::EXITED) | Some(ContainerSummaryStateEnum::DEAD) => {
            ContainerState::Exited
        }
        _ => ContainerState::Unknown,
    }
}
