//! Docker デーモンへのビルド提出
//!
//! ビルドコンテキスト（tar）を `/build` に送り、返ってくる `BuildInfo` を
//! そのまま進捗ストリームのメッセージに変換して書き出します。

use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use bollard::query_parameters::BuildImageOptions;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use http_body_util::{Either, Full};
use layerflow_core::{BuildOptions, ImageRef};
use layerflow_progress::{ErrorDetail, ProgressMessage, ProgressWriter};
use std::io::Write;

/// デーモンでのビルド結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonOutcome {
    Built(ImageRef),
    Failed(ErrorDetail),
}

pub struct DaemonBuildClient {
    docker: Docker,
}

impl DaemonBuildClient {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// イメージをビルド
    ///
    /// `Remove` / `ForceRemove` / `NoCache` はそのままデーモンに渡します。
    /// 進捗は受信したそばから `sink` に書き出します。
    pub async fn build<W: Write>(
        &self,
        context_data: Vec<u8>,
        options: &BuildOptions,
        sink: W,
    ) -> BuildResult<DaemonOutcome> {
        tracing::info!(
            "Submitting build: rm={} forcerm={} nocache={}",
            options.remove,
            options.force_remove,
            options.no_cache
        );

        let query = build_query(options);
        tracing::debug!("Build options: {:?}", query);

        let body = Full::new(Bytes::from(context_data));
        let mut stream = self
            .docker
            .build_image(query, None, Some(Either::Left(body)));

        let mut progress = ProgressWriter::new(sink);
        let mut image = None;

        while let Some(msg) = stream.next().await {
            let output = msg.map_err(BuildError::DockerConnection)?;

            match convert_build_info(output) {
                Some(ProgressMessage::Error(detail)) => {
                    tracing::info!("Build failed: {}", detail.message);
                    progress.finish(ProgressMessage::Error(detail.clone()))?;
                    return Ok(DaemonOutcome::Failed(detail));
                }
                // aux の後にも "Successfully built" 等が続くため終端は最後に書く
                Some(ProgressMessage::Finished { image: id }) => image = Some(id),
                Some(message) => progress.send(&message)?,
                None => {}
            }
        }

        let image = image.ok_or_else(|| {
            BuildError::BuildFailed("build stream ended without an image id".to_string())
        })?;
        progress.finish(ProgressMessage::finished(image.clone()))?;

        tracing::info!("Successfully built: {}", image);
        Ok(DaemonOutcome::Built(image))
    }
}

fn build_query(options: &BuildOptions) -> BuildImageOptions {
    BuildImageOptions {
        dockerfile: "Dockerfile".to_string(),
        t: options.tag.clone(),
        nocache: options.no_cache,
        rm: options.remove,
        forcerm: options.force_remove,
        ..Default::default()
    }
}

/// ビルド出力の変換
fn convert_build_info(output: bollard::models::BuildInfo) -> Option<ProgressMessage> {
    if output.error.is_some() || output.error_detail.is_some() {
        let code = output.error_detail.as_ref().and_then(|d| d.code);
        let message = output
            .error
            .or_else(|| output.error_detail.and_then(|d| d.message))
            .unwrap_or_else(|| "Unknown build error".to_string());
        return Some(ProgressMessage::Error(ErrorDetail { code, message }));
    }

    if let Some(id) = output.aux.and_then(|aux| aux.id) {
        return Some(ProgressMessage::finished(id));
    }

    if let Some(stream) = output.stream {
        return Some(ProgressMessage::Stream(stream));
    }

    output.status.map(|status| ProgressMessage::Status {
        id: output.id,
        status,
    })
}
