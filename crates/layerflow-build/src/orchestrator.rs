//! ビルドオーケストレータ
//!
//! 命令を順に実行し、1命令につき1つの中間コンテナを作成してレイヤーをコミットします。
//! 終了時にジョブの結果と `rm` / `forceRm` から残りのコンテナの扱いを決めます。
//!
//! | 結果 | rm | forceRm | 残りの中間コンテナ |
//! |---|---|---|---|
//! | 成功 | false | false | 残す |
//! | 成功 | true | * | 削除（ステップごとに削除済み） |
//! | 成功 | false | true | 削除 |
//! | 失敗 | * | false | 残す |
//! | 失敗 | * | true | 削除 |

use crate::error::BuildResult;
use layerflow_container::{ContainerRuntime, LifecycleManager, RemovalFailure, StepResult};
use layerflow_core::{
    BuildOptions, BuildOutcome, CleanupPolicy, ContainerId, FailureDetail, ImageRef, Instruction,
    JobId,
};
use layerflow_progress::{ProgressError, ProgressMessage, ProgressWriter, running_in_line};
use std::io::Write;

/// 1ステップの結果
enum StepOutcome {
    Committed(ImageRef),
    Failed(FailureDetail),
}

/// BuildReport - ビルドジョブの記録
#[derive(Debug)]
pub struct BuildReport {
    pub job: JobId,
    pub outcome: BuildOutcome,
    /// 作成された中間コンテナ（作成順）
    pub created: Vec<ContainerId>,
    /// クリーンアップ後も残っている中間コンテナ
    pub remaining: Vec<ContainerId>,
    /// 削除に失敗したコンテナ（ビルド結果には影響しない）
    pub cleanup_errors: Vec<RemovalFailure>,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn image(&self) -> Option<&ImageRef> {
        self.outcome.image()
    }
}

/// BuildOrchestrator - 命令列を実行するビルドエンジン
///
/// ジョブ間で共有するのはランタイムのみなので、同じオーケストレータで
/// 複数のジョブを並行に実行できます。
pub struct BuildOrchestrator<'r, R: ContainerRuntime> {
    runtime: &'r R,
}

impl<'r, R: ContainerRuntime> BuildOrchestrator<'r, R> {
    pub fn new(runtime: &'r R) -> Self {
        Self { runtime }
    }

    /// ビルドジョブを実行し、進捗を `sink` に書き出す
    ///
    /// 命令の失敗やランタイムの失敗はビルド結果として `BuildReport` に記録されます。
    /// `Err` になるのは進捗ストリームへの書き込みに失敗した場合のみです。その場合も
    /// ジョブは失敗扱いで終了時のクリーンアップを行い、その後にエラーを返します。
    pub async fn run<W: Write>(
        &self,
        instructions: &[Instruction],
        options: &BuildOptions,
        sink: W,
    ) -> BuildResult<BuildReport> {
        let job = JobId::generate();
        let policy = options.cleanup_policy();
        let mut manager = LifecycleManager::new(self.runtime, job.clone());
        let mut progress = ProgressWriter::new(sink);
        let mut cleanup_errors = Vec::new();

        tracing::info!(
            job = %job,
            steps = instructions.len(),
            rm = policy.rm,
            force_rm = policy.force_rm,
            no_cache = options.no_cache,
            "build started"
        );

        let total = instructions.len();
        let mut image = options.base_image.clone();
        let mut failure = None;
        let mut sink_error = None;

        for instruction in instructions {
            let step = self
                .run_step(
                    &mut manager,
                    &mut progress,
                    &image,
                    instruction,
                    total,
                    policy,
                    &mut cleanup_errors,
                )
                .await;

            match step {
                Ok(StepOutcome::Committed(layer)) => image = layer,
                Ok(StepOutcome::Failed(detail)) => {
                    tracing::info!(job = %job, step = instruction.index(), detail = %detail, "step failed");
                    failure = Some((instruction, detail));
                    break;
                }
                Err(e) => {
                    tracing::warn!(job = %job, step = instruction.index(), error = %e, "progress stream closed, aborting build");
                    failure = Some((
                        instruction,
                        FailureDetail::Runtime {
                            message: format!("progress stream closed: {}", e),
                        },
                    ));
                    sink_error = Some(e);
                    break;
                }
            }
        }

        let outcome = match &failure {
            None => BuildOutcome::Succeeded {
                image: image.clone(),
            },
            Some((instruction, detail)) => BuildOutcome::Failed {
                step: instruction.index(),
                detail: detail.clone(),
            },
        };

        // 打ち切られたステップのコンテナも削除対象にする
        manager.fail_unfinished();

        let mut out = StreamState {
            progress: &mut progress,
            error: sink_error,
        };
        cleanup_errors.extend(
            self.terminal_cleanup(&mut manager, &mut out, policy, &outcome)
                .await,
        );
        // 終了時の再試行で消えたコンテナのエラーは落とし、1コンテナ1件にする
        let remaining = manager.remaining();
        cleanup_errors.retain(|f| remaining.contains(&f.container));
        cleanup_errors.sort_by(|a, b| a.container.cmp(&b.container));
        cleanup_errors.dedup_by(|a, b| a.container == b.container);

        for failed in &cleanup_errors {
            out.line(format!(
                "Failed to remove intermediate container {}: {}",
                failed.container.short(),
                failed.error
            ));
        }

        let terminal = match &failure {
            None => {
                out.line(format!("Successfully built {}", image.short()));
                if let Some(tag) = &options.tag {
                    out.line(format!("Successfully tagged {}", tag));
                }
                ProgressMessage::finished(image.clone())
            }
            Some((instruction, detail)) => failure_message(instruction, detail),
        };
        let sink_error = out.error;

        let report = BuildReport {
            job,
            outcome,
            created: manager.created_ids(),
            remaining,
            cleanup_errors,
        };

        tracing::info!(
            job = %report.job,
            succeeded = report.succeeded(),
            created = report.created.len(),
            remaining = report.remaining.len(),
            cleanup_errors = report.cleanup_errors.len(),
            "build finished"
        );

        match sink_error {
            Some(e) => Err(e.into()),
            None => {
                progress.finish(terminal)?;
                Ok(report)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step<W: Write>(
        &self,
        manager: &mut LifecycleManager<'r, R>,
        progress: &mut ProgressWriter<W>,
        image: &ImageRef,
        instruction: &Instruction,
        total: usize,
        policy: CleanupPolicy,
        cleanup_errors: &mut Vec<RemovalFailure>,
    ) -> Result<StepOutcome, ProgressError> {
        progress.stream_line(format!(
            "Step {}/{} : {}",
            instruction.index(),
            total,
            instruction.display_line()
        ))?;

        let id = match manager.create(image, instruction).await {
            Ok(id) => id,
            Err(e) => return Ok(StepOutcome::Failed(runtime_failure(e))),
        };
        progress.stream_line(running_in_line(id.as_str()))?;

        match manager.execute(&id).await {
            Ok(StepResult::Success) => {}
            Ok(StepResult::Failure(code)) => {
                return Ok(StepOutcome::Failed(FailureDetail::NonZeroExit { code }));
            }
            Err(e) => return Ok(StepOutcome::Failed(runtime_failure(e))),
        }

        let layer = match manager.commit(&id).await {
            Ok(layer) => layer,
            Err(e) => return Ok(StepOutcome::Failed(runtime_failure(e))),
        };

        // ここに到達するのはジョブがまだ失敗していない場合のみ
        if policy.remove_after_step(false) {
            progress.stream_line(format!("Removing intermediate container {}", id.short()))?;
            if let Err(error) = manager.remove(&id).await {
                cleanup_errors.push(RemovalFailure {
                    container: id.clone(),
                    error,
                });
            }
        }

        progress.stream_line(format!(" ---> {}", layer.short()))?;
        Ok(StepOutcome::Committed(layer))
    }

    async fn terminal_cleanup<W: Write>(
        &self,
        manager: &mut LifecycleManager<'r, R>,
        out: &mut StreamState<'_, W>,
        policy: CleanupPolicy,
        outcome: &BuildOutcome,
    ) -> Vec<RemovalFailure> {
        if !policy.remove_remaining(outcome) {
            let retained = manager.remaining().len();
            if retained > 0 {
                tracing::debug!(job = %manager.job(), retained, "keeping intermediate containers");
            }
            return Vec::new();
        }

        for id in manager.remaining() {
            out.line(format!("Removing intermediate container {}", id.short()));
        }

        manager.remove_remaining().await
    }
}

/// 終了処理中の出力先
///
/// 一度書き込みに失敗したら以降の行は捨て、最初のエラーだけを保持します。
struct StreamState<'a, W: Write> {
    progress: &'a mut ProgressWriter<W>,
    error: Option<ProgressError>,
}

impl<W: Write> StreamState<'_, W> {
    fn line(&mut self, text: String) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.progress.stream_line(text) {
            self.error = Some(e);
        }
    }
}

fn runtime_failure(error: layerflow_container::ContainerError) -> FailureDetail {
    tracing::warn!(error = %error, "container runtime failure");
    FailureDetail::Runtime {
        message: error.to_string(),
    }
}

fn failure_message(instruction: &Instruction, detail: &FailureDetail) -> ProgressMessage {
    match detail {
        FailureDetail::NonZeroExit { code } => ProgressMessage::error(
            Some(*code),
            format!(
                "The command '{}' returned a non-zero code: {}",
                instruction.shell_command().join(" "),
                code
            ),
        ),
        FailureDetail::Runtime { message } => ProgressMessage::error(
            None,
            format!("step {} ({}): {}", instruction.index(), instruction.display_line(), message),
        ),
    }
}
