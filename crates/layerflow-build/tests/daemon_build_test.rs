//! 実際の Docker デーモンを使ったビルドテスト
//!
//! Docker と `busybox` イメージが必要なため `#[ignore]` にしています。
//! `cargo test -- --ignored` で実行します。

use layerflow_build::{BuildOrchestrator, ContextBuilder, DaemonBuildClient, DaemonOutcome};
use layerflow_container::{ContainerFilter, ContainerRuntime, DockerRuntime};
use layerflow_core::{BuildOptions, ImageRef, Instruction};
use layerflow_progress::scan_intermediate_containers;
use std::io::Cursor;

const SUCCEEDING: &[&str] = &["exit 0", "exit 0"];
const FAILING: &[&str] = &["exit 0", "exit 1"];

/// (命令, 残るコンテナ数, rm, forceRm)
const CASES: &[(&[&str], usize, bool, bool)] = &[
    (SUCCEEDING, 2, false, false),
    (SUCCEEDING, 0, true, false),
    (SUCCEEDING, 0, true, true),
    (FAILING, 2, false, false),
    (FAILING, 1, true, false),
    (FAILING, 0, true, true),
];

async fn count_remaining(runtime: &DockerRuntime, out: Vec<u8>) -> anyhow::Result<usize> {
    let ids = scan_intermediate_containers(Cursor::new(out))?;
    let remaining = runtime.list(&ContainerFilter::ids(ids).all(true)).await?;
    Ok(remaining.len())
}

#[tokio::test]
#[ignore]
async fn test_daemon_build_with_remove_and_force_remove() -> anyhow::Result<()> {
    let runtime = DockerRuntime::connect().await?;
    let client = DaemonBuildClient::new(runtime.docker().clone());

    for &(commands, expected, rm, force_rm) in CASES {
        let instructions = Instruction::from_commands(commands.iter().copied());
        let context = ContextBuilder::from_script(&ImageRef::new("busybox"), &instructions)?;
        let options = BuildOptions::new("busybox")
            .remove(rm)
            .force_remove(force_rm)
            .no_cache(true);

        let mut out = Vec::new();
        let outcome = client.build(context, &options, &mut out).await?;
        assert_eq!(
            matches!(outcome, DaemonOutcome::Built(_)),
            commands == SUCCEEDING,
            "rm={} forceRm={}",
            rm,
            force_rm
        );

        let remaining = count_remaining(&runtime, out).await?;
        assert_eq!(
            remaining, expected,
            "rm={} forceRm={}: expected {} remaining intermediate containers, got {}",
            rm, force_rm, expected, remaining
        );
    }

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_orchestrator_with_docker_runtime() -> anyhow::Result<()> {
    let runtime = DockerRuntime::connect().await?;
    let orchestrator = BuildOrchestrator::new(&runtime);

    for &(commands, expected, rm, force_rm) in CASES {
        let instructions = Instruction::from_commands(commands.iter().copied());
        let options = BuildOptions::new("busybox")
            .remove(rm)
            .force_remove(force_rm);

        let mut out = Vec::new();
        let report = orchestrator.run(&instructions, &options, &mut out).await?;
        assert!(report.cleanup_errors.is_empty());

        let remaining = count_remaining(&runtime, out).await?;
        assert_eq!(remaining, expected, "rm={} forceRm={}", rm, force_rm);

        // 残したコンテナを片付ける
        for id in &report.remaining {
            runtime.remove(id).await?;
        }
    }

    Ok(())
}
