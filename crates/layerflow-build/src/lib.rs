//! LayerFlow Image Build Orchestration
//!
//! 命令列を1ステップずつ中間コンテナで実行してレイヤーをコミットし、
//! `rm` / `forceRm` に従って中間コンテナを片付けるビルドエンジンです。
//! 進捗は JSON メッセージのストリームとして逐次書き出されます。

pub mod context;
pub mod daemon;
pub mod error;
pub mod orchestrator;
pub mod progress;

pub use context::ContextBuilder;
pub use daemon::{DaemonBuildClient, DaemonOutcome};
pub use error::{BuildError, BuildResult};
pub use orchestrator::{BuildOrchestrator, BuildReport};
pub use progress::BuildProgress;
