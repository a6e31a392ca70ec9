//! ビルド命令定義

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Instruction - ビルドスクリプトの1ステップ
///
/// パース済みの `RUN` 相当の命令です。提出後は変更されません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// 1始まりの序数
    index: usize,
    /// シェルで実行されるコマンド
    command: String,
}

impl Instruction {
    pub fn run(index: usize, command: impl Into<String>) -> Self {
        Self {
            index,
            command: command.into(),
        }
    }

    /// コマンド列から 1..=n の序数を振った命令列を作成
    pub fn from_commands<I, S>(commands: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        commands
            .into_iter()
            .enumerate()
            .map(|(i, cmd)| Self::run(i + 1, cmd))
            .collect()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// ランタイムに渡すコマンドライン（`/bin/sh -c <command>`）
    pub fn shell_command(&self) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), self.command.clone()]
    }

    /// Dockerfile 上の表記
    pub fn display_line(&self) -> String {
        format!("RUN {}", self.command)
    }

    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(CoreError::InvalidInstruction {
                index: self.index,
                reason: "コマンドが空です".to_string(),
            });
        }
        Ok(())
    }
}
