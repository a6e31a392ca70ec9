use thiserror::Error;

use crate::model::ContainerStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("無効な状態遷移: {from} -> {to}")]
    InvalidTransition {
        from: ContainerStatus,
        to: ContainerStatus,
    },

    #[error("無効な命令 (#{index}): {reason}")]
    InvalidInstruction { index: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
