//! LayerFlow Core
//!
//! ビルドエンジン全体で共有されるモデル定義。
//! 命令列、コンテナ/イメージの識別子、ビルドオプション、
//! クリーンアップポリシー、ビルド結果を提供します。

pub mod error;
pub mod model;

pub use error::{CoreError, Result};
pub use model::*;
