//! モデル定義
//!
//! ビルドジョブで扱うデータモデルを機能ごとのモジュールに分けて定義します。

mod id;
mod instruction;
mod options;
mod outcome;
mod status;

// Re-exports
pub use id::*;
pub use instruction::*;
pub use options::*;
pub use outcome::*;
pub use status::*;
