//! LayerFlow Progress Stream
//!
//! ビルド進捗メッセージのエンコーダ/デコーダ。
//! 1レコード = 1 JSON オブジェクトの自己区切りストリームで、
//! 書き込み側は逐次フラッシュし、読み込み側は pull 型のイテレータで
//! 全体をバッファせずに読み進めます。

pub mod error;
pub mod message;
pub mod reader;
pub mod scan;
pub mod writer;

pub use error::{ProgressError, Result};
pub use message::{ErrorDetail, JsonMessage, ProgressMessage};
pub use reader::ProgressReader;
pub use scan::{
    INTERMEDIATE_CONTAINER_PREFIX, announced_container, collect_intermediate_containers,
    running_in_line, scan_intermediate_containers,
};
pub use writer::ProgressWriter;
