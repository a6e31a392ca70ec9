//! 中間コンテナ告知のスキャン
//!
//! `" ---> Running in <id>"` を含む stream 行からコンテナIDを取り出し、
//! ビルド中に作成された中間コンテナの集合を復元します。

use crate::error::Result;
use crate::message::ProgressMessage;
use crate::reader::ProgressReader;
use std::collections::HashSet;
use std::io::Read;

/// 中間コンテナの告知マーカー
pub const INTERMEDIATE_CONTAINER_PREFIX: &str = " ---> Running in ";

/// 告知行を作成
pub fn running_in_line(container_id: &str) -> String {
    format!("{}{}\n", INTERMEDIATE_CONTAINER_PREFIX, container_id)
}

/// テキスト中の告知からコンテナIDを取り出す
///
/// IDはマーカー直後からテキスト末尾までを trim したものです。
pub fn announced_container(text: &str) -> Option<&str> {
    let ix = text.find(INTERMEDIATE_CONTAINER_PREFIX)?;
    let id = text[ix + INTERMEDIATE_CONTAINER_PREFIX.len()..].trim();
    if id.is_empty() { None } else { Some(id) }
}

/// メッセージ列から告知されたコンテナIDを集める
///
/// 出現順・重複なし。マーカーを含まないメッセージは読み飛ばし、
/// 終端で空を含む集合を返します。エラーになるのはデコード/IO 失敗のみです。
pub fn collect_intermediate_containers<I>(messages: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = Result<ProgressMessage>>,
{
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for message in messages {
        let message = message?;
        let Some(text) = message.as_stream() else {
            continue;
        };
        if let Some(id) = announced_container(text) {
            if seen.insert(id.to_string()) {
                ids.push(id.to_string());
            }
        }
    }

    Ok(ids)
}

/// バイトストリームを読み切って告知されたコンテナIDを集める
pub fn scan_intermediate_containers<R: Read>(reader: R) -> Result<Vec<String>> {
    collect_intermediate_containers(ProgressReader::new(reader))
}
