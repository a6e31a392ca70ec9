//! 進捗ストリームの書き込み

use crate::error::{ProgressError, Result};
use crate::message::ProgressMessage;
use std::io::Write;

/// ProgressWriter - 進捗メッセージを出力先に逐次書き込む
///
/// 各レコードは書き込みのたびにフラッシュされます。
/// 終端メッセージは [`ProgressWriter::finish`] でのみ書き込め、
/// writer はそこで消費されます。
pub struct ProgressWriter<W: Write> {
    sink: W,
    sent: usize,
}

impl<W: Write> ProgressWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, sent: 0 }
    }

    /// 非終端メッセージを書き込む
    pub fn send(&mut self, message: &ProgressMessage) -> Result<()> {
        if message.is_terminal() {
            return Err(ProgressError::TerminalViaSend);
        }
        self.write_record(message)
    }

    /// 1行のテキストを `stream` として書き込む（改行は補完する）
    pub fn stream_line(&mut self, text: impl AsRef<str>) -> Result<()> {
        let text = text.as_ref();
        let line = if text.ends_with('\n') {
            text.to_string()
        } else {
            format!("{}\n", text)
        };
        self.write_record(&ProgressMessage::Stream(line))
    }

    /// 終端メッセージを書き込んでストリームを閉じる
    pub fn finish(mut self, terminal: ProgressMessage) -> Result<W> {
        debug_assert!(terminal.is_terminal());
        self.write_record(&terminal)?;
        Ok(self.sink)
    }

    /// これまでに書き込んだレコード数
    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    fn write_record(&mut self, message: &ProgressMessage) -> Result<()> {
        serde_json::to_writer(&mut self.sink, &message.to_wire())?;
        self.sink.write_all(b"\n")?;
        self.sink.flush()?;
        self.sent += 1;
        Ok(())
    }
}
