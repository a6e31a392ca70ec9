//! 進捗ストリームの読み込み

use crate::error::{ProgressError, Result};
use crate::message::{JsonMessage, ProgressMessage};
use serde_json::de::IoRead;
use serde_json::{Deserializer, StreamDeserializer};
use std::io::Read;

/// ProgressReader - 進捗メッセージの pull 型イテレータ
///
/// 有限・再開不可のシーケンスで、以下のいずれかで終了します:
/// - クリーンな EOF
/// - 終端メッセージ（`Error` / `Finished`）の直後
/// - 最初のエラーの直後
pub struct ProgressReader<R: Read> {
    records: StreamDeserializer<'static, IoRead<R>, JsonMessage>,
    done: bool,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            records: Deserializer::from_reader(reader).into_iter::<JsonMessage>(),
            done: false,
        }
    }

    /// 読み込み済みのバイト数
    pub fn byte_offset(&self) -> usize {
        self.records.byte_offset()
    }
}

impl<R: Read> Iterator for ProgressReader<R> {
    type Item = Result<ProgressMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.records.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(ProgressError::from(e)));
                }
                Some(Ok(wire)) => match ProgressMessage::from_wire(wire) {
                    Some(message) => {
                        self.done = message.is_terminal();
                        return Some(Ok(message));
                    }
                    None => {
                        tracing::trace!("skipping empty progress record");
                    }
                },
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for ProgressReader<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    fn read_all(input: &str) -> Vec<Result<ProgressMessage>> {
        ProgressReader::new(Cursor::new(input.as_bytes().to_vec())).collect()
    }

    #[test]
    fn test_reads_until_eof() {
        let input = concat!(
            r#"{"stream":"Step 1/1 : RUN exit 0\n"}"#,
            "\n",
            r#"{"stream":" ---> Running in abc\n"}"#,
            "\n"
        );
        let messages: Vec<_> = read_all(input).into_iter().map(|m| m.unwrap()).collect();
        assert_eq!(
            messages,
            vec![
                ProgressMessage::stream("Step 1/1 : RUN exit 0\n"),
                ProgressMessage::stream(" ---> Running in abc\n"),
            ]
        );
    }

    #[test]
    fn test_records_need_no_newline() {
        let input = r#"{"stream":"a"}{"stream":"b"} {"stream":"c"}"#;
        let messages = read_all(input);
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn test_empty_stream() {
        assert!(read_all("").is_empty());
        assert!(read_all("  \n").is_empty());
    }

    #[test]
    fn test_stops_after_terminal_message() {
        let input = concat!(
            r#"{"aux":{"ID":"sha256:abc"}}"#,
            "\n",
            r#"{"stream":"ignored"}"#,
            "\n"
        );
        let messages = read_all(input);
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].as_ref().unwrap(),
            &ProgressMessage::finished("sha256:abc")
        );
    }

    #[test]
    fn test_skips_empty_records() {
        let input = r#"{}{"stream":"x"}{}"#;
        let messages = read_all(input);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_malformed_record_is_decode_error() {
        let input = concat!(r#"{"stream":"ok"}"#, "\n", r#"{"stream": 42}"#, "\n");
        let mut reader = ProgressReader::new(Cursor::new(input.as_bytes().to_vec()));

        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert!(err.is_decode());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_truncated_record_is_decode_error() {
        let messages = read_all(r#"{"stream":"abc"#);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].as_ref().unwrap_err().is_decode());
    }

    struct BrokenPipe;

    impl Read for BrokenPipe {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }
    }

    #[test]
    fn test_io_failure_is_distinct_from_decode() {
        let mut reader = ProgressReader::new(BrokenPipe);
        let err = reader.next().unwrap().unwrap_err();
        assert!(err.is_io());
        assert!(!err.is_decode());
    }
}
