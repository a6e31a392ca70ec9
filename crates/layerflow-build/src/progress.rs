use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use layerflow_progress::{ProgressMessage, ProgressReader, announced_container};
use std::io::Read;

/// 進捗ストリームを端末に表示する
pub struct BuildProgress {
    progress_bar: ProgressBar,
}

impl BuildProgress {
    pub fn new(label: &str) -> Self {
        Self::with_bar(ProgressBar::new_spinner(), label)
    }

    /// 描画しない（テスト・非TTY用）
    pub fn hidden(label: &str) -> Self {
        Self::with_bar(ProgressBar::hidden(), label)
    }

    fn with_bar(pb: ProgressBar, label: &str) -> Self {
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("Building {}...", label));

        Self { progress_bar: pb }
    }

    /// 1メッセージを反映
    pub fn observe(&self, message: &ProgressMessage) {
        match message {
            ProgressMessage::Stream(text) => {
                let line = text.trim_end();
                if let Some(id) = announced_container(line) {
                    self.set_message(&format!("running in {}", id));
                    self.progress_bar.println(line.dimmed().to_string());
                } else if line.starts_with("Step ") {
                    self.set_message(line);
                    self.progress_bar.println(line.bold().to_string());
                } else if !line.is_empty() {
                    self.progress_bar.println(line);
                }
            }
            ProgressMessage::Status { id, status } => match id {
                Some(id) => self.set_message(&format!("{}: {}", id, status)),
                None => self.set_message(status),
            },
            ProgressMessage::Error(detail) => self.finish_error(&detail.message),
            ProgressMessage::Finished { image } => {
                self.finish(&format!("Build completed ✓ {}", image.short().cyan()));
            }
        }
    }

    /// ストリームを読み切って表示し、終端メッセージを返す
    pub fn follow<R: Read>(
        &self,
        reader: R,
    ) -> layerflow_progress::Result<Option<ProgressMessage>> {
        let mut terminal = None;
        for message in ProgressReader::new(reader) {
            let message = message?;
            self.observe(&message);
            if message.is_terminal() {
                terminal = Some(message);
            }
        }
        Ok(terminal)
    }

    pub fn set_message(&self, msg: &str) {
        self.progress_bar.set_message(msg.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.progress_bar.finish_with_message(message.to_string());
    }

    pub fn finish_error(&self, error: &str) {
        self.progress_bar
            .finish_with_message(format!("Build failed: {}", error.red()));
    }

    pub fn is_finished(&self) -> bool {
        self.progress_bar.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_follow_returns_terminal_message() {
        let input = concat!(
            r#"{"stream":"Step 1/1 : RUN exit 1\n"}"#,
            r#"{"stream":" ---> Running in abc\n"}"#,
            r#"{"errorDetail":{"code":1,"message":"failed"},"error":"failed"}"#,
        );
        let progress = BuildProgress::hidden("test");
        let terminal = progress.follow(Cursor::new(input)).unwrap();

        assert_eq!(terminal, Some(ProgressMessage::error(Some(1), "failed")));
        assert!(progress.is_finished());
    }

    #[test]
    fn test_follow_without_terminal_message() {
        let progress = BuildProgress::hidden("test");
        let terminal = progress
            .follow(Cursor::new(r#"{"stream":"hello\n"}"#))
            .unwrap();
        assert_eq!(terminal, None);
        assert!(!progress.is_finished());
    }

    #[test]
    fn test_follow_surfaces_decode_error() {
        let progress = BuildProgress::hidden("test");
        let err = progress.follow(Cursor::new("{oops")).unwrap_err();
        assert!(err.is_decode());
    }
}
