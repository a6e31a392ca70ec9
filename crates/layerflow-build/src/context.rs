use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use layerflow_core::{ImageRef, Instruction};
use std::io::Write;
use std::path::Path;
use tar::Builder;

pub struct ContextBuilder;

impl ContextBuilder {
    /// 命令列から Dockerfile を生成し、それだけを含むコンテキストを作成
    pub fn from_script(base: &ImageRef, instructions: &[Instruction]) -> BuildResult<Vec<u8>> {
        if base.as_str().trim().is_empty() {
            return Err(BuildError::InvalidConfig(
                "base image must not be empty".to_string(),
            ));
        }

        let dockerfile = Self::render_dockerfile(base, instructions);
        tracing::debug!("Generated Dockerfile:\n{}", dockerfile);

        Self::archive(|tar| Self::append_dockerfile(tar, dockerfile.as_bytes()))
    }

    /// ディレクトリと Dockerfile からビルドコンテキストを作成
    ///
    /// `dockerfile_path` はコンテキスト外にあっても構いません。アーカイブ内では常に
    /// ルートの `Dockerfile` になり、ディレクトリ側の同名ファイルより優先されます。
    pub fn create_context(context_path: &Path, dockerfile_path: &Path) -> BuildResult<Vec<u8>> {
        if !context_path.is_dir() {
            return Err(BuildError::ContextNotFound(context_path.to_path_buf()));
        }
        if !dockerfile_path.is_file() {
            return Err(BuildError::DockerfileNotFound(dockerfile_path.to_path_buf()));
        }

        tracing::debug!(context = %context_path.display(), dockerfile = %dockerfile_path.display(), "packing build context");
        let dockerfile = std::fs::read(dockerfile_path)?;

        Self::archive(|tar| {
            Self::append_tree(tar, context_path, Path::new(""))?;
            Self::append_dockerfile(tar, &dockerfile)
        })
    }

    /// `FROM` + `RUN` 行の Dockerfile
    pub fn render_dockerfile(base: &ImageRef, instructions: &[Instruction]) -> String {
        let mut dockerfile = format!("FROM {}\n", base);
        for instruction in instructions {
            dockerfile.push_str(&instruction.display_line());
            dockerfile.push('\n');
        }
        dockerfile
    }

    fn archive<F>(fill: F) -> BuildResult<Vec<u8>>
    where
        F: FnOnce(&mut Builder<GzEncoder<&mut Vec<u8>>>) -> BuildResult<()>,
    {
        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);
            fill(&mut tar)?;
            tar.into_inner()?.finish()?.flush()?;
        }

        tracing::debug!(bytes = archive_data.len(), "build context ready");
        Self::check_context_size(archive_data.len());

        Ok(archive_data)
    }

    fn append_dockerfile<W: Write>(tar: &mut Builder<W>, content: &[u8]) -> BuildResult<()> {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        tar.append_data(&mut header, "Dockerfile", content)?;
        Ok(())
    }

    /// ディレクトリを再帰的に追加（ルートの `Dockerfile` は除く）
    fn append_tree<W: Write>(tar: &mut Builder<W>, dir: &Path, prefix: &Path) -> BuildResult<()> {
        let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = prefix.join(entry.file_name());
            if name == Path::new("Dockerfile") {
                continue;
            }
            if entry.file_type()?.is_dir() {
                tar.append_dir(&name, entry.path())?;
                Self::append_tree(tar, &entry.path(), &name)?;
            } else {
                tar.append_path_with_name(entry.path(), &name)?;
            }
        }
        Ok(())
    }

    fn check_context_size(size: usize) {
        const WARN_CONTEXT_BYTES: usize = 500 << 20;

        if size > WARN_CONTEXT_BYTES {
            tracing::warn!(
                size_mb = size >> 20,
                "ビルドコンテキストが大きいため送信に時間がかかります"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn unpack(archive: Vec<u8>, dest: &Path) {
        let decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(archive));
        let mut tar = tar::Archive::new(decoder);
        tar.unpack(dest).unwrap();
    }

    #[test]
    fn test_render_dockerfile() {
        let instructions = Instruction::from_commands(["exit 0", "exit 1"]);
        let dockerfile = ContextBuilder::render_dockerfile(&ImageRef::new("busybox"), &instructions);
        assert_eq!(dockerfile, "FROM busybox\nRUN exit 0\nRUN exit 1\n");
    }

    #[test]
    fn test_from_script_contains_dockerfile() {
        let instructions = Instruction::from_commands(["exit 0"]);
        let archive =
            ContextBuilder::from_script(&ImageRef::new("busybox"), &instructions).unwrap();

        let extract_dir = tempdir().unwrap();
        unpack(archive, extract_dir.path());

        let content = fs::read_to_string(extract_dir.path().join("Dockerfile")).unwrap();
        assert_eq!(content, "FROM busybox\nRUN exit 0\n");
    }

    #[test]
    fn test_from_script_rejects_empty_base() {
        let result = ContextBuilder::from_script(&ImageRef::new(" "), &[]);
        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }

    #[test]
    fn test_create_context_prefers_given_dockerfile() {
        let context = tempdir().unwrap();
        fs::create_dir_all(context.path().join("scripts/lib")).unwrap();
        fs::write(context.path().join("scripts/lib/setup.sh"), "exit 0").unwrap();
        fs::write(context.path().join("Dockerfile"), "FROM stale").unwrap();

        let elsewhere = tempdir().unwrap();
        let dockerfile = elsewhere.path().join("build.Dockerfile");
        fs::write(&dockerfile, "FROM busybox\nRUN exit 0\n").unwrap();

        let archive = ContextBuilder::create_context(context.path(), &dockerfile).unwrap();
        let out = tempdir().unwrap();
        unpack(archive, out.path());

        assert_eq!(
            fs::read_to_string(out.path().join("Dockerfile")).unwrap(),
            "FROM busybox\nRUN exit 0\n"
        );
        assert_eq!(
            fs::read_to_string(out.path().join("scripts/lib/setup.sh")).unwrap(),
            "exit 0"
        );
    }

    #[test]
    fn test_create_context_missing_dockerfile() {
        let temp_dir = tempdir().unwrap();
        let result =
            ContextBuilder::create_context(temp_dir.path(), &temp_dir.path().join("Dockerfile"));
        assert!(matches!(result, Err(BuildError::DockerfileNotFound(_))));
    }

    #[test]
    fn test_create_context_missing_dir() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("nope");
        let result = ContextBuilder::create_context(&missing, &missing.join("Dockerfile"));
        assert!(matches!(result, Err(BuildError::ContextNotFound(_))));
    }
}
