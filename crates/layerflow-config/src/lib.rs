//! LayerFlow のエンジン設定
//!
//! 設定ファイル（YAML）と環境変数からビルドの既定値を読み込みます。
//!
//! 探索順:
//! 1. 環境変数 `LAYERFLOW_CONFIG`（直接パス指定）
//! 2. `~/.config/layerflow/config.yaml`
//!
//! どちらも無ければ既定値を使います。環境変数 `LAYERFLOW_REMOVE` /
//! `LAYERFLOW_FORCE_REMOVE` / `LAYERFLOW_NO_CACHE` はファイルの値より優先されます。

pub mod error;

pub use error::*;

use layerflow_core::{BuildOptions, ImageRef};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "LAYERFLOW_CONFIG";
pub const REMOVE_ENV: &str = "LAYERFLOW_REMOVE";
pub const FORCE_REMOVE_ENV: &str = "LAYERFLOW_FORCE_REMOVE";
pub const NO_CACHE_ENV: &str = "LAYERFLOW_NO_CACHE";

const DEFAULT_BASE_IMAGE: &str = "busybox";

/// ビルドフラグの既定値（Docker API と同じ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildDefaults {
    pub remove: bool,
    pub force_remove: bool,
    pub no_cache: bool,
}

impl Default for BuildDefaults {
    fn default() -> Self {
        Self {
            remove: true,
            force_remove: false,
            no_cache: false,
        }
    }
}

/// EngineConfig - config.yaml の内容
///
/// ```yaml
/// base_image: alpine:3.20
/// tag: app:latest
/// defaults:
///   remove: true
///   force_remove: false
///   no_cache: false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_image: String,
    pub tag: Option<String>,
    pub defaults: BuildDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_image: DEFAULT_BASE_IMAGE.to_string(),
            tag: None,
            defaults: BuildDefaults::default(),
        }
    }
}

impl EngineConfig {
    /// 設定を読み込み、環境変数を適用する
    pub fn load() -> Result<Self> {
        let mut config = match config_path()? {
            Some(path) => Self::load_from(&path)?,
            None => {
                tracing::debug!("設定ファイルが無いため既定値を使用します");
                Self::default()
            }
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// 指定したファイルから読み込む（環境変数は適用しない）
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!("設定ファイルを読み込み: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        // 空ファイルは既定値
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// `LAYERFLOW_REMOVE` などの環境変数で既定値を上書き
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_flag(REMOVE_ENV)? {
            self.defaults.remove = value;
        }
        if let Some(value) = env_flag(FORCE_REMOVE_ENV)? {
            self.defaults.force_remove = value;
        }
        if let Some(value) = env_flag(NO_CACHE_ENV)? {
            self.defaults.no_cache = value;
        }
        Ok(())
    }

    /// 設定の既定値から `BuildOptions` を作る
    ///
    /// `base` を省略した場合は設定の `base_image` を使います。
    pub fn build_options(&self, base: Option<ImageRef>) -> BuildOptions {
        let base = base.unwrap_or_else(|| ImageRef::new(self.base_image.clone()));
        let options = BuildOptions::new(base)
            .remove(self.defaults.remove)
            .force_remove(self.defaults.force_remove)
            .no_cache(self.defaults.no_cache);

        match &self.tag {
            Some(tag) => options.tag(tag.clone()),
            None => options,
        }
    }
}

/// 使用する設定ファイルのパス
///
/// `LAYERFLOW_CONFIG` が指定されていればそのパスを返します（存在しなくてもエラーにはせず、
/// 読み込み時に IO エラーになります）。
pub fn config_path() -> Result<Option<PathBuf>> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Ok(Some(PathBuf::from(path)));
    }

    let global = get_config_dir()?.join("config.yaml");
    Ok(global.exists().then_some(global))
}

/// LayerFlowの設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("layerflow"))
}

fn env_flag(name: &str) -> Result<Option<bool>> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    parse_flag(&raw)
        .map(Some)
        .ok_or_else(|| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw,
        })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
