//! 設定 - 環境変数（`.env` 対応）から読み込み

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::time::Duration;

const ENGINE_VAR: &str = "WORD2PDF_ENGINE";
const SOFFICE_VAR: &str = "WORD2PDF_SOFFICE";
const TIMEOUT_VAR: &str = "WORD2PDF_JOB_TIMEOUT_SECS";
const OVERWRITE_VAR: &str = "WORD2PDF_OVERWRITE";

/// 1 ファイルあたりの既定の待ち時間
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(120);

/// 使用する変換エンジン
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Microsoft Word（COM オートメーション）
    Word,
    /// LibreOffice（headless）
    LibreOffice,
}

impl EngineKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "word" | "msword" => Ok(Self::Word),
            "libreoffice" | "soffice" => Ok(Self::LibreOffice),
            other => bail!("不明な変換エンジン: {}", other),
        }
    }
}

impl Default for EngineKind {
    fn default() -> Self {
        if cfg!(windows) { Self::Word } else { Self::LibreOffice }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone)]
pub struct Settings {
    pub engine: EngineKind,
    /// LibreOffice の実行ファイル
    pub soffice: PathBuf,
    pub job_timeout: Duration,
    /// 既存の PDF を上書きするか
    pub overwrite: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            soffice: PathBuf::from("soffice"),
            job_timeout: DEFAULT_JOB_TIMEOUT,
            overwrite: true,
        }
    }
}

impl Settings {
    /// 環境変数から読み込む
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(value) = lookup(ENGINE_VAR) {
            settings.engine = EngineKind::parse(&value).with_context(|| format!("{} の値が不正", ENGINE_VAR))?;
        }

        if let Some(value) = lookup(SOFFICE_VAR).filter(|v| !v.trim().is_empty()) {
            settings.soffice = PathBuf::from(value.trim());
        }

        if let Some(value) = lookup(TIMEOUT_VAR) {
            let secs: u64 = value
                .trim()
                .parse()
                .with_context(|| format!("{} の値が不正: {}", TIMEOUT_VAR, value))?;
            if secs == 0 {
                bail!("{} は 1 以上を指定してください", TIMEOUT_VAR);
            }
            settings.job_timeout = Duration::from_secs(secs);
        }

        if let Some(value) = lookup(OVERWRITE_VAR) {
            settings.overwrite = parse_bool(&value).with_context(|| format!("{} の値が不正", OVERWRITE_VAR))?;
        }

        Ok(settings)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("真偽値ではありません: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let settings = load(&[]).unwrap();
        assert_eq!(settings.job_timeout, DEFAULT_JOB_TIMEOUT);
        assert!(settings.overwrite);
        assert_eq!(settings.soffice, PathBuf::from("soffice"));
        assert_eq!(settings.engine, EngineKind::default());
    }

    #[test]
    fn reads_all_variables() {
        let settings = load(&[
            (ENGINE_VAR, "LibreOffice"),
            (SOFFICE_VAR, "/opt/lo/program/soffice"),
            (TIMEOUT_VAR, "30"),
            (OVERWRITE_VAR, "no"),
        ])
        .unwrap();
        assert_eq!(settings.engine, EngineKind::LibreOffice);
        assert_eq!(settings.soffice, PathBuf::from("/opt/lo/program/soffice"));
        assert_eq!(settings.job_timeout, Duration::from_secs(30));
        assert!(!settings.overwrite);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(load(&[(ENGINE_VAR, "notepad")]).is_err());
        assert!(load(&[(TIMEOUT_VAR, "soon")]).is_err());
        assert!(load(&[(TIMEOUT_VAR, "0")]).is_err());
        assert!(load(&[(OVERWRITE_VAR, "maybe")]).is_err());
    }
}
