//! エラー型

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// 変換処理のエラー
#[derive(Debug, Error)]
pub enum ConversionError {
    /// 元ファイルを開けない（破損・未対応形式・ロック中など）
    #[error("ファイルを開けません: {path}: {reason}")]
    FileOpen { path: PathBuf, reason: String },

    /// PDF の書き出しに失敗（権限・容量不足・パス長など）
    #[error("PDF の書き出しに失敗: {path}: {reason}")]
    Export { path: PathBuf, reason: String },

    /// 1 ファイルあたりの待ち時間を超過
    #[error("{}秒以内に応答がありませんでした", .0.as_secs())]
    Timeout(Duration),

    /// ワープロアプリケーションを起動できない
    #[error("変換エンジンを起動できません: {0}")]
    Launch(String),

    /// 自動化セッションとの通信が途絶えた
    #[error("変換エンジンとの通信に失敗: {0}")]
    Session(String),
}

impl ConversionError {
    /// バッチ全体を中断すべきエラーか
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Launch(_))
    }

    /// セッションを作り直す必要があるか
    pub fn needs_restart(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Session(_))
    }

    pub fn file_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::FileOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn export(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Export {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = ConversionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_launch_failures_are_fatal() {
        assert!(ConversionError::Launch("no word".into()).is_fatal());
        assert!(!ConversionError::file_open("a.docx", "corrupt").is_fatal());
        assert!(!ConversionError::Timeout(Duration::from_secs(5)).is_fatal());
    }

    #[test]
    fn timeout_and_session_errors_restart_the_session() {
        assert!(ConversionError::Timeout(Duration::from_secs(1)).needs_restart());
        assert!(ConversionError::Session("pipe closed".into()).needs_restart());
        assert!(!ConversionError::export("a.pdf", "denied").needs_restart());
    }

    #[test]
    fn timeout_message_shows_seconds() {
        let msg = ConversionError::Timeout(Duration::from_secs(120)).to_string();
        assert!(msg.starts_with("120秒"));
    }
}
