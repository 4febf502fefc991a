//! 変換エンジン - ワープロアプリケーションの自動化インターフェース
//!
//! バッチごとに [`Launcher::launch`] でセッションを 1 つ起動し、
//! 1 ファイルずつ `open → export → close` を呼び出す。
//! セッションは最後に [`WordProcessor::quit`] で終了させる。

mod libreoffice;
mod word;

pub use libreoffice::{LibreOffice, LibreOfficeSession};
pub use word::{WordAutomation, WordSession};

use crate::config::{EngineKind, Settings};
use crate::error::Result;
use std::future::Future;
use std::path::{Path, PathBuf};

/// 開いている文書のハンドル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    pub id: u64,
    pub source: PathBuf,
}

/// 起動済みの自動化セッション（同時に扱う文書は 1 つ）
pub trait WordProcessor: Send {
    /// 文書を読み取り専用で開く
    fn open_document(&mut self, path: &Path) -> impl Future<Output = Result<DocumentHandle>> + Send;

    /// PDF として書き出す
    fn export_as_pdf(
        &mut self,
        handle: &DocumentHandle,
        output: &Path,
    ) -> impl Future<Output = Result<()>> + Send;

    /// 保存せずに閉じる
    fn close_document(&mut self, handle: DocumentHandle) -> impl Future<Output = Result<()>> + Send;

    /// セッションを終了する
    fn quit(self) -> impl Future<Output = ()> + Send;
}

/// セッションの起動
pub trait Launcher: Send + Sync {
    type Session: WordProcessor;

    fn name(&self) -> &str;

    /// 失敗はバッチ全体の致命的エラー
    fn launch(&self) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// 設定で選ばれたエンジン
#[derive(Debug, Clone)]
pub enum Engine {
    Word(WordAutomation),
    LibreOffice(LibreOffice),
}

impl Engine {
    pub fn from_settings(settings: &Settings) -> Self {
        match settings.engine {
            EngineKind::Word => Self::Word(WordAutomation::new()),
            EngineKind::LibreOffice => Self::LibreOffice(LibreOffice::new(settings.soffice.clone())),
        }
    }
}

pub enum EngineSession {
    Word(WordSession),
    LibreOffice(LibreOfficeSession),
}

impl Launcher for Engine {
    type Session = EngineSession;

    fn name(&self) -> &str {
        match self {
            Self::Word(w) => w.name(),
            Self::LibreOffice(l) => l.name(),
        }
    }

    async fn launch(&self) -> Result<EngineSession> {
        match self {
            Self::Word(w) => w.launch().await.map(EngineSession::Word),
            Self::LibreOffice(l) => l.launch().await.map(EngineSession::LibreOffice),
        }
    }
}

impl WordProcessor for EngineSession {
    async fn open_document(&mut self, path: &Path) -> Result<DocumentHandle> {
        match self {
            Self::Word(s) => s.open_document(path).await,
            Self::LibreOffice(s) => s.open_document(path).await,
        }
    }

    async fn export_as_pdf(&mut self, handle: &DocumentHandle, output: &Path) -> Result<()> {
        match self {
            Self::Word(s) => s.export_as_pdf(handle, output).await,
            Self::LibreOffice(s) => s.export_as_pdf(handle, output).await,
        }
    }

    async fn close_document(&mut self, handle: DocumentHandle) -> Result<()> {
        match self {
            Self::Word(s) => s.close_document(handle).await,
            Self::LibreOffice(s) => s.close_document(handle).await,
        }
    }

    async fn quit(self) {
        match self {
            Self::Word(s) => s.quit().await,
            Self::LibreOffice(s) => s.quit().await,
        }
    }
}
