//! Word → PDF 一括変換ツール - ローカルのワープロを使ったPDF変換
//!
//! # 機能
//! - 複数の Word 文書を選択して一括で PDF に変換
//! - 出力ファイル名は元のファイル名（拡張子を .pdf に置換）
//! - Microsoft Word（COM オートメーション）または LibreOffice を使用
//! - ファイル単位の失敗は記録して次のファイルへ進む
//! - ドラッグ＆ドロップ対応GUI

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod gui;
pub mod job;
pub mod selection;

pub use batch::{BatchEvent, BatchRequest, CancelToken, run_batch};
pub use error::ConversionError;
