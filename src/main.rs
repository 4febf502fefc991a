//! Word → PDF 一括変換ツール - メインエントリポイント

// リリースビルドではコンソールを表示しない
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use anyhow::Result;

fn main() -> Result<()> {
    // ロギング初期化
    tracing_subscriber::fmt::init();

    // 環境変数の読み込み
    dotenvy::dotenv().ok();

    // GUIアプリケーション起動
    word_to_pdf::gui::run()
}
