//! メインアプリケーションウィンドウ

use crate::batch::{BatchEvent, BatchRequest, CancelToken, Phase, run_batch};
use crate::config::Settings;
use crate::engine::{Engine, Launcher};
use crate::job::{BatchSummary, JobOutcome};
use crate::selection::{FileSelection, is_word_document, select_output_directory, select_source_files};
use anyhow::{Context, Result};
use eframe::egui;
use egui::{CentralPanel, RichText, Vec2};
use rfd::{MessageButtons, MessageDialog, MessageLevel};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, channel};
use tokio::runtime::Runtime;
use tracing::{error, info};

use super::theme::{Colors, dark_theme};

/// 最大ログ行数
const MAX_LOG_LINES: usize = 1000;

/// ファイルごとの状態
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileStatus {
    Pending,
    Converting,
    Converted,
    Skipped,
    Failed(String),
}

impl FileStatus {
    fn from_outcome(outcome: &JobOutcome) -> Self {
        match outcome {
            JobOutcome::Converted { .. } => Self::Converted,
            JobOutcome::Skipped { .. } => Self::Skipped,
            JobOutcome::Failed { error } => Self::Failed(error.clone()),
        }
    }

    fn icon(&self) -> (&'static str, egui::Color32) {
        match self {
            Self::Pending => ("•", Colors::TEXT_SECONDARY),
            Self::Converting => ("⟳", Colors::ACCENT),
            Self::Converted => ("✓", Colors::SUCCESS),
            Self::Skipped => ("↷", Colors::WARNING),
            Self::Failed(_) => ("✗", Colors::ERROR),
        }
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "待機中",
        Phase::FilesSelected => "ファイル選択済み",
        Phase::OutputSelected => "準備完了",
        Phase::Converting => "変換中",
        Phase::Done => "完了",
        Phase::PartialFailure => "一部失敗",
    }
}

fn show_message(level: MessageLevel, title: &str, description: &str) {
    MessageDialog::new()
        .set_level(level)
        .set_title(title)
        .set_description(description)
        .set_buttons(MessageButtons::Ok)
        .show();
}

/// アプリケーション状態
pub struct WordToPdfApp {
    /// Tokioランタイム
    runtime: Runtime,
    settings: Settings,
    engine: Engine,
    /// 変換対象
    selection: FileSelection,
    /// 選択順と対応するファイルの状態
    statuses: Vec<FileStatus>,
    /// 出力フォルダ（入力欄）
    output_dir: String,
    is_converting: bool,
    progress: f32,
    /// ステータスメッセージ
    status: String,
    log: Vec<String>,
    last_summary: Option<BatchSummary>,
    cancel: Option<CancelToken>,
    /// 進捗受信チャンネル
    event_rx: Receiver<BatchEvent>,
    /// 進捗送信チャンネル
    event_tx: Sender<BatchEvent>,
}

impl WordToPdfApp {
    pub fn new(runtime: Runtime, settings: Settings) -> Self {
        let (event_tx, event_rx) = channel();
        let engine = Engine::from_settings(&settings);

        Self {
            runtime,
            settings,
            engine,
            selection: FileSelection::new(),
            statuses: Vec::new(),
            output_dir: String::new(),
            is_converting: false,
            progress: 0.0,
            status: "Word ファイルを選択して開始".to_string(),
            log: Vec::new(),
            last_summary: None,
            cancel: None,
            event_rx,
            event_tx,
        }
    }

    fn phase(&self) -> Phase {
        Phase::derive(
            !self.selection.is_empty(),
            !self.output_dir.trim().is_empty(),
            self.is_converting,
            self.last_summary.as_ref(),
        )
    }

    fn append_log(&mut self, message: impl Into<String>) {
        let line = format!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), message.into());
        self.log.push(line);
        if self.log.len() > MAX_LOG_LINES {
            let excess = self.log.len() - MAX_LOG_LINES;
            self.log.drain(..excess);
        }
    }

    /// ファイルを追加
    fn add_files(&mut self, files: Vec<PathBuf>) {
        let requested = files.len();
        let result = self.selection.add(files);
        self.statuses.resize(self.selection.len(), FileStatus::Pending);
        self.last_summary = None;

        if self.output_dir.trim().is_empty() {
            if let Some(dir) = self.selection.suggested_output_dir() {
                self.output_dir = dir.display().to_string();
            }
        }

        if result.added > 0 {
            self.status = format!(
                "{} 件のファイルを追加しました（合計 {} 件）",
                result.added,
                self.selection.len()
            );
        } else if requested > 0 {
            self.status = "新しいファイルはありません（重複をスキップ）".to_string();
        }
    }

    fn clear_file_list(&mut self) {
        self.selection.clear();
        self.statuses.clear();
        self.progress = 0.0;
        self.last_summary = None;
        self.status = "リストをクリアしました".to_string();
    }

    fn choose_output_directory(&mut self) {
        let current = PathBuf::from(self.output_dir.trim());
        let start = current.is_dir().then_some(current.as_path());
        if let Some(dir) = select_output_directory(start) {
            self.output_dir = dir.display().to_string();
            self.status = format!("出力フォルダ: {}", self.output_dir);
        }
    }

    /// 変換開始
    fn start_conversion(&mut self) {
        if !self.phase().can_start() {
            show_message(MessageLevel::Info, "変換中", "現在の変換が終わるまでお待ちください。");
            return;
        }

        if self.selection.is_empty() {
            self.status = "変換するファイルがありません".to_string();
            return;
        }

        let output_dir = self.output_dir.trim();
        if output_dir.is_empty() {
            show_message(MessageLevel::Warning, "出力フォルダ未指定", "変換前に出力フォルダを選択してください。");
            return;
        }

        let output_dir = PathBuf::from(output_dir);
        if !output_dir.is_dir() {
            show_message(MessageLevel::Error, "無効なフォルダ", "指定された出力フォルダが存在しません。");
            return;
        }

        let request = BatchRequest {
            files: self.selection.files().to_vec(),
            output_dir,
            overwrite: self.settings.overwrite,
            job_timeout: self.settings.job_timeout,
        };

        self.statuses = vec![FileStatus::Pending; request.files.len()];
        self.log.clear();
        self.progress = 0.0;
        self.last_summary = None;
        self.is_converting = true;
        self.status = "変換を開始しています...".to_string();

        let cancel = CancelToken::new();
        self.cancel = Some(cancel.clone());

        let engine = self.engine.clone();
        let event_tx = self.event_tx.clone();

        // バックグラウンドで処理
        self.runtime.spawn(async move {
            if let Err(e) = run_batch(&engine, request, &cancel, &event_tx).await {
                error!(error = %e, "変換を中断しました");
            }
        });
    }

    fn cancel_conversion(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
            self.status = "現在のファイルの完了後にキャンセルします...".to_string();
            self.append_log("キャンセルを要求しました");
        }
    }

    /// 進捗を受信
    fn receive_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                BatchEvent::Started { total, engine } => {
                    self.append_log(format!("{} を起動中...", engine));
                    self.append_log(format!("{} 件のファイルを変換します", total));
                }
                BatchEvent::JobStarted { index, source } => {
                    if let Some(status) = self.statuses.get_mut(index) {
                        *status = FileStatus::Converting;
                    }
                    self.status = format!("変換中 ({}/{}): {}", index + 1, self.statuses.len(), file_name(&source));
                    self.append_log(format!("変換中: {}", source.display()));
                }
                BatchEvent::JobFinished(report) => {
                    let line = match &report.outcome {
                        JobOutcome::Converted { output } => format!("[OK] 保存: {}", output.display()),
                        JobOutcome::Skipped { output } => format!("[SKIP] 既に存在します: {}", output.display()),
                        JobOutcome::Failed { error } => {
                            format!("[ERROR] 失敗: {} -> {}", report.source.display(), error)
                        }
                    };
                    self.append_log(line);

                    if let Some(status) = self.statuses.get_mut(report.index) {
                        *status = FileStatus::from_outcome(&report.outcome);
                    }
                    self.progress = (report.index + 1) as f32 / self.statuses.len().max(1) as f32;
                }
                BatchEvent::Finished(summary) => self.finish(summary),
                BatchEvent::Fatal(message) => {
                    self.is_converting = false;
                    self.cancel = None;
                    self.status = format!("変換エラー: {}", message);
                    self.append_log(self.status.clone());
                    show_message(MessageLevel::Error, "変換エラー", &message);
                }
            }
        }
    }

    fn finish(&mut self, summary: BatchSummary) {
        self.is_converting = false;
        self.cancel = None;

        let message = summary.message();
        self.append_log(message.clone());
        self.status = message.clone();
        info!(converted = summary.converted, total = summary.total, "バッチ完了");

        if summary.is_partial_failure() {
            let details = format!("一部のファイルを変換できませんでした。\n\n{}", summary.failure_details());
            show_message(MessageLevel::Warning, "エラーのある変換", &details);
        } else if summary.total > 0 {
            show_message(MessageLevel::Info, "変換完了", &message);
        }

        self.last_summary = Some(summary);
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl eframe::App for WordToPdfApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.receive_events();

        // ドロップされた Word ファイルを追加
        if !self.is_converting && !ctx.input(|i| i.raw.dropped_files.is_empty()) {
            let files: Vec<PathBuf> = ctx.input(|i| {
                i.raw
                    .dropped_files
                    .iter()
                    .filter_map(|f| f.path.clone())
                    .filter(|p| is_word_document(p))
                    .collect()
            });

            if files.is_empty() {
                self.status = "Word ファイルが見つかりません".to_string();
            } else {
                self.add_files(files);
            }
        }

        // 処理中は再描画を要求
        if self.is_converting {
            ctx.request_repaint();
        }

        let phase = self.phase();
        let idle = !self.is_converting;

        CentralPanel::default().show(ctx, |ui| {
            ui.spacing_mut().item_spacing = Vec2::new(8.0, 10.0);

            // ヘッダー
            ui.horizontal(|ui| {
                ui.heading(RichText::new("Word → PDF 変換").size(26.0).color(Colors::TEXT_PRIMARY));
                ui.label(RichText::new(phase_label(phase)).size(13.0).color(Colors::TEXT_SECONDARY));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let folder = PathBuf::from(self.output_dir.trim());
                    if ui
                        .add_enabled(folder.is_dir(), egui::Button::new("📁 フォルダを開く"))
                        .clicked()
                    {
                        if let Err(e) = open::that(&folder) {
                            self.append_log(format!("フォルダを開けません: {}", e));
                        }
                    }
                });
            });

            ui.label(
                RichText::new(format!("変換エンジン: {}", self.engine.name()))
                    .size(13.0)
                    .color(Colors::TEXT_SECONDARY),
            );

            // ボタン
            ui.horizontal(|ui| {
                if ui.add_enabled(idle, egui::Button::new("Word ファイルを追加")).clicked() {
                    let files = select_source_files();
                    self.add_files(files);
                }
                if ui.add_enabled(phase.can_start(), egui::Button::new("変換開始")).clicked() {
                    self.start_conversion();
                }
                if ui.add_enabled(idle, egui::Button::new("リストをクリア")).clicked() {
                    self.clear_file_list();
                }
                if ui
                    .add_enabled(self.is_converting, egui::Button::new("キャンセル"))
                    .clicked()
                {
                    self.cancel_conversion();
                }
            });

            // 選択されたファイル
            ui.label(
                RichText::new(format!("選択されたファイル（{} 件）", self.selection.len()))
                    .size(15.0)
                    .color(Colors::TEXT_PRIMARY),
            );

            egui::Frame::new()
                .fill(Colors::BG_CARD)
                .stroke(egui::Stroke::new(1.0, Colors::BORDER))
                .corner_radius(8.0)
                .inner_margin(8.0)
                .show(ui, |ui| {
                    egui::ScrollArea::vertical()
                        .id_salt("files")
                        .max_height(160.0)
                        .auto_shrink([false, false])
                        .show(ui, |ui| {
                            if self.selection.is_empty() {
                                ui.label(
                                    RichText::new("ファイルをドロップするか「Word ファイルを追加」を押してください")
                                        .color(Colors::TEXT_SECONDARY),
                                );
                            }
                            for (path, status) in self.selection.files().iter().zip(&self.statuses) {
                                ui.horizontal(|ui| {
                                    let (icon, color) = status.icon();
                                    ui.label(RichText::new(icon).color(color));
                                    let label = ui.label(
                                        RichText::new(path.display().to_string()).color(Colors::TEXT_PRIMARY),
                                    );
                                    if let FileStatus::Failed(reason) = status {
                                        label.on_hover_text(reason);
                                    }
                                });
                            }
                        });
                });

            // 出力フォルダ
            ui.horizontal(|ui| {
                ui.label(RichText::new("出力フォルダ:").color(Colors::TEXT_PRIMARY));
                ui.add_enabled(
                    idle,
                    egui::TextEdit::singleline(&mut self.output_dir).desired_width(380.0),
                );
                if ui.add_enabled(idle, egui::Button::new("参照")).clicked() {
                    self.choose_output_directory();
                }
            });

            // 進捗
            ui.add(egui::ProgressBar::new(self.progress).fill(Colors::ACCENT).show_percentage());

            ui.horizontal(|ui| {
                if self.is_converting {
                    ui.spinner();
                }
                let color = match phase {
                    Phase::PartialFailure => Colors::ERROR,
                    Phase::Done => Colors::SUCCESS,
                    _ => Colors::TEXT_SECONDARY,
                };
                ui.label(RichText::new(&self.status).size(13.0).color(color));
            });

            // ログ
            ui.label(RichText::new("ログ").size(15.0).color(Colors::TEXT_PRIMARY));
            egui::Frame::new()
                .fill(Colors::BG_CARD)
                .corner_radius(8.0)
                .inner_margin(8.0)
                .show(ui, |ui| {
                    egui::ScrollArea::vertical()
                        .id_salt("log")
                        .stick_to_bottom(true)
                        .auto_shrink([false, false])
                        .show(ui, |ui| {
                            for line in &self.log {
                                ui.label(RichText::new(line).monospace().size(12.0).color(Colors::TEXT_SECONDARY));
                            }
                        });
                });
        });
    }
}

/// アプリケーションを起動
pub fn run() -> Result<()> {
    let runtime = Runtime::new().context("Tokioランタイムの作成に失敗")?;

    let (settings, config_error) = match Settings::from_env() {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(format!("{:#}", e))),
    };
    info!(?settings, "設定を読み込みました");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([640.0, 620.0])
            .with_min_inner_size([560.0, 520.0])
            .with_title("Word → PDF 変換")
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Word → PDF 変換",
        options,
        Box::new(move |cc| {
            // ダークテーマを設定
            cc.egui_ctx.set_style(dark_theme());

            // 日本語フォントを設定
            let mut fonts = egui::FontDefinitions::default();

            #[cfg(windows)]
            {
                if let Ok(font_data) = std::fs::read("C:\\Windows\\Fonts\\YuGothM.ttc") {
                    fonts.font_data.insert(
                        "yu_gothic".to_owned(),
                        egui::FontData::from_owned(font_data).into(),
                    );

                    fonts
                        .families
                        .entry(egui::FontFamily::Proportional)
                        .or_default()
                        .insert(0, "yu_gothic".to_owned());

                    fonts
                        .families
                        .entry(egui::FontFamily::Monospace)
                        .or_default()
                        .push("yu_gothic".to_owned());
                }
            }

            cc.egui_ctx.set_fonts(fonts);

            let mut app = WordToPdfApp::new(runtime, settings);
            if let Some(message) = config_error {
                app.append_log(format!("設定エラー（既定値を使用）: {}", message));
            }
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("アプリケーションエラー: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> WordToPdfApp {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        WordToPdfApp::new(runtime, Settings::default())
    }

    #[test]
    fn adding_files_prefills_output_folder() {
        let mut app = app();
        app.add_files(vec![PathBuf::from("/docs/Report.docx"), PathBuf::from("/docs/Notes.docx")]);

        assert_eq!(app.output_dir, PathBuf::from("/docs").display().to_string());
        assert_eq!(app.statuses, vec![FileStatus::Pending, FileStatus::Pending]);
        assert_eq!(app.phase(), Phase::OutputSelected);

        app.add_files(vec![PathBuf::from("/docs/Report.docx")]);
        assert_eq!(app.selection.len(), 2);
        assert!(app.status.contains("重複"));
    }

    #[test]
    fn clearing_returns_to_idle() {
        let mut app = app();
        app.add_files(vec![PathBuf::from("/docs/a.docx")]);
        app.output_dir.clear();
        assert_eq!(app.phase(), Phase::FilesSelected);

        app.clear_file_list();
        assert!(app.statuses.is_empty());
        assert_eq!(app.phase(), Phase::Idle);
    }

    #[test]
    fn start_without_files_is_noop() {
        let mut app = app();
        app.start_conversion();
        assert!(!app.is_converting);
        assert_eq!(app.status, "変換するファイルがありません");
    }

    #[test]
    fn job_events_update_statuses() {
        let mut app = app();
        app.add_files(vec![PathBuf::from("/docs/a.docx"), PathBuf::from("/docs/b.docx")]);
        app.is_converting = true;

        let tx = app.event_tx.clone();
        tx.send(BatchEvent::JobStarted {
            index: 0,
            source: PathBuf::from("/docs/a.docx"),
        })
        .unwrap();
        app.receive_events();
        assert_eq!(app.statuses[0], FileStatus::Converting);

        tx.send(BatchEvent::JobFinished(crate::job::JobReport {
            index: 0,
            source: PathBuf::from("/docs/a.docx"),
            outcome: JobOutcome::Failed { error: "破損".into() },
            elapsed: std::time::Duration::ZERO,
        }))
        .unwrap();
        app.receive_events();

        assert_eq!(app.statuses[0], FileStatus::Failed("破損".into()));
        assert_eq!(app.progress, 0.5);
        assert!(app.log.last().unwrap().contains("[ERROR]"));
    }
}
