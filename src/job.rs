//! 変換ジョブと結果

use crate::error::{ConversionError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 1 ファイル分の変換ジョブ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub output_dir: PathBuf,
}

impl ConversionJob {
    pub fn new(source: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
        }
    }

    /// 出力先パス: 出力フォルダ + 元ファイルのベース名 + `.pdf`
    pub fn output_path(&self) -> Result<PathBuf> {
        output_path_for(&self.source, &self.output_dir)
    }
}

/// 元ファイル名から出力 PDF のパスを作る
pub fn output_path_for(source: &Path, output_dir: &Path) -> Result<PathBuf> {
    let stem = source
        .file_stem()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConversionError::file_open(source, "ファイル名がありません"))?;

    let mut name = stem.to_os_string();
    name.push(".pdf");
    Ok(output_dir.join(name))
}

/// ジョブの結果
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Converted { output: PathBuf },
    /// 既存ファイルがあり上書きしない設定
    Skipped { output: PathBuf },
    Failed { error: String },
}

impl JobOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// 処理結果（GUI 表示用）
#[derive(Debug, Clone)]
pub struct JobReport {
    /// 0 始まりの選択順
    pub index: usize,
    pub source: PathBuf,
    pub outcome: JobOutcome,
    pub elapsed: Duration,
}

impl JobReport {
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// バッチ全体の集計
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failures: Vec<(PathBuf, String)>,
    /// 途中でキャンセルされた
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, report: &JobReport) {
        match &report.outcome {
            JobOutcome::Converted { .. } => self.converted += 1,
            JobOutcome::Skipped { .. } => self.skipped += 1,
            JobOutcome::Failed { error } => {
                self.failures.push((report.source.clone(), error.clone()));
            }
        }
    }

    pub fn processed(&self) -> usize {
        self.converted + self.skipped + self.failures.len()
    }

    pub fn is_partial_failure(&self) -> bool {
        !self.failures.is_empty()
    }

    /// ステータス行に出すメッセージ
    pub fn message(&self) -> String {
        if self.total == 0 {
            return "変換するファイルがありません".to_string();
        }

        let mut msg = format!("{} / {} 件のファイルを変換しました", self.converted, self.total);
        if self.skipped > 0 {
            msg.push_str(&format!("（{} 件スキップ）", self.skipped));
        }
        if self.cancelled {
            msg.push_str("。キャンセルされました");
        }
        if self.is_partial_failure() {
            msg.push_str("。詳細はログを確認してください");
        }
        msg
    }

    /// 失敗一覧（ダイアログ用）
    pub fn failure_details(&self) -> String {
        self.failures
            .iter()
            .map(|(path, reason)| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                format!("- {}: {}", name, reason)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, outcome: JobOutcome) -> JobReport {
        JobReport {
            index: 0,
            source: PathBuf::from(name),
            outcome,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn output_keeps_base_name() {
        let job = ConversionJob::new("/docs/Report.docx", "/out");
        assert_eq!(job.output_path().unwrap(), PathBuf::from("/out/Report.pdf"));

        let job = ConversionJob::new("/docs/Notes.DOC", "/out");
        assert_eq!(job.output_path().unwrap(), PathBuf::from("/out/Notes.pdf"));
    }

    #[test]
    fn only_last_extension_is_replaced() {
        let path = output_path_for(Path::new("/docs/v1.2 draft.docx"), Path::new("/out")).unwrap();
        assert_eq!(path, PathBuf::from("/out/v1.2 draft.pdf"));
    }

    #[test]
    fn source_without_name_is_rejected() {
        let err = output_path_for(Path::new("/"), Path::new("/out")).unwrap_err();
        assert!(matches!(err, ConversionError::FileOpen { .. }));
    }

    #[test]
    fn summary_counts_each_outcome() {
        let mut summary = BatchSummary::new(3);
        summary.record(&report("a.docx", JobOutcome::Converted { output: "a.pdf".into() }));
        summary.record(&report("b.docx", JobOutcome::Skipped { output: "b.pdf".into() }));
        summary.record(&report("c.docx", JobOutcome::Failed { error: "破損".into() }));

        assert_eq!(summary.converted, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed(), 3);
        assert!(summary.is_partial_failure());
        assert_eq!(summary.failure_details(), "- c.docx: 破損");
        assert!(summary.message().contains("ログを確認"));
    }

    #[test]
    fn empty_summary_message() {
        assert_eq!(BatchSummary::new(0).message(), "変換するファイルがありません");
    }
}
