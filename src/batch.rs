//! 一括変換 - 選択されたファイルを 1 つずつ PDF に変換する

use crate::engine::{Launcher, WordProcessor};
use crate::error::{ConversionError, Result};
use crate::job::{BatchSummary, ConversionJob, JobOutcome, JobReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// 応答しなくなったセッションに与える終了待ち時間
pub const UNRESPONSIVE_QUIT_TIMEOUT: Duration = Duration::from_secs(3);

/// 変換要求
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub overwrite: bool,
    /// 1 ファイルあたりの待ち時間
    pub job_timeout: Duration,
}

/// 進捗イベント（GUI へ送信）
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize, engine: String },
    JobStarted { index: usize, source: PathBuf },
    JobFinished(JobReport),
    Finished(BatchSummary),
    /// エンジンを起動できずバッチを中断
    Fatal(String),
}

/// キャンセル要求。ファイルの区切りでのみ反映される
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 画面の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FilesSelected,
    OutputSelected,
    Converting,
    Done,
    PartialFailure,
}

impl Phase {
    pub fn derive(has_files: bool, has_output: bool, converting: bool, last: Option<&BatchSummary>) -> Self {
        if converting {
            return Self::Converting;
        }
        if let Some(summary) = last {
            return if summary.is_partial_failure() {
                Self::PartialFailure
            } else {
                Self::Done
            };
        }
        match (has_files, has_output) {
            (true, true) => Self::OutputSelected,
            (true, false) => Self::FilesSelected,
            _ => Self::Idle,
        }
    }

    /// 変換を開始できる状態か
    pub fn can_start(self) -> bool {
        !matches!(self, Self::Converting)
    }
}

/// バッチを実行する
///
/// セッションはバッチにつき 1 回起動し、どの経路でも終了させる。
/// ファイル単位の失敗は記録して次へ進み、起動失敗だけが `Err` になる。
pub async fn run_batch<L: Launcher>(
    launcher: &L,
    request: BatchRequest,
    cancel: &CancelToken,
    events: &Sender<BatchEvent>,
) -> Result<BatchSummary> {
    let total = request.files.len();
    let mut summary = BatchSummary::new(total);

    if total == 0 {
        info!("変換するファイルがありません");
        let _ = events.send(BatchEvent::Finished(summary.clone()));
        return Ok(summary);
    }

    let _ = events.send(BatchEvent::Started {
        total,
        engine: launcher.name().to_string(),
    });

    let mut session = launch(launcher, events).await?;
    let mut healthy = true;
    info!(total, output_dir = %request.output_dir.display(), "変換開始");

    let jobs = request
        .files
        .iter()
        .map(|source| ConversionJob::new(source.clone(), request.output_dir.clone()));

    for (index, job) in jobs.enumerate() {
        let source = &job.source;
        if cancel.is_cancelled() {
            info!(remaining = total - index, "キャンセルされました");
            summary.cancelled = true;
            break;
        }

        let _ = events.send(BatchEvent::JobStarted {
            index,
            source: source.clone(),
        });

        let started = Instant::now();
        let Attempt { result, restart } = convert_one(&mut session, &job, &request).await;
        healthy = !restart;

        let outcome = match result {
            Ok(outcome) => {
                info!(source = %source.display(), ?outcome, "変換完了");
                outcome
            }
            Err(e) => {
                warn!(source = %source.display(), error = %e, "変換失敗");
                JobOutcome::Failed { error: e.to_string() }
            }
        };

        let report = JobReport {
            index,
            source: source.clone(),
            outcome,
            elapsed: started.elapsed(),
        };
        summary.record(&report);
        let _ = events.send(BatchEvent::JobFinished(report));

        // 応答しなくなったセッションは作り直す
        if restart && index + 1 < total && !cancel.is_cancelled() {
            warn!("変換エンジンを再起動します");
            shutdown(session, UNRESPONSIVE_QUIT_TIMEOUT).await;
            session = launch(launcher, events).await?;
            healthy = true;
        }
    }

    let limit = if healthy {
        request.job_timeout
    } else {
        UNRESPONSIVE_QUIT_TIMEOUT
    };
    shutdown(session, limit).await;

    info!(
        converted = summary.converted,
        skipped = summary.skipped,
        failed = summary.failures.len(),
        "変換終了"
    );
    let _ = events.send(BatchEvent::Finished(summary.clone()));
    Ok(summary)
}

async fn launch<L: Launcher>(launcher: &L, events: &Sender<BatchEvent>) -> Result<L::Session> {
    launcher.launch().await.map_err(|e| {
        // 起動時のエラーは種類を問わずバッチを続けられない
        let e = if e.is_fatal() {
            e
        } else {
            ConversionError::Launch(e.to_string())
        };
        error!(engine = launcher.name(), error = %e, "変換エンジンを起動できません");
        let _ = events.send(BatchEvent::Fatal(e.to_string()));
        e
    })
}

async fn shutdown<S: WordProcessor>(session: S, limit: Duration) {
    // 時間内に終わらなければ drop でプロセスを終了させる
    if tokio::time::timeout(limit, session.quit()).await.is_err() {
        warn!("変換エンジンの終了がタイムアウトしました");
    }
}

/// 1 ファイル分の結果と、セッションを作り直す必要があるか
struct Attempt<T> {
    result: Result<T>,
    restart: bool,
}

impl<T> From<Result<T>> for Attempt<T> {
    fn from(result: Result<T>) -> Self {
        let restart = result.as_ref().is_err_and(ConversionError::needs_restart);
        Self { result, restart }
    }
}

/// 1 ファイルを変換
async fn convert_one<S: WordProcessor>(
    session: &mut S,
    job: &ConversionJob,
    request: &BatchRequest,
) -> Attempt<JobOutcome> {
    let output = match prepare_output(job, request.overwrite).await {
        Ok(Target::Write(output)) => output,
        Ok(Target::Skip(output)) => return Ok(JobOutcome::Skipped { output }).into(),
        Err(e) => return Err(e).into(),
    };

    match tokio::time::timeout(request.job_timeout, export_document(session, &job.source, &output)).await {
        Ok(Attempt { result, restart }) => Attempt {
            result: result.map(|()| JobOutcome::Converted { output }),
            restart,
        },
        Err(_) => Err(ConversionError::Timeout(request.job_timeout)).into(),
    }
}

enum Target {
    Write(PathBuf),
    /// 既存の PDF を残す
    Skip(PathBuf),
}

/// 出力先を決める。既存の PDF は上書き設定に従って削除するかスキップする
async fn prepare_output(job: &ConversionJob, overwrite: bool) -> Result<Target> {
    let output = job.output_path()?;

    if tokio::fs::try_exists(&output).await.unwrap_or(false) {
        if !overwrite {
            return Ok(Target::Skip(output));
        }
        tokio::fs::remove_file(&output)
            .await
            .map_err(|e| ConversionError::export(&output, e))?;
    }

    Ok(Target::Write(output))
}

/// open → export → close。書き出しに失敗しても文書は閉じる
async fn export_document<S: WordProcessor>(session: &mut S, source: &Path, output: &Path) -> Attempt<()> {
    let handle = match session.open_document(source).await {
        Ok(handle) => handle,
        Err(e) => return Err(e).into(),
    };
    let mut attempt = Attempt::from(session.export_as_pdf(&handle, output).await);

    // 書き出せていても、閉じる時点で途絶えたセッションは次のファイルに使わない
    if let Err(e) = session.close_document(handle).await {
        warn!(source = %source.display(), error = %e, "文書を閉じられませんでした");
        attempt.restart |= e.needs_restart();
    }

    attempt
}
