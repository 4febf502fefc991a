//! Microsoft Word エンジン - PowerShell 経由の COM オートメーション
//!
//! `Word.Application` を 1 つ起動した PowerShell プロセスを常駐させ、
//! 標準入出力の JSON 行でやり取りする。

use super::{DocumentHandle, Launcher, WordProcessor};
use crate::error::{ConversionError, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

/// ホストスクリプト
const HOST_SCRIPT: &str = include_str!("word_host.ps1");

/// Word 起動の待ち時間
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

/// 終了要求後にプロセス終了を待つ時間
const QUIT_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// ホストへの要求
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Request<'a> {
    Open { path: &'a str },
    Export { handle: u64, output: &'a str },
    Close { handle: u64 },
    Quit,
}

/// ホストからの応答
#[derive(Debug, Deserialize)]
struct Reply {
    ok: bool,
    #[serde(default)]
    handle: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    /// 起動応答に含まれる WINWORD.EXE のプロセス ID
    #[serde(default)]
    pid: Option<u32>,
}

impl Reply {
    fn into_result(self) -> std::result::Result<Option<u64>, String> {
        if self.ok {
            Ok(self.handle)
        } else {
            Err(self.error.unwrap_or_else(|| "不明なエラー".to_string()))
        }
    }
}

/// `-EncodedCommand` 用に UTF-16LE を Base64 化
fn encode_command(script: &str) -> String {
    let bytes: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    STANDARD.encode(bytes)
}

/// Word プロセスを強制終了する `taskkill` の引数
fn taskkill_args(pid: u32) -> [String; 4] {
    ["/PID".to_string(), pid.to_string(), "/F".to_string(), "/T".to_string()]
}

/// ホストが正常終了しなかったとき、残った WINWORD.EXE を drop で終了させる
///
/// Word は COM のアウトプロセスサーバーなので、PowerShell を終了させても残り続ける。
struct WordProcess {
    pid: Option<u32>,
}

impl WordProcess {
    /// 正常に終了したので何もしない
    fn release(&mut self) {
        self.pid = None;
    }
}

impl Drop for WordProcess {
    fn drop(&mut self) {
        let Some(pid) = self.pid.take() else {
            return;
        };
        warn!(pid, "応答しない Microsoft Word を強制終了します");

        let mut command = std::process::Command::new("taskkill");
        command
            .args(taskkill_args(pid))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        if let Err(e) = command.spawn() {
            warn!(pid, error = %e, "taskkill を起動できません");
        }
    }
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| ConversionError::file_open(path, "パスに無効な文字が含まれています"))
}

/// Word オートメーションの起動設定
#[derive(Debug, Clone)]
pub struct WordAutomation {
    powershell: String,
}

impl Default for WordAutomation {
    fn default() -> Self {
        Self::new()
    }
}

impl WordAutomation {
    pub fn new() -> Self {
        Self {
            powershell: "powershell.exe".to_string(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.powershell);
        command
            .args(["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass", "-EncodedCommand"])
            .arg(encode_command(HOST_SCRIPT))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        command
    }
}

impl Launcher for WordAutomation {
    type Session = WordSession;

    fn name(&self) -> &str {
        "Microsoft Word"
    }

    async fn launch(&self) -> Result<WordSession> {
        if !cfg!(windows) {
            return Err(ConversionError::Launch(
                "Microsoft Word は Windows でのみ利用できます".to_string(),
            ));
        }

        info!("Microsoft Word を起動中...");
        let mut child = self
            .command()
            .spawn()
            .map_err(|e| ConversionError::Launch(format!("PowerShell を起動できません: {}", e)))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ConversionError::Launch("標準入出力を取得できません".to_string()));
        };

        let mut session = WordSession {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            word: WordProcess { pid: None },
        };

        // 起動完了の応答を待つ
        let ready = tokio::time::timeout(LAUNCH_TIMEOUT, session.read_reply())
            .await
            .map_err(|_| ConversionError::Launch("Word の起動がタイムアウトしました".to_string()))?
            .map_err(|e| ConversionError::Launch(e.to_string()))?;

        session.word.pid = ready.pid;
        ready
            .into_result()
            .map_err(|e| ConversionError::Launch(format!("Word を起動できません（インストール・ライセンスを確認してください）: {}", e)))?;

        info!(pid = ?session.word.pid, "Microsoft Word の起動完了");
        Ok(session)
    }
}

/// 起動済みの Word セッション
pub struct WordSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    word: WordProcess,
}

impl WordSession {
    async fn read_reply(&mut self) -> Result<Reply> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .map_err(|e| ConversionError::Session(e.to_string()))?
                .ok_or_else(|| ConversionError::Session("Word ホストが終了しました".to_string()))?;

            let line = line.trim();
            // JSON 以外の出力は読み飛ばす
            if !line.starts_with('{') {
                debug!(line, "Word ホストの出力を無視");
                continue;
            }

            return serde_json::from_str(line)
                .map_err(|e| ConversionError::Session(format!("応答を解析できません: {}", e)));
        }
    }

    async fn request(&mut self, request: &Request<'_>) -> Result<Reply> {
        let mut line =
            serde_json::to_string(request).map_err(|e| ConversionError::Session(e.to_string()))?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ConversionError::Session(e.to_string()))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| ConversionError::Session(e.to_string()))?;

        self.read_reply().await
    }
}

impl WordProcessor for WordSession {
    async fn open_document(&mut self, path: &Path) -> Result<DocumentHandle> {
        let absolute = std::path::absolute(path).map_err(|e| ConversionError::file_open(path, e))?;
        let reply = self.request(&Request::Open { path: path_arg(&absolute)? }).await?;

        let handle = reply.into_result().map_err(|e| ConversionError::file_open(path, e))?;
        self.next_id += 1;
        Ok(DocumentHandle {
            id: handle.unwrap_or(self.next_id),
            source: path.to_path_buf(),
        })
    }

    async fn export_as_pdf(&mut self, handle: &DocumentHandle, output: &Path) -> Result<()> {
        let absolute = std::path::absolute(output).map_err(|e| ConversionError::export(output, e))?;
        let output_str = absolute
            .to_str()
            .ok_or_else(|| ConversionError::export(output, "パスに無効な文字が含まれています"))?;

        let reply = self
            .request(&Request::Export {
                handle: handle.id,
                output: output_str,
            })
            .await?;

        reply
            .into_result()
            .map(|_| ())
            .map_err(|e| ConversionError::export(output, e))
    }

    async fn close_document(&mut self, handle: DocumentHandle) -> Result<()> {
        let reply = self.request(&Request::Close { handle: handle.id }).await?;
        // ホストが返したエラーは文書側の問題。セッションは生きている
        reply
            .into_result()
            .map(|_| ())
            .map_err(|e| ConversionError::file_open(&handle.source, e))
    }

    async fn quit(mut self) {
        if let Err(e) = self.request(&Request::Quit).await {
            warn!(error = %e, "Word への終了要求に失敗");
        }
        drop(self.stdin);

        match tokio::time::timeout(QUIT_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) if status.success() => {
                self.word.release();
                info!(%status, "Microsoft Word を終了");
            }
            Ok(Ok(status)) => warn!(%status, "Word ホストが異常終了しました"),
            Ok(Err(e)) => warn!(error = %e, "Word ホストの終了待ちに失敗"),
            Err(_) => {
                warn!("Word ホストが終了しないため強制終了します");
                let _ = self.child.kill().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_tagged_json_lines() {
        let open = serde_json::to_string(&Request::Open { path: "C:\\Docs\\Report.docx" }).unwrap();
        assert_eq!(open, r#"{"op":"open","path":"C:\\Docs\\Report.docx"}"#);

        let export = serde_json::to_string(&Request::Export {
            handle: 3,
            output: "C:\\Out\\Report.pdf",
        })
        .unwrap();
        assert_eq!(export, r#"{"op":"export","handle":3,"output":"C:\\Out\\Report.pdf"}"#);

        assert_eq!(serde_json::to_string(&Request::Quit).unwrap(), r#"{"op":"quit"}"#);
    }

    #[test]
    fn reply_errors_carry_host_message() {
        let reply: Reply = serde_json::from_str(r#"{"ok":false,"error":"file is corrupt"}"#).unwrap();
        assert_eq!(reply.into_result(), Err("file is corrupt".to_string()));

        let reply: Reply = serde_json::from_str(r#"{"ok":true,"handle":7}"#).unwrap();
        assert_eq!(reply.into_result(), Ok(Some(7)));
    }

    #[test]
    fn ready_reply_carries_word_pid() {
        let reply: Reply = serde_json::from_str(r#"{"ok":true,"pid":4242}"#).unwrap();
        assert_eq!(reply.pid, Some(4242));

        // 既存の Word に接続した場合は PID を返さない
        let reply: Reply = serde_json::from_str(r#"{"ok":true,"pid":null}"#).unwrap();
        assert_eq!(reply.pid, None);
    }

    #[test]
    fn taskkill_targets_word_process_tree() {
        assert_eq!(taskkill_args(4242), ["/PID", "4242", "/F", "/T"]);
    }

    #[test]
    fn released_word_process_is_left_running() {
        let mut word = WordProcess { pid: Some(u32::MAX) };
        word.release();
        assert_eq!(word.pid, None);
        drop(word);
    }

    #[test]
    fn encoded_command_is_utf16le_base64() {
        // "ab" -> 61 00 62 00
        assert_eq!(encode_command("ab"), "YQBiAA==");
    }

    #[tokio::test]
    #[cfg(not(windows))]
    async fn launch_fails_outside_windows() {
        let err = WordAutomation::new().launch().await.err().unwrap();
        assert!(err.is_fatal());
    }
}
