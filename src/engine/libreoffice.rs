//! LibreOffice エンジン - `soffice --headless --convert-to pdf`

use super::{DocumentHandle, Launcher, WordProcessor};
use crate::error::{ConversionError, Result};
use crate::job::output_path_for;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

/// `--version` 確認の待ち時間
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// LibreOffice の起動設定
#[derive(Debug, Clone)]
pub struct LibreOffice {
    soffice: PathBuf,
}

impl LibreOffice {
    pub fn new(soffice: impl Into<PathBuf>) -> Self {
        Self {
            soffice: soffice.into(),
        }
    }
}

fn command(soffice: &Path) -> Command {
    let mut command = Command::new(soffice);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(windows)]
    command.creation_flags(CREATE_NO_WINDOW);

    command
}

/// `-env:UserInstallation` 用の file URL
///
/// 非予約文字（RFC 3986）と区切りの `/`、ドライブ名の `:` 以外はパーセントエンコードする
fn file_url(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    let mut url = String::from(if s.starts_with('/') { "file://" } else { "file:///" });

    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' | b':' => {
                url.push(char::from(byte))
            }
            _ => url.push_str(&format!("%{byte:02X}")),
        }
    }
    url
}

impl Launcher for LibreOffice {
    type Session = LibreOfficeSession;

    fn name(&self) -> &str {
        "LibreOffice"
    }

    async fn launch(&self) -> Result<LibreOfficeSession> {
        info!(soffice = %self.soffice.display(), "LibreOffice を確認中...");

        let output = tokio::time::timeout(PROBE_TIMEOUT, command(&self.soffice).arg("--version").output())
            .await
            .map_err(|_| ConversionError::Launch("LibreOffice の応答がありません".to_string()))?
            .map_err(|e| {
                ConversionError::Launch(format!("{} を実行できません: {}", self.soffice.display(), e))
            })?;

        if !output.status.success() {
            return Err(ConversionError::Launch(format!(
                "LibreOffice の起動に失敗: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!(version = %String::from_utf8_lossy(&output.stdout).trim(), "LibreOffice");

        // 既に起動している LibreOffice と干渉しないよう専用プロファイルを使う
        let profile = tempfile::Builder::new()
            .prefix("word_to_pdf-profile-")
            .tempdir()
            .map_err(|e| ConversionError::Launch(format!("作業フォルダを作成できません: {}", e)))?;

        Ok(LibreOfficeSession {
            soffice: self.soffice.clone(),
            profile,
            next_id: 0,
        })
    }
}

/// LibreOffice セッション（バッチ単位のプロファイルを保持）
pub struct LibreOfficeSession {
    soffice: PathBuf,
    profile: TempDir,
    next_id: u64,
}

impl WordProcessor for LibreOfficeSession {
    async fn open_document(&mut self, path: &Path) -> Result<DocumentHandle> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ConversionError::file_open(path, e))?;
        if !metadata.is_file() {
            return Err(ConversionError::file_open(path, "ファイルではありません"));
        }
        // 読み取れるか確認
        tokio::fs::File::open(path)
            .await
            .map_err(|e| ConversionError::file_open(path, e))?;

        self.next_id += 1;
        Ok(DocumentHandle {
            id: self.next_id,
            source: path.to_path_buf(),
        })
    }

    async fn export_as_pdf(&mut self, handle: &DocumentHandle, output: &Path) -> Result<()> {
        let output_dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        // 出力フォルダ内の一時フォルダに書き出してから移動する
        let staging = tempfile::Builder::new()
            .prefix(".word_to_pdf-")
            .tempdir_in(output_dir)
            .map_err(|e| ConversionError::export(output, e))?;

        let result = command(&self.soffice)
            .arg(format!("-env:UserInstallation={}", file_url(self.profile.path())))
            .args(["--headless", "--norestore", "--convert-to", "pdf", "--outdir"])
            .arg(staging.path())
            .arg(&handle.source)
            .output()
            .await
            .map_err(|e| ConversionError::Session(e.to_string()))?;

        let produced = output_path_for(&handle.source, staging.path())?;

        if !result.status.success() || !produced.exists() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let reason = if stderr.trim().is_empty() {
                "PDF が生成されませんでした".to_string()
            } else {
                stderr.trim().to_string()
            };
            // 読み込み失敗は入力側の問題として扱う
            if reason.contains("source file could not be loaded") {
                return Err(ConversionError::file_open(&handle.source, reason));
            }
            return Err(ConversionError::export(output, reason));
        }

        tokio::fs::rename(&produced, output)
            .await
            .map_err(|e| ConversionError::export(output, e))?;
        Ok(())
    }

    async fn close_document(&mut self, _handle: DocumentHandle) -> Result<()> {
        // 変換ごとにプロセスが終了するため何もしない
        Ok(())
    }

    async fn quit(self) {
        debug!(profile = %self.profile.path().display(), "LibreOffice プロファイルを削除");
        drop(self.profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_file_urls() {
        assert_eq!(file_url(Path::new("/tmp/lo profile")), "file:///tmp/lo%20profile");
        assert_eq!(file_url(Path::new("C:\\Temp\\lo")), "file:///C:/Temp/lo");
    }

    #[test]
    fn file_urls_escape_reserved_and_non_ascii() {
        assert_eq!(file_url(Path::new("/tmp/100%#1")), "file:///tmp/100%25%231");
        assert_eq!(
            file_url(Path::new("C:\\Users\\山田\\AppData")),
            "file:///C:/Users/%E5%B1%B1%E7%94%B0/AppData"
        );
    }

    #[tokio::test]
    async fn missing_soffice_is_fatal() {
        let engine = LibreOffice::new("/nonexistent/bin/soffice-word-to-pdf");
        let err = engine.launch().await.err().unwrap();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn open_rejects_missing_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LibreOfficeSession {
            soffice: PathBuf::from("soffice"),
            profile: tempfile::tempdir().unwrap(),
            next_id: 0,
        };

        let err = session.open_document(&dir.path().join("missing.docx")).await.unwrap_err();
        assert!(matches!(err, ConversionError::FileOpen { .. }));

        let err = session.open_document(dir.path()).await.unwrap_err();
        assert!(matches!(err, ConversionError::FileOpen { .. }));

        let file = dir.path().join("Report.docx");
        std::fs::write(&file, b"PK").unwrap();
        let handle = session.open_document(&file).await.unwrap();
        assert_eq!(handle.id, 1);
        assert_eq!(handle.source, file);
    }

    #[tokio::test]
    async fn export_into_missing_folder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LibreOfficeSession {
            soffice: PathBuf::from("soffice"),
            profile: tempfile::tempdir().unwrap(),
            next_id: 0,
        };
        let handle = DocumentHandle {
            id: 1,
            source: dir.path().join("Report.docx"),
        };
        let output = dir.path().join("missing").join("Report.pdf");

        let err = session.export_as_pdf(&handle, &output).await.unwrap_err();
        assert!(matches!(err, ConversionError::Export { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn export_into_read_only_folder_fails() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("out");
        std::fs::create_dir(&output_dir).unwrap();
        std::fs::set_permissions(&output_dir, std::fs::Permissions::from_mode(0o555)).unwrap();

        // root は権限に関係なく書き込める
        if std::fs::write(output_dir.join("check"), b"").is_ok() {
            return;
        }

        let mut session = LibreOfficeSession {
            soffice: PathBuf::from("soffice"),
            profile: tempfile::tempdir().unwrap(),
            next_id: 0,
        };
        let handle = DocumentHandle {
            id: 1,
            source: dir.path().join("Report.docx"),
        };

        let err = session
            .export_as_pdf(&handle, &output_dir.join("Report.pdf"))
            .await
            .unwrap_err();
        std::fs::set_permissions(&output_dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(err, ConversionError::Export { .. }));
        assert_eq!(std::fs::read_dir(&output_dir).unwrap().count(), 0);
    }
}
