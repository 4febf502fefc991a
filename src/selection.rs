//! ファイル選択 - 変換対象リストとダイアログ

use std::path::{Component, Path, PathBuf};

/// Word 文書として扱う拡張子
pub const WORD_EXTENSIONS: &[&str] = &["doc", "docx", "docm", "dot", "dotx", "rtf"];

/// Word 文書の拡張子か
pub fn is_word_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| WORD_EXTENSIONS.iter().any(|w| e.eq_ignore_ascii_case(w)))
}

/// パスを字句的に正規化（`.` を除去し `..` を解決）
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// 追加結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddResult {
    pub added: usize,
    pub duplicates: usize,
}

/// 選択順を保持した変換対象リスト
#[derive(Debug, Clone, Default)]
pub struct FileSelection {
    files: Vec<PathBuf>,
}

impl FileSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// ファイルを追加（重複はスキップ）
    pub fn add<I>(&mut self, paths: I) -> AddResult
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut result = AddResult::default();
        for path in paths {
            let normalized = normalize_path(&path);
            if self.files.contains(&normalized) {
                result.duplicates += 1;
            } else {
                self.files.push(normalized);
                result.added += 1;
            }
        }
        result
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 出力フォルダの初期値（最初のファイルのフォルダ）
    pub fn suggested_output_dir(&self) -> Option<PathBuf> {
        self.files
            .first()
            .and_then(|p| p.parent())
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }
}

/// Word ファイル選択ダイアログ。キャンセル時は空
pub fn select_source_files() -> Vec<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Word ファイルを選択")
        .add_filter("Word 文書", WORD_EXTENSIONS)
        .add_filter("すべてのファイル", &["*"])
        .pick_files()
        .unwrap_or_default()
}

/// 出力フォルダ選択ダイアログ
pub fn select_output_directory(start: Option<&Path>) -> Option<PathBuf> {
    let mut dialog = rfd::FileDialog::new().set_title("出力フォルダを選択");
    if let Some(dir) = start {
        dialog = dialog.set_directory(dir);
    }
    dialog.pick_folder().map(|p| normalize_path(&p))
}
