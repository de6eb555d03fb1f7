//! HTML 파일 수집 모듈
//!
//! HTML 디렉토리를 재귀 탐색하여 파일 이름의 숫자열 -> 파일 경로 인덱스를 만듭니다.
//! 같은 숫자열을 가진 파일이 여럿이면 먼저 발견된 파일이 이깁니다.
//!
//! 탐색 순서: `.html` 전체 -> `.htm` 전체, 각 패스 안에서는 파일 이름 정렬 순.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use walkdir::WalkDir;

use crate::error::PipelineError;

// ============================================================================
// File Types
// ============================================================================

/// 수집 대상 확장자 (탐색 우선순위 순)
pub const HTML_EXTENSIONS: [&str; 2] = ["html", "htm"];

/// 경로의 확장자가 주어진 확장자인지 확인 (대소문자 무시)
fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// HTML 파일 여부
pub fn is_html_file(path: &Path) -> bool {
    HTML_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
}

/// 파일 이름에서 ASCII 숫자열 추출
///
/// `"post-123-v2.html"` -> `["123", "2"]`
pub fn digit_runs(name: &str) -> impl Iterator<Item = &str> {
    name.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
}

/// 확장자 우선순위 (`HTML_EXTENSIONS` 내 위치)
fn extension_rank(path: &Path) -> usize {
    HTML_EXTENSIONS
        .iter()
        .position(|ext| has_extension(path, ext))
        .unwrap_or(HTML_EXTENSIONS.len())
}

/// HTML 파일 목록 (재귀)
///
/// 파일 이름 정렬 순으로 한 번 탐색한 뒤 확장자 우선순위로 안정 정렬합니다.
pub fn iter_html_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PipelineError::HtmlRootNotFound(root.to_path_buf()).into());
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Failed to read entry: {}", e);
                continue;
            }
        };

        // 파일만 처리
        if !entry.file_type().is_file() {
            continue;
        }

        if is_html_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort_by_key(|path| extension_rank(path));

    Ok(files)
}

// ============================================================================
// HtmlIndex
// ============================================================================

/// 숫자열 -> HTML 파일 경로 인덱스
#[derive(Debug, Default)]
pub struct HtmlIndex {
    entries: HashMap<String, PathBuf>,
    file_count: usize,
}

impl HtmlIndex {
    /// HTML 루트 디렉토리를 탐색하여 인덱스 생성
    pub fn build(root: &Path) -> Result<Self> {
        let files = iter_html_files(root)?;
        let index = Self::from_files(files);

        tracing::info!(
            "Indexed {} HTML files ({} numeric keys) from {:?}",
            index.file_count,
            index.entries.len(),
            root
        );
        Ok(index)
    }

    /// 파일 목록에서 인덱스 생성 (목록 순서대로 먼저 등록된 파일 우선)
    pub fn from_files(files: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut index = Self::default();

        for path in files {
            index.file_count += 1;

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            for digits in digit_runs(name) {
                if !index.entries.contains_key(digits) {
                    index.entries.insert(digits.to_string(), path.clone());
                }
            }
        }

        index
    }

    /// 숫자 ID로 파일 조회 (빈 ID는 항상 None)
    pub fn get(&self, numeric_id: &str) -> Option<&Path> {
        if numeric_id.is_empty() {
            return None;
        }
        self.entries.get(numeric_id).map(PathBuf::as_path)
    }

    /// 등록된 숫자 키 개수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 탐색된 HTML 파일 수
    pub fn file_count(&self) -> usize {
        self.file_count
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, "<html></html>").unwrap();
    }

    #[test]
    fn test_is_html_file() {
        assert!(is_html_file(Path::new("a/123.html")));
        assert!(is_html_file(Path::new("123.HTM")));
        assert!(!is_html_file(Path::new("123.txt")));
        assert!(!is_html_file(Path::new("html")));
    }

    #[test]
    fn test_iter_html_files_orders_by_extension_then_name() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/2.htm"));
        touch(&dir.path().join("b/1.HTML"));
        touch(&dir.path().join("c/3.html"));
        touch(&dir.path().join("notes.txt"));

        let files = iter_html_files(dir.path()).unwrap();
        let relative: Vec<PathBuf> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("b/1.HTML"),
                PathBuf::from("c/3.html"),
                PathBuf::from("a/2.htm"),
            ]
        );
    }

    #[test]
    fn test_digit_runs() {
        let runs: Vec<&str> = digit_runs("post-123-v2.html").collect();
        assert_eq!(runs, vec!["123", "2"]);
        assert_eq!(digit_runs("about.html").count(), 0);
    }

    #[test]
    fn test_first_match_wins() {
        let index = HtmlIndex::from_files(vec![
            PathBuf::from("a/123.html"),
            PathBuf::from("b/123.html"),
            PathBuf::from("c/9-123.html"),
        ]);

        assert_eq!(index.get("123"), Some(Path::new("a/123.html")));
        assert_eq!(index.get("9"), Some(Path::new("c/9-123.html")));
        assert_eq!(index.file_count(), 3);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_empty_id_never_matches() {
        let index = HtmlIndex::from_files(vec![PathBuf::from("123.html")]);
        assert!(index.get("").is_none());
        assert!(index.get("456").is_none());
    }

    #[test]
    fn test_build_walks_nested_dirs_html_before_htm() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/77.htm"));
        touch(&dir.path().join("z/nested/77.html"));
        touch(&dir.path().join("88-post.html"));
        touch(&dir.path().join("99.txt"));

        let index = HtmlIndex::build(dir.path()).unwrap();

        // .html 패스가 .htm 패스보다 먼저
        assert_eq!(
            index.get("77"),
            Some(dir.path().join("z/nested/77.html").as_path())
        );
        assert!(index.get("88").is_some());
        assert!(index.get("99").is_none());
        assert_eq!(index.file_count(), 3);
    }

    #[test]
    fn test_build_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = HtmlIndex::build(&dir.path().join("posts")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::HtmlRootNotFound(_))
        ));
    }
}
