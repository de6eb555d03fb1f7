//! 콘텐츠 추출 모듈 - HTML 게시글 본문을 일반 텍스트로 변환
//!
//! script/style/noscript를 제외하고, `article` > `main` > `body` 순으로
//! 본문 영역을 선택한 뒤 보이는 텍스트를 줄 단위로 모읍니다.

use std::path::Path;

use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};

/// 텍스트 수집에서 제외할 태그
const SKIPPED_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// 본문 영역 선택 우선순위 (없으면 문서 전체)
const CONTENT_SELECTORS: [&str; 3] = ["article", "main", "body"];

// ============================================================================
// HTML -> Text
// ============================================================================

/// HTML 문자열에서 본문 텍스트 추출
///
/// 텍스트 노드를 각각 trim하고 빈 노드는 버린 뒤 `\n`으로 연결합니다.
/// 3줄 이상 연속된 줄바꿈은 빈 줄 하나로 합칩니다.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let target = select_content_root(&document);

    let lines: Vec<&str> = visible_text(target)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    collapse_blank_lines(&lines.join("\n")).trim().to_string()
}

/// HTML 바이트 디코딩 (UTF-8 실패 시 손실 디코딩)
pub fn decode_html(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Invalid UTF-8 in HTML, decoding lossily: {}", e);
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

/// HTML 파일을 읽어 본문 텍스트 추출
pub fn read_html_text(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read HTML file: {:?}", path))?;
    Ok(html_to_text(&decode_html(bytes)))
}

/// 본문 영역 선택 (article > main > body > 문서 전체)
fn select_content_root(document: &Html) -> ElementRef<'_> {
    for selector_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                return element;
            }
        }
    }

    document.root_element()
}

/// 제외 태그 하위를 건너뛴 텍스트 노드 순회
fn visible_text<'a>(root: ElementRef<'a>) -> impl Iterator<Item = &'a str> {
    root.descendants().filter_map(|node| {
        let text = node.value().as_text()?;

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
        });

        if hidden {
            None
        } else {
            Some(&**text)
        }
    })
}

/// 3개 이상 연속 줄바꿈 -> 2개
fn collapse_blank_lines(text: &str) -> String {
    if let Ok(re) = regex::Regex::new(r"\n{3,}") {
        re.replace_all(text, "\n\n").into_owned()
    } else {
        text.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
