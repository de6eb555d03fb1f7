//! 데이터셋 점검 모듈 - Lance 데이터셋 미리보기 출력
//!
//! 읽기 전용. 앞쪽 N개 행의 필드와 전체 행 수를 출력합니다.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use crate::knowledge::{PostDataset, PostPreview};

/// 미리보기 기본 행 수
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// 임베딩 요약: `[v0, v1, v2, ..., vLast] (length: n)`
///
/// 4개 미만이면 전체 값을 출력합니다.
pub fn format_embedding(values: &[f32]) -> String {
    let body = if values.len() >= 4 {
        format!(
            "{:.4}, {:.4}, {:.4}, ..., {:.4}",
            values[0],
            values[1],
            values[2],
            values[values.len() - 1]
        )
    } else {
        values
            .iter()
            .map(|v| format!("{:.4}", v))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!("[{}] (length: {})", body, values.len())
}

/// 미리보기 행들과 전체 행 수 출력
pub fn write_preview<W: Write>(out: &mut W, rows: &[PostPreview], total: usize) -> Result<()> {
    writeln!(out, "First {} rows from Lance dataset:", rows.len())?;
    writeln!(out, "{}", "=".repeat(120))?;

    for (i, row) in rows.iter().enumerate() {
        writeln!(out, "\nRow {}:", i + 1)?;
        writeln!(out, "  post_id: {}", row.post_id)?;
        writeln!(out, "  title: {}", row.title)?;
        writeln!(out, "  sub_title: {}", row.sub_title)?;
        writeln!(out, "  post_date: {}", row.post_date)?;
        writeln!(out, "  blog_text_length: {}", row.blog_text_length)?;
        writeln!(out, "  embedding: {}", format_embedding(&row.embedding))?;
    }

    writeln!(out, "\n")?;
    writeln!(out, "Total rows: {}", total)?;
    Ok(())
}

/// 데이터셋을 열어 미리보기 출력
pub async fn inspect_dataset<W: Write>(path: &Path, limit: usize, out: &mut W) -> Result<()> {
    let dataset = PostDataset::open(path).await?;

    let rows = dataset.preview(limit).await?;
    let total = dataset.count().await?;

    write_preview(out, &rows, total)
}

// ============================================================================
// Tests
// ============================================================================
