//! 메타데이터 모듈 - 게시글 요약 CSV 로드 및 정규화
//!
//! arrow-csv 스키마 추론으로 컬럼 타입(불리언, 정수, 날짜, 문자열)을 자동 감지합니다.
//! 컬럼 이름은 고정된 동의어 테이블로 정규화됩니다.
//!
//! ref: https://docs.rs/arrow-csv/latest/arrow_csv/reader/struct.Format.html

use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{Array, BooleanArray};
use arrow_cast::display::array_value_to_string;
use arrow_csv::reader::{Format, ReaderBuilder};

use crate::error::PipelineError;

// ============================================================================
// Column Synonyms
// ============================================================================

/// 정규화 컬럼 이름
pub const POST_ID: &str = "post_id";
pub const TITLE: &str = "title";
pub const SUB_TITLE: &str = "sub_title";
pub const POST_DATE: &str = "post_date";
pub const IS_PUBLISHED: &str = "is_published";

/// 소문자 헤더 -> 정규화 이름
const COLUMN_SYNONYMS: &[(&str, &str)] = &[
    ("post_id", POST_ID),
    ("title", TITLE),
    ("subtitle", SUB_TITLE),
    ("sub_title", SUB_TITLE),
    ("post_date", POST_DATE),
    ("date", POST_DATE),
    ("is_published", IS_PUBLISHED),
    ("published", IS_PUBLISHED),
];

/// 헤더 이름을 정규화 이름으로 변환
///
/// 앞뒤 공백 제거 + 소문자 비교. 동의어 테이블에 없으면 원래 이름 그대로 반환합니다.
pub fn normalize_column_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    COLUMN_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == lowered)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// post_id 앞부분의 숫자열 추출 (없으면 빈 문자열)
///
/// `"123-my-post"` -> `"123"`, `"my-post-123"` -> `""`
pub fn numeric_id(post_id: &str) -> String {
    post_id.chars().take_while(|c| c.is_ascii_digit()).collect()
}

// ============================================================================
// Types
// ============================================================================

/// CSV 셀 값
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    /// 불리언 외 타입은 문자열로 렌더링됨 (정수, 날짜 등)
    Text(String),
}

impl CellValue {
    /// 문자열 표현 (NULL은 빈 문자열)
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }

    /// 발행 여부 판정: `true` 불리언 또는 대소문자 무시 `"true"` 문자열
    pub fn is_true_like(&self) -> bool {
        match self {
            CellValue::Bool(b) => *b,
            CellValue::Text(s) => s.eq_ignore_ascii_case("true"),
            CellValue::Null => false,
        }
    }
}

/// 게시글 메타데이터 (정규화 완료)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMeta {
    pub post_id: String,
    pub title: String,
    pub sub_title: String,
    pub post_date: String,
    /// post_id 선행 숫자열 (HTML 매칭 키)
    pub numeric_id: String,
}

// ============================================================================
// MetadataTable
// ============================================================================

/// 메타데이터 테이블 (행 우선 저장)
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl MetadataTable {
    /// 컬럼과 행으로 직접 생성
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    /// CSV 파일 로드 (헤더 필수, 전체 파일로 타입 추론)
    pub fn from_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::MetadataNotFound(path.to_path_buf()).into());
        }

        let mut file =
            File::open(path).with_context(|| format!("Failed to open CSV: {:?}", path))?;

        // 1. 스키마 추론
        let format = Format::default().with_header(true);
        let (schema, scanned) = format
            .infer_schema(&mut file, None)
            .context("Failed to infer CSV schema")?;
        tracing::debug!(
            "Inferred CSV schema from {} records: {:?}",
            scanned,
            schema.fields().iter().map(|f| (f.name(), f.data_type())).collect::<Vec<_>>()
        );

        file.rewind().context("Failed to rewind CSV file")?;

        // 2. RecordBatch 단위로 읽어서 셀 변환
        let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let reader = ReaderBuilder::new(Arc::new(schema))
            .with_header(true)
            .build(file)
            .context("Failed to create CSV reader")?;

        let mut rows = Vec::new();
        for batch in reader {
            let batch = batch.context("Failed to read CSV batch")?;
            for row in 0..batch.num_rows() {
                let cells = batch
                    .columns()
                    .iter()
                    .map(|column| cell_at(column.as_ref(), row))
                    .collect::<Result<Vec<_>>>()?;
                rows.push(cells);
            }
        }

        tracing::info!("Loaded {} metadata rows from {:?}", rows.len(), path);
        Ok(Self { columns, rows })
    }

    /// 컬럼 이름 정규화 (동의어 테이블 적용)
    pub fn normalize_columns(mut self) -> Self {
        self.columns = self
            .columns
            .iter()
            .map(|c| normalize_column_name(c))
            .collect();
        self
    }

    /// 발행된 행만 남김
    ///
    /// `enabled`가 false면 모든 행을 그대로 유지합니다.
    pub fn filter_published(mut self, enabled: bool) -> Result<Self> {
        if !enabled {
            return Ok(self);
        }

        let idx = self
            .column_index(IS_PUBLISHED)
            .ok_or(PipelineError::MissingColumn(IS_PUBLISHED))?;

        let before = self.rows.len();
        self.rows.retain(|row| row.get(idx).is_some_and(CellValue::is_true_like));
        tracing::info!("Publish filter kept {}/{} rows", self.rows.len(), before);

        Ok(self)
    }

    /// 게시글 메타데이터 목록 생성
    pub fn posts(&self) -> Result<Vec<PostMeta>> {
        let post_id_idx = self
            .column_index(POST_ID)
            .ok_or(PipelineError::MissingColumn(POST_ID))?;
        let title_idx = self.column_index(TITLE);
        let sub_title_idx = self.column_index(SUB_TITLE);
        let post_date_idx = self.column_index(POST_DATE);

        let text_of = |row: &[CellValue], idx: Option<usize>| -> String {
            idx.and_then(|i| row.get(i))
                .map(CellValue::as_text)
                .unwrap_or_default()
        };

        Ok(self
            .rows
            .iter()
            .map(|row| {
                let post_id = text_of(row, Some(post_id_idx));
                PostMeta {
                    numeric_id: numeric_id(&post_id),
                    post_id,
                    title: text_of(row, title_idx),
                    sub_title: text_of(row, sub_title_idx),
                    post_date: text_of(row, post_date_idx),
                }
            })
            .collect())
    }

    /// 컬럼 이름 목록
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 행 목록
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 컬럼 위치 (같은 이름이 여러 개면 첫 번째)
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Arrow 배열의 한 셀을 CellValue로 변환
fn cell_at(column: &dyn Array, row: usize) -> Result<CellValue> {
    if column.is_null(row) {
        return Ok(CellValue::Null);
    }

    if let Some(flags) = column.as_any().downcast_ref::<BooleanArray>() {
        return Ok(CellValue::Bool(flags.value(row)));
    }

    let text = array_value_to_string(column, row).context("Failed to render CSV cell")?;
    Ok(CellValue::Text(text))
}

// ============================================================================
// Tests
// ============================================================================
