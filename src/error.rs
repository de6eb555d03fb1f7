//! 파이프라인 전제조건 에러
//!
//! 입력 파일/디렉토리/데이터셋 누락처럼 즉시 종료해야 하는 실패만 타입으로 구분합니다.
//! 그 외 실패는 `anyhow::Error`로 전파됩니다.

use std::path::PathBuf;

use thiserror::Error;

/// 시작 시점에 검사하는 치명적 전제조건 실패
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 메타데이터 CSV 없음
    #[error("CSV not found: {}", .0.display())]
    MetadataNotFound(PathBuf),

    /// HTML 루트 디렉토리 없음
    #[error("HTML root not found: {}", .0.display())]
    HtmlRootNotFound(PathBuf),

    /// Lance 데이터셋 없음
    #[error("Lance dataset not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    /// 정규화 후에도 필수 컬럼이 없음
    #[error("required column '{0}' not found in metadata table")]
    MissingColumn(&'static str),
}
