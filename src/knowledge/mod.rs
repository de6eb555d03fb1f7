//! Knowledge 모듈 - 게시글 벡터 데이터셋
//!
//! - Vector: 게시글 레코드 타입 + 검색 트레이트
//! - Lance: LanceDB 기반 컬럼형 데이터셋 (쓰기/읽기/ANN 검색)

mod lance;
mod vector;

// Re-exports
pub use lance::{post_schema, records_to_batch, DatasetLocation, PostDataset};
pub use vector::{PostPreview, PostRecord, PostSearch, RetrievedPost};
