//! blog-rag - 블로그 아카이브 RAG 파이프라인
//!
//! HTML 게시글 본문 추출 + 로컬 임베딩 + LanceDB 벡터 검색 + LLM 질의응답.
//!
//! - extract: CSV 메타데이터와 HTML을 합쳐 Lance 데이터셋 생성
//! - inspect: 데이터셋 미리보기
//! - chat: 상위 K개 게시글을 컨텍스트로 질문에 답변

pub mod chat;
pub mod cli;
pub mod collector;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod inspect;
pub mod knowledge;
pub mod llm;
pub mod metadata;
pub mod pipeline;

// Re-exports
pub use chat::{ChatAnswer, ChatSession, TurnInput};
pub use collector::HtmlIndex;
pub use embedding::{EmbeddingProvider, MiniLmEmbedding, MiniLmOptions};
pub use error::PipelineError;
pub use extractor::{html_to_text, read_html_text};
pub use knowledge::{PostDataset, PostPreview, PostRecord, PostSearch, RetrievedPost};
pub use llm::{ChatModel, OpenAiChat};
pub use metadata::{MetadataTable, PostMeta};
pub use pipeline::{run_extraction, ExtractConfig, ExtractionReport};
