//! 임베딩 모듈 - fastembed 로컬 모델을 통한 텍스트 벡터화
//!
//! 추출 시점과 질의 시점 모두 같은 모델(all-MiniLM-L6-v2)을 사용해야
//! 벡터 비교가 의미를 가집니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = MiniLmEmbedding::with_options(MiniLmOptions::default())?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// all-MiniLM-L6-v2 (fastembed)
// ============================================================================

/// 기본 모델 이름
/// ref: https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2
pub const DEFAULT_MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 384;

/// MiniLM 로컬 임베딩 옵션
#[derive(Debug, Clone, Default)]
pub struct MiniLmOptions {
    /// 모델 캐시 디렉토리 (None이면 fastembed 기본값)
    pub cache_dir: Option<PathBuf>,
    /// 한 번에 모델에 넣을 텍스트 수 (None이면 fastembed 기본값)
    pub batch_size: Option<usize>,
    /// 모델 다운로드 진행률 표시
    pub show_download_progress: bool,
}

/// all-MiniLM-L6-v2 임베딩 구현체
///
/// ONNX 추론은 CPU 바운드이므로 `spawn_blocking`에서 실행합니다.
pub struct MiniLmEmbedding {
    model: Arc<TextEmbedding>,
    batch_size: Option<usize>,
}

impl MiniLmEmbedding {
    /// 옵션을 지정하여 모델 로드 (최초 실행 시 다운로드)
    pub fn with_options(options: MiniLmOptions) -> Result<Self> {
        let mut init = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(options.show_download_progress);

        if let Some(dir) = options.cache_dir {
            init = init.with_cache_dir(dir);
        }

        let model = TextEmbedding::try_new(init).context("Failed to load embedding model")?;

        tracing::info!(
            "Loaded embedding model {} (dimension: {})",
            DEFAULT_MODEL_NAME,
            DEFAULT_DIMENSION
        );

        Ok(Self {
            model: Arc::new(model),
            batch_size: options.batch_size,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for MiniLmEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedding model returned no vector"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let batch_size = self.batch_size;

        tokio::task::spawn_blocking(move || model.embed(texts, batch_size))
            .await
            .context("Embedding task failed")?
            .context("Failed to generate embeddings")
    }

    fn dimension(&self) -> usize {
        DEFAULT_DIMENSION
    }

    fn name(&self) -> &str {
        DEFAULT_MODEL_NAME
    }
}

/// 임베딩 결과 검증 (개수 및 차원)
pub fn validate_embeddings(embeddings: &[Vec<f32>], expected_count: usize, dimension: usize) -> Result<()> {
    if embeddings.len() != expected_count {
        anyhow::bail!(
            "Embedding count mismatch: expected {}, got {}",
            expected_count,
            embeddings.len()
        );
    }

    if let Some((i, e)) = embeddings.iter().enumerate().find(|(_, e)| e.len() != dimension) {
        anyhow::bail!(
            "Embedding dimension mismatch at row {}: expected {}, got {}",
            i,
            dimension,
            e.len()
        );
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
