//! 추출 파이프라인 - 메타데이터 CSV + HTML 디렉토리 -> Lance 데이터셋
//!
//! 1. CSV 로드 및 컬럼 정규화, 발행 필터
//! 2. HTML 인덱스 생성 후 post_id 숫자열로 본문 매칭
//! 3. 제목 + 부제목 + 본문 배치 임베딩
//! 4. 데이터셋 전체 덮어쓰기
//!
//! HTML 매칭/추출 실패는 빈 본문으로 처리하고 계속 진행합니다.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::collector::HtmlIndex;
use crate::embedding::{validate_embeddings, EmbeddingProvider};
use crate::error::PipelineError;
use crate::extractor::read_html_text;
use crate::knowledge::{PostDataset, PostRecord};
use crate::metadata::{MetadataTable, PostMeta};

/// 기본 입력/출력 경로
pub const DEFAULT_CSV_PATH: &str = "posts_summary.csv";
pub const DEFAULT_HTML_DIR: &str = "posts";
pub const DEFAULT_DATASET_PATH: &str = "posts.lance";

// ============================================================================
// Types
// ============================================================================

/// 추출 설정
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// 메타데이터 CSV 경로
    pub csv_path: PathBuf,
    /// HTML 루트 디렉토리
    pub html_root: PathBuf,
    /// 출력 데이터셋 경로
    pub dataset_path: PathBuf,
    /// 발행된 게시글만 추출
    pub published_only: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            html_root: PathBuf::from(DEFAULT_HTML_DIR),
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            published_only: true,
        }
    }
}

/// 추출 결과 통계
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// 저장된 행 수
    pub rows: usize,
    /// HTML 본문이 비어 있지 않은 행 수
    pub rows_with_text: usize,
    /// 탐색된 HTML 파일 수
    pub html_files: usize,
    pub embedding_time: Duration,
    pub write_time: Duration,
    /// 실제 데이터셋 디렉토리
    pub dataset_dir: PathBuf,
}

// ============================================================================
// Pipeline
// ============================================================================

/// 전제조건 검사 (CSV 파일, HTML 디렉토리)
pub fn check_inputs(config: &ExtractConfig) -> Result<()> {
    if !config.csv_path.is_file() {
        return Err(PipelineError::MetadataNotFound(config.csv_path.clone()).into());
    }
    if !config.html_root.is_dir() {
        return Err(PipelineError::HtmlRootNotFound(config.html_root.clone()).into());
    }
    Ok(())
}

/// 게시글별 HTML 본문 매칭 (실패는 빈 문자열)
pub fn match_blog_texts(posts: &[PostMeta], index: &HtmlIndex) -> Vec<String> {
    posts
        .iter()
        .map(|post| {
            let Some(path) = index.get(&post.numeric_id) else {
                return String::new();
            };

            match read_html_text(path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!("HTML extraction failed for {}: {:#}", post.post_id, e);
                    String::new()
                }
            }
        })
        .collect()
}

/// 추출 실행
///
/// 진행 상황은 표준 출력으로, 세부 로그는 tracing으로 남깁니다.
pub async fn run_extraction(
    config: &ExtractConfig,
    embedder: &dyn EmbeddingProvider,
) -> Result<ExtractionReport> {
    check_inputs(config)?;

    // 1. 메타데이터
    let table = MetadataTable::from_csv(&config.csv_path)?
        .normalize_columns()
        .filter_published(config.published_only)?;
    let posts = table.posts()?;
    println!("[*] 메타데이터 {} 행", posts.len());

    // 2. HTML 본문
    let index = HtmlIndex::build(&config.html_root)?;
    let blog_texts = match_blog_texts(&posts, &index);
    let rows_with_text = blog_texts.iter().filter(|t| !t.is_empty()).count();

    // 3. 임베딩
    let inputs: Vec<String> = posts
        .iter()
        .zip(&blog_texts)
        .map(|(post, text)| PostRecord::embedding_input(&post.title, &post.sub_title, text))
        .collect();

    println!("[*] 임베딩 생성 중... ({})", embedder.name());
    let started = Instant::now();
    let embeddings = embedder
        .embed_batch(&inputs)
        .await
        .context("Failed to embed posts")?;
    let embedding_time = started.elapsed();
    println!(
        "    임베딩 생성 시간: {:.2}초",
        embedding_time.as_secs_f64()
    );

    validate_embeddings(&embeddings, posts.len(), embedder.dimension())?;

    let records: Vec<PostRecord> = posts
        .into_iter()
        .zip(blog_texts)
        .zip(embeddings)
        .map(|((post, blog_text), embedding)| PostRecord {
            post_id: post.post_id,
            title: post.title,
            sub_title: post.sub_title,
            post_date: post.post_date,
            blog_text,
            embedding,
        })
        .collect();

    // 4. 데이터셋 쓰기
    println!("[*] Lance 데이터셋 쓰는 중...");
    let started = Instant::now();
    let dataset = PostDataset::write(&config.dataset_path, &records, embedder.dimension())
        .await
        .context("Failed to write Lance dataset")?;
    let write_time = started.elapsed();
    println!("    데이터셋 쓰기 시간: {:.2}초", write_time.as_secs_f64());

    Ok(ExtractionReport {
        rows: records.len(),
        rows_with_text,
        html_files: index.file_count(),
        embedding_time,
        write_time,
        dataset_dir: dataset.location().dataset_dir(),
    })
}

// ============================================================================
// Tests
// ============================================================================
