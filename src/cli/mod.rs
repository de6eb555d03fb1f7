//! CLI 모듈
//!
//! blog-rag CLI 명령어 정의 및 구현
//!
//! 인자 없이 실행하면 현재 디렉토리의 `posts_summary.csv`, `posts/`, `posts.lance`를 사용합니다.

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::chat::{ChatSession, DEFAULT_TOP_K};
use crate::embedding::{EmbeddingProvider, MiniLmEmbedding, MiniLmOptions};
use crate::error::PipelineError;
use crate::inspect::{inspect_dataset, DEFAULT_PREVIEW_ROWS};
use crate::knowledge::{DatasetLocation, PostDataset};
use crate::llm::{ensure_api_key, OpenAiChat, DEFAULT_CHAT_MODEL};
use crate::pipeline::{
    check_inputs, run_extraction, ExtractConfig, DEFAULT_CSV_PATH, DEFAULT_DATASET_PATH,
    DEFAULT_HTML_DIR,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "blog-rag")]
#[command(version, about = "블로그 아카이브 RAG 파이프라인", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 게시글 CSV + HTML에서 Lance 데이터셋 생성 (기존 데이터셋 덮어씀)
    Extract {
        /// 게시글 메타데이터 CSV
        #[arg(long, default_value = DEFAULT_CSV_PATH)]
        csv: PathBuf,

        /// HTML 게시글 디렉토리 (재귀)
        #[arg(long, default_value = DEFAULT_HTML_DIR)]
        html_dir: PathBuf,

        /// 출력 데이터셋 경로
        #[arg(short, long, default_value = DEFAULT_DATASET_PATH)]
        output: PathBuf,

        /// 발행 여부와 관계없이 모든 행 추출
        #[arg(long)]
        all: bool,

        /// 임베딩 배치 크기
        #[arg(long)]
        batch_size: Option<usize>,

        /// 임베딩 모델 캐시 디렉토리
        #[arg(long)]
        model_cache: Option<PathBuf>,
    },

    /// 데이터셋 미리보기
    Inspect {
        /// 데이터셋 경로
        #[arg(short, long, default_value = DEFAULT_DATASET_PATH)]
        dataset: PathBuf,

        /// 출력할 행 수
        #[arg(short, long, default_value_t = DEFAULT_PREVIEW_ROWS)]
        limit: usize,
    },

    /// 게시글 기반 대화형 질의응답
    Chat {
        /// 데이터셋 경로
        #[arg(short, long, default_value = DEFAULT_DATASET_PATH)]
        dataset: PathBuf,

        /// 검색할 게시글 수
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// OpenAI 모델
        #[arg(short, long, default_value = DEFAULT_CHAT_MODEL)]
        model: String,

        /// 임베딩 모델 캐시 디렉토리
        #[arg(long)]
        model_cache: Option<PathBuf>,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Extract {
            csv,
            html_dir,
            output,
            all,
            batch_size,
            model_cache,
        } => {
            let config = ExtractConfig {
                csv_path: csv,
                html_root: html_dir,
                dataset_path: output,
                published_only: !all,
            };
            cmd_extract(config, batch_size, model_cache).await
        }
        Commands::Inspect { dataset, limit } => cmd_inspect(dataset, limit).await,
        Commands::Chat {
            dataset,
            top_k,
            model,
            model_cache,
        } => cmd_chat(dataset, top_k, model, model_cache).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 추출 명령어 (extract)
async fn cmd_extract(
    config: ExtractConfig,
    batch_size: Option<usize>,
    model_cache: Option<PathBuf>,
) -> Result<()> {
    // 모델 로드 전에 입력 확인
    check_inputs(&config)?;

    println!("[*] 임베딩 모델 로드 중...");
    let embedder = MiniLmEmbedding::with_options(MiniLmOptions {
        cache_dir: model_cache,
        batch_size,
        show_download_progress: true,
    })
    .context("임베딩 모델 로드 실패")?;

    let report = run_extraction(&config, &embedder).await?;

    println!();
    println!(
        "[OK] 완료: {} 행 (본문 매칭 {} 행, HTML 파일 {} 개)",
        report.rows, report.rows_with_text, report.html_files
    );
    println!("     데이터셋: {}", report.dataset_dir.display());

    Ok(())
}

/// 점검 명령어 (inspect)
async fn cmd_inspect(dataset: PathBuf, limit: usize) -> Result<()> {
    let mut stdout = std::io::stdout();
    inspect_dataset(&dataset, limit, &mut stdout).await
}

/// 채팅 명령어 (chat)
async fn cmd_chat(
    dataset_path: PathBuf,
    top_k: usize,
    model: String,
    model_cache: Option<PathBuf>,
) -> Result<()> {
    // 프롬프트 전에 데이터셋 확인
    let dataset_dir = DatasetLocation::from_path(&dataset_path)?.dataset_dir();
    if !dataset_dir.exists() {
        return Err(PipelineError::DatasetNotFound(dataset_dir).into());
    }

    // API 키 입력과 채팅 루프가 같은 버퍼 리더를 공유
    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    ensure_api_key(&mut stdin, &mut stdout).await?;

    println!("[*] Lance 데이터셋 로드 중...");
    let dataset = PostDataset::open(&dataset_path)
        .await
        .context("데이터셋 열기 실패")?;

    println!("[*] 임베딩 모델 로드 중 (시간이 걸릴 수 있습니다)...");
    let embedder = MiniLmEmbedding::with_options(MiniLmOptions {
        cache_dir: model_cache,
        batch_size: None,
        show_download_progress: true,
    })
    .context("임베딩 모델 로드 실패")?;

    if let Some(stored) = dataset.embedding_dimension().await? {
        if stored != embedder.dimension() {
            tracing::warn!(
                "Dataset embedding dimension {} does not match model {} ({})",
                stored,
                embedder.name(),
                embedder.dimension()
            );
        }
    }

    println!("[*] LLM 초기화 중...");
    let llm = OpenAiChat::from_env(model).context("LLM 초기화 실패")?;

    let session = ChatSession::new(&embedder, &dataset, &llm).with_top_k(top_k);

    session.run(stdin, &mut stdout, interrupt_signal()).await
}

/// Ctrl-C 대기 (시그널 등록 실패 시 영원히 대기)
fn interrupt_signal() -> impl Future<Output = ()> {
    async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_defaults() {
        let cli = Cli::try_parse_from(["blog-rag", "extract"]).unwrap();
        match cli.command {
            Commands::Extract {
                csv,
                html_dir,
                output,
                all,
                batch_size,
                model_cache,
            } => {
                assert_eq!(csv, PathBuf::from("posts_summary.csv"));
                assert_eq!(html_dir, PathBuf::from("posts"));
                assert_eq!(output, PathBuf::from("posts.lance"));
                assert!(!all);
                assert!(batch_size.is_none());
                assert!(model_cache.is_none());
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_chat_defaults_and_overrides() {
        let cli = Cli::try_parse_from(["blog-rag", "chat"]).unwrap();
        match cli.command {
            Commands::Chat {
                dataset,
                top_k,
                model,
                ..
            } => {
                assert_eq!(dataset, PathBuf::from("posts.lance"));
                assert_eq!(top_k, 5);
                assert_eq!(model, "gpt-4o-mini");
            }
            _ => panic!("expected chat"),
        }

        let cli = Cli::try_parse_from(["blog-rag", "chat", "-k", "8", "--model", "gpt-4o"]).unwrap();
        match cli.command {
            Commands::Chat { top_k, model, .. } => {
                assert_eq!(top_k, 8);
                assert_eq!(model, "gpt-4o");
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_inspect_defaults() {
        let cli = Cli::try_parse_from(["blog-rag", "inspect"]).unwrap();
        match cli.command {
            Commands::Inspect { dataset, limit } => {
                assert_eq!(dataset, PathBuf::from("posts.lance"));
                assert_eq!(limit, 10);
            }
            _ => panic!("expected inspect"),
        }
    }

    #[tokio::test]
    async fn test_chat_missing_dataset_fails_before_prompt() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let err = cmd_chat(
            temp_dir.path().join("posts.lance"),
            DEFAULT_TOP_K,
            DEFAULT_CHAT_MODEL.to_string(),
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::DatasetNotFound(_))
        ));
    }
}
