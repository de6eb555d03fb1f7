//! 채팅 모듈 - 블로그 게시글 기반 질의응답 루프
//!
//! 질문 임베딩 -> 상위 K개 게시글 검색 -> 컨텍스트 프롬프트 구성 -> LLM 호출.
//! 한 턴의 실패는 출력만 하고 다음 질문을 계속 받습니다.

use std::future::Future;
use std::io::Write;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::embedding::EmbeddingProvider;
use crate::knowledge::{PostSearch, RetrievedPost};
use crate::llm::ChatModel;

/// 검색할 게시글 수
pub const DEFAULT_TOP_K: usize = 5;

/// 출력할 최대 출처 수
pub const MAX_SOURCES: usize = 3;

/// 게시글당 컨텍스트에 넣을 최대 문자 수
pub const CONTEXT_CHARS: usize = 1000;

/// 컨텍스트 블록 구분자
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// 모델 지시문
pub const SYSTEM_PROMPT: &str = "Use the following pieces of context from blog posts to answer the question. \n\
If you don't know the answer based on the context, say that you don't know. Don't make up an answer.";

/// 종료 인사
pub const FAREWELL: &str = "안녕히 가세요!";

// ============================================================================
// Input Classification
// ============================================================================

/// 입력 한 줄의 해석 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnInput {
    /// quit / exit / q
    Quit,
    /// 빈 입력 (다시 프롬프트)
    Skip,
    Question(String),
}

/// 입력 한 줄 분류 (앞뒤 공백 제거, 종료 명령은 대소문자 무시)
pub fn classify_input(line: &str) -> TurnInput {
    let question = line.trim();

    if ["quit", "exit", "q"]
        .iter()
        .any(|cmd| question.eq_ignore_ascii_case(cmd))
    {
        TurnInput::Quit
    } else if question.is_empty() {
        TurnInput::Skip
    } else {
        TurnInput::Question(question.to_string())
    }
}

// ============================================================================
// Prompt Building
// ============================================================================

/// 검색 결과로 컨텍스트 블록 구성
pub fn build_context(posts: &[RetrievedPost]) -> String {
    posts
        .iter()
        .map(|post| {
            let content: String = post.blog_text.chars().take(CONTEXT_CHARS).collect();
            format!("Title: {}\nContent: {}", post.title, content)
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// 최종 프롬프트 구성
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "{}\n\nContext:\n{}\n\nQuestion: {}\n\nAnswer:",
        SYSTEM_PROMPT, context, question
    )
}

// ============================================================================
// ChatSession
// ============================================================================

/// 답변 + 검색된 출처
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<RetrievedPost>,
}

/// 질의응답 세션
pub struct ChatSession<'a> {
    embedder: &'a dyn EmbeddingProvider,
    posts: &'a dyn PostSearch,
    llm: &'a dyn ChatModel,
    top_k: usize,
}

impl<'a> ChatSession<'a> {
    pub fn new(
        embedder: &'a dyn EmbeddingProvider,
        posts: &'a dyn PostSearch,
        llm: &'a dyn ChatModel,
    ) -> Self {
        Self {
            embedder,
            posts,
            llm,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// 검색 게시글 수 변경
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// 질문 한 개에 대한 답변
    pub async fn answer(&self, question: &str) -> Result<ChatAnswer> {
        let query_embedding = self
            .embedder
            .embed(question)
            .await
            .context("Failed to embed question")?;

        let sources = self
            .posts
            .search(&query_embedding, self.top_k)
            .await
            .context("Failed to search posts")?;
        for source in &sources {
            tracing::debug!(
                "Retrieved {} (post_id: {}, similarity: {:.3})",
                source.title,
                source.post_id,
                source.similarity
            );
        }

        let prompt = build_prompt(&build_context(&sources), question);
        let answer = self
            .llm
            .complete(&prompt)
            .await
            .with_context(|| format!("Language model call failed ({})", self.llm.name()))?;

        Ok(ChatAnswer { answer, sources })
    }

    /// 대화 루프
    ///
    /// 종료 조건: 종료 명령, 입력 끝(EOF), `interrupt` 완료(Ctrl-C).
    /// `interrupt`는 입력 대기 중과 답변 생성 중 모두 감시합니다.
    pub async fn run<R, W, I>(&self, input: R, out: &mut W, interrupt: I) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
        I: Future<Output = ()>,
    {
        let mut lines = input.lines();
        tokio::pin!(interrupt);

        writeln!(
            out,
            "\n[OK] 채팅 준비 완료! 블로그 게시글에 대해 질문하세요. 종료: 'quit' 또는 'exit'\n"
        )?;

        loop {
            write!(out, "질문: ")?;
            out.flush()?;

            let line = tokio::select! {
                _ = &mut interrupt => {
                    writeln!(out, "\n\n{}", FAREWELL)?;
                    return Ok(());
                }
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    writeln!(out, "\n{}", FAREWELL)?;
                    return Ok(());
                }
                // 디코딩 실패한 줄은 건너뛰고 계속 읽음
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    write_turn_error(out, &anyhow::Error::new(e).context("Failed to read input"))?;
                    continue;
                }
                Err(e) => return Err(anyhow::Error::new(e).context("Failed to read input")),
            };

            let question = match classify_input(&line) {
                TurnInput::Quit => {
                    writeln!(out, "{}", FAREWELL)?;
                    return Ok(());
                }
                TurnInput::Skip => continue,
                TurnInput::Question(q) => q,
            };

            writeln!(out, "\n[*] 답변 생성 중...")?;

            let result = tokio::select! {
                _ = &mut interrupt => {
                    writeln!(out, "\n\n{}", FAREWELL)?;
                    return Ok(());
                }
                result = self.answer(&question) => result,
            };

            match result {
                Ok(reply) => write_answer(out, &reply)?,
                Err(e) => write_turn_error(out, &e)?,
            }
        }
    }
}

/// 한 턴의 실패 출력 (메시지 + 원인 체인)
fn write_turn_error<W: Write>(out: &mut W, e: &anyhow::Error) -> Result<()> {
    tracing::error!("Chat turn failed: {:#}", e);
    writeln!(out, "\n[!] 오류: {}\n", e)?;
    writeln!(out, "{:?}\n", e)?;
    Ok(())
}

/// 답변과 상위 출처 출력
fn write_answer<W: Write>(out: &mut W, reply: &ChatAnswer) -> Result<()> {
    writeln!(out, "\n답변: {}\n", reply.answer)?;
    writeln!(out, "출처:")?;
    for (i, source) in reply.sources.iter().take(MAX_SOURCES).enumerate() {
        writeln!(out, "  {}. {} (post_id: {})", i + 1, source.title, source.post_id)?;
    }
    writeln!(out)?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
