//! LLM 모듈 - OpenAI Chat Completions 호출
//!
//! 프롬프트 한 개를 user 메시지로 보내고 답변 텍스트를 받습니다.
//! 재시도/타임아웃 없음. 중단은 채팅 루프의 Ctrl-C 처리에 맡깁니다.
//!
//! ref: https://platform.openai.com/docs/api-reference/chat/create

use std::io::Write;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

// ============================================================================
// ChatModel Trait
// ============================================================================

/// 언어 모델 트레이트
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 프롬프트에 대한 답변 생성
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI
// ============================================================================

/// Chat Completions 엔드포인트
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// API 키 환경변수
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// 기본 모델
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// OpenAI 채팅 모델 구현체
pub struct OpenAiChat {
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiChat {
    /// 새 인스턴스 생성 (temperature 0)
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.into(),
            temperature: 0.0,
            client,
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = get_api_key()?;
        Self::new(api_key, model)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI 에러 응답
#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(self.api_key.trim())
            .json(&request)
            .send()
            .await
            .context("Failed to call OpenAI chat completions")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<OpenAiError>(&body) {
                bail!(
                    "OpenAI API error ({}, {}): {}",
                    status,
                    error.error.kind.unwrap_or_default(),
                    error.error.message
                );
            }
            bail!("OpenAI API error ({}): {}", status, body);
        }

        parse_answer(&body)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// 응답 본문에서 첫 번째 답변 추출
fn parse_answer(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).context("Failed to parse OpenAI response")?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| anyhow::anyhow!("OpenAI response contained no choices"))
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
pub fn get_api_key() -> Result<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("API key not found. Set {} environment variable.", API_KEY_ENV),
    }
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

/// API 키 확보: 환경변수에 없으면 콘솔에서 입력받아 현재 프로세스 환경에만 설정
///
/// 디스크에는 저장하지 않습니다. `input`은 이후 채팅 루프가 이어서 읽는 리더여야
/// 키 다음 줄부터의 입력이 유실되지 않습니다.
pub async fn ensure_api_key<R, W>(input: &mut R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    if has_api_key() {
        return Ok(());
    }

    let key = prompt_api_key(input, out).await?;
    std::env::set_var(API_KEY_ENV, key);
    tracing::debug!("{} set for this session", API_KEY_ENV);
    Ok(())
}

/// 콘솔에서 API 키 한 줄 입력
async fn prompt_api_key<R, W>(input: &mut R, out: &mut W) -> Result<String>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    write!(out, "OpenAI API 키를 입력하세요: ")?;
    out.flush()?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .await
        .context("Failed to read API key")?;

    let key = line.trim().to_string();
    if key.is_empty() {
        bail!("API key is required");
    }
    Ok(key)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 테스트용 고정 답변 모델 (받은 프롬프트 기록)
    pub(crate) struct FakeChatModel {
        pub answer: String,
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
    }

    impl FakeChatModel {
        pub(crate) fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for FakeChatModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.answer.clone())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: DEFAULT_CHAT_MODEL,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_parse_answer() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"42"}}]}"#;
        assert_eq!(parse_answer(body).unwrap(), "42");

        let empty = r#"{"choices":[]}"#;
        assert!(parse_answer(empty).is_err());

        assert!(parse_answer("not json").is_err());
    }

    #[tokio::test]
    async fn test_prompt_api_key() {
        let mut input = &b"  sk-test-key \n"[..];
        let mut out = Vec::new();

        let key = prompt_api_key(&mut input, &mut out).await.unwrap();
        assert_eq!(key, "sk-test-key");
        assert!(String::from_utf8(out).unwrap().contains("API"));
    }

    #[tokio::test]
    async fn test_prompt_api_key_rejects_empty() {
        let mut input = &b"\n"[..];
        let mut out = Vec::new();
        assert!(prompt_api_key(&mut input, &mut out).await.is_err());
    }

    #[tokio::test]
    async fn test_prompt_api_key_leaves_following_lines_buffered() {
        // 키와 질문이 한 번에 들어오는 파이프 입력
        let mut input = tokio::io::BufReader::new(&b"sk-test-key\nwhat is rust?\nquit\n"[..]);
        let mut out = Vec::new();

        let key = prompt_api_key(&mut input, &mut out).await.unwrap();
        assert_eq!(key, "sk-test-key");

        let mut lines = input.lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("what is rust?"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("quit"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }
}
