//! Vector Search - 게시글 벡터 검색 트레이트 및 타입
//!
//! LanceDB ANN (Approximate Nearest Neighbor) 검색을 사용합니다.

use anyhow::Result;
use async_trait::async_trait;

// ============================================================================
// Types
// ============================================================================

/// 게시글 레코드 (데이터셋 한 행)
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub post_id: String,
    pub title: String,
    pub sub_title: String,
    pub post_date: String,
    /// HTML 본문 텍스트 (매칭 실패 시 빈 문자열)
    pub blog_text: String,
    /// 임베딩 벡터 (데이터셋 내 모든 행이 같은 길이)
    pub embedding: Vec<f32>,
}

impl PostRecord {
    /// 임베딩 입력 텍스트: `"{title} {sub_title} {blog_text}"` (trim)
    pub fn embedding_input(title: &str, sub_title: &str, blog_text: &str) -> String {
        format!("{} {} {}", title, sub_title, blog_text).trim().to_string()
    }
}

/// 미리보기 행 (inspect용)
#[derive(Debug, Clone, PartialEq)]
pub struct PostPreview {
    pub post_id: String,
    pub title: String,
    pub sub_title: String,
    pub post_date: String,
    /// blog_text 문자 수
    pub blog_text_length: usize,
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct RetrievedPost {
    pub post_id: String,
    pub title: String,
    pub blog_text: String,
    /// 유사도 스코어 (0.0 ~ 1.0, 높을수록 가까움)
    pub similarity: f32,
}

// ============================================================================
// PostSearch Trait
// ============================================================================

/// 게시글 검색 트레이트 (async)
#[async_trait]
pub trait PostSearch: Send + Sync {
    /// 쿼리 임베딩과 가장 가까운 게시글 `limit`개
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<RetrievedPost>>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_input_joins_and_trims() {
        assert_eq!(
            PostRecord::embedding_input("Hello", "Sub", "World"),
            "Hello Sub World"
        );
        assert_eq!(PostRecord::embedding_input("Hello", "", ""), "Hello");
        assert_eq!(PostRecord::embedding_input("", "", "World"), "World");
        assert_eq!(PostRecord::embedding_input("", "", ""), "");
    }

    #[test]
    fn test_embedding_input_keeps_inner_gap() {
        // 빈 부제목은 내부 공백 두 칸을 남김
        assert_eq!(PostRecord::embedding_input("A", "", "B"), "A  B");
    }
}
