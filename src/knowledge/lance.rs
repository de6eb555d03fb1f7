//! LanceDB Post Dataset - 게시글 컬럼형 데이터셋
//!
//! 데이터셋 경로(`posts.lance`)의 부모 디렉토리에 연결하고,
//! 경로의 stem(`posts`)을 테이블 이름으로 사용합니다.
//! 추출기는 매번 테이블 전체를 덮어씁니다.
//!
//! ref: https://lancedb.github.io/lancedb/

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::{Connection, CreateTableMode};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::Table;

use super::vector::{PostPreview, PostRecord, PostSearch, RetrievedPost};
use crate::error::PipelineError;

/// Lance 데이터셋 디렉토리 확장자
const DATASET_EXTENSION: &str = "lance";

/// 컬럼 이름
const COL_POST_ID: &str = "post_id";
const COL_TITLE: &str = "title";
const COL_SUB_TITLE: &str = "sub_title";
const COL_POST_DATE: &str = "post_date";
const COL_BLOG_TEXT: &str = "blog_text";
const COL_EMBEDDING: &str = "embedding";
/// LanceDB가 벡터 검색 결과에 자동 추가하는 컬럼
const COL_DISTANCE: &str = "_distance";

// ============================================================================
// DatasetLocation
// ============================================================================

/// 데이터셋 경로 -> (LanceDB 디렉토리, 테이블 이름)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLocation {
    /// LanceDB 연결 디렉토리 (데이터셋 경로의 부모)
    pub db_dir: PathBuf,
    /// 테이블 이름 (데이터셋 경로의 stem)
    pub table_name: String,
}

impl DatasetLocation {
    /// 데이터셋 경로 해석 (상대 경로는 현재 디렉토리 기준)
    pub fn from_path(path: &Path) -> Result<Self> {
        let abs_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let table_name = abs_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Invalid dataset path: {:?}", path))?
            .to_string();

        let db_dir = abs_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self { db_dir, table_name })
    }

    /// 실제 Lance 데이터셋 디렉토리 (`<db_dir>/<table_name>.lance`)
    pub fn dataset_dir(&self) -> PathBuf {
        self.db_dir
            .join(format!("{}.{}", self.table_name, DATASET_EXTENSION))
    }

    async fn connect(&self) -> Result<Connection> {
        let uri = self
            .db_dir
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        lancedb::connect(uri)
            .execute()
            .await
            .context("Failed to connect to LanceDB")
    }
}

// ============================================================================
// Schema
// ============================================================================

/// 게시글 테이블 스키마
pub fn post_schema(dimension: usize) -> Result<Schema> {
    let dimension = i32::try_from(dimension).context("Embedding dimension too large")?;

    Ok(Schema::new(vec![
        Field::new(COL_POST_ID, DataType::Utf8, false),
        Field::new(COL_TITLE, DataType::Utf8, false),
        Field::new(COL_SUB_TITLE, DataType::Utf8, false),
        Field::new(COL_POST_DATE, DataType::Utf8, false),
        Field::new(COL_BLOG_TEXT, DataType::Utf8, false),
        Field::new(
            COL_EMBEDDING,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            false,
        ),
    ]))
}

/// 레코드들을 Arrow RecordBatch로 변환
pub fn records_to_batch(records: &[PostRecord], dimension: usize) -> Result<RecordBatch> {
    if records.is_empty() {
        anyhow::bail!("Cannot create batch from empty records");
    }

    if let Some(bad) = records.iter().find(|r| r.embedding.len() != dimension) {
        anyhow::bail!(
            "Embedding for post '{}' has length {}, expected {}",
            bad.post_id,
            bad.embedding.len(),
            dimension
        );
    }

    let schema = Arc::new(post_schema(dimension)?);

    // 임베딩을 FixedSizeList로 변환
    let embeddings_flat: Vec<f32> = records
        .iter()
        .flat_map(|r| r.embedding.iter().copied())
        .collect();

    let values = Float32Array::from(embeddings_flat);
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let embeddings_list = FixedSizeListArray::try_new(
        field,
        i32::try_from(dimension).context("Embedding dimension too large")?,
        Arc::new(values) as Arc<dyn Array>,
        None,
    )
    .context("Failed to create embedding array")?;

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(string_array(records, |r| r.post_id.as_str())),
            Arc::new(string_array(records, |r| r.title.as_str())),
            Arc::new(string_array(records, |r| r.sub_title.as_str())),
            Arc::new(string_array(records, |r| r.post_date.as_str())),
            Arc::new(string_array(records, |r| r.blog_text.as_str())),
            Arc::new(embeddings_list),
        ],
    )
    .context("Failed to create RecordBatch")
}

fn string_array<'a>(
    records: &'a [PostRecord],
    field: impl Fn(&'a PostRecord) -> &'a str,
) -> StringArray {
    StringArray::from(records.iter().map(field).collect::<Vec<&str>>())
}

// ============================================================================
// PostDataset
// ============================================================================

/// LanceDB 게시글 데이터셋
pub struct PostDataset {
    table: Table,
    location: DatasetLocation,
}

impl PostDataset {
    /// 데이터셋 생성 (기존 데이터셋은 통째로 덮어씀)
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `records` - 저장할 레코드 (비어 있으면 빈 테이블 생성)
    /// * `dimension` - 임베딩 차원
    pub async fn write(path: &Path, records: &[PostRecord], dimension: usize) -> Result<Self> {
        let location = DatasetLocation::from_path(path)?;

        // 부모 디렉토리 생성
        if !location.db_dir.exists() {
            tokio::fs::create_dir_all(&location.db_dir)
                .await
                .context("Failed to create LanceDB directory")?;
        }

        let db = location.connect().await?;

        let table = if records.is_empty() {
            let schema: SchemaRef = Arc::new(post_schema(dimension)?);
            db.create_empty_table(&location.table_name, schema)
                .mode(CreateTableMode::Overwrite)
                .execute()
                .await
                .context("Failed to create empty table")?
        } else {
            let batch = records_to_batch(records, dimension)?;
            let schema = batch.schema();
            // RecordBatchIterator로 감싸서 전달
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            db.create_table(&location.table_name, batches)
                .mode(CreateTableMode::Overwrite)
                .execute()
                .await
                .context("Failed to create table")?
        };

        tracing::info!(
            "Wrote {} rows to {:?}",
            records.len(),
            location.dataset_dir()
        );

        Ok(Self { table, location })
    }

    /// 기존 데이터셋 열기 (읽기 전용 용도)
    pub async fn open(path: &Path) -> Result<Self> {
        let location = DatasetLocation::from_path(path)?;
        let dataset_dir = location.dataset_dir();

        if !dataset_dir.exists() {
            return Err(PipelineError::DatasetNotFound(dataset_dir).into());
        }

        let db = location.connect().await?;
        let table = db
            .open_table(&location.table_name)
            .execute()
            .await
            .context("Failed to open table")?;

        Ok(Self { table, location })
    }

    /// 데이터셋 위치
    pub fn location(&self) -> &DatasetLocation {
        &self.location
    }

    /// 전체 행 수
    pub async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .context("Failed to count rows")
    }

    /// 테이블 스키마
    pub async fn schema(&self) -> Result<SchemaRef> {
        self.table.schema().await.context("Failed to read schema")
    }

    /// 저장된 임베딩 차원 (FixedSizeList 길이)
    pub async fn embedding_dimension(&self) -> Result<Option<usize>> {
        let schema = self.schema().await?;
        let dimension = schema
            .field_with_name(COL_EMBEDDING)
            .ok()
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            });
        Ok(dimension)
    }

    /// 앞쪽 `limit`개 행 미리보기
    pub async fn preview(&self, limit: usize) -> Result<Vec<PostPreview>> {
        let stream = self
            .table
            .query()
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute preview query")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;

        let mut previews = Vec::new();

        for batch in batches {
            let post_ids = string_column(&batch, COL_POST_ID)?;
            let titles = string_column(&batch, COL_TITLE)?;
            let sub_titles = string_column(&batch, COL_SUB_TITLE)?;
            let post_dates = string_column(&batch, COL_POST_DATE)?;
            let blog_texts = string_column(&batch, COL_BLOG_TEXT)?;
            let embeddings = embedding_column(&batch)?;

            for i in 0..batch.num_rows() {
                if previews.len() >= limit {
                    break;
                }

                previews.push(PostPreview {
                    post_id: post_ids.value(i).to_string(),
                    title: titles.value(i).to_string(),
                    sub_title: sub_titles.value(i).to_string(),
                    post_date: post_dates.value(i).to_string(),
                    blog_text_length: blog_texts.value(i).chars().count(),
                    embedding: embedding_at(embeddings, i)?,
                });
            }
        }

        Ok(previews)
    }
}

#[async_trait]
impl PostSearch for PostDataset {
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<RetrievedPost>> {
        // 벡터 검색
        let results = self
            .table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut retrieved = Vec::new();

        for batch in batches {
            let post_ids = string_column(&batch, COL_POST_ID)?;
            let titles = string_column(&batch, COL_TITLE)?;
            let blog_texts = string_column(&batch, COL_BLOG_TEXT)?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name(COL_DISTANCE)
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                // 거리를 유사도로 변환 (L2 거리 -> 0~1)
                let similarity = 1.0 / (1.0 + distances.value(i));

                retrieved.push(RetrievedPost {
                    post_id: post_ids.value(i).to_string(),
                    title: titles.value(i).to_string(),
                    blog_text: blog_texts.value(i).to_string(),
                    similarity,
                });
            }
        }

        Ok(retrieved)
    }
}

// ============================================================================
// Column Helpers
// ============================================================================

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

fn embedding_column(batch: &RecordBatch) -> Result<&FixedSizeListArray> {
    batch
        .column_by_name(COL_EMBEDDING)
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing embedding column"))
}

fn embedding_at(list: &FixedSizeListArray, row: usize) -> Result<Vec<f32>> {
    let values = list.value(row);
    let floats = values
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| anyhow::anyhow!("Embedding values are not Float32"))?;
    Ok(floats.values().to_vec())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIM: usize = 4;

    fn record(post_id: &str, title: &str, blog_text: &str, embedding: [f32; DIM]) -> PostRecord {
        PostRecord {
            post_id: post_id.to_string(),
            title: title.to_string(),
            sub_title: String::new(),
            post_date: "2024-01-01".to_string(),
            blog_text: blog_text.to_string(),
            embedding: embedding.to_vec(),
        }
    }

    fn sample_records() -> Vec<PostRecord> {
        vec![
            record("1-rust", "Rust", "Ownership and borrowing", [1.0, 0.0, 0.0, 0.0]),
            record("2-lance", "Lance", "Columnar storage", [0.0, 1.0, 0.0, 0.0]),
            record("3-empty", "No body", "", [0.0, 0.0, 1.0, 0.0]),
        ]
    }

    #[test]
    fn test_location_from_path() {
        let location = DatasetLocation::from_path(Path::new("/data/blog/posts.lance")).unwrap();
        assert_eq!(location.db_dir, PathBuf::from("/data/blog"));
        assert_eq!(location.table_name, "posts");
        assert_eq!(
            location.dataset_dir(),
            PathBuf::from("/data/blog/posts.lance")
        );

        // 확장자 없는 경로도 같은 위치로 해석
        let location = DatasetLocation::from_path(Path::new("/data/blog/posts")).unwrap();
        assert_eq!(
            location.dataset_dir(),
            PathBuf::from("/data/blog/posts.lance")
        );
    }

    #[test]
    fn test_relative_location_resolves_against_cwd() {
        let location = DatasetLocation::from_path(Path::new("posts.lance")).unwrap();
        assert!(location.db_dir.is_absolute());
        assert_eq!(location.table_name, "posts");
    }

    #[test]
    fn test_records_to_batch_rejects_wrong_dimension() {
        let mut records = sample_records();
        records[1].embedding.pop();

        let err = records_to_batch(&records, DIM).unwrap_err();
        assert!(err.to_string().contains("2-lance"));
    }

    #[test]
    fn test_post_schema_shape() {
        let schema = post_schema(384).unwrap();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec!["post_id", "title", "sub_title", "post_date", "blog_text", "embedding"]
        );
        assert!(matches!(
            schema.field_with_name("embedding").unwrap().data_type(),
            DataType::FixedSizeList(_, 384)
        ));
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posts.lance");

        let written = PostDataset::write(&path, &sample_records(), DIM).await.unwrap();
        assert_eq!(written.count().await.unwrap(), 3);
        assert!(path.exists());

        let dataset = PostDataset::open(&path).await.unwrap();
        assert_eq!(dataset.count().await.unwrap(), 3);
        assert_eq!(dataset.embedding_dimension().await.unwrap(), Some(DIM));

        let schema = dataset.schema().await.unwrap();
        let expected = post_schema(DIM).unwrap();
        let names: Vec<&String> = schema.fields().iter().map(|f| f.name()).collect();
        let expected_names: Vec<&String> = expected.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, expected_names);
    }

    #[tokio::test]
    async fn test_write_overwrites_existing_dataset() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posts.lance");

        PostDataset::write(&path, &sample_records(), DIM).await.unwrap();
        let replacement = vec![record("9-new", "New", "Only row", [0.5, 0.5, 0.0, 0.0])];
        PostDataset::write(&path, &replacement, DIM).await.unwrap();

        let dataset = PostDataset::open(&path).await.unwrap();
        assert_eq!(dataset.count().await.unwrap(), 1);

        let preview = dataset.preview(10).await.unwrap();
        assert_eq!(preview[0].post_id, "9-new");
    }

    #[tokio::test]
    async fn test_write_empty_dataset_keeps_schema() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posts.lance");

        PostDataset::write(&path, &[], DIM).await.unwrap();

        let dataset = PostDataset::open(&path).await.unwrap();
        assert_eq!(dataset.count().await.unwrap(), 0);
        assert_eq!(dataset.embedding_dimension().await.unwrap(), Some(DIM));
        assert!(dataset.preview(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preview_limit_and_text_length() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posts.lance");

        PostDataset::write(&path, &sample_records(), DIM).await.unwrap();
        let dataset = PostDataset::open(&path).await.unwrap();

        let preview = dataset.preview(2).await.unwrap();
        assert_eq!(preview.len(), 2);
        assert_eq!(preview[0].post_id, "1-rust");
        assert_eq!(preview[0].blog_text_length, "Ownership and borrowing".len());
        assert_eq!(preview[0].embedding, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_search_returns_nearest_first() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posts.lance");

        PostDataset::write(&path, &sample_records(), DIM).await.unwrap();
        let dataset = PostDataset::open(&path).await.unwrap();

        let results = dataset.search(&[0.0, 0.9, 0.1, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].post_id, "2-lance");
        assert_eq!(results[0].blog_text, "Columnar storage");
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[tokio::test]
    async fn test_open_missing_dataset() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posts.lance");

        let err = PostDataset::open(&path).await.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::DatasetNotFound(_))
        ));
    }
}
