//! Arrow schemas and row conversion for the three vector tables.
//!
//! Row structs from `rev-core` are traced into Arrow fields with serde_arrow,
//! then the `embedding` column is rewritten to `FixedSizeList<Float32, 384>`
//! so Lance can build an ANN index over it. Reads decode record batches by
//! column downcast; `_distance` is tolerated in either float width.

use std::sync::Arc;

use arrow_array::{Array, RecordBatch};
use arrow_schema::{DataType, Field, FieldRef, Schema};
use serde::Serialize;
use serde_arrow::schema::{SchemaLike, TracingOptions};

use rev_core::VECTOR_DIM;
use rev_core::record::{DocChunkRecord, FileRecord, PrCommentRecord};

use crate::error::StoreError;

/// Rewrite the traced `embedding` field to a fixed-size float list.
fn with_embedding_fixed_size(fields: Vec<FieldRef>) -> Vec<FieldRef> {
    fields
        .into_iter()
        .map(|f| {
            if f.name() == "embedding" {
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                Arc::new(Field::new(
                    "embedding",
                    DataType::FixedSizeList(
                        Arc::new(Field::new("item", DataType::Float32, true)),
                        VECTOR_DIM as i32,
                    ),
                    false,
                ))
            } else {
                f
            }
        })
        .collect()
}

fn traced_fields<T: for<'de> serde::Deserialize<'de>>() -> Result<Vec<FieldRef>, StoreError> {
    let fields = Vec::<FieldRef>::from_type::<T>(TracingOptions::default())
        .map_err(|e| StoreError::Arrow(format!("schema trace failed: {e}")))?;
    Ok(with_embedding_fixed_size(fields))
}

/// Arrow schema for the `file_embeddings` table.
pub fn file_schema() -> Result<Arc<Schema>, StoreError> {
    Ok(Arc::new(Schema::new(traced_fields::<FileRecord>()?)))
}

/// Arrow schema for the `document_chunk_embeddings` table.
pub fn doc_schema() -> Result<Arc<Schema>, StoreError> {
    Ok(Arc::new(Schema::new(traced_fields::<DocChunkRecord>()?)))
}

/// Arrow schema for the `pr_comments` table.
pub fn pr_schema() -> Result<Arc<Schema>, StoreError> {
    Ok(Arc::new(Schema::new(traced_fields::<PrCommentRecord>()?)))
}

/// Convert rows to a record batch using the table's fixed schema.
pub fn rows_to_batch<T>(rows: &[T]) -> Result<RecordBatch, StoreError>
where
    T: Serialize + for<'de> serde::Deserialize<'de>,
{
    let fields = traced_fields::<T>()?;
    serde_arrow::to_record_batch(&fields, &rows)
        .map_err(|e| StoreError::Arrow(format!("row conversion failed: {e}")))
}

/// Required string column value.
pub fn get_string(batch: &RecordBatch, column: &str, row: usize) -> Result<String, StoreError> {
    get_opt_string(batch, column, row)?
        .ok_or_else(|| StoreError::Arrow(format!("null in required column '{column}'")))
}

/// Optional string column value.
pub fn get_opt_string(
    batch: &RecordBatch,
    column: &str,
    row: usize,
) -> Result<Option<String>, StoreError> {
    let index = batch
        .schema()
        .index_of(column)
        .map_err(|e| StoreError::Arrow(format!("missing column '{column}': {e}")))?;
    let array = batch.column(index);

    if let Some(values) = array.as_any().downcast_ref::<arrow_array::StringArray>() {
        if values.is_null(row) {
            return Ok(None);
        }
        return Ok(Some(values.value(row).to_string()));
    }
    if let Some(values) = array
        .as_any()
        .downcast_ref::<arrow_array::LargeStringArray>()
    {
        if values.is_null(row) {
            return Ok(None);
        }
        return Ok(Some(values.value(row).to_string()));
    }

    Err(StoreError::Arrow(format!(
        "unsupported string column type for '{column}'"
    )))
}

/// Required integer column value (Int64 or Int32).
pub fn get_i64(batch: &RecordBatch, column: &str, row: usize) -> Result<i64, StoreError> {
    let index = batch
        .schema()
        .index_of(column)
        .map_err(|e| StoreError::Arrow(format!("missing column '{column}': {e}")))?;
    let array = batch.column(index);

    if let Some(values) = array.as_any().downcast_ref::<arrow_array::Int64Array>() {
        return Ok(values.value(row));
    }
    if let Some(values) = array.as_any().downcast_ref::<arrow_array::Int32Array>() {
        return Ok(i64::from(values.value(row)));
    }

    Err(StoreError::Arrow(format!(
        "unsupported integer column type for '{column}'"
    )))
}

/// Embedding column value as a float vector.
pub fn get_embedding(batch: &RecordBatch, row: usize) -> Result<Vec<f32>, StoreError> {
    let index = batch
        .schema()
        .index_of("embedding")
        .map_err(|e| StoreError::Arrow(format!("missing embedding column: {e}")))?;
    let array = batch.column(index);

    let list = array
        .as_any()
        .downcast_ref::<arrow_array::FixedSizeListArray>()
        .ok_or_else(|| StoreError::Arrow("embedding column is not a fixed-size list".to_string()))?;
    let values = list.value(row);
    let floats = values
        .as_any()
        .downcast_ref::<arrow_array::Float32Array>()
        .ok_or_else(|| StoreError::Arrow("embedding items are not float32".to_string()))?;

    Ok(floats.values().to_vec())
}

/// `_distance` from a vector query result row, if the column is present.
#[must_use]
pub fn get_distance(batch: &RecordBatch, row: usize) -> Option<f64> {
    let index = batch.schema().index_of("_distance").ok()?;
    let array = batch.column(index);

    if let Some(values) = array.as_any().downcast_ref::<arrow_array::Float64Array>() {
        if values.is_null(row) {
            return None;
        }
        return Some(values.value(row));
    }
    if let Some(values) = array.as_any().downcast_ref::<arrow_array::Float32Array>() {
        if values.is_null(row) {
            return None;
        }
        return Some(f64::from(values.value(row)));
    }

    None
}

/// Decode one `file_embeddings` row.
pub fn file_record_from_batch(batch: &RecordBatch, row: usize) -> Result<FileRecord, StoreError> {
    Ok(FileRecord {
        id: get_string(batch, "id", row)?,
        project_path: get_string(batch, "project_path", row)?,
        path: get_string(batch, "path", row)?,
        content: get_string(batch, "content", row)?,
        language: get_string(batch, "language", row)?,
        content_hash: get_string(batch, "content_hash", row)?,
        last_modified: get_string(batch, "last_modified", row)?,
        record_type: get_string(batch, "record_type", row)?,
        embedding: get_embedding(batch, row)?,
    })
}

/// Decode one `document_chunk_embeddings` row.
pub fn doc_record_from_batch(
    batch: &RecordBatch,
    row: usize,
) -> Result<DocChunkRecord, StoreError> {
    Ok(DocChunkRecord {
        id: get_string(batch, "id", row)?,
        project_path: get_opt_string(batch, "project_path", row)?.unwrap_or_default(),
        original_document_path: get_string(batch, "original_document_path", row)?,
        document_title: get_string(batch, "document_title", row)?,
        heading_text: get_opt_string(batch, "heading_text", row)?.unwrap_or_default(),
        start_line_in_doc: get_i64(batch, "start_line_in_doc", row)?,
        content: get_string(batch, "content", row)?,
        content_hash: get_string(batch, "content_hash", row)?,
        language: get_string(batch, "language", row)?,
        embedding: get_embedding(batch, row)?,
    })
}

/// Decode one `pr_comments` row.
pub fn pr_record_from_batch(
    batch: &RecordBatch,
    row: usize,
) -> Result<PrCommentRecord, StoreError> {
    Ok(PrCommentRecord {
        id: get_string(batch, "id", row)?,
        project_path: get_opt_string(batch, "project_path", row)?.unwrap_or_default(),
        repository: get_string(batch, "repository", row)?,
        pr_number: get_i64(batch, "pr_number", row)?,
        author: get_string(batch, "author", row)?,
        created_at: get_string(batch, "created_at", row)?,
        file_path: get_string(batch, "file_path", row)?,
        body: get_string(batch, "body", row)?,
        comment_type: get_string(batch, "comment_type", row)?,
        matched_chunk: get_opt_string(batch, "matched_chunk", row)?.unwrap_or_default(),
        embedding: get_embedding(batch, row)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file_record(id: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            project_path: "/repo".to_string(),
            path: "/repo/src/main.rs".to_string(),
            content: "fn main() {}".to_string(),
            language: "rust".to_string(),
            content_hash: "abcd1234".to_string(),
            last_modified: "2026-01-01T00:00:00Z".to_string(),
            record_type: "code".to_string(),
            embedding: vec![0.25; VECTOR_DIM],
        }
    }

    #[test]
    fn file_schema_has_fixed_size_embedding() {
        let schema = file_schema().unwrap();
        let field = schema.field_with_name("embedding").unwrap();
        match field.data_type() {
            DataType::FixedSizeList(_, size) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                let expected = VECTOR_DIM as i32;
                assert_eq!(*size, expected);
            }
            other => panic!("expected FixedSizeList, got {other:?}"),
        }
    }

    #[test]
    fn file_record_round_trips_through_batch() {
        let records = vec![sample_file_record("r1"), sample_file_record("r2")];
        let batch = rows_to_batch(&records).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let decoded = file_record_from_batch(&batch, 0).unwrap();
        assert_eq!(decoded.id, "r1");
        assert_eq!(decoded.path, "/repo/src/main.rs");
        assert_eq!(decoded.embedding.len(), VECTOR_DIM);
        assert!((decoded.embedding[0] - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn doc_record_round_trips_through_batch() {
        let record = DocChunkRecord {
            id: "d1".to_string(),
            project_path: "/repo".to_string(),
            original_document_path: "/repo/docs/guide.md".to_string(),
            document_title: "Guide".to_string(),
            heading_text: "Setup".to_string(),
            start_line_in_doc: 5,
            content: "Run the installer.".to_string(),
            content_hash: "11aa22bb".to_string(),
            language: "markdown".to_string(),
            embedding: vec![0.1; VECTOR_DIM],
        };
        let batch = rows_to_batch(std::slice::from_ref(&record)).unwrap();
        let decoded = doc_record_from_batch(&batch, 0).unwrap();
        assert_eq!(decoded.document_title, "Guide");
        assert_eq!(decoded.start_line_in_doc, 5);
    }

    #[test]
    fn distance_column_absent_returns_none() {
        let batch = rows_to_batch(&[sample_file_record("r1")]).unwrap();
        assert!(get_distance(&batch, 0).is_none());
    }
}
