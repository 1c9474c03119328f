//! Single-file review orchestration.
//!
//! Gathers the three context channels in parallel (historical PR comments,
//! guideline documents, similar code), with each channel isolated: a failed
//! or timed-out channel contributes an empty list and the review proceeds.

use std::path::{Path, PathBuf};

use rev_config::{GeneralConfig, LlmConfig};
use rev_context::retriever::{CodeQuery, DocQuery};
use rev_context::{ContextCaches, DocumentRollup, Retriever, ScoredCode, rollup_documents};
use rev_core::context::ContextTag;
use rev_core::language::{is_documentation_file, is_test_path};
use rev_core::record::DocChunkRecord;
use rev_embeddings::{
    Embedder, MAX_EMBED_CHARS_CODE, MAX_EMBED_CHARS_PR, truncate_for_embedding,
};
use rev_store::{PrHit, VectorStore};

use crate::error::ReviewError;
use crate::llm::{CompletionRequest, LlmClient};
use crate::parse::{ReviewReport, parse_review_response};
use crate::prompt;

/// Comments requested from the PR channel before thresholding.
const PR_COMMENT_LIMIT: usize = 10;

/// One file prepared for review.
#[derive(Debug, Clone)]
pub struct ReviewFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the project root, used in prompts and output.
    pub rel_path: PathBuf,
    pub content: String,
    pub language: String,
}

/// A document pinned into the guideline channel by the user.
#[derive(Debug, Clone)]
pub struct PinnedDoc {
    pub title: String,
    pub path: PathBuf,
}

/// The merged retrieval context for one file.
#[derive(Debug, Default)]
pub struct GatheredContext {
    pub reviewed_context: ContextTag,
    pub code_examples: Vec<ScoredCode>,
    pub guidelines: Vec<DocumentRollup>,
    pub pr_comments: Vec<PrHit>,
}

/// Review result for one file.
#[derive(Debug, Clone)]
pub struct FileReview {
    pub file_path: String,
    pub language: String,
    pub success: bool,
    pub review: ReviewReport,
    pub error: Option<String>,
}

/// Review orchestrator for one project.
pub struct Orchestrator<'a, E: Embedder, L: LlmClient> {
    store: &'a VectorStore,
    embedder: &'a E,
    caches: &'a ContextCaches,
    pub(crate) llm: &'a L,
    pub general: GeneralConfig,
    pub llm_config: LlmConfig,
    pub project_path: String,
    pub pinned_docs: Vec<PinnedDoc>,
}

impl<'a, E: Embedder, L: LlmClient> Orchestrator<'a, E, L> {
    #[must_use]
    pub fn new(
        store: &'a VectorStore,
        embedder: &'a E,
        caches: &'a ContextCaches,
        llm: &'a L,
        general: GeneralConfig,
        llm_config: LlmConfig,
        project_path: String,
    ) -> Self {
        Self {
            store,
            embedder,
            caches,
            llm,
            general,
            llm_config,
            project_path,
            pinned_docs: Vec::new(),
        }
    }

    /// Gather the three context channels for one file. Never fails: each
    /// channel degrades to an empty list on error.
    pub async fn gather_context(&self, file: &ReviewFile) -> GatheredContext {
        let reviewed_context = rev_context::infer_from_code(&file.content, &file.language);
        let is_test = is_test_path(&file.rel_path.to_string_lossy());

        let query_embedding = if file.content.trim().is_empty() {
            None
        } else {
            match self
                .embedder
                .embed_one(truncate_for_embedding(&file.content, MAX_EMBED_CHARS_CODE))
                .await
            {
                Ok(vector) => Some(vector),
                Err(error) => {
                    tracing::warn!(file = %file.rel_path.display(), %error, "query embedding failed");
                    None
                }
            }
        };

        let retriever = Retriever::new(self.store, self.embedder, self.caches);
        let file_path_str = file.path.to_string_lossy().to_string();

        let pr_task = self.pr_comment_channel(file, is_test);
        let guideline_task = self.guideline_channel(&retriever, &reviewed_context, file);
        let code_task = self.code_channel(
            &retriever,
            file,
            &file_path_str,
            is_test,
            query_embedding.as_deref(),
        );

        let (pr_comments, mut guidelines, code_examples) =
            tokio::join!(pr_task, guideline_task, code_task);

        self.inject_pinned_docs(&mut guidelines).await;

        GatheredContext {
            reviewed_context,
            code_examples: self.filter_code_examples(code_examples, &file_path_str),
            guidelines,
            pr_comments,
        }
    }

    /// Channel A: historical PR comments, bounded by the PR deadline.
    async fn pr_comment_channel(&self, file: &ReviewFile, is_test: bool) -> Vec<PrHit> {
        let deadline = std::time::Duration::from_secs(self.general.pr_timeout_secs);
        let search = async {
            let vector = self
                .embedder
                .embed_one(truncate_for_embedding(&file.content, MAX_EMBED_CHARS_PR))
                .await?;
            let hits = self
                .store
                .search_pr_comments(
                    &self.project_path,
                    "",
                    Some(&vector),
                    PR_COMMENT_LIMIT,
                    is_test,
                )
                .await?;
            Ok::<_, ReviewError>(
                hits.into_iter()
                    .filter(|hit| hit.score.similarity() >= self.general.pr_similarity_threshold)
                    .collect::<Vec<_>>(),
            )
        };

        match tokio::time::timeout(deadline, search).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(error)) => {
                tracing::warn!(%error, "PR comment retrieval failed, continuing without");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.general.pr_timeout_secs,
                    "PR comment retrieval timed out, continuing without"
                );
                Vec::new()
            }
        }
    }

    /// Channel B: guideline documents via templated query + rollup.
    async fn guideline_channel(
        &self,
        retriever: &Retriever<'_, E>,
        reviewed_context: &ContextTag,
        file: &ReviewFile,
    ) -> Vec<DocumentRollup> {
        let query = prompt::guideline_query(reviewed_context, &file.language, &file.content);

        let mut opts = DocQuery::new(&self.project_path);
        opts.similarity_threshold = self.general.doc_similarity_threshold;
        opts.candidate_limit = 100;
        opts.limit = 100;
        opts.use_reranking = true;
        opts.query_context = Some(reviewed_context);
        let file_path = file.path.to_string_lossy().to_string();
        opts.query_file_path = Some(&file_path);

        match retriever.find_relevant_docs(&query, &opts).await {
            Ok(chunks) => rollup_documents(&chunks, self.general.max_guideline_docs),
            Err(error) => {
                tracing::warn!(%error, "guideline retrieval failed, continuing without");
                Vec::new()
            }
        }
    }

    /// Channel C: similar code.
    async fn code_channel(
        &self,
        retriever: &Retriever<'_, E>,
        file: &ReviewFile,
        file_path_str: &str,
        is_test: bool,
        query_embedding: Option<&[f32]>,
    ) -> Vec<ScoredCode> {
        let mut opts = CodeQuery::new(&self.project_path);
        opts.similarity_threshold = self.general.code_similarity_threshold;
        opts.candidate_limit = 40;
        opts.limit = 40;
        opts.is_test_file = is_test;
        opts.query_file_path = Some(file_path_str);
        opts.precomputed_query_embedding = query_embedding;

        match retriever.find_similar_code(&file.content, &opts).await {
            Ok(results) => results,
            Err(error) => {
                tracing::warn!(%error, "similar-code retrieval failed, continuing without");
                Vec::new()
            }
        }
    }

    /// Pinned documents enter the guideline channel ahead of retrieval.
    async fn inject_pinned_docs(&self, guidelines: &mut Vec<DocumentRollup>) {
        for pinned in self.pinned_docs.iter().rev() {
            let content = match tokio::fs::read_to_string(&pinned.path).await {
                Ok(content) => content,
                Err(error) => {
                    tracing::warn!(path = %pinned.path.display(), %error, "pinned doc unreadable");
                    continue;
                }
            };
            let record = DocChunkRecord {
                id: format!("pinned:{}", pinned.path.display()),
                project_path: self.project_path.clone(),
                original_document_path: pinned.path.to_string_lossy().to_string(),
                document_title: pinned.title.clone(),
                heading_text: String::new(),
                start_line_in_doc: 1,
                content,
                content_hash: String::new(),
                language: "markdown".to_string(),
                embedding: Vec::new(),
            };
            guidelines.insert(
                0,
                DocumentRollup {
                    document_path: record.original_document_path.clone(),
                    doc_score: 1.0,
                    best_chunk: rev_context::ScoredChunk {
                        similarity: 1.0,
                        final_score: 1.0,
                        doc_context: ContextTag::default(),
                        area_match: rev_context::scorer::AreaMatch::Skipped,
                        tech_overlap: false,
                        h1_relevance: 1.0,
                        penalized: false,
                        record,
                    },
                },
            );
        }
        guidelines.truncate(self.general.max_guideline_docs.max(self.pinned_docs.len()));
    }

    /// Dedup by path, drop the reviewed file and documentation, cap count.
    fn filter_code_examples(
        &self,
        examples: Vec<ScoredCode>,
        reviewed_path: &str,
    ) -> Vec<ScoredCode> {
        let reviewed_canonical = std::fs::canonicalize(reviewed_path)
            .map_or_else(|_| PathBuf::from(reviewed_path), |p| p);

        let mut seen = std::collections::HashSet::new();
        let mut kept = Vec::new();
        for example in examples {
            let path = example.record.path.clone();
            if !seen.insert(path.clone()) {
                continue;
            }
            let candidate_canonical = std::fs::canonicalize(&path)
                .map_or_else(|_| PathBuf::from(&path), |p| p);
            if candidate_canonical == reviewed_canonical {
                continue;
            }
            if is_documentation_file(Path::new(&path)) {
                continue;
            }
            kept.push(example);
            if kept.len() >= self.general.max_examples {
                break;
            }
        }
        kept
    }

    /// Run the full review for one file.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError`] when the LLM call fails; retrieval failures
    /// never propagate.
    pub async fn review_file(&self, file: &ReviewFile) -> Result<FileReview, ReviewError> {
        let context = self.gather_context(file).await;
        let sections = prompt::context_sections(
            &context.code_examples,
            &context.guidelines,
            &context.pr_comments,
        );
        let request = CompletionRequest {
            prompt: prompt::single_file_prompt(
                &file.rel_path.to_string_lossy(),
                &file.language,
                &file.content,
                &sections,
            ),
            model: self.llm_config.model.clone(),
            temperature: 0.0,
            max_tokens: self.llm_config.max_tokens,
            json_mode: true,
        };

        let completion = self.llm.complete(request).await?;
        let review = parse_review_response(&completion.content);

        Ok(FileReview {
            file_path: file.rel_path.to_string_lossy().to_string(),
            language: file.language.clone(),
            success: true,
            review,
            error: None,
        })
    }
}

/// Keep the highest-similarity hit per key. Shared by the multi-file merge.
pub(crate) fn dedup_max_by<T, K, FK, FS>(items: Vec<T>, key: FK, score: FS) -> Vec<T>
where
    K: std::hash::Hash + Eq,
    FK: Fn(&T) -> K,
    FS: Fn(&T) -> f64,
{
    let mut best: std::collections::HashMap<K, T> = std::collections::HashMap::new();
    for item in items {
        let k = key(&item);
        match best.get(&k) {
            Some(existing) if score(existing) >= score(&item) => {}
            _ => {
                best.insert(k, item);
            }
        }
    }
    let mut out: Vec<T> = best.into_values().collect();
    out.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

/// Build a [`PrHit`]-shaped constant for tests and pinned data.
#[cfg(test)]
pub(crate) fn synthetic_pr_hit(id: &str, file_path: &str, similarity: f64) -> PrHit {
    PrHit {
        record: rev_core::record::PrCommentRecord {
            id: id.to_string(),
            project_path: "/repo".to_string(),
            repository: "acme/widgets".to_string(),
            pr_number: 1,
            author: "r".to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
            file_path: file_path.to_string(),
            body: "watch out".to_string(),
            comment_type: "review".to_string(),
            matched_chunk: String::new(),
            embedding: Vec::new(),
        },
        score: rev_store::HitScore {
            distance: Some(1.0 - similarity),
            score: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rev_core::VECTOR_DIM;
    use rev_core::record::{FileRecord, RecordKind};
    use rev_embeddings::EmbeddingError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeEmbedder;

    fn synthetic(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; VECTOR_DIM];
        for (i, byte) in text.bytes().enumerate() {
            v[i % VECTOR_DIM] += f32::from(byte) / 255.0;
        }
        v
    }

    impl Embedder for FakeEmbedder {
        async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(synthetic(text))
        }

        async fn embed_batch(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
            Ok(texts.iter().map(|t| Some(synthetic(t))).collect())
        }
    }

    /// Scripted LLM: returns queued responses, records prompts.
    struct ScriptedLlm {
        responses: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<crate::llm::Completion, ReviewError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().pop();
            next.map_or_else(
                || Err(ReviewError::Llm("script exhausted".to_string())),
                |content| {
                    Ok(crate::llm::Completion {
                        content,
                        model: "scripted".to_string(),
                        input_tokens: 0,
                        output_tokens: 0,
                    })
                },
            )
        }
    }

    fn code_record(project: &str, path: &str, content: &str) -> FileRecord {
        FileRecord {
            id: rev_core::hash::record_id(&[project, path, "code"]),
            project_path: project.to_string(),
            path: path.to_string(),
            content: content.to_string(),
            language: "javascript".to_string(),
            content_hash: rev_core::hash::content_hash(content),
            last_modified: "2026-01-01T00:00:00Z".to_string(),
            record_type: RecordKind::Code.as_str().to_string(),
            embedding: synthetic(content),
        }
    }

    fn review_file(rel: &str, content: &str) -> ReviewFile {
        ReviewFile {
            path: PathBuf::from("/repo").join(rel),
            rel_path: PathBuf::from(rel),
            content: content.to_string(),
            language: "javascript".to_string(),
        }
    }

    async fn orchestrator_fixture(
        store: &VectorStore,
        embedder: &FakeEmbedder,
        caches: &ContextCaches,
        llm: &ScriptedLlm,
    ) -> Orchestrator<'_, FakeEmbedder, ScriptedLlm> {
        Orchestrator::new(
            store,
            embedder,
            caches,
            llm,
            GeneralConfig::default(),
            LlmConfig::default(),
            "/repo".to_string(),
        )
    }

    #[tokio::test]
    async fn empty_stores_still_produce_a_review() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(tmp.path()).await.unwrap();
        let embedder = FakeEmbedder;
        let caches = ContextCaches::new();
        let llm = ScriptedLlm::new(vec![r#"{"summary": "fine", "issues": []}"#]);
        let orchestrator = orchestrator_fixture(&store, &embedder, &caches, &llm).await;

        let review = orchestrator
            .review_file(&review_file("src/a.js", "function a() {}"))
            .await
            .unwrap();

        assert!(review.success);
        assert_eq!(review.review.summary, "fine");
    }

    #[tokio::test]
    async fn failing_pr_channel_does_not_sink_the_review() {
        // No PR table was ever created: the channel hits TableMissing and
        // must degrade to an empty list while code examples still flow.
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(tmp.path()).await.unwrap();
        store
            .upsert_files(&[code_record("/repo", "/repo/src/other.js", "function other() {}")])
            .await
            .unwrap();

        let embedder = FakeEmbedder;
        let caches = ContextCaches::new();
        let llm = ScriptedLlm::new(vec![]);
        let mut orchestrator = orchestrator_fixture(&store, &embedder, &caches, &llm).await;
        orchestrator.general.code_similarity_threshold = 0.0;

        let context = orchestrator
            .gather_context(&review_file("src/a.js", "function a() {}"))
            .await;

        assert!(context.pr_comments.is_empty());
        assert!(!context.code_examples.is_empty());
    }

    #[tokio::test]
    async fn reviewed_file_is_filtered_from_examples() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(tmp.path()).await.unwrap();
        store
            .upsert_files(&[
                code_record("/repo", "/repo/src/a.js", "function a() {}"),
                code_record("/repo", "/repo/src/b.js", "function b() {}"),
            ])
            .await
            .unwrap();

        let embedder = FakeEmbedder;
        let caches = ContextCaches::new();
        let llm = ScriptedLlm::new(vec![]);
        let mut orchestrator = orchestrator_fixture(&store, &embedder, &caches, &llm).await;
        orchestrator.general.code_similarity_threshold = 0.0;

        let context = orchestrator
            .gather_context(&review_file("src/a.js", "function a() {}"))
            .await;

        assert!(
            context
                .code_examples
                .iter()
                .all(|e| e.record.path != "/repo/src/a.js")
        );
    }

    #[tokio::test]
    async fn llm_failure_surfaces_as_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(tmp.path()).await.unwrap();
        let embedder = FakeEmbedder;
        let caches = ContextCaches::new();
        let llm = ScriptedLlm::new(vec![]);
        let orchestrator = orchestrator_fixture(&store, &embedder, &caches, &llm).await;

        let err = orchestrator
            .review_file(&review_file("src/a.js", "function a() {}"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::Llm(_)));
    }

    #[test]
    fn dedup_keeps_highest_score() {
        let hits = vec![
            synthetic_pr_hit("c1", "src/a.ts", 0.4),
            synthetic_pr_hit("c1", "src/a.ts", 0.9),
            synthetic_pr_hit("c2", "src/b.ts", 0.5),
        ];
        let deduped = dedup_max_by(
            hits,
            |h| format!("{}\u{0}{}", h.record.id, h.record.file_path),
            |h| h.score.similarity(),
        );
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].record.id, "c1");
        assert!((deduped[0].score.similarity() - 0.9).abs() < 1e-9);
    }
}
