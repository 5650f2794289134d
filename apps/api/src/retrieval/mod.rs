//! Context retriever. Grounds continuation turns in opportunity material.
//!
//! The index is populated lazily: a miss triggers one `index()` of the
//! opportunity's documents and extra context, then one more `retrieve()`.

pub mod chunking;
pub mod documents;
pub mod index;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::llm_client::embeddings::Embedder;
use crate::models::opportunity::OpportunityContext;
use chunking::{split_text, ChunkConfig};
use documents::DocumentSource;
use index::{IndexedPassage, VectorIndex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedPassage {
    pub content: String,
    pub opportunity_id: String,
}

pub struct ContextRetriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    documents: Arc<dyn DocumentSource>,
    top_k: usize,
    chunk: ChunkConfig,
}

impl ContextRetriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        documents: Arc<dyn DocumentSource>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            documents,
            top_k: top_k.max(1),
            chunk: ChunkConfig::default(),
        }
    }

    /// Passages relevant to `query` for one opportunity, newline-joined.
    /// Empty string when nothing matches.
    pub async fn retrieve(&self, query: &str, opportunity_id: &str) -> Result<String, AppError> {
        if query.trim().is_empty() {
            return Ok(String::new());
        }

        let embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| AppError::Retrieval(e.to_string()))?
            .pop()
            .ok_or_else(|| AppError::Retrieval("Embedding service returned no vector".to_string()))?;

        let passages = self
            .index
            .search(opportunity_id, &embedding, self.top_k)
            .await?;

        // The index filters by opportunity too; this is the line that guarantees it.
        let total = passages.len();
        let scoped: Vec<String> = passages
            .into_iter()
            .filter(|p| p.opportunity_id == opportunity_id)
            .map(|p| p.content)
            .collect();
        if scoped.len() != total {
            warn!(
                "Dropped {} passages from other opportunities for {opportunity_id}",
                total - scoped.len()
            );
        }

        debug!("Retrieved {} passages for opportunity {opportunity_id}", scoped.len());
        Ok(scoped.join("\n"))
    }

    /// Fetches, chunks, embeds and upserts the opportunity material.
    /// A document that fails to load is skipped; the rest are still indexed.
    /// Returns the number of passages written.
    pub async fn index(
        &self,
        documents: &[String],
        extra_context: &str,
        opportunity_id: &str,
    ) -> Result<usize, AppError> {
        let mut texts = Vec::with_capacity(documents.len() + 1);
        if !extra_context.trim().is_empty() {
            texts.push(extra_context.to_string());
        }
        for reference in documents {
            match self.documents.fetch_text(reference).await {
                Ok(text) => texts.push(text),
                Err(e) => warn!("Skipping document {reference} for {opportunity_id}: {e}"),
            }
        }

        let chunks: Vec<String> = texts
            .iter()
            .flat_map(|text| split_text(text, self.chunk))
            .collect();
        if chunks.is_empty() {
            return Ok(0);
        }

        let embeddings = self
            .embedder
            .embed(&chunks)
            .await
            .map_err(|e| AppError::Retrieval(e.to_string()))?;
        let passages: Vec<IndexedPassage> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(content, embedding)| IndexedPassage { content, embedding })
            .collect();

        self.index.upsert(opportunity_id, &passages).await?;
        info!("Indexed {} passages for opportunity {opportunity_id}", passages.len());
        Ok(passages.len())
    }

    /// `retrieve`, and on an empty result index the opportunity once and retry once.
    pub async fn retrieve_or_index(
        &self,
        query: &str,
        opportunity: &OpportunityContext,
    ) -> Result<String, AppError> {
        let context = self.retrieve(query, &opportunity.id).await?;
        if !context.is_empty() || query.trim().is_empty() {
            return Ok(context);
        }

        info!("Retrieval miss for {}, indexing on demand", opportunity.id);
        let written = self
            .index(
                &opportunity.documents,
                &opportunity.indexable_text(),
                &opportunity.id,
            )
            .await?;
        if written == 0 {
            return Ok(String::new());
        }
        self.retrieve(query, &opportunity.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        sample_opportunity, HashEmbedder, LeakyVectorIndex, MemoryVectorIndex, StaticDocuments,
    };

    fn retriever(index: Arc<dyn VectorIndex>, documents: StaticDocuments) -> ContextRetriever {
        ContextRetriever::new(index, Arc::new(HashEmbedder), Arc::new(documents), 4)
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty_string() {
        let retriever = retriever(Arc::new(MemoryVectorIndex::default()), StaticDocuments::default());
        assert_eq!(retriever.retrieve("salary", "opp-1").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_passages_never_leak_across_opportunities() {
        let index = Arc::new(MemoryVectorIndex::default());
        let retriever = retriever(index.clone(), StaticDocuments::default());
        retriever
            .index(&[], "The salary band for the Lisbon role is generous", "opp-a")
            .await
            .unwrap();
        retriever
            .index(&[], "The salary for the Berlin role is modest", "opp-b")
            .await
            .unwrap();

        let context = retriever.retrieve("salary", "opp-a").await.unwrap();
        assert!(context.contains("Lisbon"));
        assert!(!context.contains("Berlin"));
    }

    #[tokio::test]
    async fn test_foreign_passages_from_index_are_filtered() {
        let leaky = Arc::new(LeakyVectorIndex::new(vec![
            RetrievedPassage {
                content: "ours".to_string(),
                opportunity_id: "opp-a".to_string(),
            },
            RetrievedPassage {
                content: "theirs".to_string(),
                opportunity_id: "opp-b".to_string(),
            },
        ]));
        let retriever = retriever(leaky, StaticDocuments::default());

        assert_eq!(retriever.retrieve("anything", "opp-a").await.unwrap(), "ours");
    }

    #[tokio::test]
    async fn test_failing_document_does_not_abort_indexing() {
        let documents = StaticDocuments::default()
            .with("docs/good.txt", "Benefits include remote work")
            .failing("docs/broken.pdf");
        let retriever = retriever(Arc::new(MemoryVectorIndex::default()), documents);

        let written = retriever
            .index(
                &["docs/broken.pdf".to_string(), "docs/good.txt".to_string()],
                "",
                "opp-1",
            )
            .await
            .unwrap();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_miss_triggers_single_lazy_index() {
        let index = Arc::new(MemoryVectorIndex::default());
        let retriever = retriever(index.clone(), StaticDocuments::default());
        let mut opportunity = sample_opportunity("opp-1");
        opportunity.more_context = "The team works remotely from Lisbon".to_string();

        let context = retriever
            .retrieve_or_index("Is the team remote?", &opportunity)
            .await
            .unwrap();
        assert!(context.contains("remotely"));
        assert_eq!(index.upsert_count(), 1);

        // Second query hits the populated index.
        retriever
            .retrieve_or_index("Where is the team?", &opportunity)
            .await
            .unwrap();
        assert_eq!(index.upsert_count(), 1);
    }
}
