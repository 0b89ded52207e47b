//! Document chunking and deterministic indexing.
//!
//! Converts a parsed graph into a Markdown document, splits it into
//! heading-scoped chunks, and upserts the resulting records in batches.
//!
//! Record identifiers are a pure function of `(task_id, chunk_index)`
//! (UUIDv5 over the URL namespace), so re-dispatching a failed ingestion
//! under the same task identifier overwrites in place instead of
//! duplicating.

use anyhow::Result;
use uuid::Uuid;
use tracing::info;

use crate::chunk::split_by_headers;
use crate::graph::{to_markdown, RdfGraph};
use crate::models::ChunkRecord;
use crate::store::VectorStore;

/// Records per upsert request; bounds memory and request size.
const BATCH_SIZE: usize = 100;

/// Deterministic identifier for one chunk of one ingestion task.
pub fn chunk_record_id(task_id: &str, chunk_index: i64) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("{task_id}-{chunk_index}").as_bytes(),
    )
    .to_string()
}

/// Convert, chunk, and index a parsed graph. Returns the chunk count.
///
/// Idempotent for a fixed `task_id`. Conversion or splitting failures
/// abort the run; no partial batches are retried here.
pub async fn index_graph(
    store: &dyn VectorStore,
    graph: &RdfGraph,
    ontology_id: &str,
    version: &str,
    metadata: &serde_json::Value,
    task_id: &str,
) -> Result<usize> {
    info!(ontology_id, "converting ontology graph to Markdown");
    let document = to_markdown(graph);

    let chunks = split_by_headers(&document);
    info!(ontology_id, chunks = chunks.len(), "split document into chunks");

    let records: Vec<ChunkRecord> = chunks
        .iter()
        .map(|chunk| ChunkRecord {
            id: chunk_record_id(task_id, chunk.chunk_index),
            content: chunk.text.clone(),
            ontology_id: ontology_id.to_string(),
            version: version.to_string(),
            header: chunk.headers.primary().to_string(),
            metadata: metadata.clone(),
        })
        .collect();

    for batch in records.chunks(BATCH_SIZE) {
        store.upsert_batch(batch).await?;
    }

    info!(ontology_id, indexed = records.len(), "batch indexing complete");
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Object, Term, Triple, RDFS_COMMENT, RDFS_LABEL, RDF_TYPE, OWL_CLASS};
    use crate::store::MemoryVectorStore;

    fn class_graph(names: &[&str]) -> RdfGraph {
        let mut graph = RdfGraph::default();
        for name in names {
            let iri = format!("http://example.org/{name}");
            graph.triples.push(Triple {
                subject: Term::Iri(iri.clone()),
                predicate: RDF_TYPE.to_string(),
                object: Object::Node(Term::Iri(OWL_CLASS.to_string())),
            });
            graph.triples.push(Triple {
                subject: Term::Iri(iri.clone()),
                predicate: RDFS_LABEL.to_string(),
                object: Object::Literal(crate::graph::Literal {
                    lexical: name.to_string(),
                    datatype: None,
                    language: None,
                }),
            });
            graph.triples.push(Triple {
                subject: Term::Iri(iri),
                predicate: RDFS_COMMENT.to_string(),
                object: Object::Literal(crate::graph::Literal {
                    lexical: format!("About {name}."),
                    datatype: None,
                    language: None,
                }),
            });
        }
        graph
    }

    #[test]
    fn test_identifier_is_deterministic() {
        assert_eq!(chunk_record_id("task-1", 0), chunk_record_id("task-1", 0));
        assert_ne!(chunk_record_id("task-1", 0), chunk_record_id("task-1", 1));
        assert_ne!(chunk_record_id("task-1", 0), chunk_record_id("task-2", 0));
    }

    #[tokio::test]
    async fn test_reindex_same_task_does_not_duplicate() {
        let store = MemoryVectorStore::new();
        let graph = class_graph(&["Alloy", "Metal"]);
        let meta = serde_json::json!({"source": "test"});

        let first = index_graph(&store, &graph, "MAT", "1.0", &meta, "task-1")
            .await
            .unwrap();
        let second = index_graph(&store, &graph, "MAT", "1.0", &meta, "task-1")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.record_count(), first);
    }

    #[tokio::test]
    async fn test_different_task_produces_new_identifiers() {
        let store = MemoryVectorStore::new();
        let graph = class_graph(&["Alloy"]);
        let meta = serde_json::Value::Null;

        let count = index_graph(&store, &graph, "MAT", "1.0", &meta, "task-1")
            .await
            .unwrap();
        index_graph(&store, &graph, "MAT", "1.0", &meta, "task-2")
            .await
            .unwrap();

        assert_eq!(store.record_count(), count * 2);
    }

    #[tokio::test]
    async fn test_records_carry_header_and_metadata() {
        let store = MemoryVectorStore::new();
        let graph = class_graph(&["Alloy"]);
        let meta = serde_json::json!({"acronym": "MAT"});

        index_graph(&store, &graph, "MAT", "2.1", &meta, "task-9")
            .await
            .unwrap();

        let records = store.records_for("MAT");
        assert!(!records.is_empty());
        for record in &records {
            assert_eq!(record.version, "2.1");
            assert_eq!(record.metadata, meta);
            assert!(!record.header.is_empty(), "header context missing");
        }
    }
}
