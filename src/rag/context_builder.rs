//! Grounding prompt assembly.
//!
//! Formats retrieved chunks into a numbered, cited context block and wraps it
//! with the answering instructions and the question.

use super::chunker::Chunk;

const INSTRUCTIONS: &str = "Use the following pieces of context to answer the question.\n\
If you don't know the answer, say you don't know. Do not make up an answer.\n\
Only use information from the context.\n\
Always cite the document/source.";

/// Citation tag for a chunk, e.g. `Source: manual.pdf, page 3`.
pub fn citation(chunk: &Chunk) -> String {
    match chunk.page {
        Some(page) => format!("Source: {}, page {}", chunk.source, page),
        None => format!("Source: {}", chunk.source),
    }
}

/// Context block: `[n] (citation)` followed by the chunk text, in retrieval order.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}] ({})\n{}", i + 1, citation(chunk), chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(question: &str, chunks: &[Chunk]) -> String {
    format!(
        "{}\n\nContext:\n{}\n\nQuestion:\n{}\n\nAnswer:",
        INSTRUCTIONS,
        format_context(chunks),
        question.trim()
    )
}
