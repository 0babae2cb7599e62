//! Chunking of serialized page content
//!
//! Pages are stored as JSON; chunk boundaries are the configured delimiter
//! (`|` by default). Content without the delimiter is a single chunk.

/// Split `content` on `delimiter` after trimming, dropping empty segments.
///
/// Segments are not trimmed individually, so whitespace-only segments survive
/// as chunks.
pub fn split_chunks(content: &str, delimiter: &str) -> Vec<String> {
    let trimmed = content.trim();
    if delimiter.is_empty() {
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    trimmed
        .split(delimiter)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}
