/// Bounds for splitting long text into indexable passages, in characters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Splits `text` into chunks of at most `chunk_size` characters with `overlap`
/// characters shared between neighbours. A chunk ends on whitespace when one
/// exists in its second half, so words are rarely cut.
pub fn split_text(text: &str, config: ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = text.trim().chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let size = config.chunk_size.max(1);
    let overlap = config.overlap.min(size.saturating_sub(1));
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            let floor = start + size / 2;
            if let Some(space) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = space;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= chars.len() {
            break;
        }
        // Always move forward, even if the overlap would swallow the whole step.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}
