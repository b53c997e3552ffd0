//! Corpus chunking.
//!
//! Two strategies: fixed-size character windows that prefer whitespace
//! boundaries, and semantic chunking that cuts where consecutive sentence
//! windows drift apart in embedding space.

use tracing::debug;

use super::embedding::{cosine_similarity, Embedder};
use super::IndexError;

/// How the corpus is cut into retrievable chunks.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkStrategy {
    /// Cut where the distance between neighbouring sentence windows exceeds
    /// this percentile of all such distances.
    Semantic { breakpoint_percentile: f32 },
    /// Character windows of `chunk_size`, overlapping by `chunk_overlap`.
    FixedSize {
        chunk_size: usize,
        chunk_overlap: usize,
    },
}

/// Chunk `corpus` with `strategy`. Fails on an empty corpus.
pub async fn chunk_corpus(
    corpus: &str,
    strategy: &ChunkStrategy,
    embedder: &dyn Embedder,
) -> Result<Vec<String>, IndexError> {
    if corpus.trim().is_empty() {
        return Err(IndexError::EmptyCorpus);
    }

    let chunks = match strategy {
        ChunkStrategy::FixedSize {
            chunk_size,
            chunk_overlap,
        } => {
            if *chunk_size == 0 || chunk_overlap >= chunk_size {
                return Err(IndexError::InvalidConfig(format!(
                    "chunk_overlap ({}) must be smaller than chunk_size ({})",
                    chunk_overlap, chunk_size
                )));
            }
            split_fixed(corpus, *chunk_size, *chunk_overlap)
        }
        ChunkStrategy::Semantic {
            breakpoint_percentile,
        } => split_semantic(corpus, *breakpoint_percentile, embedder).await?,
    };

    debug!("Chunked corpus into {} chunks", chunks.len());
    Ok(chunks)
}

/// Find the nearest char boundary at or before `pos`.
fn safe_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut p = pos;
    while p > 0 && !text.is_char_boundary(p) {
        p -= 1;
    }
    p
}

/// Prefer ending a window just after whitespace within 50 bytes of `pos`.
fn word_boundary(text: &str, start: usize, pos: usize) -> usize {
    let safe_pos = safe_boundary(text, pos);
    let search_start = safe_boundary(text, safe_pos.saturating_sub(50)).max(start);
    match text[search_start..safe_pos].rfind(char::is_whitespace) {
        Some(ws) if search_start + ws + 1 > start => search_start + ws + 1,
        _ => safe_pos,
    }
}

/// Start of the window after `[pos, end)`: `overlap` characters back from
/// `end`, moved forward to the next word start. Never past `end`, always
/// after `pos`.
fn next_start(text: &str, pos: usize, end: usize, overlap: usize) -> usize {
    let mut start = match overlap {
        0 => end,
        n => text[..end]
            .char_indices()
            .rev()
            .nth(n - 1)
            .map_or(0, |(i, _)| i),
    };
    if start <= pos {
        start = text[pos..]
            .chars()
            .next()
            .map_or(end, |c| pos + c.len_utf8());
    }

    let mid_word = text[..start]
        .chars()
        .next_back()
        .is_some_and(|c| !c.is_whitespace())
        && text[start..].chars().next().is_some_and(|c| !c.is_whitespace());
    if mid_word && start < end {
        start = text[start..end]
            .find(char::is_whitespace)
            .map_or(end, |ws| start + ws);
    }
    start.min(end)
}

/// Fixed-size windows measured in characters.
///
/// Consecutive windows share up to `overlap` characters, rounded to whole
/// words, and together cover every character of `text`.
pub fn split_fixed(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let len = text.len();
    let mut pos = 0;

    while pos < len {
        let end = match text[pos..].char_indices().nth(chunk_size) {
            Some((idx, _)) => word_boundary(text, pos, pos + idx),
            None => len,
        };

        let chunk = text[pos..end].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        if end == len {
            break;
        }

        pos = next_start(text, pos, end, overlap);
    }
    chunks
}

/// Split after `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(_, next)) = chars.peek() {
                if next.is_whitespace() {
                    let end = i + c.len_utf8();
                    let sentence = text[start..end].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence.to_string());
                    }
                    start = end;
                }
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Linear-interpolated percentile of `values` (`p` in 0-100).
fn percentile(values: &[f32], p: f32) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f32)
}

async fn split_semantic(
    text: &str,
    breakpoint_percentile: f32,
    embedder: &dyn Embedder,
) -> Result<Vec<String>, IndexError> {
    let sentences = split_sentences(text);
    if sentences.len() < 2 {
        return Ok(sentences);
    }

    // Each sentence is embedded together with its immediate neighbours.
    let windows: Vec<String> = (0..sentences.len())
        .map(|i| {
            let from = i.saturating_sub(1);
            let to = (i + 2).min(sentences.len());
            sentences[from..to].join(" ")
        })
        .collect();

    let vectors = embedder.embed(&windows).await?;
    if vectors.len() != windows.len() {
        return Err(IndexError::Embedding(format!(
            "expected {} embeddings, got {}",
            windows.len(),
            vectors.len()
        )));
    }

    let distances: Vec<f32> = vectors
        .windows(2)
        .map(|pair| 1.0 - cosine_similarity(&pair[0], &pair[1]))
        .collect();
    let threshold = percentile(&distances, breakpoint_percentile);

    let mut chunks = Vec::new();
    let mut start = 0;
    for (i, distance) in distances.iter().enumerate() {
        if *distance > threshold {
            chunks.push(sentences[start..=i].join(" "));
            start = i + 1;
        }
    }
    chunks.push(sentences[start..].join(" "));
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Two-topic embedder: counts of "cat" and "tax".
    struct TopicEmbedder;

    #[async_trait]
    impl Embedder for TopicEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
            Ok(inputs
                .iter()
                .map(|s| {
                    vec![
                        s.matches("cat").count() as f32,
                        s.matches("tax").count() as f32,
                    ]
                })
                .collect())
        }
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("I woke up. Was it late? Yes!  Then v1.2 shipped"),
            ["I woke up.", "Was it late?", "Yes!", "Then v1.2 shipped"]
        );
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_split_fixed_respects_size_and_overlap() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = split_fixed(text, 20, 5);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks.first().map(String::as_str), Some("one two three four"));
        assert!(chunks.last().unwrap().ends_with("ten"));
    }

    #[test]
    fn test_split_fixed_keeps_every_word() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi \
                    omicron pi rho sigma tau upsilon phi chi psi omega";
        let words: Vec<&str> = text.split_whitespace().collect();

        for (size, overlap) in [(30, 5), (40, 0), (25, 10), (12, 11)] {
            let chunks = split_fixed(text, size, overlap);
            for word in &words {
                assert!(
                    chunks
                        .iter()
                        .any(|c| c.split_whitespace().any(|w| w == *word)),
                    "{} lost with size {} overlap {}: {:?}",
                    word,
                    size,
                    overlap,
                    chunks
                );
            }
            for chunk in &chunks {
                let first = chunk.split_whitespace().next().unwrap();
                assert!(words.contains(&first), "chunk starts mid-word: {:?}", chunk);
            }
        }
    }

    #[test]
    fn test_split_fixed_overlap_repeats_whole_words() {
        let chunks = split_fixed("one two three four five six seven eight nine ten", 20, 5);
        assert_eq!(chunks[0], "one two three four");
        assert!(chunks[1].starts_with("four "));
    }

    #[test]
    fn test_split_fixed_short_text_is_one_chunk() {
        assert_eq!(split_fixed("short entry", 300, 100), ["short entry"]);
    }

    #[test]
    fn test_split_fixed_multibyte() {
        let text = "é".repeat(50);
        let chunks = split_fixed(&text, 20, 5);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert!(chunks.concat().chars().count() >= 50);
    }

    #[test]
    fn test_percentile() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 50.0), 2.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!((percentile(&values, 95.0) - 3.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_semantic_cuts_at_topic_change() {
        let corpus = "My cat slept. The cat purred. A cat meowed. I filed tax forms. The tax was due. More tax today.";
        let chunks = chunk_corpus(
            corpus,
            &ChunkStrategy::Semantic {
                breakpoint_percentile: 50.0,
            },
            &TopicEmbedder,
        )
        .await
        .unwrap();
        assert_eq!(
            chunks,
            [
                "My cat slept. The cat purred. A cat meowed.",
                "I filed tax forms. The tax was due. More tax today."
            ]
        );
    }

    #[tokio::test]
    async fn test_single_sentence_is_one_chunk() {
        let chunks = chunk_corpus(
            "Only one thought",
            &ChunkStrategy::Semantic {
                breakpoint_percentile: 95.0,
            },
            &TopicEmbedder,
        )
        .await
        .unwrap();
        assert_eq!(chunks, ["Only one thought"]);
    }

    #[tokio::test]
    async fn test_empty_corpus_rejected() {
        let err = chunk_corpus(
            "  \n ",
            &ChunkStrategy::FixedSize {
                chunk_size: 10,
                chunk_overlap: 2,
            },
            &TopicEmbedder,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IndexError::EmptyCorpus));
    }
}
