//! Boundary math and deterministic fallback text for summary generation

use crate::config::{Locale, SummaryConfig};
use crate::memory::ChatRole;
use crate::memory_db::{SeqRange, StoredSummary};
use crate::utils::TextUtils;

/// Chunk ranges that became eligible since `previous_end`.
///
/// The last `chunk_reserve` messages are never chunked. Ranges start right
/// after `previous_end`, are exactly `chunk_size` long and stop at the last
/// range that ends at or before `total_messages - chunk_reserve`.
pub fn calculate_chunk_boundaries(
    total_messages: i64,
    previous_end: i64,
    chunk_size: usize,
    chunk_reserve: usize,
) -> Vec<SeqRange> {
    let chunk = chunk_size as i64;
    if chunk == 0 {
        return Vec::new();
    }

    let latest_chunk_end = total_messages - chunk_reserve as i64;
    if latest_chunk_end < chunk || latest_chunk_end <= previous_end {
        return Vec::new();
    }

    let mut boundaries = Vec::new();
    let mut next_chunk_end = (previous_end + chunk).max(chunk);
    while next_chunk_end <= latest_chunk_end {
        boundaries.push(SeqRange::new(next_chunk_end - chunk + 1, next_chunk_end));
        next_chunk_end += chunk;
    }
    boundaries
}

impl SummaryConfig {
    pub fn chunk_boundaries(&self, total_messages: i64, previous_end: i64) -> Vec<SeqRange> {
        calculate_chunk_boundaries(total_messages, previous_end, self.chunk_size, self.chunk_reserve)
    }
}

/// True when every range starts right after the previous one ends.
pub fn are_chunks_sequential<I>(ranges: I) -> bool
where
    I: IntoIterator<Item = SeqRange>,
{
    let mut previous: Option<SeqRange> = None;
    for range in ranges {
        if let Some(prev) = previous {
            if range.start != prev.end + 1 {
                return false;
            }
        }
        previous = Some(range);
    }
    true
}

/// A message line as it is handed to the summarizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub role: ChatRole,
    pub content: String,
}

/// `USER: ...` / `ASSISTANT: ...` transcript, one message per line.
pub fn format_transcript(lines: &[TranscriptLine]) -> String {
    lines
        .iter()
        .map(|line| format!("{}: {}", line.role.as_str().to_uppercase(), line.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Digest of the chunk's last few messages, used when generation fails.
pub fn build_chunk_fallback_summary(lines: &[TranscriptLine], config: &SummaryConfig) -> String {
    let skip = lines.len().saturating_sub(config.fallback_recent_messages);
    let highlights: Vec<String> = lines[skip..]
        .iter()
        .map(|line| {
            let content = TextUtils::normalize_whitespace(&line.content);
            format!(
                "{}: {}",
                config.locale.speaker(line.role),
                TextUtils::truncate_with_ellipsis(&content, config.fallback_message_chars)
            )
        })
        .collect();

    let summary = format!(
        "{}\n- {}",
        config.locale.chunk_fallback_marker(),
        highlights.join("\n- ")
    );
    TextUtils::truncate_with_ellipsis(&summary, config.fallback_char_limit).into_owned()
}

/// Range-by-range excerpt of the chunk summaries, used when meta generation fails.
pub fn build_meta_fallback_summary(chunks: &[StoredSummary], config: &SummaryConfig) -> String {
    let lines: Vec<String> = chunks
        .iter()
        .map(|chunk| {
            format!(
                "[{}-{}] {}",
                chunk.start_seq,
                chunk.end_seq,
                TextUtils::truncate_with_ellipsis(&chunk.summary, config.fallback_chunk_chars)
            )
        })
        .collect();

    let summary = format!("{}\n{}", config.locale.meta_fallback_marker(), lines.join("\n"));
    TextUtils::truncate_with_ellipsis(&summary, config.fallback_char_limit).into_owned()
}

/// Fallback marker for a locale; present at the start of every fallback summary.
pub fn is_fallback_summary(text: &str, locale: Locale) -> bool {
    text.starts_with(locale.chunk_fallback_marker()) || text.starts_with(locale.meta_fallback_marker())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_db::SummaryLevel;
    use chrono::Utc;

    const CONTEXT_WINDOW: i64 = 20;
    const CHUNK_SIZE: i64 = 10;

    /// Reserve only one chunk's worth of trailing messages.
    fn chunk_ahead() -> SummaryConfig {
        SummaryConfig { chunk_reserve: CHUNK_SIZE as usize, ..Default::default() }
    }

    fn ranges(config: &SummaryConfig, total: i64, previous_end: i64) -> Vec<(i64, i64)> {
        config
            .chunk_boundaries(total, previous_end)
            .into_iter()
            .map(|range| (range.start, range.end))
            .collect()
    }

    #[test]
    fn test_default_keeps_context_window_unchunked() {
        let config = SummaryConfig::default();

        assert!(ranges(&config, CONTEXT_WINDOW, 0).is_empty());
        assert_eq!(ranges(&config, 30, 0), vec![(1, 10)]);
        assert_eq!(ranges(&config, 40, 0), vec![(1, 10), (11, 20)]);
        assert!(ranges(&config, 39, 10).is_empty());
        assert!(ranges(&config, 39, 20).is_empty());
    }

    #[test]
    fn test_default_never_reaches_into_window() {
        let config = SummaryConfig::default();
        for total in 0..=300 {
            let mut previous_end = 0;
            loop {
                let new = config.chunk_boundaries(total, previous_end);
                let Some(last) = new.last() else { break };
                assert!(
                    last.end <= total - CONTEXT_WINDOW,
                    "chunk {}-{} overlaps the last {} of {} messages",
                    last.start,
                    last.end,
                    CONTEXT_WINDOW,
                    total
                );
                previous_end = last.end;
            }
        }
    }

    #[test]
    fn test_chunk_ahead_first_chunk_at_trigger_point() {
        assert_eq!(ranges(&chunk_ahead(), CONTEXT_WINDOW, 0), vec![(1, 10)]);
    }

    #[test]
    fn test_below_trigger_point_emits_nothing() {
        assert!(ranges(&chunk_ahead(), 19, 0).is_empty());
        assert!(ranges(&chunk_ahead(), 0, 0).is_empty());
        assert!(ranges(&SummaryConfig::default(), 29, 0).is_empty());
    }

    #[test]
    fn test_chunk_ahead_sequential_ranges_up_to_cutoff() {
        assert_eq!(
            ranges(&chunk_ahead(), CONTEXT_WINDOW + CHUNK_SIZE * 2, 0),
            vec![(1, 10), (11, 20), (21, 30)]
        );
    }

    #[test]
    fn test_respects_previously_summarized_range() {
        let config = chunk_ahead();
        assert_eq!(ranges(&config, CONTEXT_WINDOW + CHUNK_SIZE * 3, 20), vec![(21, 30), (31, 40)]);
        assert_eq!(ranges(&config, CONTEXT_WINDOW + CHUNK_SIZE * 4, 30), vec![(31, 40), (41, 50)]);
        assert_eq!(ranges(&SummaryConfig::default(), 70, 20), vec![(21, 30), (31, 40), (41, 50)]);
    }

    #[test]
    fn test_between_triggers_emits_nothing() {
        let total = CONTEXT_WINDOW + CHUNK_SIZE - 1;
        assert!(ranges(&chunk_ahead(), total, CHUNK_SIZE).is_empty());
        assert!(ranges(&chunk_ahead(), total, CHUNK_SIZE * 2).is_empty());
    }

    #[test]
    fn test_chunks_sequential() {
        let ranges = [SeqRange::new(1, 10), SeqRange::new(11, 20), SeqRange::new(21, 30)];
        assert!(are_chunks_sequential(ranges));

        let gapped = [SeqRange::new(1, 10), SeqRange::new(12, 21)];
        assert!(!are_chunks_sequential(gapped));

        assert!(are_chunks_sequential(Vec::new()));
    }

    #[test]
    fn test_transcript_is_role_tagged() {
        let lines = vec![
            TranscriptLine { role: ChatRole::User, content: "hi".to_string() },
            TranscriptLine { role: ChatRole::Assistant, content: "hello".to_string() },
        ];
        assert_eq!(format_transcript(&lines), "USER: hi\nASSISTANT: hello");
    }

    #[test]
    fn test_chunk_fallback_uses_recent_messages() {
        let config = SummaryConfig::default();
        let lines: Vec<TranscriptLine> = (1..=10)
            .map(|i| TranscriptLine {
                role: if i % 2 == 1 { ChatRole::User } else { ChatRole::Assistant },
                content: format!("message-{}", i),
            })
            .collect();

        let fallback = build_chunk_fallback_summary(&lines, &config);

        assert!(fallback.starts_with("summary failed"));
        assert!(!fallback.contains("message-5\n"));
        assert!(fallback.contains("- AI: message-6"));
        assert!(fallback.contains("- User: message-7"));
        assert!(fallback.ends_with("- AI: message-10"));
        assert!(is_fallback_summary(&fallback, config.locale));
    }

    #[test]
    fn test_chunk_fallback_is_capped() {
        let config = SummaryConfig::default();
        let lines: Vec<TranscriptLine> = (0..5)
            .map(|_| TranscriptLine { role: ChatRole::User, content: "x".repeat(1000) })
            .collect();

        let fallback = build_chunk_fallback_summary(&lines, &config);
        assert!(fallback.chars().count() <= config.fallback_char_limit);
        assert!(fallback.ends_with('…'));
    }

    #[test]
    fn test_meta_fallback_lists_ranges() {
        let config = SummaryConfig { locale: Locale::Korean, ..Default::default() };
        let chunks: Vec<StoredSummary> = (0..2)
            .map(|i| StoredSummary {
                id: i,
                chat_id: "chat-1".to_string(),
                level: SummaryLevel::Chunk,
                start_seq: i * 10 + 1,
                end_seq: i * 10 + 10,
                summary: "y".repeat(300),
                token_count: Some(1),
                created_at: Utc::now(),
            })
            .collect();

        let fallback = build_meta_fallback_summary(&chunks, &config);
        assert!(fallback.starts_with("요약 실패"));
        assert!(fallback.contains("[1-10] "));
        assert!(fallback.contains("[11-20] "));
        assert!(fallback.chars().count() <= config.fallback_char_limit);
    }
}
