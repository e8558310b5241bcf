//! Labeled summary segments spliced into the system prompt

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::Locale;
use crate::memory_db::{StoredSummary, SummaryLevel};

lazy_static! {
    static ref SEGMENT_HEADER: Regex =
        Regex::new(r"(?m)^\[(meta summary|summary|메타 요약|요약) (\d+)-(\d+)\]$").unwrap();
}

/// `(level, start_seq, end_seq)` recovered from a segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub level: SummaryLevel,
    pub start_seq: i64,
    pub end_seq: i64,
}

/// `"[<label> <start>-<end>]\n<trimmed text>"` for each summary, in order.
pub fn format_summary_segments(summaries: &[StoredSummary], locale: Locale) -> Vec<String> {
    summaries
        .iter()
        .map(|summary| {
            format!(
                "[{} {}-{}]\n{}",
                locale.summary_label(summary.level),
                summary.start_seq,
                summary.end_seq,
                summary.summary.trim()
            )
        })
        .collect()
}

/// Headers found in formatted segment text, in order of appearance. Labels
/// from either locale are recognized.
pub fn parse_summary_segments(text: &str) -> Vec<SegmentHeader> {
    SEGMENT_HEADER
        .captures_iter(text)
        .filter_map(|caps| {
            let level = match &caps[1] {
                "meta summary" | "메타 요약" => SummaryLevel::Meta,
                _ => SummaryLevel::Chunk,
            };
            Some(SegmentHeader {
                level,
                start_seq: caps[2].parse().ok()?,
                end_seq: caps[3].parse().ok()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn summary(level: SummaryLevel, start_seq: i64, end_seq: i64, text: &str) -> StoredSummary {
        StoredSummary {
            id: 0,
            chat_id: "chat-1".to_string(),
            level,
            start_seq,
            end_seq,
            summary: text.to_string(),
            token_count: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_labels_meta_and_chunk_summaries() {
        let segments = format_summary_segments(
            &[
                summary(SummaryLevel::Chunk, 1, 10, " First chunk. "),
                summary(SummaryLevel::Meta, 1, 100, " Meta summary "),
            ],
            Locale::English,
        );

        assert_eq!(
            segments,
            vec![
                "[summary 1-10]\nFirst chunk.".to_string(),
                "[meta summary 1-100]\nMeta summary".to_string(),
            ]
        );
    }

    #[test]
    fn test_korean_labels() {
        let segments = format_summary_segments(
            &[
                summary(SummaryLevel::Chunk, 1, 10, "첫 청크"),
                summary(SummaryLevel::Meta, 1, 100, "메타"),
            ],
            Locale::Korean,
        );
        assert_eq!(segments[0], "[요약 1-10]\n첫 청크");
        assert_eq!(segments[1], "[메타 요약 1-100]\n메타");
    }

    #[test]
    fn test_headers_round_trip() {
        let rows = vec![
            summary(SummaryLevel::Meta, 1, 100, "meta"),
            summary(SummaryLevel::Chunk, 101, 110, "chunk one\nwith two lines"),
            summary(SummaryLevel::Chunk, 111, 120, "[1-10] not a header"),
        ];

        for locale in [Locale::English, Locale::Korean] {
            let text = format_summary_segments(&rows, locale).join("\n\n");
            let parsed = parse_summary_segments(&text);
            let expected: Vec<SegmentHeader> = rows
                .iter()
                .map(|row| SegmentHeader { level: row.level, start_seq: row.start_seq, end_seq: row.end_seq })
                .collect();
            assert_eq!(parsed, expected);
        }
    }
}
