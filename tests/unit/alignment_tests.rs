/*!
 * Tests for sequential alignment and timing normalization
 */

use capsync::alignment::{SectionTiming, SequentialAligner, TimingNormalizer};
use capsync::transcript::TimedWord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::words;

const VOCABULARY: [&str; 20] = [
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india", "juliet", "kilo",
    "lima", "mike", "november", "oscar", "papa", "quebec", "romeo", "sierra", "tango",
];

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "expected {}, got {}", expected, actual);
}

fn timings(list: &[(f64, f64)]) -> Vec<SectionTiming> {
    list.iter().map(|(s, e)| SectionTiming::new(*s, *e)).collect()
}

/// Random transcript plus captions cut from contiguous word ranges
fn random_case(rng: &mut StdRng, unique: bool) -> (Vec<TimedWord>, Vec<String>, f64) {
    let count = if unique {
        rng.random_range(3..=VOCABULARY.len())
    } else {
        rng.random_range(3..60)
    };

    let mut cursor = rng.random_range(0.0..2.0);
    let mut transcript = Vec::with_capacity(count);
    for i in 0..count {
        let text = if unique {
            VOCABULARY[i]
        } else {
            VOCABULARY[rng.random_range(0..VOCABULARY.len())]
        };
        cursor += rng.random_range(0.0..0.3);
        let length = rng.random_range(0.15..0.6);
        transcript.push(TimedWord::new(text, cursor, cursor + length));
        cursor += length;
    }

    let mut captions = Vec::new();
    let mut start = 0;
    while start < count {
        let len = rng.random_range(1..=4).min(count - start);
        let caption = transcript[start..start + len]
            .iter()
            .map(|w| w.text.clone())
            .collect::<Vec<_>>()
            .join(" ");
        captions.push(caption);
        start += len;
    }

    let spoken = cursor - transcript[0].start_sec;
    let audio_total = (spoken + rng.random_range(-0.8..1.5)).max(0.5);
    (transcript, captions, audio_total)
}

#[test]
fn test_scenario_a_single_section_should_span_all_words() {
    let transcript = words(&[("the", 0.0, 0.2), ("cat", 0.2, 0.5), ("sat", 0.5, 0.9)]);
    let report = SequentialAligner::default().align(&transcript, &["the cat sat"]);

    assert!(report.fully_aligned());
    assert_eq!(report.timings, vec![SectionTiming::new(0.0, 0.9)]);
    assert_close(report.timings[0].duration, 0.9);
}

#[test]
fn test_scenario_b_two_sections_should_split_and_consume_once() {
    let transcript = words(&[("the", 0.0, 0.2), ("cat", 0.2, 0.5), ("sat", 0.5, 0.9)]);
    let report = SequentialAligner::default().align(&transcript, &["the cat", "sat"]);

    assert_eq!(report.timings, timings(&[(0.0, 0.5), (0.5, 0.9)]));
    assert_eq!(report.owners(), &[Some(0), Some(0), Some(1)]);
    assert_eq!(report.spans, vec![Some((0, 1)), Some((2, 2))]);
}

#[test]
fn test_scenario_c_short_video_should_extend_only_last_section() {
    let raw = timings(&[(0.0, 4.0), (4.0, 9.0)]);
    let normalized = TimingNormalizer::default().normalize(&raw, 10.0);

    assert_eq!(normalized[0], SectionTiming::new(0.0, 4.0));
    assert_close(normalized[1].start, 4.0);
    assert_close(normalized[1].end, 10.0);
    assert_close(normalized[1].duration, 6.0);
}

#[test]
fn test_scenario_d_long_video_should_scale_every_section() {
    let raw = timings(&[(0.0, 5.0), (5.0, 11.0)]);
    let normalized = TimingNormalizer::default().normalize(&raw, 10.0);
    let ratio = 10.0 / 11.0;

    assert_close(normalized[0].start, 0.0);
    assert_close(normalized[0].end, 5.0 * ratio);
    assert_close(normalized[1].start, 5.0 * ratio);
    assert_close(normalized[1].end, 10.0);
}

#[test]
fn test_normalize_should_rebase_offset_transcript() {
    let transcript = words(&[("hello", 1.5, 1.9), ("world", 2.0, 2.6), ("again", 2.7, 3.1)]);
    let report = SequentialAligner::default().align(&transcript, &["Hello,", "world again!"]);
    let normalized = TimingNormalizer::default().normalize(&report.timings, 1.6);

    assert_eq!(normalized[0].start, 0.0);
    assert_close(normalized[0].end, 0.5);
    assert_close(normalized[1].end, 1.6);
}

#[test]
fn test_align_with_unique_words_should_recover_word_boundaries() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..50 {
        let (transcript, captions, _) = random_case(&mut rng, true);
        let report = SequentialAligner::default().align(&transcript, &captions);

        assert!(report.fully_aligned());
        let mut next = 0;
        for (caption, span) in captions.iter().zip(&report.spans) {
            let len = caption.split_whitespace().count();
            assert_eq!(*span, Some((next, next + len - 1)));
            next += len;
        }
        assert_eq!(report.consumed_count(), transcript.len());
    }
}

#[test]
fn test_align_should_partition_consumed_words() {
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..200 {
        let (transcript, captions, _) = random_case(&mut rng, false);
        let report = SequentialAligner::default().align(&transcript, &captions);

        let mut previous_last: Option<usize> = None;
        let mut consumed = 0;
        for (section, span) in report.spans.iter().enumerate() {
            let Some((first, last)) = *span else {
                assert!(report.fallback_sections.contains(&section));
                continue;
            };
            assert!(first <= last);
            if let Some(previous) = previous_last {
                assert!(first > previous, "spans overlap at section {}", section);
            }
            for owner in &report.owners()[first..=last] {
                assert_eq!(*owner, Some(section));
            }
            consumed += last - first + 1;
            previous_last = Some(last);
        }
        assert_eq!(consumed, report.consumed_count());
    }
}

#[test]
fn test_normalized_timings_should_be_contiguous_and_sum_to_audio() {
    let mut rng = StdRng::seed_from_u64(42);
    let aligner = SequentialAligner::default();
    let normalizer = TimingNormalizer::default();

    for _ in 0..300 {
        let (transcript, captions, audio_total) = random_case(&mut rng, false);
        let report = aligner.align(&transcript, &captions);
        let normalized = normalizer.normalize(&report.timings, audio_total);

        assert_eq!(normalized.len(), captions.len());
        assert_eq!(normalized[0].start, 0.0);
        for pair in normalized.windows(2) {
            assert!((pair[1].start - pair[0].end).abs() < 1e-9);
            assert!(pair[1].start > pair[0].start);
        }

        let total: f64 = normalized.iter().map(|t| t.duration).sum();
        assert!(
            (total - audio_total).abs() < 0.05,
            "sum {} vs audio {}",
            total,
            audio_total
        );
    }
}

#[test]
fn test_normalize_should_be_idempotent() {
    let mut rng = StdRng::seed_from_u64(5);
    let normalizer = TimingNormalizer::default();

    for _ in 0..100 {
        let (transcript, captions, audio_total) = random_case(&mut rng, true);
        let report = SequentialAligner::default().align(&transcript, &captions);

        // Only extend, so no section is scaled under the minimum length
        let span = report.timings[report.timings.len() - 1].end - report.timings[0].start;
        let audio_total = audio_total.max(span);

        let once = normalizer.normalize(&report.timings, audio_total);
        let twice = normalizer.normalize(&once, audio_total);

        for (a, b) in once.iter().zip(&twice) {
            assert_close(b.start, a.start);
            assert_close(b.end, a.end);
        }
    }
}

#[test]
fn test_align_twice_should_yield_identical_timings() {
    let mut rng = StdRng::seed_from_u64(19);
    let aligner = SequentialAligner::default();

    for _ in 0..100 {
        let (transcript, captions, _) = random_case(&mut rng, false);
        let first = aligner.align(&transcript, &captions);
        let second = aligner.align(&transcript, &captions);

        assert_eq!(first.timings, second.timings);
        assert_eq!(first.owners(), second.owners());
    }
}
