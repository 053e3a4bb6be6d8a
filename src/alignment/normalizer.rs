use log::{debug, warn};

use super::SectionTiming;

/// Shortest duration any section keeps after the contiguity pass
pub const MIN_SECTION_SECS: f64 = 0.1;

/// Rebases raw timings to zero and corrects drift against the audio length
#[derive(Debug, Clone, Copy)]
pub struct TimingNormalizer {
    tolerance_secs: f64,
}

impl Default for TimingNormalizer {
    fn default() -> Self {
        Self::new(10)
    }
}

impl TimingNormalizer {
    pub fn new(tolerance_ms: u64) -> Self {
        Self {
            tolerance_secs: tolerance_ms as f64 / 1000.0,
        }
    }

    /// Normalize raw section timings.
    ///
    /// The result starts at zero, is contiguous, and sums to `audio_total`
    /// unless the drift is below tolerance or `audio_total` is unusable.
    pub fn normalize(&self, raw: &[SectionTiming], audio_total: f64) -> Vec<SectionTiming> {
        let Some(first) = raw.first() else {
            return Vec::new();
        };

        let offset = first.start;
        if offset != 0.0 {
            debug!("Rebasing section timings by {:.3}s", offset);
        }

        let mut timings = make_contiguous(raw, offset);

        if !audio_total.is_finite() || audio_total <= 0.0 {
            warn!("Audio duration {} is not usable, skipping drift correction", audio_total);
            return timings;
        }

        let video_total: f64 = timings.iter().map(|t| t.duration).sum();
        let drift = audio_total - video_total;

        if drift.abs() < self.tolerance_secs {
            return timings;
        }

        if drift > 0.0 {
            debug!("Extending last section by {:.3}s to match audio", drift);
            if let Some(last) = timings.last_mut() {
                *last = SectionTiming::new(last.start, last.end + drift);
            }
        } else {
            let ratio = audio_total / video_total;
            debug!(
                "Scaling timings by {:.4} ({:.3}s video vs {:.3}s audio)",
                ratio, video_total, audio_total
            );

            let mut cursor = 0.0;
            for timing in timings.iter_mut() {
                let duration = timing.duration * ratio;
                *timing = SectionTiming::new(cursor, cursor + duration);
                cursor += duration;
            }
        }

        timings
    }
}

// Subtract the offset and close gaps and overlaps between neighbours
fn make_contiguous(raw: &[SectionTiming], offset: f64) -> Vec<SectionTiming> {
    let mut out: Vec<SectionTiming> = Vec::with_capacity(raw.len());

    for timing in raw {
        let mut start = timing.start - offset;
        let end = timing.end - offset;

        match out.last_mut() {
            None => start = 0.0,
            Some(prev) => {
                if start >= prev.start + MIN_SECTION_SECS {
                    // Gap is absorbed, overlap is trimmed, by the earlier section
                    *prev = SectionTiming::new(prev.start, start);
                } else {
                    start = prev.end;
                }
            }
        }

        out.push(SectionTiming::new(start, end.max(start + MIN_SECTION_SECS)));
    }

    out
}
