//! Silence-gap speaker labeling.
//!
//! Tracks a per-session speaker index that advances whenever the silence
//! between the end of one voiced segment and the start of the next reaches
//! the gap threshold. Labels are advisory text prefixes (`Person N:`), not
//! verified identities: the same voice is relabeled as a new speaker after a
//! long pause. That is the documented behavior of the heuristic.

use crate::defaults;
use crate::stt::Segment;

/// Speaker state for one session.
///
/// Timestamps are absolute milliseconds on the session's audio timeline;
/// callers pass each window's offset so gaps spanning window boundaries are
/// seen by the tracker.
#[derive(Debug, Clone)]
pub struct SpeakerTracker {
    current_index: u32,
    last_voiced_end_ms: Option<u64>,
    gap_ms: u64,
}

impl SpeakerTracker {
    pub fn new(gap_ms: u64) -> Self {
        Self {
            current_index: 1,
            last_voiced_end_ms: None,
            gap_ms,
        }
    }

    /// The speaker index that the next voiced segment would start from.
    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    /// Timestamp of the end of the last voiced segment, if any.
    pub fn last_voiced_end_ms(&self) -> Option<u64> {
        self.last_voiced_end_ms
    }

    /// Label a window's segments, advancing the speaker index on gaps.
    ///
    /// `window_offset_ms` places the segments' window-relative timestamps on
    /// the session timeline. Returns one `Person N: text` line per voiced
    /// segment, in order.
    pub fn label(&mut self, segments: &[Segment], window_offset_ms: u64) -> Vec<String> {
        let mut lines = Vec::with_capacity(segments.len());

        for segment in segments {
            if segment.text.trim().is_empty() {
                continue;
            }

            let start = window_offset_ms + segment.start_ms;
            let end = window_offset_ms + segment.end_ms;

            if let Some(last_end) = self.last_voiced_end_ms
                && start.saturating_sub(last_end) >= self.gap_ms
            {
                self.current_index += 1;
            }

            lines.push(format!("Person {}: {}", self.current_index, segment.text));
            self.last_voiced_end_ms = Some(end);
        }

        lines
    }
}

impl Default for SpeakerTracker {
    fn default() -> Self {
        Self::new(defaults::SPEAKER_GAP_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str, start_ms: u64, end_ms: u64) -> Segment {
        Segment {
            text: text.to_string(),
            start_ms,
            end_ms,
        }
    }

    #[test]
    fn test_initial_speaker_is_one() {
        let tracker = SpeakerTracker::new(2000);
        assert_eq!(tracker.current_index(), 1);
        assert_eq!(tracker.last_voiced_end_ms(), None);
    }

    #[test]
    fn test_first_segment_labeled_person_one() {
        let mut tracker = SpeakerTracker::new(2000);
        let lines = tracker.label(&[segment("hello there", 0, 800)], 0);

        assert_eq!(lines, vec!["Person 1: hello there"]);
        assert_eq!(tracker.current_index(), 1);
        assert_eq!(tracker.last_voiced_end_ms(), Some(800));
    }

    #[test]
    fn test_gap_at_threshold_advances_exactly_one() {
        let mut tracker = SpeakerTracker::new(2000);
        tracker.label(&[segment("first", 0, 1000)], 0);

        // Gap of exactly 2000ms: 1000 -> 3000
        let lines = tracker.label(&[segment("second", 3000, 3800)], 0);
        assert_eq!(lines, vec!["Person 2: second"]);
        assert_eq!(tracker.current_index(), 2);
    }

    #[test]
    fn test_gap_below_threshold_keeps_speaker() {
        let mut tracker = SpeakerTracker::new(2000);
        tracker.label(&[segment("first", 0, 1000)], 0);

        // Gap of 1999ms, one short of the threshold
        let lines = tracker.label(&[segment("second", 2999, 3500)], 0);
        assert_eq!(lines, vec!["Person 1: second"]);
        assert_eq!(tracker.current_index(), 1);
    }

    #[test]
    fn test_gap_spanning_window_boundary() {
        let mut tracker = SpeakerTracker::new(2000);

        // Window 1 at offset 0: speech ends at 2500ms
        tracker.label(&[segment("window one", 0, 2500)], 0);

        // Window 2 at offset 3000: first voice at 3000 + 1600 = 4600ms,
        // so the silence gap is 2100ms
        let lines = tracker.label(&[segment("window two", 1600, 2900)], 3000);
        assert_eq!(lines, vec!["Person 2: window two"]);
    }

    #[test]
    fn test_adjacent_windows_without_gap_keep_speaker() {
        let mut tracker = SpeakerTracker::new(2000);

        tracker.label(&[segment("one", 0, 2900)], 0);
        let lines = tracker.label(&[segment("two", 100, 2000)], 3000);

        // Gap is 3100 - 2900 = 200ms
        assert_eq!(lines, vec!["Person 1: two"]);
    }

    #[test]
    fn test_gap_within_single_window() {
        let mut tracker = SpeakerTracker::new(2000);

        let lines = tracker.label(
            &[
                segment("before the pause", 0, 1000),
                segment("after the pause", 3500, 4200),
            ],
            0,
        );

        assert_eq!(
            lines,
            vec!["Person 1: before the pause", "Person 2: after the pause"]
        );
    }

    #[test]
    fn test_multiple_gaps_advance_monotonically() {
        let mut tracker = SpeakerTracker::new(1000);

        let lines = tracker.label(
            &[
                segment("a", 0, 100),
                segment("b", 2000, 2100),
                segment("c", 4000, 4100),
                segment("d", 4200, 4300),
            ],
            0,
        );

        assert_eq!(
            lines,
            vec!["Person 1: a", "Person 2: b", "Person 3: c", "Person 3: d"]
        );
    }

    #[test]
    fn test_overlapping_timestamps_do_not_underflow() {
        let mut tracker = SpeakerTracker::new(2000);
        tracker.label(&[segment("first", 0, 5000)], 0);

        // Next segment starts before the previous one ended
        let lines = tracker.label(&[segment("overlap", 4000, 6000)], 0);
        assert_eq!(lines, vec!["Person 1: overlap"]);
    }

    #[test]
    fn test_blank_segments_are_skipped() {
        let mut tracker = SpeakerTracker::new(2000);

        let lines = tracker.label(
            &[
                segment("real speech", 0, 500),
                segment("   ", 600, 700),
                segment("more speech", 900, 1400),
            ],
            0,
        );

        assert_eq!(lines, vec!["Person 1: real speech", "Person 1: more speech"]);
        // Blank segment did not move the voiced timestamp
        assert_eq!(tracker.last_voiced_end_ms(), Some(1400));
    }

    #[test]
    fn test_empty_window_changes_nothing() {
        let mut tracker = SpeakerTracker::new(2000);
        tracker.label(&[segment("speech", 0, 500)], 0);

        let lines = tracker.label(&[], 3000);
        assert!(lines.is_empty());
        assert_eq!(tracker.current_index(), 1);
        assert_eq!(tracker.last_voiced_end_ms(), Some(500));
    }

    #[test]
    fn test_same_input_same_output() {
        let segments = vec![
            segment("alpha", 0, 900),
            segment("beta", 3100, 4000),
            segment("gamma", 4100, 5000),
        ];

        let mut first = SpeakerTracker::new(2000);
        let mut second = SpeakerTracker::new(2000);

        assert_eq!(first.label(&segments, 0), second.label(&segments, 0));
        assert_eq!(first.current_index(), second.current_index());
    }
}
