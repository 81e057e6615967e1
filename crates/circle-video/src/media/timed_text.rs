use std::path::Path;

use crate::error::SourceError;
use crate::subtitle::cue::parse_cue_block;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedTextEntry {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// A numbered cue track, played back against a media clock.
///
/// Delivery fires at cue starts only: each call to [`advance`](Self::advance)
/// yields the most recent cue whose start was crossed since the last call.
#[derive(Debug, Default, Clone)]
pub struct TimedTextTrack {
    entries: Vec<TimedTextEntry>,
    cursor: usize,
}

impl TimedTextTrack {
    pub fn parse(input: &str) -> Self {
        let mut entries: Vec<TimedTextEntry> = input
            .replace('\r', "")
            .split("\n\n")
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .filter_map(|block| match parse_cue_block(block) {
                Ok(cue) => Some(TimedTextEntry {
                    start_ms: cue.start.as_millis() as u64,
                    end_ms: cue.end.as_millis() as u64,
                    text: cue.text,
                }),
                Err(e) => {
                    log::warn!("Skipping timed-text block: {e}");
                    None
                }
            })
            .collect();
        entries.sort_by_key(|e| e.start_ms);
        Self { entries, cursor: 0 }
    }

    pub fn load(path: &Path) -> Result<Self, SourceError> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TimedTextEntry] {
        &self.entries
    }

    /// Move the clock to `position_ms`, returning the latest cue that started
    /// in between. Cues skipped over in one step are not delivered.
    pub fn advance(&mut self, position_ms: u64) -> Option<&TimedTextEntry> {
        let start = self.cursor;
        while self
            .entries
            .get(self.cursor)
            .is_some_and(|e| e.start_ms <= position_ms)
        {
            self.cursor += 1;
        }
        (self.cursor > start).then(|| &self.entries[self.cursor - 1])
    }

    /// Reposition after a seek: cues starting before `position_ms` are
    /// considered delivered.
    pub fn reset(&mut self, position_ms: u64) {
        self.cursor = self.entries.partition_point(|e| e.start_ms < position_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::cue::convert_webvtt;

    fn track() -> TimedTextTrack {
        TimedTextTrack::parse(&convert_webvtt(
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHello\n\n00:00:03.000 --> 00:00:04.000\nWorld",
        ))
    }

    #[test]
    fn parses_converted_track() {
        let t = track();
        assert_eq!(t.len(), 4);
        assert_eq!(t.entries()[1].text, "~");
        assert_eq!(t.entries()[1].start_ms, 2000);
        assert_eq!(t.entries()[1].end_ms, 2010);
    }

    #[test]
    fn fires_at_cue_starts_only() {
        let mut t = track();
        assert!(t.advance(500).is_none());
        assert_eq!(t.advance(1000).unwrap().text, "Hello");
        assert!(t.advance(1500).is_none());
        assert_eq!(t.advance(2005).unwrap().text, "~");
        assert!(t.advance(2900).is_none());
        assert_eq!(t.advance(3100).unwrap().text, "World");
    }

    #[test]
    fn large_step_yields_latest() {
        let mut t = track();
        assert_eq!(t.advance(3500).unwrap().text, "World");
        assert!(t.advance(3600).is_none());
    }

    #[test]
    fn reset_repositions_cursor() {
        let mut t = track();
        t.advance(5000);
        t.reset(0);
        assert_eq!(t.advance(1000).unwrap().text, "Hello");
        t.reset(2500);
        assert_eq!(t.advance(3000).unwrap().text, "World");
    }
}
