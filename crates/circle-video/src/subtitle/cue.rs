//! WebVTT-like cue parsing and conversion to the numbered timed-text format
//! the video source delivers.
//!
//! Timed-text delivery only fires at cue starts, so every real cue is
//! followed by a short synthetic cue whose text is [`SENTINEL_TEXT`]; the
//! caption overlay treats it as "clear now".

use std::fmt::Write as _;
use std::io::Write as _;
use std::time::Duration;

use tempfile::TempPath;

use crate::error::CueError;

/// Reserved caption text meaning "clear the caption".
pub const SENTINEL_TEXT: &str = "~";

/// Length of the synthetic clear cue.
pub const SENTINEL_DURATION: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleCue {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

impl SubtitleCue {
    pub fn new(start: Duration, end: Duration, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        is_sentinel(&self.text)
    }
}

pub fn is_sentinel(text: &str) -> bool {
    text.trim() == SENTINEL_TEXT
}

/// Parse `HH:MM:SS.mmm` (hours optional). A comma is accepted in place of
/// the dot so the same parser reads the converted output back.
pub fn parse_timestamp(input: &str) -> Result<Duration, CueError> {
    let err = || CueError::Timestamp(input.to_string());
    let trimmed = input.trim();
    let split = trimmed.rfind(['.', ',']).ok_or_else(err)?;
    let (hms, millis) = (&trimmed[..split], &trimmed[split + 1..]);
    if millis.len() != 3 || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    let millis: u64 = millis.parse().map_err(|_| err())?;

    let fields: Vec<&str> = hms.split(':').collect();
    let (hours, minutes, seconds) = match fields.as_slice() {
        [h, m, s] => (parse_field(h, None), parse_field(m, Some(60)), parse_field(s, Some(60))),
        [m, s] => (Some(0), parse_field(m, Some(60)), parse_field(s, Some(60))),
        _ => return Err(err()),
    };
    let (Some(hours), Some(minutes), Some(seconds)) = (hours, minutes, seconds) else {
        return Err(err());
    };
    Ok(Duration::from_millis(
        ((hours * 60 + minutes) * 60 + seconds) * 1000 + millis,
    ))
}

fn parse_field(field: &str, limit: Option<u64>) -> Option<u64> {
    if field.len() < 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u64 = field.parse().ok()?;
    match limit {
        Some(limit) if value >= limit => None,
        _ => Some(value),
    }
}

/// `HH:MM:SS,mmm`.
pub fn format_timestamp(time: Duration) -> String {
    let total_ms = time.as_millis();
    let millis = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60,
        millis
    )
}

/// Parse one block: an optional identifier line, a timing line, then text.
/// Cue settings after the end timestamp are ignored.
pub fn parse_cue_block(block: &str) -> Result<SubtitleCue, CueError> {
    let mut lines = block.lines();
    let timing = lines
        .by_ref()
        .find(|line| line.contains("-->"))
        .ok_or(CueError::MissingTiming)?;
    let (start, rest) = timing.split_once("-->").ok_or(CueError::MissingTiming)?;
    let end = rest.split_whitespace().next().unwrap_or("");
    let start = parse_timestamp(start)?;
    let end = parse_timestamp(end)?;
    let text = lines.collect::<Vec<_>>().join("\n");
    Ok(SubtitleCue::new(start, end, text.trim()))
}

/// Parse every cue in a WebVTT-like blob. Blocks with no timing line
/// (header, `NOTE`, `STYLE`) are skipped silently; blocks with a bad
/// timestamp are skipped with a warning and parsing continues.
pub fn parse_webvtt(input: &str) -> Vec<SubtitleCue> {
    let mut cues = Vec::new();
    for block in blocks(input) {
        match parse_cue_block(&block) {
            Ok(cue) if cue.text.is_empty() => {
                log::debug!("Skipping empty cue at {}", format_timestamp(cue.start));
            }
            Ok(cue) => cues.push(cue),
            Err(CueError::MissingTiming) => {}
            Err(e) => log::warn!("Skipping cue block: {e}"),
        }
    }
    cues
}

// Blocks are separated by one or more blank (or whitespace-only) lines.
fn blocks(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in input.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

/// Interleave a clear-caption cue after every real cue.
pub fn with_clear_markers(cues: &[SubtitleCue]) -> Vec<SubtitleCue> {
    cues.iter()
        .flat_map(|cue| {
            let clear = SubtitleCue::new(cue.end, cue.end + SENTINEL_DURATION, SENTINEL_TEXT);
            [cue.clone(), clear]
        })
        .collect()
}

/// Render cues as numbered blocks with comma-separated milliseconds.
pub fn to_timed_text(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    for (index, cue) in cues.iter().enumerate() {
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_timestamp(cue.start),
            format_timestamp(cue.end),
            cue.text
        );
    }
    out
}

/// Parse, add clear markers and render in one pass.
pub fn convert_webvtt(input: &str) -> String {
    to_timed_text(&with_clear_markers(&parse_webvtt(input)))
}

/// Write the converted track to a temporary file. The file is deleted when
/// the returned path is dropped.
pub fn write_timed_text_artifact(timed_text: &str) -> std::io::Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix("subtitles")
        .suffix(".srt")
        .tempfile()?;
    file.write_all(timed_text.as_bytes())?;
    file.flush()?;
    Ok(file.into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn single_cue_gains_clear_marker() {
        let out = convert_webvtt("00:00:01.000 --> 00:00:02.000\nHello");
        assert_eq!(
            out,
            "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n\
             2\n00:00:02,000 --> 00:00:02,010\n~\n\n"
        );
    }

    #[test]
    fn parses_full_webvtt_document() {
        let vtt = "WEBVTT\n\n\
                   NOTE produced by hand\n\n\
                   intro\n00:00:00.500 --> 00:00:01.250 align:center\nFirst line\nsecond line\n\n\n\
                   00:01:02.003 --> 00:01:04.000\n<i>Styled</i>\n";
        let cues = parse_webvtt(vtt);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0], SubtitleCue::new(ms(500), ms(1250), "First line\nsecond line"));
        assert_eq!(cues[1].start, ms(62_003));
        assert_eq!(cues[1].text, "<i>Styled</i>");
    }

    #[test]
    fn bad_timestamp_skips_only_that_block() {
        let vtt = "00:00:01.000 --> 00:00:0x.000\nBroken\n\n\
                   00:00:03.000 --> 00:00:04.000\nKept";
        let cues = parse_webvtt(vtt);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "Kept");
    }

    #[test]
    fn crlf_input_is_accepted() {
        let cues = parse_webvtt("WEBVTT\r\n\r\n00:00:01.000 --> 00:00:02.000\r\nHi\r\n");
        assert_eq!(cues, vec![SubtitleCue::new(ms(1000), ms(2000), "Hi")]);
    }

    #[test]
    fn timestamp_forms() {
        assert_eq!(parse_timestamp("01:02:03.004").unwrap(), ms(3_723_004));
        assert_eq!(parse_timestamp("02:03.004").unwrap(), ms(123_004));
        assert_eq!(parse_timestamp("00:00:02,010").unwrap(), ms(2010));
        for bad in ["", "00:00:01", "00:00:01.5", "00:61:00.000", "aa:00:00.000", "0:00:01.000"] {
            assert_eq!(
                parse_timestamp(bad),
                Err(CueError::Timestamp(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn format_uses_comma_and_padding() {
        assert_eq!(format_timestamp(ms(0)), "00:00:00,000");
        assert_eq!(format_timestamp(ms(3_723_004)), "01:02:03,004");
    }

    #[test]
    fn sentinel_detection_trims() {
        assert!(is_sentinel(" ~ "));
        assert!(!is_sentinel("~~"));
        assert!(with_clear_markers(&[SubtitleCue::new(ms(0), ms(5), "a")])[1].is_sentinel());
    }

    #[test]
    fn artifact_round_trips_through_disk() {
        let text = convert_webvtt("00:00:01.000 --> 00:00:02.000\nHello");
        let path = write_timed_text_artifact(&text).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
        let owned = path.to_path_buf();
        drop(path);
        assert!(!owned.exists());
    }
}
