//! Streaming TTS Segmenter (spec §4.3): splits an append-only token
//! stream into speech-sized fragments at sentence-ish punctuation, never
//! exceeding `MAX_WORD` runes, and withholds micro-fragments while the
//! speaker is busy to avoid TTS stutter.

use crate::state::MuteState;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

pub const MAX_WORD: usize = 256;
/// Fragments shorter than this (and not newline-terminated) may be held
/// back until the speaker is free (spec §4.3 step 4).
const WITHHOLD_THRESHOLD: usize = 14;

const CUT_CHARS: &[char] =
    &['\n', '\r', '\u{3002}', '\u{FF1A}', '\u{FF1B}', '\u{FF01}', '\u{FF0C}', ':', ';', '!', ','];

struct Buffer {
    runes: Vec<char>,
    closed: bool,
}

/// Producer-side handle: the LLM stream reader appends deltas here.
#[derive(Clone)]
pub struct SegmenterWriter {
    buffer: std::sync::Arc<parking_lot::Mutex<Buffer>>,
    notify: Arc<Notify>,
}

impl SegmenterWriter {
    pub fn push(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut buf = self.buffer.lock();
        buf.runes.extend(text.chars());
        self.notify.notify_waiters();
    }

    pub fn close(&self) {
        let mut buf = self.buffer.lock();
        buf.closed = true;
        self.notify.notify_waiters();
    }
}

/// Consumer-side handle: yields complete fragments, respecting the
/// withholding heuristic against the shared [`MuteState`].
pub struct SegmenterReader {
    buffer: std::sync::Arc<parking_lot::Mutex<Buffer>>,
    notify: Arc<Notify>,
    mute: Arc<MuteState>,
}

/// Builds a writer/reader pair sharing one buffer (spec §4.3 "Ownership":
/// mutex-guarded because producer and consumer run concurrently).
pub fn segmenter(mute: Arc<MuteState>) -> (SegmenterWriter, SegmenterReader) {
    let buffer = std::sync::Arc::new(parking_lot::Mutex::new(Buffer { runes: Vec::new(), closed: false }));
    let notify = Arc::new(Notify::new());
    (
        SegmenterWriter { buffer: buffer.clone(), notify: notify.clone() },
        SegmenterReader { buffer, notify, mute },
    )
}

impl SegmenterReader {
    /// Returns the next non-empty fragment, or `None` once the stream is
    /// closed and the buffer is drained.
    pub async fn next_fragment(&mut self) -> Option<String> {
        loop {
            if let Some(fragment) = self.try_extract() {
                return Some(fragment);
            }
            let closed = self.buffer.lock().closed;
            if closed && self.buffer.lock().runes.is_empty() {
                return None;
            }
            if closed {
                // Closed but something remains that didn't reach a cut
                // point: flush the remainder (spec "On stream EOF, flush
                // the remainder").
                let mut buf = self.buffer.lock();
                if buf.runes.is_empty() {
                    return None;
                }
                let remainder: String = buf.runes.drain(..).collect();
                let trimmed = remainder.trim();
                if trimmed.is_empty() {
                    continue;
                }
                return Some(trimmed.to_string());
            }
            // A withheld micro-fragment waits on the mute state rather
            // than a new push, so poll on a short timer alongside the
            // notify wake to pick up a mute release promptly.
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
            }
        }
    }

    fn try_extract(&mut self) -> Option<String> {
        loop {
            let len = self.buffer.lock().runes.len();
            let closed = self.buffer.lock().closed;
            if len <= MAX_WORD && !closed {
                return None;
            }

            let cut = {
                let buf = self.buffer.lock();
                find_cut(&buf.runes)
            };

            let i = match cut {
                Some(i) => i,
                None if len >= MAX_WORD => MAX_WORD - 1,
                None => return None,
            };

            let fragment: String = {
                let mut buf = self.buffer.lock();
                if buf.runes.len() <= i {
                    continue;
                }
                buf.runes.drain(..=i).collect()
            };
            let trimmed = fragment.trim();
            if trimmed.is_empty() {
                continue;
            }

            if trimmed.chars().count() < WITHHOLD_THRESHOLD && !fragment.ends_with(['\n', '\r']) && !self.mute.is_active() {
                // Put it back and wait for Active; a later call (after a
                // release) will pick it up.
                let mut buf = self.buffer.lock();
                let mut restored: Vec<char> = trimmed.chars().collect();
                restored.extend(buf.runes.iter());
                buf.runes = restored;
                return None;
            }

            return Some(trimmed.to_string());
        }
    }
}

fn find_cut(runes: &[char]) -> Option<usize> {
    let bound = runes.len().min(MAX_WORD);
    (0..bound).rev().find(|&i| CUT_CHARS.contains(&runes[i]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (SegmenterWriter, SegmenterReader) {
        segmenter(Arc::new(MuteState::new()))
    }

    #[tokio::test]
    async fn exact_256_runes_no_punctuation_emits_one_fragment() {
        let (writer, mut reader) = fresh();
        writer.push(&"a".repeat(256));
        writer.close();
        let fragment = reader.next_fragment().await.unwrap();
        assert_eq!(fragment.chars().count(), 256);
        assert!(reader.next_fragment().await.is_none());
    }

    #[tokio::test]
    async fn single_rune_writes_accumulate_until_256_or_eof() {
        let (writer, mut reader) = fresh();
        let reader_task = tokio::spawn(async move { reader.next_fragment().await });
        for _ in 0..300 {
            writer.push("x");
        }
        writer.close();
        let fragment = reader_task.await.unwrap().unwrap();
        assert_eq!(fragment.chars().count(), 256);
    }

    #[tokio::test]
    async fn sentence_boundary_cuts_before_the_cap() {
        let (writer, mut reader) = fresh();
        writer.push("hello there. ");
        writer.push(&"x".repeat(300));
        writer.close();
        let first = reader.next_fragment().await.unwrap();
        assert!(first.starts_with("hello there"));
        assert!(first.chars().count() < MAX_WORD);
    }

    #[tokio::test]
    async fn concatenation_preserves_dispatched_content_modulo_whitespace_runs() {
        let (writer, mut reader) = fresh();
        let source = "one, two, three. four! five? six\nseven".repeat(5);
        writer.push(&source);
        writer.close();

        let mut rebuilt = String::new();
        while let Some(fragment) = reader.next_fragment().await {
            rebuilt.push_str(&fragment);
        }
        let normalize = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        assert_eq!(normalize(&rebuilt), normalize(&source));
    }
}
