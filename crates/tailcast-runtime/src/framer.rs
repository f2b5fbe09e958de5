//! Line framing for captured output streams (non-UTF8-safe).
//!
//! Child processes can emit non-UTF8 bytes on stdout/stderr, and
//! `BufReader::lines()` would terminate on them. The framer reads bytes,
//! splits on `\n`, strips an optional `\r`, and decodes lossily so a
//! stream keeps flowing whatever it contains.
//!
//! Lines longer than the configured cap are emitted in chunks, each split
//! followed by a `system` warning line. Nothing is dropped silently. A split
//! never cuts a multi-byte UTF-8 character: the incomplete tail moves on to
//! the next chunk.

use std::collections::VecDeque;
use std::io;

use futures_util::{Stream, StreamExt};
use tailcast_core::{DEFAULT_MAX_LINE_BYTES, FramedLine, LineSource};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::StreamFeed;

/// Splits one byte stream into tagged text lines.
///
/// Single pass over its input: once [`next_line`](Self::next_line) has
/// returned `None` it keeps returning `None`.
pub struct LineFramer<R> {
    reader: BufReader<R>,
    source: LineSource,
    max_line_bytes: usize,
    buf: Vec<u8>,
    /// Start of a character cut off by the previous split.
    carry: Vec<u8>,
    pending: VecDeque<FramedLine>,
    done: bool,
}

impl<R: AsyncRead + Unpin> LineFramer<R> {
    pub fn new(stream: R, source: LineSource) -> Self {
        Self {
            reader: BufReader::new(stream),
            source,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            buf: Vec::with_capacity(1024),
            carry: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Override the line length cap. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes.max(1);
        self
    }

    /// Source label attached to captured lines.
    pub const fn source(&self) -> LineSource {
        self.source
    }

    /// Read the next line.
    ///
    /// Returns `None` at clean end of input. A read error yields any
    /// partial line first, then one `system` line describing the error,
    /// then `None`.
    pub async fn next_line(&mut self) -> Option<FramedLine> {
        if let Some(line) = self.pending.pop_front() {
            return Some(line);
        }
        if self.done {
            return None;
        }

        self.buf.clear();
        self.buf.append(&mut self.carry);
        loop {
            let available = match self.reader.fill_buf().await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    debug!(source = %self.source, error = %e, "stream read failed");
                    let error_line =
                        FramedLine::system(format!("{} stream read error: {e}", self.source));
                    if self.buf.is_empty() {
                        return Some(error_line);
                    }
                    self.pending.push_back(error_line);
                    return Some(self.take_line(false));
                }
            };

            // EOF: flush whatever partial line is left
            if available.is_empty() {
                self.done = true;
                if self.buf.is_empty() {
                    return None;
                }
                return Some(self.take_line(false));
            }

            // A terminator right at the cap still ends the line normally
            let room = self.max_line_bytes - self.buf.len();
            let window = &available[..available.len().min(room + 1)];

            if let Some(pos) = window.iter().position(|&b| b == b'\n') {
                self.buf.extend_from_slice(&window[..pos]);
                self.reader.consume(pos + 1);
                return Some(self.take_line(true));
            }

            let taken = window.len().min(room);
            self.buf.extend_from_slice(&window[..taken]);
            self.reader.consume(taken);

            if self.buf.len() >= self.max_line_bytes {
                let keep = self.buf.len() - incomplete_utf8_tail(&self.buf);
                if keep > 0 {
                    self.carry.extend_from_slice(&self.buf[keep..]);
                    self.buf.truncate(keep);
                }
                warn!(source = %self.source, cap = self.max_line_bytes, "splitting over-long line");
                self.pending.push_back(FramedLine::system(format!(
                    "{} line exceeded {} bytes and was split",
                    self.source, self.max_line_bytes
                )));
                return Some(self.take_line(false));
            }
        }
    }

    fn take_line(&mut self, terminated: bool) -> FramedLine {
        if terminated && self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        let text = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        FramedLine::new(self.source, text)
    }

    /// Consume the framer as a lazy stream of lines.
    pub fn into_stream(mut self) -> impl Stream<Item = FramedLine> {
        async_stream::stream! {
            while let Some(line) = self.next_line().await {
                yield line;
            }
        }
    }
}

/// Length of a truncated multi-byte UTF-8 sequence at the end of `bytes`.
///
/// Returns 0 when `bytes` ends on a character boundary or when the tail is
/// not valid UTF-8 anyway.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return 0,
        };
        return if width > back { back } else { 0 };
    }
    0
}

/// Spawn a task that frames `stream` and feeds every line to the engine.
///
/// The task stops at end of input, on a read error, when the engine goes
/// away, or when `cancel` fires. Dropping the feed on exit tells the
/// engine this stream is finished.
pub fn spawn_framer<R>(
    stream: R,
    feed: StreamFeed,
    max_line_bytes: usize,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let source = feed.source();
        let lines = LineFramer::new(stream, source)
            .with_max_line_bytes(max_line_bytes)
            .into_stream();
        tokio::pin!(lines);
        let mut count: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(%source, "framer cancelled");
                    break;
                }
                next = lines.next() => next,
            };

            let Some(line) = next else { break };
            if feed.send(line).is_err() {
                debug!(%source, "engine gone, framer exiting");
                break;
            }
            count += 1;
        }

        debug!(%source, lines = count, "framer task exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &'static [u8], max: usize) -> Vec<FramedLine> {
        let framer = LineFramer::new(input, LineSource::Stdout).with_max_line_bytes(max);
        framer.into_stream().collect().await
    }

    fn texts(lines: &[FramedLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[tokio::test]
    async fn empty_input_yields_nothing() {
        assert!(collect(b"", 1024).await.is_empty());
    }

    #[tokio::test]
    async fn splits_and_strips_terminators() {
        let lines = collect(b"one\ntwo\r\nthree\n", 1024).await;
        assert_eq!(texts(&lines), vec!["one", "two", "three"]);
        assert!(lines.iter().all(|l| l.source == LineSource::Stdout));
    }

    #[tokio::test]
    async fn flushes_unterminated_tail() {
        let lines = collect(b"first\npartial", 1024).await;
        assert_eq!(texts(&lines), vec!["first", "partial"]);
    }

    #[tokio::test]
    async fn keeps_blank_lines() {
        let lines = collect(b"a\n\nb\n", 1024).await;
        assert_eq!(texts(&lines), vec!["a", "", "b"]);
    }

    #[tokio::test]
    async fn decodes_invalid_utf8_lossily() {
        let lines = collect(b"ok \xff\xfe end\n", 1024).await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text.starts_with("ok "));
        assert!(lines[0].text.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn over_long_line_is_split_with_warning() {
        let lines = collect(b"abcdefghij\n", 4).await;
        let sources: Vec<LineSource> = lines.iter().map(|l| l.source).collect();
        assert_eq!(
            texts(&lines),
            vec![
                "abcd",
                "stdout line exceeded 4 bytes and was split",
                "efgh",
                "stdout line exceeded 4 bytes and was split",
                "ij",
            ]
        );
        assert_eq!(sources[1], LineSource::System);
        assert_eq!(sources[4], LineSource::Stdout);
    }

    #[tokio::test]
    async fn split_does_not_cut_multibyte_characters() {
        // '€' is three bytes; a cap of 4 lands inside the first one
        let lines = collect("abc€d€€\n".as_bytes(), 4).await;
        let chunks: Vec<&str> = lines
            .iter()
            .filter(|l| l.source == LineSource::Stdout)
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(chunks, vec!["abc", "€d", "€", "€"]);
        assert!(lines.iter().all(|l| !l.text.contains('\u{FFFD}')));
        assert_eq!(chunks.concat(), "abc€d€€");
    }

    #[tokio::test]
    async fn cap_below_character_width_still_makes_progress() {
        let lines = collect("€\n".as_bytes(), 2).await;
        let chunks: Vec<&str> = lines
            .iter()
            .filter(|l| l.source == LineSource::Stdout)
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn incomplete_tail_lengths() {
        assert_eq!(incomplete_utf8_tail(b"abc"), 0);
        assert_eq!(incomplete_utf8_tail("a€".as_bytes()), 0);
        assert_eq!(incomplete_utf8_tail(b"a\xE2"), 1);
        assert_eq!(incomplete_utf8_tail(b"a\xE2\x82"), 2);
        assert_eq!(incomplete_utf8_tail(b"\xF0\x9F\x98"), 3);
        assert_eq!(incomplete_utf8_tail(b"a\xff"), 0);
        assert_eq!(incomplete_utf8_tail(b""), 0);
    }

    #[tokio::test]
    async fn line_exactly_at_cap_is_not_split() {
        let lines = collect(b"abcd\nef\n", 4).await;
        assert_eq!(texts(&lines), vec!["abcd", "ef"]);
    }

    #[tokio::test]
    async fn read_error_emits_system_line_after_partial() {
        let mock = tokio_test::io::Builder::new()
            .read(b"good\nhalf")
            .read_error(io::Error::other("pipe broke"))
            .build();
        let mut framer = LineFramer::new(mock, LineSource::Stderr);

        assert_eq!(
            framer.next_line().await,
            Some(FramedLine::new(LineSource::Stderr, "good"))
        );
        assert_eq!(
            framer.next_line().await,
            Some(FramedLine::new(LineSource::Stderr, "half"))
        );
        let error_line = framer.next_line().await.unwrap();
        assert_eq!(error_line.source, LineSource::System);
        assert!(error_line.text.contains("stderr stream read error"));
        assert!(error_line.text.contains("pipe broke"));
        assert_eq!(framer.next_line().await, None);
        assert_eq!(framer.next_line().await, None);
    }
}
