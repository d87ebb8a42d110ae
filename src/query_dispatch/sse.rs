//! Incremental decoding of `text/event-stream` bodies and sentence chunking
//! of the streamed text.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Buffers raw body bytes until complete lines are available. Chunks may
/// split lines and multi-byte characters anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }
    Some(SseEvent::Data(payload.to_string()))
}

const SENTENCE_ENDINGS: [char; 3] = ['.', '!', '?'];

/// Accumulates streamed deltas and releases whole sentences.
#[derive(Debug, Default)]
pub struct SentenceSplitter {
    current: String,
}

impl SentenceSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `delta`; returns the trimmed sentence once the buffer ends
    /// with terminal punctuation or a newline.
    pub fn push(&mut self, delta: &str) -> Option<String> {
        self.current.push_str(delta);
        let complete = self.current.trim_end().ends_with(SENTENCE_ENDINGS)
            || self.current.ends_with('\n');
        if !complete {
            return None;
        }
        let sentence = self.current.trim();
        if sentence.is_empty() {
            return None;
        }
        let sentence = sentence.to_string();
        self.current.clear();
        Some(sentence)
    }

    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.current);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_handles_split_lines() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        let events = decoder.push(b"1}\n\ndata: [DONE]\n\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"a\":1}".to_string()), SseEvent::Done]
        );
    }

    #[test]
    fn test_decoder_ignores_comments_and_blank_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\r\ndata:\r\nevent: ping\r\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_decoder_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), Some(SseEvent::Data("tail".to_string())));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_decoder_keeps_multibyte_chars_across_chunks() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: héllo\n".as_bytes();
        let (first, second) = bytes.split_at(8);
        assert!(decoder.push(first).is_empty());
        assert_eq!(
            decoder.push(second),
            vec![SseEvent::Data("héllo".to_string())]
        );
    }

    #[test]
    fn test_splitter_yields_sentences() {
        let mut splitter = SentenceSplitter::new();
        assert_eq!(splitter.push("Hello"), None);
        assert_eq!(splitter.push(" there."), Some("Hello there.".to_string()));
        assert_eq!(splitter.push(" How are"), None);
        assert_eq!(splitter.push(" you? "), Some("How are you?".to_string()));
        assert_eq!(splitter.push("Bye"), None);
        assert_eq!(splitter.finish(), Some("Bye".to_string()));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_splitter_breaks_on_newline() {
        let mut splitter = SentenceSplitter::new();
        assert_eq!(splitter.push("A list item\n"), Some("A list item".to_string()));
        assert_eq!(splitter.push("\n"), None);
        assert_eq!(splitter.finish(), None);
    }
}
