use url::Url;

/// Splits `text` into sentences (runs ending in `.`, `!` or `?`), cutting
/// sentences longer than `max_len` characters into fixed-size pieces. Pieces
/// are trimmed and empty ones dropped; an unterminated tail is kept.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);

    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current);
    }

    let mut chunks = Vec::new();
    for sentence in sentences {
        let chars: Vec<char> = sentence.chars().collect();
        for piece in chars.chunks(max_len) {
            let piece: String = piece.iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }
        }
    }
    chunks
}

/// True for URLs with both a scheme and a host (`https://…`, `gs://bucket/…`).
/// Local paths, including `file:///…`, are not remote.
pub fn is_remote_url(path: &str) -> bool {
    Url::parse(path)
        .map(|url| !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}
