//! Outbound payload shaping: sender prefix, edit marker, captions and chunking.

pub const EDITED_MARKER: &str = "[EDITED] ";
pub const CONTINUATION_MARKER: &str = "(cont.) ";
pub const TOO_LARGE_NOTICE: &str = "[media omitted: file too large to forward]";
pub const TEXT_TOO_LARGE_NOTICE: &str = "[message part omitted: too long to forward]";

const PREFIX_SEPARATOR: &str = " - ";

/// `"<sender> - "`, preceded by the edit marker for edited messages.
pub fn sender_prefix(sender: &str, is_edit: bool) -> String {
    let marker = if is_edit { EDITED_MARKER } else { "" };
    format!("{marker}{sender}{PREFIX_SEPARATOR}")
}

/// Split `body` into ordered chunks that each fit in `max_len` characters.
///
/// Only the first chunk carries `prefix`; every later chunk starts with
/// `CONTINUATION_MARKER`. Each body piece holds at most `chunk_len`
/// characters, less whatever the prefix or marker needs to stay within
/// `max_len`. The prefix is never cut unless it alone would not fit.
pub fn text_chunks(prefix: &str, body: &str, chunk_len: usize, max_len: usize) -> Vec<String> {
    let prefix = if prefix.chars().count() >= max_len {
        truncate_chars(prefix, max_len / 2)
    } else {
        prefix.to_string()
    };
    let room = |lead: &str| {
        chunk_len
            .min(max_len.saturating_sub(lead.chars().count()))
            .max(1)
    };

    split_text(body, room(&prefix), room(CONTINUATION_MARKER))
        .into_iter()
        .enumerate()
        .map(|(i, piece)| {
            if i == 0 {
                format!("{prefix}{piece}")
            } else {
                format!("{CONTINUATION_MARKER}{piece}")
            }
        })
        .collect()
}

/// Text sent in place of a chunk the transport refuses as too long.
pub fn text_too_large_placeholder(lead: &str) -> String {
    format!("{lead}{TEXT_TOO_LARGE_NOTICE}")
}

/// Media caption: prefix plus text, or just the sender label without the separator.
pub fn caption(prefix: &str, text: Option<&str>, max_len: usize) -> String {
    let full = match text {
        Some(t) => format!("{prefix}{t}"),
        None => prefix
            .strip_suffix(PREFIX_SEPARATOR)
            .unwrap_or(prefix)
            .to_string(),
    };
    truncate_chars(&full, max_len)
}

/// Whether `prefix + text` fits in one caption.
pub fn caption_fits(prefix: &str, text: &str, max_len: usize) -> bool {
    prefix.chars().count() + text.chars().count() <= max_len
}

/// Text notice sent instead of media that the transport refuses as too large.
pub fn too_large_placeholder(caption: &str) -> String {
    format!("{caption}\n{TOO_LARGE_NOTICE}")
}

fn truncate_chars(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut out = s.chars().take(keep).collect::<String>();
    out.push_str("...");
    out
}

fn split_text(s: &str, first_len: usize, next_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;
    let mut max_len = first_len;

    for ch in s.chars() {
        if cur_len >= max_len {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
            max_len = next_len;
        }
        cur.push(ch);
        cur_len += 1;
    }
    if !cur.is_empty() || out.is_empty() {
        out.push(cur);
    }
    out
}
