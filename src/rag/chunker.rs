//! Separator-aware overlapping text splitter.
//!
//! Chunks are at most `size` characters. When a chunk boundary falls
//! mid-text the split point is pulled back to the best separator inside
//! the window (paragraph break, then line break, then space, then a bare
//! character boundary). Consecutive chunks overlap by up to `overlap`
//! characters so nothing meaningful is lost at a boundary.

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    split_with_offsets(text, size, overlap)
        .into_iter()
        .map(|(_, chunk)| chunk)
        .collect()
}

/// Split returning each chunk's character offset in the source.
pub(crate) fn split_with_offsets(
    text: &str,
    size: usize,
    overlap: usize,
) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 || size == 0 {
        return Vec::new();
    }

    let overlap = overlap.min(size.saturating_sub(1));
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = (start + size).min(total);
        let end = if hard_end < total {
            find_break(&chars, start, hard_end)
        } else {
            hard_end
        };

        chunks.push((start, chars[start..end].iter().collect()));

        if end >= total {
            break;
        }
        // step back by the overlap, but always make forward progress
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Last separator position within the window, tried in priority order.
fn find_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    for sep in SEPARATORS {
        let sep: Vec<char> = sep.chars().collect();
        let mut best = None;
        let mut i = start;
        while i + sep.len() <= hard_end {
            if chars[i..i + sep.len()] == sep[..] {
                best = Some(i + sep.len());
            }
            i += 1;
        }
        if let Some(pos) = best {
            if pos > start {
                return pos;
            }
        }
    }
    hard_end
}
