//! Keyword-anchored text windows.

/// Cut up to `max_windows` windows of `window_chars` characters out of
/// `text`, each centred on the first occurrence of a keyword.
///
/// Keywords are tried in order and matched case-insensitively. A window that
/// overlaps an earlier one is skipped. Positions are counted in characters,
/// so multi-byte text is never split inside a code point.
pub fn extract_windows(
    text: &str,
    keywords: &[String],
    window_chars: usize,
    max_windows: usize,
) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let folded: Vec<char> = chars.iter().map(|&c| fold(c)).collect();
    let half = window_chars / 2;

    let mut taken: Vec<(usize, usize)> = Vec::new();
    let mut windows = Vec::new();

    for keyword in keywords {
        if windows.len() >= max_windows {
            break;
        }
        let needle: Vec<char> = keyword.trim().chars().map(fold).collect();
        let Some(index) = find(&folded, &needle) else {
            continue;
        };

        let start = index.saturating_sub(half);
        let end = (start + window_chars).min(chars.len());
        if taken.iter().any(|&(s, e)| start < e && s < end) {
            continue;
        }

        let window: String = chars[start..end].iter().collect();
        let window = window.trim();
        if !window.is_empty() {
            taken.push((start, end));
            windows.push(window.to_string());
        }
    }

    windows
}

/// One-to-one lowercase mapping so folded indices line up with the original.
fn fold(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

fn find(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
