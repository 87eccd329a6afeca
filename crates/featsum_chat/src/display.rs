//! Splitting long reports into chat-sized messages.

use std::sync::OnceLock;

use regex::Regex;

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Paragraphs (separated by blank lines) are packed greedily and rejoined
/// with a blank line. A paragraph that does not fit on its own is split into
/// sentences joined by a space; a sentence that still does not fit is cut by
/// characters.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max = max_chars.max(1);
    if char_len(text) <= max {
        return vec![text.to_string()];
    }

    static PARAGRAPH_BREAK: OnceLock<Regex> = OnceLock::new();
    let paragraph_break =
        PARAGRAPH_BREAK.get_or_init(|| Regex::new(r"\n\n+").expect("valid paragraph regex"));

    let mut packer = Packer::new(max);
    for paragraph in paragraph_break.split(text) {
        if paragraph.is_empty() {
            continue;
        }
        if char_len(paragraph) <= max {
            packer.push(paragraph, "\n\n");
            continue;
        }

        packer.flush();
        for sentence in sentences(paragraph) {
            if char_len(sentence) <= max {
                packer.push(sentence, " ");
            } else {
                packer.flush();
                for piece in hard_cut(sentence, max) {
                    packer.push(&piece, " ");
                }
            }
        }
    }
    packer.finish()
}

struct Packer {
    max: usize,
    current: String,
    current_len: usize,
    pieces: Vec<String>,
}

impl Packer {
    fn new(max: usize) -> Self {
        Self {
            max,
            current: String::new(),
            current_len: 0,
            pieces: Vec::new(),
        }
    }

    /// Append `part`, starting a new piece when it would overflow.
    fn push(&mut self, part: &str, joiner: &str) {
        let part_len = char_len(part);
        if self.current.is_empty() {
            self.current.push_str(part);
            self.current_len = part_len;
        } else if self.current_len + char_len(joiner) + part_len <= self.max {
            self.current.push_str(joiner);
            self.current.push_str(part);
            self.current_len += char_len(joiner) + part_len;
        } else {
            self.flush();
            self.current.push_str(part);
            self.current_len = part_len;
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.pieces.push(std::mem::take(&mut self.current));
        }
        self.current_len = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.pieces
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Sentences of `paragraph`; a boundary follows `.`, `!` or `?` when
/// whitespace comes next. The whitespace itself is dropped.
fn sentences(paragraph: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let Some(&(next_i, next)) = chars.peek() else {
            break;
        };
        if !next.is_whitespace() {
            continue;
        }

        result.push(&paragraph[start..next_i]);
        let mut resume = paragraph.len();
        while let Some(&(j, w)) = chars.peek() {
            if w.is_whitespace() {
                chars.next();
            } else {
                resume = j;
                break;
            }
        }
        start = resume;
    }

    if start < paragraph.len() {
        result.push(&paragraph[start..]);
    }
    result
}

fn hard_cut(sentence: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_message() {
        assert_eq!(split_message("hello", 4000), vec!["hello"]);
        assert_eq!(split_message("", 10), vec![""]);
    }

    #[test]
    fn test_packs_paragraphs() {
        let text = "aaaa\n\nbbbb\n\n\ncccc";
        assert_eq!(split_message(text, 10), vec!["aaaa\n\nbbbb", "cccc"]);
    }

    #[test]
    fn test_oversize_paragraph_splits_on_sentences() {
        let text = "First one. Second one! Third?  Fourth";
        let pieces = split_message(text, 22);
        assert_eq!(pieces, vec!["First one. Second one!", "Third? Fourth"]);
    }

    #[test]
    fn test_hard_cut_counts_chars() {
        let text = "ж".repeat(25);
        let pieces = split_message(&text, 10);
        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|p| p.chars().count() <= 10));
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_every_piece_fits() {
        let paragraph = "Проект: Alpha показал рост. ".repeat(40);
        let text = format!("{paragraph}\n\n• short\n\n{}", "x".repeat(130));
        for piece in split_message(&text, 100) {
            assert!(piece.chars().count() <= 100, "piece too long: {piece}");
            assert!(!piece.is_empty());
        }
    }

    #[test]
    fn test_sentences() {
        assert_eq!(
            sentences("A b. C d!\tE? F.G"),
            vec!["A b.", "C d!", "E?", "F.G"]
        );
        assert_eq!(sentences("End."), vec!["End."]);
    }
}
