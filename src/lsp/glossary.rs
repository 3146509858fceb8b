//! Glossary language service: documents known words.

use std::collections::BTreeMap;

use lsp_types::{Position, Range};

use super::{HoverInfo, LanguageService};

/// Looks the word under the cursor up in a fixed word → markdown table.
#[derive(Debug, Clone, Default)]
pub struct GlossaryService {
    entries: BTreeMap<String, String>,
}

impl GlossaryService {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LanguageService for GlossaryService {
    fn hover(&self, content: &str, pos: Position) -> Option<HoverInfo> {
        let line = content.lines().nth(pos.line as usize)?;
        let (start, word) = word_at(line, pos.character as usize)?;
        let doc = self.entries.get(word)?;
        let end = start + word.chars().count();
        Some(HoverInfo {
            content: format!("**{word}**\n\n{doc}"),
            range: Some(Range::new(
                Position::new(pos.line, start as u32),
                Position::new(pos.line, end as u32),
            )),
        })
    }
}

/// The identifier touching character column `col`, with its start column.
fn word_at(line: &str, col: usize) -> Option<(usize, &str)> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    if col > chars.len() {
        return None;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    let mut start = col;
    while start > 0 && is_word(chars[start - 1].1) {
        start -= 1;
    }
    let mut end = col;
    while end < chars.len() && is_word(chars[end].1) {
        end += 1;
    }
    if start == end {
        return None;
    }

    let byte_start = chars[start].0;
    let byte_end = chars.get(end).map_or(line.len(), |(i, _)| *i);
    Some((start, &line[byte_start..byte_end]))
}
