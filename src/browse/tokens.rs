//! Menu tokens: short callback payloads standing in for folder and file refs.
//!
//! Payload format: `nb:<s|f>:<generation>:<index>`. The generation number is
//! process-wide and monotonic, so a token minted before a menu was replaced
//! (or before the session was reset) can never match a newer menu.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::BrowseKind;
use crate::drive::FolderRef;

pub const TOKEN_PREFIX: &str = "nb";

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Subject,
    File,
}

impl TokenKind {
    fn tag(self) -> &'static str {
        match self {
            TokenKind::Subject => "s",
            TokenKind::File => "f",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "s" => Some(TokenKind::Subject),
            "f" => Some(TokenKind::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MenuToken {
    pub kind: TokenKind,
    pub generation: u64,
    pub index: usize,
}

impl MenuToken {
    /// Parses a callback payload. Anything not shaped like a menu token
    /// (other features' buttons included) yields `None`.
    pub fn parse(payload: &str) -> Option<Self> {
        let mut parts = payload.split(':');
        if parts.next()? != TOKEN_PREFIX {
            return None;
        }
        let kind = TokenKind::from_tag(parts.next()?)?;
        let generation = parts.next()?.parse().ok()?;
        let index = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { kind, generation, index })
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MenuToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", TOKEN_PREFIX, self.kind.tag(), self.generation, self.index)
    }
}

/// What a menu button stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Subject { folder: FolderRef, kind: BrowseKind },
    File { file: FolderRef, subject: String, kind: BrowseKind },
}

impl MenuEntry {
    /// Button label.
    pub fn label(&self) -> &str {
        match self {
            MenuEntry::Subject { folder, .. } => &folder.name,
            MenuEntry::File { file, .. } => &file.name,
        }
    }

    pub fn token_kind(&self) -> TokenKind {
        match self {
            MenuEntry::Subject { .. } => TokenKind::Subject,
            MenuEntry::File { .. } => TokenKind::File,
        }
    }
}

#[derive(Debug)]
struct Generation {
    number: u64,
    entries: Vec<MenuEntry>,
}

/// Token → entry mapping for one session.
///
/// Subject and file menus are separate generations. `put` replaces the whole
/// generation of its kind; nothing is ever merged into an existing one.
#[derive(Debug, Default)]
pub struct TokenTable {
    subjects: Option<Generation>,
    files: Option<Generation>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: TokenKind) -> &Option<Generation> {
        match kind {
            TokenKind::Subject => &self.subjects,
            TokenKind::File => &self.files,
        }
    }

    fn slot_mut(&mut self, kind: TokenKind) -> &mut Option<Generation> {
        match kind {
            TokenKind::Subject => &mut self.subjects,
            TokenKind::File => &mut self.files,
        }
    }

    /// Installs a new menu of `kind` and returns one token per entry, in order.
    pub fn put(&mut self, kind: TokenKind, entries: Vec<MenuEntry>) -> Vec<MenuToken> {
        let number = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let tokens = (0..entries.len())
            .map(|index| MenuToken {
                kind,
                generation: number,
                index,
            })
            .collect();
        *self.slot_mut(kind) = Some(Generation { number, entries });
        tokens
    }

    /// Looks a token up in the current generation of its kind.
    ///
    /// `None` means the menu was replaced or never existed.
    pub fn get(&self, token: &MenuToken) -> Option<&MenuEntry> {
        let generation = self.slot(token.kind).as_ref()?;
        if generation.number != token.generation {
            return None;
        }
        generation.entries.get(token.index)
    }

    pub fn clear(&mut self) {
        self.subjects = None;
        self.files = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn subjects(names: &[&str]) -> Vec<MenuEntry> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| MenuEntry::Subject {
                folder: FolderRef::folder(format!("id{}", i), *name),
                kind: BrowseKind::Notes,
            })
            .collect()
    }

    #[test]
    fn test_parse_and_display() {
        let token = MenuToken::parse("nb:s:42:3").unwrap();
        assert_eq!(
            token,
            MenuToken {
                kind: TokenKind::Subject,
                generation: 42,
                index: 3
            }
        );
        assert_eq!(token.encode(), "nb:s:42:3");
    }

    #[test]
    fn test_foreign_payloads_do_not_parse() {
        for payload in ["lb:refresh", "nb:x:1:1", "nb:s:1", "nb:s:1:2:3", "nb:f:a:1", "", "subj:123:DSA:notes"] {
            assert!(MenuToken::parse(payload).is_none(), "{payload}");
        }
    }

    #[test]
    fn test_fresh_tokens_resolve_to_their_entries() {
        let mut table = TokenTable::new();
        let entries = subjects(&["Chemistry", "DSA"]);
        let tokens = table.put(TokenKind::Subject, entries.clone());

        assert_eq!(tokens.len(), 2);
        for (token, entry) in tokens.iter().zip(&entries) {
            assert_eq!(table.get(token), Some(entry));
        }
    }

    #[test]
    fn test_rerender_invalidates_previous_generation() {
        let mut table = TokenTable::new();
        let old = table.put(TokenKind::Subject, subjects(&["DSA"]));
        let new = table.put(TokenKind::Subject, subjects(&["DSA"]));

        assert!(table.get(&old[0]).is_none());
        assert!(table.get(&new[0]).is_some());
    }

    #[test]
    fn test_kinds_are_separate_generations() {
        let mut table = TokenTable::new();
        let subject_tokens = table.put(TokenKind::Subject, subjects(&["DSA"]));
        table.put(
            TokenKind::File,
            vec![MenuEntry::File {
                file: FolderRef::file("F1", "unit1.pdf"),
                subject: "DSA".into(),
                kind: BrowseKind::Notes,
            }],
        );

        assert!(table.get(&subject_tokens[0]).is_some());
    }

    #[test]
    fn test_out_of_range_index_is_missing() {
        let mut table = TokenTable::new();
        let tokens = table.put(TokenKind::Subject, subjects(&["DSA"]));
        let bogus = MenuToken { index: 5, ..tokens[0] };
        assert!(table.get(&bogus).is_none());
    }

    #[test]
    fn test_clear() {
        let mut table = TokenTable::new();
        let tokens = table.put(TokenKind::Subject, subjects(&["DSA"]));
        table.clear();
        assert!(table.get(&tokens[0]).is_none());
    }
}
