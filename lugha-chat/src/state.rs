//! Per-message UI state for code blocks, kept outside the AST.
//!
//! Entries are keyed by what a block contains rather than where it sits, so
//! a block keeps its toggle and busy flags when other blocks are inserted or
//! removed around it between renders. Identical blocks are told apart by
//! their occurrence index. Blocks that disappear are pruned at the end of the
//! pass that no longer sees them.

use std::collections::HashMap;
use std::fmt;

/// Identity of a code block across renders of one message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeKey {
    pub lang: String,
    pub code: String,
    /// 0 for the first block with this `(lang, code)`, 1 for the next, ...
    pub occurrence: usize,
}

impl fmt::Display for CodeKey {
    /// Short stable token used in HTML (`data-key`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // FNV-1a; stable across processes unlike the std hasher.
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in self.lang.bytes().chain([0u8]).chain(self.code.bytes()) {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        write!(f, "{:016x}-{}", hash, self.occurrence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingAxis {
    Run,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeUiState {
    pub collapsed: bool,
    pub running: bool,
    pub copying: bool,
    seen_in: u64,
}

#[derive(Debug, Default)]
pub struct RenderState {
    entries: HashMap<CodeKey, CodeUiState>,
    pass: u64,
    occurrences: HashMap<(String, String), usize>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_pass(&mut self) {
        self.pass += 1;
        self.occurrences.clear();
    }

    /// Drops entries for blocks the current pass did not visit.
    pub fn finish_pass(&mut self) {
        let pass = self.pass;
        self.entries.retain(|_, state| state.seen_in == pass);
    }

    /// Next key for a block with this language and text in the current pass.
    pub fn next_key(&mut self, lang: &str, code: &str) -> CodeKey {
        let counter = self
            .occurrences
            .entry((lang.to_string(), code.to_string()))
            .or_insert(0);
        let key = CodeKey {
            lang: lang.to_string(),
            code: code.to_string(),
            occurrence: *counter,
        };
        *counter += 1;
        key
    }

    /// Marks `key` as seen in this pass, creating its entry on first sight.
    pub fn observe(&mut self, key: &CodeKey, collapsed_by_default: bool) -> CodeUiState {
        let pass = self.pass;
        let state = self.entries.entry(key.clone()).or_insert(CodeUiState {
            collapsed: collapsed_by_default,
            running: false,
            copying: false,
            seen_in: pass,
        });
        state.seen_in = pass;
        *state
    }

    pub fn get(&self, key: &CodeKey) -> Option<CodeUiState> {
        self.entries.get(key).copied()
    }

    /// Flips visibility; returns the new collapsed flag.
    pub fn toggle(&mut self, key: &CodeKey) -> Option<bool> {
        let state = self.entries.get_mut(key)?;
        state.collapsed = !state.collapsed;
        Some(state.collapsed)
    }

    pub fn set_loading(&mut self, key: &CodeKey, axis: LoadingAxis, busy: bool) -> bool {
        match self.entries.get_mut(key) {
            Some(state) => {
                match axis {
                    LoadingAxis::Run => state.running = busy,
                    LoadingAxis::Copy => state.copying = busy,
                }
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(state: &mut RenderState, blocks: &[(&str, &str)]) -> Vec<CodeKey> {
        state.begin_pass();
        let keys: Vec<_> = blocks
            .iter()
            .map(|(lang, code)| {
                let key = state.next_key(lang, code);
                state.observe(&key, *lang != "text");
                key
            })
            .collect();
        state.finish_pass();
        keys
    }

    #[test]
    fn test_toggle_survives_inserted_block() {
        let mut state = RenderState::new();
        let keys = pass(&mut state, &[("lugha", "a()"), ("lugha", "b()")]);
        assert_eq!(state.toggle(&keys[1]), Some(false));

        // A new block lands in front; "b()" keeps its expanded state.
        let keys = pass(&mut state, &[("lugha", "new()"), ("lugha", "a()"), ("lugha", "b()")]);
        assert_eq!(state.get(&keys[2]).map(|s| s.collapsed), Some(false));
        assert_eq!(state.get(&keys[0]).map(|s| s.collapsed), Some(true));
    }

    #[test]
    fn test_identical_blocks_get_distinct_keys() {
        let mut state = RenderState::new();
        let keys = pass(&mut state, &[("lugha", "x"), ("lugha", "x")]);
        assert_ne!(keys[0], keys[1]);
        assert_eq!(keys[1].occurrence, 1);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_removed_blocks_are_pruned() {
        let mut state = RenderState::new();
        let keys = pass(&mut state, &[("text", "notes"), ("lugha", "x")]);
        pass(&mut state, &[("lugha", "x")]);
        assert!(state.get(&keys[0]).is_none());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_loading_flags() {
        let mut state = RenderState::new();
        let keys = pass(&mut state, &[("lugha", "x")]);
        assert!(state.set_loading(&keys[0], LoadingAxis::Run, true));
        assert!(state.get(&keys[0]).unwrap().running);
        assert!(!state.get(&keys[0]).unwrap().copying);

        let missing = CodeKey {
            lang: "lugha".into(),
            code: "gone".into(),
            occurrence: 0,
        };
        assert!(!state.set_loading(&missing, LoadingAxis::Copy, true));
    }

    #[test]
    fn test_display_key_is_stable() {
        let key = CodeKey {
            lang: "lugha".into(),
            code: "print(1)".into(),
            occurrence: 2,
        };
        assert_eq!(key.to_string(), key.clone().to_string());
        assert!(key.to_string().ends_with("-2"));
    }
}
