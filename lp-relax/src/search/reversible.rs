//! State saved per decision level.

/// Stack of values keyed by decision level.
///
/// [`descend`](LevelSnapshots::descend) records the value held at each level
/// that is left; [`backtrack`](LevelSnapshots::backtrack) pops everything
/// saved at or above the target level and returns the value held there.
#[derive(Debug, Clone)]
pub struct LevelSnapshots<T> {
    saved: Vec<(usize, T)>,
}

impl<T> Default for LevelSnapshots<T> {
    fn default() -> Self {
        Self { saved: Vec::new() }
    }
}

impl<T: Clone> LevelSnapshots<T> {
    /// Empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Going from level `from` to the deeper level `to`: `value` is the
    /// state of every level in `from..to`.
    pub fn descend(&mut self, from: usize, to: usize, value: &T) {
        for level in from..to {
            self.saved.push((level, value.clone()));
        }
    }

    /// Going back to `level`. Returns the state saved when `level` was
    /// left, or `None` if it was never left.
    pub fn backtrack(&mut self, level: usize) -> Option<T> {
        let mut restored = None;
        while let Some((saved_level, _)) = self.saved.last() {
            if *saved_level < level {
                break;
            }
            restored = self.saved.pop().map(|(_, value)| value);
        }
        restored
    }

    /// Number of saved levels.
    pub fn len(&self) -> usize {
        self.saved.len()
    }

    /// True when nothing is saved.
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_after_jump() {
        let mut snapshots = LevelSnapshots::new();
        snapshots.descend(0, 1, &"root");
        snapshots.descend(1, 3, &"one");
        assert_eq!(snapshots.len(), 3);

        assert_eq!(snapshots.backtrack(2), Some("one"));
        assert_eq!(snapshots.backtrack(1), Some("one"));
        assert_eq!(snapshots.backtrack(0), Some("root"));
        assert!(snapshots.is_empty());
        assert_eq!(snapshots.backtrack(0), None);
    }

    #[test]
    fn test_backtrack_to_current_level_is_noop() {
        let mut snapshots = LevelSnapshots::new();
        snapshots.descend(0, 2, &7);
        assert_eq!(snapshots.backtrack(3), None);
        assert_eq!(snapshots.len(), 2);
    }
}
