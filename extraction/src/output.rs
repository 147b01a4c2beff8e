//! Naming of output files and per-item outcomes.

use std::path::PathBuf;

use crate::config::UnidentifiedPolicy;

/// Outcome of writing one figure or table.
#[derive(Debug)]
pub enum ItemOutcome {
    Written(PathBuf),
    /// Deliberately not written (no coordinates, or no identifier under [UnidentifiedPolicy::Skip]).
    Skipped,
    Failed(anyhow::Error),
}

/// Counts of [ItemOutcome]s.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Tally {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Tally {
    pub fn add(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Written(_) => self.written += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: Tally) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Returns the file stem `{batch_id}_{identifier}` for an item.
///
/// Without an identifier the result depends on `policy`: `None` for
/// [UnidentifiedPolicy::Skip], or `{batch_id}_{kind}_pos{position}` for
/// [UnidentifiedPolicy::Positional].
pub fn file_stem(
    batch_id: usize,
    identifier: Option<&str>,
    kind: &str,
    position: usize,
    policy: UnidentifiedPolicy,
) -> Option<String> {
    match (identifier, policy) {
        (Some(identifier), _) => Some(format!("{batch_id}_{identifier}")),
        (None, UnidentifiedPolicy::Skip) => None,
        (None, UnidentifiedPolicy::Positional) => Some(format!("{batch_id}_{kind}_pos{position}")),
    }
}
