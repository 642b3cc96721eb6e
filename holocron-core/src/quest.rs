//! Quest prerequisite resolution.
//!
//! Given a target quest and the set of quests a character has completed,
//! walk the prerequisite graph depth-first to find the nearest unmet
//! quest that blocks progress, or determine that the target itself is the
//! next actionable step.

use std::collections::HashSet;

pub type QuestId = i64;

/// Read-only view of the quest graph. Backed by the database in
/// production and by in-memory maps in tests; either way, unknown quests
/// come back as empty/`None` rather than errors.
pub trait QuestSource {
    /// Direct prerequisites of a quest. Order does not matter; the
    /// resolver sorts before descending.
    fn prerequisites(&self, quest: QuestId) -> Vec<QuestId>;

    /// Display title of a quest, when known.
    fn title(&self, quest: QuestId) -> Option<String>;
}

/// A quest reported by the resolver, with its title resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocker {
    pub quest_id: QuestId,
    pub title: String,
}

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The target quest is already in the completed set.
    AlreadyComplete,
    /// Every prerequisite is met; the target itself is the next step.
    NextStep(Blocker),
    /// The nearest unmet prerequisite in the chain.
    Blocked(Blocker),
    /// The prerequisite graph loops through this quest. Reported
    /// explicitly so callers can tell a broken graph from a clear one.
    Cycle(QuestId),
}

impl Resolution {
    /// The reported quest, when the resolution names one.
    pub fn blocker(&self) -> Option<&Blocker> {
        match self {
            Resolution::NextStep(b) | Resolution::Blocked(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Resolution::Blocked(_))
    }
}

/// Resolve the first unmet blocker for `quest`.
///
/// Prerequisites are visited in ascending id order, so when several are
/// simultaneously unmet the lowest-id chain is the one reported. The
/// completed set is never mutated.
pub fn resolve(
    source: &dyn QuestSource,
    quest: QuestId,
    completed: &HashSet<QuestId>,
) -> Resolution {
    if completed.contains(&quest) {
        return Resolution::AlreadyComplete;
    }
    let mut visited = HashSet::new();
    match walk(source, quest, completed, &mut visited) {
        Walk::Actionable(b) => Resolution::NextStep(b),
        Walk::Blocked(b) => Resolution::Blocked(b),
        Walk::Cycle(id) => Resolution::Cycle(id),
    }
}

enum Walk {
    Actionable(Blocker),
    Blocked(Blocker),
    Cycle(QuestId),
}

/// Depth-first descent. Caller guarantees `quest` is not completed. The
/// visited set replaces a depth guard: revisiting any quest on the walk
/// means the graph loops, and that is reported instead of a false "no
/// blocker".
fn walk(
    source: &dyn QuestSource,
    quest: QuestId,
    completed: &HashSet<QuestId>,
    visited: &mut HashSet<QuestId>,
) -> Walk {
    if !visited.insert(quest) {
        return Walk::Cycle(quest);
    }

    let mut prereqs = source.prerequisites(quest);
    prereqs.sort_unstable();
    prereqs.dedup();

    for prereq in prereqs {
        if completed.contains(&prereq) {
            continue;
        }
        match walk(source, prereq, completed, visited) {
            // An actionable prerequisite is itself the blocker from the
            // target's point of view.
            Walk::Actionable(b) | Walk::Blocked(b) => return Walk::Blocked(b),
            Walk::Cycle(id) => return Walk::Cycle(id),
        }
    }

    Walk::Actionable(Blocker {
        quest_id: quest,
        title: title_or_unknown(source, quest),
    })
}

fn title_or_unknown(source: &dyn QuestSource, quest: QuestId) -> String {
    source
        .title(quest)
        .unwrap_or_else(|| "Unknown Quest".to_string())
}
