use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for entity IDs — fast comparisons, low memory.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for units, roles, blocks, instances,
/// and borders. Internally a `Spur` index — 4 bytes, Copy, Eq, Hash in O(1).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(Spur);

impl EntityId {
    /// Intern a new string as an EntityId, or return existing if already interned.
    pub fn intern(s: &str) -> Self {
        EntityId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EntityId::intern(&s))
    }
}

/// Deterministic id generator, one per open document.
///
/// Ids look like `unit_0`, `role_3`. The counter lives on the owning store
/// rather than in a global, so tests get stable ids and two documents never
/// contend for a shared sequence. After loading a saved document, call
/// [`IdGen::seed_past`] so freshly minted ids cannot collide with loaded ones.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Start the sequence at `n` (used by tests and by document loading).
    pub fn starting_at(n: u64) -> Self {
        Self { next: n }
    }

    /// Mint the next id with the given prefix.
    pub fn next(&mut self, prefix: &str) -> EntityId {
        let n = self.next;
        self.next += 1;
        EntityId::intern(&format!("{prefix}_{n}"))
    }

    /// Advance the counter past every `prefix_N` suffix in `ids`.
    pub fn seed_past<'a>(&mut self, ids: impl Iterator<Item = &'a EntityId>) {
        for id in ids {
            if let Some((_, suffix)) = id.as_str().rsplit_once('_')
                && let Ok(n) = suffix.parse::<u64>()
            {
                self.next = self.next.max(n + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = EntityId::intern("background");
        let b = EntityId::intern("background");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "background");
    }

    #[test]
    fn generated_ids_are_sequential() {
        let mut ids = IdGen::new();
        assert_eq!(ids.next("unit").as_str(), "unit_0");
        assert_eq!(ids.next("unit").as_str(), "unit_1");
        assert_eq!(ids.next("role").as_str(), "role_2");
    }

    #[test]
    fn seeding_skips_loaded_ids() {
        let mut ids = IdGen::new();
        let loaded = [EntityId::intern("unit_4"), EntityId::intern("role_11")];
        ids.seed_past(loaded.iter());
        assert_eq!(ids.next("unit").as_str(), "unit_12");
    }

    #[test]
    fn seeding_ignores_non_numeric_suffixes() {
        let mut ids = IdGen::new();
        let loaded = [EntityId::intern("background"), EntityId::intern("accent_a")];
        ids.seed_past(loaded.iter());
        assert_eq!(ids.next("unit").as_str(), "unit_0");
    }
}
