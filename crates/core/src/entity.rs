//! Ledger records with a stable identity.

use std::collections::HashSet;

/// A record identified by a strongly-typed id that never changes.
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Display;

    fn id(&self) -> Self::Id;
}

/// First id that appears more than once in `records`.
pub fn first_duplicate<E: Entity>(records: &[E]) -> Option<E::Id> {
    let mut seen = HashSet::with_capacity(records.len());
    records.iter().map(Entity::id).find(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(u8);

    impl Entity for Row {
        type Id = u8;

        fn id(&self) -> u8 {
            self.0
        }
    }

    #[test]
    fn finds_the_first_repeated_id() {
        assert_eq!(first_duplicate(&[Row(1), Row(2), Row(3)]), None);
        assert_eq!(first_duplicate(&[Row(1), Row(2), Row(2), Row(1)]), Some(2));
        assert_eq!(first_duplicate::<Row>(&[]), None);
    }
}
