#![allow(dead_code)]

use std::collections::HashSet;

use crate::storage::CardStore;
use crate::types::{Card, RegistryConfig};
use crate::Registry;

/// INV-1: every card appears in its owner's list exactly once and in no other list.
pub fn assert_index_consistent(store: &CardStore) {
    for card in store.cards() {
        let hits = store
            .owned_ids(&card.owner)
            .iter()
            .filter(|&&id| id == card.id)
            .count();
        assert_eq!(
            hits, 1,
            "INV-1 violated: card {} listed {} times under its owner {}",
            card.id, hits, card.owner
        );
    }

    for (owner, ids) in store.owners() {
        for id in ids {
            let card = store
                .get(*id)
                .unwrap_or_else(|| panic!("INV-1 violated: owner {owner} lists unknown card {id}"));
            assert_eq!(
                card.owner, *owner,
                "INV-1 violated: card {} listed under {} but owned by {}",
                id, owner, card.owner
            );
        }
    }
}

/// INV-2: the union of all owner lists equals the set of minted ids, with no duplicates.
pub fn assert_owner_union_matches_store(store: &CardStore) {
    let mut seen = HashSet::new();
    let mut listed = 0usize;
    for (_, ids) in store.owners() {
        for id in ids {
            listed += 1;
            assert!(seen.insert(*id), "INV-2 violated: card {id} listed twice");
        }
    }
    let minted: HashSet<_> = store.cards().map(|c| c.id).collect();
    assert_eq!(listed, store.len(), "INV-2 violated: listed count != card count");
    assert_eq!(seen, minted, "INV-2 violated: owner union != minted ids");
}

/// INV-3: ids are exactly `1..next_id`.
pub fn assert_ids_dense(store: &CardStore) {
    let expected: HashSet<_> = (1..store.next_id()).collect();
    let actual: HashSet<_> = store.cards().map(|c| c.id).collect();
    assert_eq!(actual, expected, "INV-3 violated: ids are not 1..next_id");
}

/// INV-4: level and character type are inside the configured bounds.
pub fn assert_card_in_bounds(card: &Card, config: &RegistryConfig) {
    assert!(
        (1..=config.max_level).contains(&card.level),
        "INV-4 violated: card {} has level {}",
        card.id,
        card.level
    );
    assert!(
        config.is_valid_character_type(card.character_type),
        "INV-4 violated: card {} has character type {}",
        card.id,
        card.character_type
    );
}

/// INV-5: a card's level never goes down and its type never changes.
pub fn assert_card_progression(before: &Card, after: &Card) {
    assert_eq!(before.id, after.id, "INV-5 violated: card id changed");
    assert_eq!(
        before.character_type, after.character_type,
        "INV-5 violated: card {} changed character type",
        before.id
    );
    assert!(
        after.level >= before.level,
        "INV-5 violated: card {} level decreased from {} to {}",
        before.id,
        before.level,
        after.level
    );
}

/// Run every store-wide invariant against `registry`.
pub fn assert_all_invariants(registry: &Registry) {
    let config = *registry.config();
    registry.with_store(|store| {
        assert_index_consistent(store);
        assert_owner_union_matches_store(store);
        assert_ids_dense(store);
        for card in store.cards() {
            assert_card_in_bounds(card, &config);
        }
    });
}
