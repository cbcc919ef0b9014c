//! # Storage
//!
//! The card store keeps two indexes that must always agree:
//!
//! | Index            | Type                           | Description                        |
//! |------------------|--------------------------------|------------------------------------|
//! | `cards_by_id`    | `HashMap<CardId, Card>`        | Source of truth, one entry per card |
//! | `ids_by_owner`   | `HashMap<Address, Vec<CardId>>`| Derived per-owner index            |
//! | `next_id`        | `CardId`                       | Auto-increment counter, starts at 1 |
//!
//! The only mutators are [`CardStore::insert_new`], [`CardStore::reassign`] and
//! [`CardStore::set_level`]. Each of them updates both indexes in the same call
//! and cannot fail half-way, so the store is never observable with a card that
//! has no owner entry or two of them.
//!
//! Owner collections use swap-remove when a card leaves, so the order of the
//! remaining ids is **not** stable.

use std::collections::HashMap;

use crate::types::{Address, Card, CardId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardStore {
    cards_by_id: HashMap<CardId, Card>,
    ids_by_owner: HashMap<Address, Vec<CardId>>,
    next_id: CardId,
}

impl Default for CardStore {
    fn default() -> Self {
        Self {
            cards_by_id: HashMap::new(),
            ids_by_owner: HashMap::new(),
            next_id: 1,
        }
    }
}

impl CardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and store a level-1 card owned by `owner`.
    /// Returns the allocated id.
    pub fn insert_new(&mut self, owner: Address, character_type: u32) -> CardId {
        let id = self.next_id;
        self.next_id += 1;

        self.cards_by_id.insert(
            id,
            Card {
                id,
                character_type,
                level: 1,
                owner,
            },
        );
        self.ids_by_owner.entry(owner).or_default().push(id);
        id
    }

    /// Move card `id` from its current owner to `to`.
    ///
    /// Returns the previous owner, or `None` when the card does not exist
    /// (nothing is modified in that case).
    pub fn reassign(&mut self, id: CardId, to: Address) -> Option<Address> {
        let card = self.cards_by_id.get_mut(&id)?;
        let from = card.owner;
        card.owner = to;

        if let Some(owned) = self.ids_by_owner.get_mut(&from) {
            if let Some(pos) = owned.iter().position(|&owned_id| owned_id == id) {
                owned.swap_remove(pos);
            }
            if owned.is_empty() {
                self.ids_by_owner.remove(&from);
            }
        }
        self.ids_by_owner.entry(to).or_default().push(id);
        Some(from)
    }

    /// Overwrite the level of card `id`. Returns `false` if the card is unknown.
    pub fn set_level(&mut self, id: CardId, level: u32) -> bool {
        match self.cards_by_id.get_mut(&id) {
            Some(card) => {
                card.level = level;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: CardId) -> Option<&Card> {
        self.cards_by_id.get(&id)
    }

    /// Ids currently held by `owner`, in no particular order.
    pub fn owned_ids(&self, owner: &Address) -> &[CardId] {
        self.ids_by_owner
            .get(owner)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.cards_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards_by_id.is_empty()
    }

    pub fn next_id(&self) -> CardId {
        self.next_id
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.cards_by_id.values()
    }

    pub fn owners(&self) -> impl Iterator<Item = (&Address, &[CardId])> {
        self.ids_by_owner
            .iter()
            .map(|(owner, ids)| (owner, ids.as_slice()))
    }
}
