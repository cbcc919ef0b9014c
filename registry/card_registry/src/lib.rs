//! # Card Registry
//!
//! An authoritative registry that issues, upgrades and trades uniquely
//! identified cards on behalf of permissioned callers.
//!
//! | Phase        | Entry Point(s)                                      |
//! |--------------|-----------------------------------------------------|
//! | Bootstrap    | [`Registry::new`], [`Registry::with_config`]        |
//! | Role admin   | `grant_role`, `revoke_role`                         |
//! | Emergency    | `pause`, `unpause`                                  |
//! | Issuance     | [`Registry::mint`]                                  |
//! | Progression  | [`Registry::upgrade`]                               |
//! | Ownership    | [`Registry::trade`]                                 |
//! | Queries      | `get_card`, `owned_card_ids`, `has_role`, `roles_of`, `is_paused`, `total_supply` |
//!
//! ## Architecture
//!
//! Authorization is delegated to [`rbac`]. The dual card index lives in
//! [`storage`]. This file holds the public entry points, the pause gate and
//! notification emission.
//!
//! All state sits behind one `RwLock`. Every mutating entry point holds the
//! write lock from its first check until its notification is queued, so
//! callers on other threads observe either none or all of a mutation, and
//! card ids are never allocated twice.
//!
//! Queued notifications are published after the write lock is released, in
//! the order their mutations committed. A sink may therefore read from, or
//! even mutate, the registry inside `publish`.
//!
//! Callers are assumed to be authenticated already; the `caller` argument of
//! each entry point is trusted as-is.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub mod events;
pub mod rbac;
pub mod storage;
pub mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_events;

pub use events::{MemorySink, Notification, NotificationSink, SinkError};
pub use rbac::{Role, RoleAuthority};
pub use storage::CardStore;
pub use types::{Address, AddressParseError, Card, CardId, RegistryConfig, MAX_CHARACTER_TYPE, MAX_LEVEL};

/// Reasons a registry call is rejected. A rejected call changes nothing.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash, thiserror::Error)]
#[repr(u32)]
pub enum Error {
    #[error("caller lacks the required role")]
    Unauthorized = 1,
    #[error("registry is paused")]
    OperationPaused = 2,
    #[error("null address")]
    InvalidAddress = 3,
    #[error("character type out of range")]
    InvalidCharacterType = 4,
    #[error("card not found")]
    CardNotFound = 5,
    #[error("caller is not the card owner")]
    NotCardOwner = 6,
    #[error("card is already at max level")]
    MaxLevelReached = 7,
    #[error("cannot trade a card to its current owner")]
    SelfTradeNotAllowed = 8,
}

impl Error {
    /// Stable numeric code, suitable for crossing process boundaries.
    pub fn code(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_level must be at least 1")]
    ZeroMaxLevel,
    #[error("max_character_type must be at least 1")]
    ZeroMaxCharacterType,
    #[error("the null address cannot be the deployer")]
    NullDeployer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RegistryState {
    roles: RoleAuthority,
    cards: CardStore,
    paused: bool,
}

pub struct Registry {
    config: RegistryConfig,
    state: RwLock<RegistryState>,
    sink: Option<Arc<dyn NotificationSink>>,
    /// Notifications of committed mutations not yet handed to the sink.
    outbox: Mutex<VecDeque<Notification>>,
    /// Held by the one thread currently draining `outbox`.
    draining: Mutex<()>,
}

impl Registry {
    // ─────────────────────────────────────────────────────────
    // Initialisation
    // ─────────────────────────────────────────────────────────

    /// Create a registry with the default bounds. `deployer` becomes the
    /// sole `Administrator` and is also an `Issuer`. The null address is
    /// rejected, since it could never be used to call the registry.
    pub fn new(deployer: Address) -> Result<Self, ConfigError> {
        Self::with_config(deployer, RegistryConfig::default())
    }

    /// Create a registry with custom bounds.
    pub fn with_config(deployer: Address, config: RegistryConfig) -> Result<Self, ConfigError> {
        if deployer.is_zero() {
            return Err(ConfigError::NullDeployer);
        }
        config.validate()?;
        Ok(Self::build(deployer, config))
    }

    fn build(deployer: Address, config: RegistryConfig) -> Self {
        info!(%deployer, max_level = config.max_level, max_character_type = config.max_character_type, "registry initialised");
        Self {
            config,
            state: RwLock::new(RegistryState {
                roles: RoleAuthority::with_genesis(deployer),
                cards: CardStore::new(),
                paused: false,
            }),
            sink: None,
            outbox: Mutex::new(VecDeque::new()),
            draining: Mutex::new(()),
        }
    }

    /// Attach a notification sink, replacing any previous one.
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────
    // Role management
    // ─────────────────────────────────────────────────────────

    /// Grant `role` to `account`.
    ///
    /// - `caller` must hold `Administrator`.
    /// - `role` may be `Issuer` or `Trader`; `Administrator` is genesis-only.
    pub fn grant_role(&self, caller: Address, account: Address, role: Role) -> Result<(), Error> {
        let result = {
            let mut state = self.state.write();
            let result = state.roles.grant(&caller, account, role);
            match result {
                Ok(true) => {
                    info!(%caller, %account, role = role.as_str(), "role granted");
                    self.enqueue(Notification::RoleGranted {
                        account,
                        role,
                        by: caller,
                    });
                }
                Ok(false) => {}
                Err(e) => debug!(%caller, %account, ?role, error = %e, "grant_role rejected"),
            }
            result
        };
        self.flush_notifications();
        result.map(|_| ())
    }

    /// Revoke `role` from `account`. Same rules as [`Registry::grant_role`].
    pub fn revoke_role(&self, caller: Address, account: Address, role: Role) -> Result<(), Error> {
        let result = {
            let mut state = self.state.write();
            let result = state.roles.revoke(&caller, &account, role);
            match result {
                Ok(true) => {
                    info!(%caller, %account, role = role.as_str(), "role revoked");
                    self.enqueue(Notification::RoleRevoked {
                        account,
                        role,
                        by: caller,
                    });
                }
                Ok(false) => {}
                Err(e) => debug!(%caller, %account, ?role, error = %e, "revoke_role rejected"),
            }
            result
        };
        self.flush_notifications();
        result.map(|_| ())
    }

    pub fn has_role(&self, account: Address, role: Role) -> bool {
        self.state.read().roles.has_role(&account, role)
    }

    pub fn roles_of(&self, account: Address) -> BTreeSet<Role> {
        self.state.read().roles.roles_of(&account)
    }

    // ─────────────────────────────────────────────────────────
    // Emergency control
    // ─────────────────────────────────────────────────────────

    /// Halt mint, upgrade and trade. `caller` must hold `Administrator`.
    pub fn pause(&self, caller: Address) -> Result<(), Error> {
        self.set_paused(caller, true)
    }

    /// Resume normal operation. `caller` must hold `Administrator`.
    pub fn unpause(&self, caller: Address) -> Result<(), Error> {
        self.set_paused(caller, false)
    }

    pub fn is_paused(&self) -> bool {
        self.state.read().paused
    }

    fn set_paused(&self, caller: Address, paused: bool) -> Result<(), Error> {
        {
            let mut state = self.state.write();
            state
                .roles
                .require_admin(&caller)
                .inspect_err(|e| debug!(%caller, paused, error = %e, "pause toggle rejected"))?;
            if state.paused == paused {
                return Ok(());
            }
            state.paused = paused;
            info!(%caller, paused, "pause flag changed");
            self.enqueue(if paused {
                Notification::Paused { by: caller }
            } else {
                Notification::Unpaused { by: caller }
            });
        }
        self.flush_notifications();
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // Card lifecycle
    // ─────────────────────────────────────────────────────────

    /// Mint a new level-1 card of `character_type` to `recipient`.
    ///
    /// `caller` must hold `Issuer`. Returns the new card id.
    pub fn mint(&self, caller: Address, recipient: Address, character_type: u32) -> Result<CardId, Error> {
        let result = {
            let mut state = self.state.write();
            let result = self.try_mint(&mut state, caller, recipient, character_type);
            match result {
                Ok(card_id) => {
                    info!(%caller, %recipient, card_id, character_type, "card minted");
                    self.enqueue(Notification::Minted {
                        recipient,
                        card_id,
                        character_type,
                    });
                }
                Err(e) => debug!(%caller, %recipient, character_type, error = %e, "mint rejected"),
            }
            result
        };
        self.flush_notifications();
        result
    }

    fn try_mint(
        &self,
        state: &mut RegistryState,
        caller: Address,
        recipient: Address,
        character_type: u32,
    ) -> Result<CardId, Error> {
        require_not_paused(state)?;
        state.roles.require_role(&caller, Role::Issuer)?;
        if recipient.is_zero() {
            return Err(Error::InvalidAddress);
        }
        if !self.config.is_valid_character_type(character_type) {
            return Err(Error::InvalidCharacterType);
        }
        Ok(state.cards.insert_new(recipient, character_type))
    }

    /// Raise the level of `card_id` by one. Only the card's owner may upgrade.
    /// Returns the new level.
    pub fn upgrade(&self, caller: Address, card_id: CardId) -> Result<u32, Error> {
        let result = {
            let mut state = self.state.write();
            let result = self.try_upgrade(&mut state, caller, card_id);
            match result {
                Ok(new_level) => {
                    info!(%caller, card_id, new_level, "card upgraded");
                    self.enqueue(Notification::Upgraded {
                        card_id,
                        new_level,
                        owner: caller,
                    });
                }
                Err(e) => debug!(%caller, card_id, error = %e, "upgrade rejected"),
            }
            result
        };
        self.flush_notifications();
        result
    }

    fn try_upgrade(&self, state: &mut RegistryState, caller: Address, card_id: CardId) -> Result<u32, Error> {
        require_not_paused(state)?;
        let card = state.cards.get(card_id).ok_or(Error::CardNotFound)?;
        if card.owner != caller {
            return Err(Error::NotCardOwner);
        }
        if card.level >= self.config.max_level {
            return Err(Error::MaxLevelReached);
        }
        let new_level = card.level + 1;
        state.cards.set_level(card_id, new_level);
        Ok(new_level)
    }

    /// Move `card_id` from `from` to `to`. `caller` must hold `Trader`.
    pub fn trade(&self, caller: Address, from: Address, to: Address, card_id: CardId) -> Result<(), Error> {
        let result = {
            let mut state = self.state.write();
            let result = try_trade(&mut state, caller, from, to, card_id);
            match result {
                Ok(()) => {
                    info!(%caller, %from, %to, card_id, "card traded");
                    self.enqueue(Notification::Traded { from, to, card_id });
                }
                Err(e) => debug!(%caller, %from, %to, card_id, error = %e, "trade rejected"),
            }
            result
        };
        self.flush_notifications();
        result
    }

    // ─────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────

    pub fn get_card(&self, card_id: CardId) -> Result<Card, Error> {
        self.state
            .read()
            .cards
            .get(card_id)
            .cloned()
            .ok_or(Error::CardNotFound)
    }

    /// Ids of the cards currently held by `owner`. Order is not significant.
    pub fn owned_card_ids(&self, owner: Address) -> Vec<CardId> {
        self.state.read().cards.owned_ids(&owner).to_vec()
    }

    /// Number of cards ever minted.
    pub fn total_supply(&self) -> usize {
        self.state.read().cards.len()
    }

    /// Id the next successful mint will receive.
    pub fn next_card_id(&self) -> CardId {
        self.state.read().cards.next_id()
    }

    // ─────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────

    /// Queue a notification. Must be called with the state write lock held,
    /// so that queue order is commit order.
    fn enqueue(&self, notification: Notification) {
        if self.sink.is_some() {
            self.outbox.lock().push_back(notification);
        }
    }

    /// Hand queued notifications to the sink, oldest first. Must be called
    /// without the state lock held.
    ///
    /// Only one thread drains at a time. A thread that finds the drain busy
    /// leaves its notifications to the current drainer, which re-checks the
    /// queue after letting go of the drain.
    fn flush_notifications(&self) {
        let Some(sink) = &self.sink else {
            return;
        };
        loop {
            let Some(draining) = self.draining.try_lock() else {
                return;
            };
            loop {
                // Pop in its own statement so the queue is unlocked during `publish`.
                let next = self.outbox.lock().pop_front();
                let Some(notification) = next else {
                    break;
                };
                if let Err(e) = sink.publish(&notification) {
                    warn!(kind = notification.kind(), error = %e, "notification delivery failed");
                }
            }
            drop(draining);
            if self.outbox.lock().is_empty() {
                return;
            }
        }
    }

    #[cfg(test)]
    fn snapshot(&self) -> RegistryState {
        self.state.read().clone()
    }

    #[cfg(test)]
    fn with_store<R>(&self, f: impl FnOnce(&CardStore) -> R) -> R {
        f(&self.state.read().cards)
    }
}

fn require_not_paused(state: &RegistryState) -> Result<(), Error> {
    if state.paused {
        return Err(Error::OperationPaused);
    }
    Ok(())
}

fn try_trade(
    state: &mut RegistryState,
    caller: Address,
    from: Address,
    to: Address,
    card_id: CardId,
) -> Result<(), Error> {
    require_not_paused(state)?;
    state.roles.require_role(&caller, Role::Trader)?;
    if from.is_zero() || to.is_zero() {
        return Err(Error::InvalidAddress);
    }
    if from == to {
        return Err(Error::SelfTradeNotAllowed);
    }
    let card = state.cards.get(card_id).ok_or(Error::CardNotFound)?;
    if card.owner != from {
        return Err(Error::NotCardOwner);
    }
    state.cards.reassign(card_id, to);
    Ok(())
}
