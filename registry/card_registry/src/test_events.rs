use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::{Address, Error, MemorySink, Notification, NotificationSink, Registry, Role, SinkError};

const ADMIN: Address = Address::new([0xa0; 20]);
const ISSUER: Address = Address::new([0x15; 20]);
const TRADER: Address = Address::new([0x7d; 20]);
const P1: Address = Address::new([0x01; 20]);
const P2: Address = Address::new([0x02; 20]);

fn setup() -> (Registry, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let registry = Registry::new(ADMIN).unwrap().with_sink(sink.clone());
    (registry, sink)
}

fn setup_with_roles() -> (Registry, Arc<MemorySink>) {
    let (registry, sink) = setup();
    registry.grant_role(ADMIN, ISSUER, Role::Issuer).unwrap();
    registry.grant_role(ADMIN, TRADER, Role::Trader).unwrap();
    sink.clear();
    (registry, sink)
}

/// Sink that always fails, counting how often it was called.
#[derive(Default)]
struct FailingSink {
    calls: AtomicUsize,
}

impl NotificationSink for FailingSink {
    fn publish(&self, _notification: &Notification) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Rejected("collector unavailable".to_string()))
    }
}

/// Sink that looks up each minted card in the registry it is attached to,
/// and upgrades level-1 cards once on their owner's behalf.
#[derive(Default)]
struct ReentrantSink {
    registry: OnceLock<Weak<Registry>>,
    seen: Mutex<Vec<(u64, u32)>>,
}

impl NotificationSink for ReentrantSink {
    fn publish(&self, notification: &Notification) -> Result<(), SinkError> {
        let Some(registry) = self.registry.get().and_then(Weak::upgrade) else {
            return Err(SinkError::Closed);
        };
        if let Notification::Minted { recipient, card_id, .. } = notification {
            let card = registry
                .get_card(*card_id)
                .map_err(|e| SinkError::Rejected(e.to_string()))?;
            self.seen.lock().push((card.id, card.level));
            registry
                .upgrade(*recipient, *card_id)
                .map_err(|e| SinkError::Rejected(e.to_string()))?;
        }
        Ok(())
    }
}

#[test]
fn test_minted_event() {
    let (registry, sink) = setup_with_roles();
    let id = registry.mint(ISSUER, P1, 3).unwrap();

    assert_eq!(
        sink.last(),
        Some(Notification::Minted {
            recipient: P1,
            card_id: id,
            character_type: 3,
        })
    );
}

#[test]
fn test_upgraded_event() {
    let (registry, sink) = setup_with_roles();
    let id = registry.mint(ISSUER, P1, 1).unwrap();
    registry.upgrade(P1, id).unwrap();

    assert_eq!(
        sink.last(),
        Some(Notification::Upgraded {
            card_id: id,
            new_level: 2,
            owner: P1,
        })
    );
}

#[test]
fn test_traded_event() {
    let (registry, sink) = setup_with_roles();
    let id = registry.mint(ISSUER, P1, 1).unwrap();
    registry.trade(TRADER, P1, P2, id).unwrap();

    assert_eq!(
        sink.last(),
        Some(Notification::Traded {
            from: P1,
            to: P2,
            card_id: id,
        })
    );
}

#[test]
fn test_events_follow_mutation_order() {
    let (registry, sink) = setup_with_roles();
    let id = registry.mint(ISSUER, P1, 1).unwrap();
    registry.upgrade(P1, id).unwrap();
    registry.trade(TRADER, P1, P2, id).unwrap();

    let kinds: Vec<_> = sink.records().iter().map(Notification::kind).collect();
    assert_eq!(kinds, vec!["minted", "upgraded", "traded"]);
}

#[test]
fn test_sink_may_call_back_into_registry() {
    let sink = Arc::new(ReentrantSink::default());
    let registry = Arc::new(Registry::new(ADMIN).unwrap().with_sink(sink.clone()));
    sink.registry.set(Arc::downgrade(&registry)).unwrap();

    let a = registry.mint(ADMIN, P1, 1).unwrap();
    let b = registry.mint(ADMIN, P2, 2).unwrap();

    // Each card was visible to the sink, and the sink's own upgrade applied.
    assert_eq!(*sink.seen.lock(), vec![(a, 1), (b, 1)]);
    assert_eq!(registry.get_card(a).unwrap().level, 2);
    assert_eq!(registry.get_card(b).unwrap().level, 2);
}

#[test]
fn test_concurrent_events_follow_commit_order() {
    let (registry, sink) = setup_with_roles();
    let per_thread = 25;
    let threads = 6u8;

    std::thread::scope(|scope| {
        for t in 0..threads {
            let registry = &registry;
            scope.spawn(move || {
                let owner = Address::new([t + 1; 20]);
                for _ in 0..per_thread {
                    registry.mint(ISSUER, owner, 1).unwrap();
                }
            });
        }
    });

    // Ids are allocated in commit order, so the minted ids arrive in order.
    let ids: Vec<u64> = sink.records().iter().filter_map(Notification::card_id).collect();
    let expected: Vec<u64> = (1..=(per_thread * threads as u64)).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_no_event_on_failure() {
    let (registry, sink) = setup_with_roles();
    let id = registry.mint(ISSUER, P1, 1).unwrap();
    sink.clear();

    assert_eq!(registry.mint(P1, P1, 1), Err(Error::Unauthorized));
    assert_eq!(registry.upgrade(P2, id), Err(Error::NotCardOwner));
    assert_eq!(registry.trade(TRADER, P1, P1, id), Err(Error::SelfTradeNotAllowed));
    assert_eq!(registry.pause(P1), Err(Error::Unauthorized));

    assert!(sink.is_empty());
}

#[test]
fn test_admin_events() {
    let (registry, sink) = setup();
    registry.grant_role(ADMIN, P1, Role::Trader).unwrap();
    registry.revoke_role(ADMIN, P1, Role::Trader).unwrap();
    registry.pause(ADMIN).unwrap();
    registry.unpause(ADMIN).unwrap();

    assert_eq!(
        sink.records(),
        vec![
            Notification::RoleGranted {
                account: P1,
                role: Role::Trader,
                by: ADMIN,
            },
            Notification::RoleRevoked {
                account: P1,
                role: Role::Trader,
                by: ADMIN,
            },
            Notification::Paused { by: ADMIN },
            Notification::Unpaused { by: ADMIN },
        ]
    );
}

#[test]
fn test_noop_admin_calls_emit_nothing() {
    let (registry, sink) = setup();
    registry.revoke_role(ADMIN, P1, Role::Trader).unwrap();
    registry.unpause(ADMIN).unwrap();
    registry.grant_role(ADMIN, P1, Role::Issuer).unwrap();
    registry.grant_role(ADMIN, P1, Role::Issuer).unwrap();
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_sink_failure_does_not_roll_back() {
    let sink = Arc::new(FailingSink::default());
    let registry = Registry::new(ADMIN).unwrap().with_sink(sink.clone());
    registry.grant_role(ADMIN, TRADER, Role::Trader).unwrap();

    let id = registry.mint(ADMIN, P1, 2).unwrap();
    assert_eq!(registry.upgrade(P1, id), Ok(2));
    registry.trade(TRADER, P1, P2, id).unwrap();

    let card = registry.get_card(id).unwrap();
    assert_eq!(card.owner, P2);
    assert_eq!(card.level, 2);
    assert_eq!(registry.owned_card_ids(P2), vec![id]);
    // grant + mint + upgrade + trade
    assert_eq!(sink.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_notification_json_shape() {
    let n = Notification::Traded {
        from: P1,
        to: P2,
        card_id: 7,
    };
    let json = serde_json::to_value(&n).unwrap();
    assert_eq!(json["kind"], "traded");
    assert_eq!(json["card_id"], 7);
    assert_eq!(json["from"], P1.to_string());
    assert_eq!(json["to"], P2.to_string());

    let back: Notification = serde_json::from_value(json).unwrap();
    assert_eq!(back, n);
    assert_eq!(back.card_id(), Some(7));
    assert_eq!(Notification::Paused { by: ADMIN }.card_id(), None);
}

#[test]
fn test_role_serializes_snake_case() {
    let n = Notification::RoleGranted {
        account: P1,
        role: Role::Issuer,
        by: ADMIN,
    };
    let json = serde_json::to_value(&n).unwrap();
    assert_eq!(json["kind"], "role_granted");
    assert_eq!(json["role"], "issuer");
}
