//! In-memory staging of table mutations, accumulated event by event and
//! committed atomically once per block.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{
    Comment, Demand, DemandState, DemandUpdate, EntityTable, LocalId, Match2, Match2State,
    Match2Update, Permission, PermissionState, PermissionUpdate, TransactionState,
};
use crate::types::TokenId;

/// A staged mutation: a full new row, or a partial patch to an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change<R, U> {
    Insert(R),
    Update(U),
}

pub type DemandChange = Change<Demand, DemandUpdate>;
pub type Match2Change = Change<Match2, Match2Update>;
pub type PermissionChange = Change<Permission, PermissionUpdate>;

/// Staged transaction state transition, keyed by transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    pub state: TransactionState,
}

/// A causal slot claimed by a finalising transaction: at commit time, every
/// other settleable transaction record sharing `local_id` whose call hash is
/// not `winning_hash` is marked failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSlot {
    pub local_id: LocalId,
    pub winning_hash: String,
}

/// Reference to a local entity that a token id resolved to, with a snapshot
/// of its state at resolution time (from the in-flight ChangeSet when the
/// token was minted earlier in the same block, otherwise from storage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRef {
    pub table: EntityTable,
    pub id: LocalId,
    pub state: Option<EntityStateSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStateSnapshot {
    Demand(DemandState),
    Match2(Match2State),
    Permission(PermissionState),
}

/// Resolve two staged mutations for the same row.
fn absorb<R, U>(
    base: Change<R, U>,
    incoming: Change<R, U>,
    apply: impl Fn(&mut R, &U),
    overlay: impl Fn(U, U) -> U,
) -> Change<R, U> {
    match (base, incoming) {
        (Change::Insert(mut row), Change::Update(patch)) => {
            apply(&mut row, &patch);
            Change::Insert(row)
        }
        (Change::Update(older), Change::Update(newer)) => Change::Update(overlay(older, newer)),
        (_, incoming) => incoming,
    }
}

/// Mergeable set of staged mutations, at most one per (table, id).
///
/// The empty ChangeSet is the identity element of [`ChangeSet::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub demands: HashMap<LocalId, DemandChange>,
    pub matches: HashMap<LocalId, Match2Change>,
    pub permissions: HashMap<LocalId, PermissionChange>,
    pub comments: HashMap<LocalId, Comment>,
    pub transactions: HashMap<Uuid, TransactionUpdate>,
    pub conflicts: Vec<ConflictSlot>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.demands.is_empty()
            && self.matches.is_empty()
            && self.permissions.is_empty()
            && self.comments.is_empty()
            && self.transactions.is_empty()
            && self.conflicts.is_empty()
    }

    /// Combine two staged sets without touching storage.
    ///
    /// Per (table, id) the `incoming` mutation wins, with one refinement: an
    /// update landing on a staged insert folds into the inserted row, because
    /// the row does not exist in storage yet and a bare patch could not be
    /// committed. Merging is order-sensitive, so the accumulator must always
    /// be the base and the newest fragment the incoming side.
    pub fn merge(mut self, incoming: ChangeSet) -> ChangeSet {
        for (id, change) in incoming.demands {
            let merged = match self.demands.remove(&id) {
                Some(base) => absorb(base, change, Demand::apply, DemandUpdate::overlay),
                None => change,
            };
            self.demands.insert(id, merged);
        }
        for (id, change) in incoming.matches {
            let merged = match self.matches.remove(&id) {
                Some(base) => absorb(base, change, Match2::apply, Match2Update::overlay),
                None => change,
            };
            self.matches.insert(id, merged);
        }
        for (id, change) in incoming.permissions {
            let merged = match self.permissions.remove(&id) {
                Some(base) => absorb(base, change, Permission::apply, PermissionUpdate::overlay),
                None => change,
            };
            self.permissions.insert(id, merged);
        }
        self.comments.extend(incoming.comments);
        self.transactions.extend(incoming.transactions);
        for slot in incoming.conflicts {
            if !self.conflicts.contains(&slot) {
                self.conflicts.push(slot);
            }
        }
        self
    }

    /// Find the local entity whose *latest* token id equals `token_id` among
    /// the staged mutations. Tokens minted earlier in the same block shadow
    /// the database, which has not yet observed this block.
    pub fn find_local_id_by_token(&self, token_id: TokenId) -> Option<LocalRef> {
        for (id, change) in &self.demands {
            let (latest, state) = match change {
                Change::Insert(d) => (d.latest_token_id, Some(d.state)),
                Change::Update(u) => (u.latest_token_id, u.state),
            };
            if latest == Some(token_id) {
                return Some(LocalRef {
                    table: EntityTable::Demand,
                    id: *id,
                    state: state.map(EntityStateSnapshot::Demand),
                });
            }
        }
        for (id, change) in &self.matches {
            let (latest, state) = match change {
                Change::Insert(m) => (m.latest_token_id, Some(m.state)),
                Change::Update(u) => (u.latest_token_id, u.state),
            };
            if latest == Some(token_id) {
                return Some(LocalRef {
                    table: EntityTable::Match2,
                    id: *id,
                    state: state.map(EntityStateSnapshot::Match2),
                });
            }
        }
        for (id, change) in &self.permissions {
            let (latest, state) = match change {
                Change::Insert(p) => (p.latest_token_id, Some(p.state)),
                Change::Update(u) => (u.latest_token_id, u.state),
            };
            if latest == Some(token_id) {
                return Some(LocalRef {
                    table: EntityTable::Permission,
                    id: *id,
                    state: state.map(EntityStateSnapshot::Permission),
                });
            }
        }
        None
    }

    // ── staging helpers used by event processors ──

    pub fn insert_demand(&mut self, demand: Demand) {
        self.demands.insert(demand.id, Change::Insert(demand));
    }

    pub fn update_demand(&mut self, id: LocalId, update: DemandUpdate) {
        self.demands.insert(id, Change::Update(update));
    }

    pub fn insert_match(&mut self, m: Match2) {
        self.matches.insert(m.id, Change::Insert(m));
    }

    pub fn update_match(&mut self, id: LocalId, update: Match2Update) {
        self.matches.insert(id, Change::Update(update));
    }

    pub fn insert_permission(&mut self, p: Permission) {
        self.permissions.insert(p.id, Change::Insert(p));
    }

    pub fn update_permission(&mut self, id: LocalId, update: PermissionUpdate) {
        self.permissions.insert(id, Change::Update(update));
    }

    pub fn insert_comment(&mut self, comment: Comment) {
        self.comments.insert(comment.id, comment);
    }

    pub fn set_transaction_state(&mut self, id: Uuid, state: TransactionState) {
        self.transactions.insert(id, TransactionUpdate { state });
    }

    pub fn claim_slot(&mut self, local_id: LocalId, winning_hash: impl Into<String>) {
        let slot = ConflictSlot {
            local_id,
            winning_hash: winning_hash.into(),
        };
        if !self.conflicts.contains(&slot) {
            self.conflicts.push(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DemandSubtype;

    fn demand(id: LocalId, token: TokenId) -> Demand {
        Demand {
            id,
            owner: "5GrwvaEF".into(),
            subtype: DemandSubtype::DemandA,
            state: DemandState::Created,
            latest_token_id: Some(token),
            original_token_id: Some(token),
        }
    }

    fn set_with_demand(token: TokenId) -> (ChangeSet, LocalId) {
        let id = Uuid::new_v4();
        let mut cs = ChangeSet::new();
        cs.insert_demand(demand(id, token));
        (cs, id)
    }

    #[test]
    fn empty_is_identity() {
        let (cs, _) = set_with_demand(7);
        assert_eq!(cs.clone().merge(ChangeSet::new()), cs);
        assert_eq!(ChangeSet::new().merge(cs.clone()), cs);
    }

    #[test]
    fn merge_self_is_idempotent() {
        let (cs, _) = set_with_demand(7);
        assert_eq!(cs.clone().merge(cs.clone()), cs);
    }

    #[test]
    fn disjoint_merge_commutes() {
        let (a, _) = set_with_demand(1);
        let (b, _) = set_with_demand(2);
        assert_eq!(a.clone().merge(b.clone()), b.merge(a));
    }

    #[test]
    fn update_folds_into_staged_insert() {
        // Same-block sequence: a row is inserted by one event, then a later
        // event patches it. The merged set must stay an insert so the commit
        // does not patch a row the database has never seen.
        let (base, id) = set_with_demand(7);
        let mut incoming = ChangeSet::new();
        incoming.update_demand(
            id,
            DemandUpdate {
                latest_token_id: Some(8),
                ..Default::default()
            },
        );
        let merged = base.merge(incoming);
        match merged.demands.get(&id) {
            Some(Change::Insert(d)) => {
                assert_eq!(d.latest_token_id, Some(8));
                assert_eq!(d.original_token_id, Some(7));
            }
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[test]
    fn incoming_wins_on_same_key() {
        let id = Uuid::new_v4();
        let mut base = ChangeSet::new();
        base.update_demand(
            id,
            DemandUpdate {
                latest_token_id: Some(10),
                ..Default::default()
            },
        );
        let mut incoming = ChangeSet::new();
        incoming.update_demand(
            id,
            DemandUpdate {
                latest_token_id: Some(11),
                ..Default::default()
            },
        );
        let merged = base.merge(incoming);
        match merged.demands.get(&id) {
            Some(Change::Update(u)) => assert_eq!(u.latest_token_id, Some(11)),
            other => panic!("unexpected change: {other:?}"),
        }
    }

    #[test]
    fn finds_staged_token_by_latest_id() {
        let (cs, id) = set_with_demand(42);
        let found = cs.find_local_id_by_token(42).unwrap();
        assert_eq!(found.table, EntityTable::Demand);
        assert_eq!(found.id, id);
        assert_eq!(
            found.state,
            Some(EntityStateSnapshot::Demand(DemandState::Created))
        );
        assert!(cs.find_local_id_by_token(43).is_none());
    }

    #[test]
    fn claim_slot_dedups() {
        let id = Uuid::new_v4();
        let mut cs = ChangeSet::new();
        cs.claim_slot(id, "0xabc");
        cs.claim_slot(id, "0xabc");
        assert_eq!(cs.conflicts.len(), 1);
    }
}
