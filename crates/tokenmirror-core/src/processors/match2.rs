//! Processors for the match2 lifecycle: propose, accept, accept-final,
//! reject, cancel.
//!
//! A match pairs a `demand_a` with a `demand_b`. Both sides must accept:
//! the first acceptance moves the match to `accepted_a`/`accepted_b`, the
//! second runs as `match2_accept_final` and allocates both demands. Only one
//! transition per entity per causal slot is possible on-chain, so a
//! finalising event settles its own transaction and fails any competing
//! submission for the same local id.

use uuid::Uuid;

use crate::changeset::{ChangeSet, EntityStateSnapshot, LocalRef};
use crate::entities::{
    DemandState, DemandUpdate, EntityTable, Match2, Match2State, Match2Update, Transaction,
};
use crate::error::IndexerError;
use crate::handler::{ResolvedInput, ResolvedOutput};

use super::{check_version, malformed, settle, EventProcessor};

fn require_local<'a>(
    process_id: &str,
    input: &'a ResolvedInput,
    table: EntityTable,
) -> Result<&'a LocalRef, IndexerError> {
    let local = input
        .local
        .as_ref()
        .ok_or(IndexerError::UnresolvedToken {
            token_id: input.token_id,
        })?;
    if local.table != table {
        return Err(malformed(
            process_id,
            format!("token {} resolves to the wrong table", input.token_id),
        ));
    }
    Ok(local)
}

/// `match2_propose` — consumes both demand tokens, mints replacements plus
/// the match token: inputs `[demand_a, demand_b]`, outputs
/// `[demand_a', demand_b', match]`.
pub struct Match2Propose;

impl EventProcessor for Match2Propose {
    fn process_id(&self) -> &'static str {
        "match2_propose"
    }

    fn run(
        &self,
        version: u32,
        matched_tx: Option<&Transaction>,
        sender: &str,
        inputs: &[ResolvedInput],
        outputs: &[ResolvedOutput],
    ) -> Result<ChangeSet, IndexerError> {
        check_version(self.process_id(), version)?;
        if inputs.len() != 2 || outputs.len() != 3 {
            return Err(malformed(
                self.process_id(),
                "consumes two demand tokens and mints three tokens",
            ));
        }
        let demand_a = require_local(self.process_id(), &inputs[0], EntityTable::Demand)?;
        let demand_b = require_local(self.process_id(), &inputs[1], EntityTable::Demand)?;
        let match_token = outputs[2].token_id;

        let mut changes = ChangeSet::new();
        for (local, output) in [(demand_a, &outputs[0]), (demand_b, &outputs[1])] {
            changes.update_demand(
                local.id,
                DemandUpdate {
                    latest_token_id: Some(output.token_id),
                    ..Default::default()
                },
            );
        }

        match matched_tx {
            Some(tx) => {
                changes.update_match(
                    tx.local_id,
                    Match2Update {
                        state: Some(Match2State::Proposed),
                        latest_token_id: Some(match_token),
                        original_token_id: Some(match_token),
                    },
                );
                settle(&mut changes, matched_tx);
            }
            None => {
                changes.insert_match(Match2 {
                    id: Uuid::new_v4(),
                    state: Match2State::Proposed,
                    member_a: sender.to_string(),
                    // The counterparty is known once it accepts; the match
                    // token's roles carry it when the processor is enriched.
                    member_b: outputs[2]
                        .roles
                        .get("member_b")
                        .cloned()
                        .unwrap_or_default(),
                    demand_a_id: demand_a.id,
                    demand_b_id: demand_b.id,
                    latest_token_id: Some(match_token),
                    original_token_id: Some(match_token),
                });
            }
        }
        Ok(changes)
    }
}

/// `match2_accept` — the first acceptance of a proposed match: consumes the
/// match token, mints its replacement.
pub struct Match2Accept;

impl EventProcessor for Match2Accept {
    fn process_id(&self) -> &'static str {
        "match2_accept"
    }

    fn run(
        &self,
        version: u32,
        matched_tx: Option<&Transaction>,
        _sender: &str,
        inputs: &[ResolvedInput],
        outputs: &[ResolvedOutput],
    ) -> Result<ChangeSet, IndexerError> {
        check_version(self.process_id(), version)?;
        if inputs.len() != 1 || outputs.len() != 1 {
            return Err(malformed(
                self.process_id(),
                "consumes the match token and mints its replacement",
            ));
        }
        let local = require_local(self.process_id(), &inputs[0], EntityTable::Match2)?;

        // The entity's current state discriminates which side this
        // acceptance is: a proposed match gains its first acceptance, a
        // half-accepted one gains the other side's.
        let next_state = match local.state {
            Some(EntityStateSnapshot::Match2(Match2State::AcceptedA)) => Match2State::AcceptedB,
            _ => Match2State::AcceptedA,
        };

        let mut changes = ChangeSet::new();
        changes.update_match(
            local.id,
            Match2Update {
                state: Some(next_state),
                latest_token_id: Some(outputs[0].token_id),
                ..Default::default()
            },
        );
        settle(&mut changes, matched_tx);
        Ok(changes)
    }
}

/// `match2_accept_final` — the second acceptance: consumes both demand
/// tokens and the match token, mints replacements for all three, and
/// allocates the demands.
pub struct Match2AcceptFinal;

impl EventProcessor for Match2AcceptFinal {
    fn process_id(&self) -> &'static str {
        "match2_accept_final"
    }

    fn run(
        &self,
        version: u32,
        matched_tx: Option<&Transaction>,
        sender: &str,
        inputs: &[ResolvedInput],
        outputs: &[ResolvedOutput],
    ) -> Result<ChangeSet, IndexerError> {
        check_version(self.process_id(), version)?;
        transition_match_and_demands(
            self.process_id(),
            matched_tx,
            sender,
            inputs,
            outputs,
            Match2State::AcceptedFinal,
            DemandState::Allocated,
        )
    }
}

/// `match2_reject` — burns the match token; no replacement is minted.
pub struct Match2Reject;

impl EventProcessor for Match2Reject {
    fn process_id(&self) -> &'static str {
        "match2_reject"
    }

    fn run(
        &self,
        version: u32,
        matched_tx: Option<&Transaction>,
        _sender: &str,
        inputs: &[ResolvedInput],
        outputs: &[ResolvedOutput],
    ) -> Result<ChangeSet, IndexerError> {
        check_version(self.process_id(), version)?;
        if inputs.len() != 1 || !outputs.is_empty() {
            return Err(malformed(self.process_id(), "burns the match token"));
        }
        let local = require_local(self.process_id(), &inputs[0], EntityTable::Match2)?;

        let mut changes = ChangeSet::new();
        changes.update_match(
            local.id,
            Match2Update {
                state: Some(Match2State::Rejected),
                ..Default::default()
            },
        );
        settle(&mut changes, matched_tx);
        Ok(changes)
    }
}

/// `match2_cancel` — unwinds an accepted match: consumes both demand tokens
/// and the match token, mints replacements, cancels all three entities.
pub struct Match2Cancel;

impl EventProcessor for Match2Cancel {
    fn process_id(&self) -> &'static str {
        "match2_cancel"
    }

    fn run(
        &self,
        version: u32,
        matched_tx: Option<&Transaction>,
        sender: &str,
        inputs: &[ResolvedInput],
        outputs: &[ResolvedOutput],
    ) -> Result<ChangeSet, IndexerError> {
        check_version(self.process_id(), version)?;
        transition_match_and_demands(
            self.process_id(),
            matched_tx,
            sender,
            inputs,
            outputs,
            Match2State::Cancelled,
            DemandState::Cancelled,
        )
    }
}

/// Shared shape of accept-final and cancel: three inputs (two demands and a
/// match, in any order), three replacement outputs paired positionally.
fn transition_match_and_demands(
    process_id: &str,
    matched_tx: Option<&Transaction>,
    _sender: &str,
    inputs: &[ResolvedInput],
    outputs: &[ResolvedOutput],
    match_state: Match2State,
    demand_state: DemandState,
) -> Result<ChangeSet, IndexerError> {
    if inputs.len() != 3 || outputs.len() != 3 {
        return Err(malformed(
            process_id,
            "consumes both demand tokens and the match token, minting replacements",
        ));
    }

    let mut changes = ChangeSet::new();
    let mut match_seen = false;
    for (input, output) in inputs.iter().zip(outputs) {
        let local = input.local.as_ref().ok_or(IndexerError::UnresolvedToken {
            token_id: input.token_id,
        })?;
        match local.table {
            EntityTable::Demand => changes.update_demand(
                local.id,
                DemandUpdate {
                    state: Some(demand_state),
                    latest_token_id: Some(output.token_id),
                    ..Default::default()
                },
            ),
            EntityTable::Match2 => {
                match_seen = true;
                changes.update_match(
                    local.id,
                    Match2Update {
                        state: Some(match_state),
                        latest_token_id: Some(output.token_id),
                        ..Default::default()
                    },
                );
            }
            _ => {
                return Err(malformed(
                    process_id,
                    format!("token {} resolves to the wrong table", input.token_id),
                ))
            }
        }
    }
    if !match_seen {
        return Err(malformed(process_id, "no match token among the inputs"));
    }
    settle(&mut changes, matched_tx);
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::Change;
    use crate::entities::{
        TransactionApiType, TransactionState, TransactionType,
    };
    use chrono::Utc;

    fn match_input(token: u64, id: Uuid, state: Match2State) -> ResolvedInput {
        ResolvedInput {
            token_id: token,
            local: Some(LocalRef {
                table: EntityTable::Match2,
                id,
                state: Some(EntityStateSnapshot::Match2(state)),
            }),
        }
    }

    fn demand_input(token: u64, id: Uuid) -> ResolvedInput {
        ResolvedInput {
            token_id: token,
            local: Some(LocalRef {
                table: EntityTable::Demand,
                id,
                state: Some(EntityStateSnapshot::Demand(DemandState::Created)),
            }),
        }
    }

    fn accept_tx(match_id: Uuid, hash: &str) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            local_id: match_id,
            api_type: TransactionApiType::Match2,
            transaction_type: TransactionType::Accept,
            state: TransactionState::Submitted,
            hash: hash.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn propose_updates_demands_and_inserts_match() {
        let (da, db) = (Uuid::new_v4(), Uuid::new_v4());
        let changes = Match2Propose
            .run(
                1,
                None,
                "5GrwvaEF",
                &[demand_input(1, da), demand_input(2, db)],
                &[
                    ResolvedOutput::new(10),
                    ResolvedOutput::new(11),
                    ResolvedOutput::new(12),
                ],
            )
            .unwrap();

        match changes.demands.get(&da) {
            Some(Change::Update(u)) => assert_eq!(u.latest_token_id, Some(10)),
            other => panic!("unexpected: {other:?}"),
        }
        match changes.demands.get(&db) {
            Some(Change::Update(u)) => assert_eq!(u.latest_token_id, Some(11)),
            other => panic!("unexpected: {other:?}"),
        }
        let m = changes.matches.values().next().unwrap();
        match m {
            Change::Insert(m) => {
                assert_eq!(m.state, Match2State::Proposed);
                assert_eq!(m.demand_a_id, da);
                assert_eq!(m.demand_b_id, db);
                assert_eq!(m.latest_token_id, Some(12));
                assert_eq!(m.original_token_id, Some(12));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn first_accept_of_proposed_match_is_accepted_a() {
        let match_id = Uuid::new_v4();
        let t = accept_tx(match_id, "0xT1");
        let changes = Match2Accept
            .run(
                1,
                Some(&t),
                "5GrwvaEF",
                &[match_input(12, match_id, Match2State::Proposed)],
                &[ResolvedOutput::new(13)],
            )
            .unwrap();

        match changes.matches.get(&match_id) {
            Some(Change::Update(u)) => {
                assert_eq!(u.state, Some(Match2State::AcceptedA));
                assert_eq!(u.latest_token_id, Some(13));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(
            changes.transactions.get(&t.id).map(|u| u.state),
            Some(TransactionState::Finalised)
        );
        assert_eq!(changes.conflicts.len(), 1);
        assert_eq!(changes.conflicts[0].winning_hash, "0xT1");
    }

    #[test]
    fn accept_of_half_accepted_match_takes_the_other_side() {
        let match_id = Uuid::new_v4();
        let changes = Match2Accept
            .run(
                1,
                None,
                "5FHneW46",
                &[match_input(13, match_id, Match2State::AcceptedA)],
                &[ResolvedOutput::new(14)],
            )
            .unwrap();
        match changes.matches.get(&match_id) {
            Some(Change::Update(u)) => assert_eq!(u.state, Some(Match2State::AcceptedB)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn accept_final_allocates_both_demands() {
        let (da, db, m) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let changes = Match2AcceptFinal
            .run(
                1,
                None,
                "5FHneW46",
                &[
                    demand_input(1, da),
                    demand_input(2, db),
                    match_input(13, m, Match2State::AcceptedA),
                ],
                &[
                    ResolvedOutput::new(20),
                    ResolvedOutput::new(21),
                    ResolvedOutput::new(22),
                ],
            )
            .unwrap();

        for id in [da, db] {
            match changes.demands.get(&id) {
                Some(Change::Update(u)) => assert_eq!(u.state, Some(DemandState::Allocated)),
                other => panic!("unexpected: {other:?}"),
            }
        }
        match changes.matches.get(&m) {
            Some(Change::Update(u)) => {
                assert_eq!(u.state, Some(Match2State::AcceptedFinal));
                assert_eq!(u.latest_token_id, Some(22));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn reject_marks_match_rejected_without_new_token() {
        let match_id = Uuid::new_v4();
        let changes = Match2Reject
            .run(
                1,
                None,
                "5FHneW46",
                &[match_input(12, match_id, Match2State::Proposed)],
                &[],
            )
            .unwrap();
        match changes.matches.get(&match_id) {
            Some(Change::Update(u)) => {
                assert_eq!(u.state, Some(Match2State::Rejected));
                assert_eq!(u.latest_token_id, None);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn accept_final_without_match_token_is_malformed() {
        let (da, db, dc) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let err = Match2AcceptFinal
            .run(
                1,
                None,
                "5FHneW46",
                &[demand_input(1, da), demand_input(2, db), demand_input(3, dc)],
                &[
                    ResolvedOutput::new(20),
                    ResolvedOutput::new(21),
                    ResolvedOutput::new(22),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, IndexerError::MalformedEvent { .. }));
    }
}
