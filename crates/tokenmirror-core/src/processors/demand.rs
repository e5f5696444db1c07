//! Processors for the demand lifecycle: creation and commenting.

use chrono::Utc;
use uuid::Uuid;

use crate::changeset::ChangeSet;
use crate::entities::{
    Comment, Demand, DemandState, DemandSubtype, DemandUpdate, EntityTable, Transaction,
};
use crate::error::IndexerError;
use crate::handler::{ResolvedInput, ResolvedOutput};

use super::{check_version, malformed, settle, EventProcessor};

/// `demand_create` — mints one demand token, consumes nothing.
///
/// When the event matches a locally-submitted transaction, the pending
/// demand row created by the API layer (keyed by the transaction's
/// `local_id`) is promoted; otherwise the demand originated on another node
/// and a fresh row is inserted.
pub struct DemandCreate;

impl EventProcessor for DemandCreate {
    fn process_id(&self) -> &'static str {
        "demand_create"
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
        if !inputs.is_empty() {
            return Err(malformed(self.process_id(), "consumes no tokens"));
        }
        let token = outputs
            .first()
            .ok_or_else(|| malformed(self.process_id(), "mints exactly one token"))?;

        let mut changes = ChangeSet::new();
        match matched_tx {
            Some(tx) => {
                changes.update_demand(
                    tx.local_id,
                    DemandUpdate {
                        state: Some(DemandState::Created),
                        latest_token_id: Some(token.token_id),
                        original_token_id: Some(token.token_id),
                    },
                );
                settle(&mut changes, matched_tx);
            }
            None => {
                let subtype = token
                    .metadata
                    .get("subtype")
                    .and_then(|s| DemandSubtype::from_str(s))
                    .unwrap_or(DemandSubtype::DemandA);
                changes.insert_demand(Demand {
                    id: Uuid::new_v4(),
                    owner: sender.to_string(),
                    subtype,
                    state: DemandState::Created,
                    latest_token_id: Some(token.token_id),
                    original_token_id: Some(token.token_id),
                });
            }
        }
        Ok(changes)
    }
}

/// `demand_comment` — transitions the commented demand's token and records
/// the comment row.
///
/// Tolerates an unresolved demand token: a comment on a demand this mirror
/// never tracked is informational and stages nothing.
pub struct DemandComment;

impl EventProcessor for DemandComment {
    fn process_id(&self) -> &'static str {
        "demand_comment"
    }

    fn tolerates_unresolved_inputs(&self) -> bool {
        true
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
        let input = inputs
            .first()
            .ok_or_else(|| malformed(self.process_id(), "consumes one demand token"))?;
        let token = outputs
            .first()
            .ok_or_else(|| malformed(self.process_id(), "mints one demand token"))?;

        let mut changes = ChangeSet::new();
        let Some(local) = &input.local else {
            // Externally-originated demand; no rows to stage. Still settle a
            // matched transaction so it cannot stay submitted forever.
            settle(&mut changes, matched_tx);
            return Ok(changes);
        };
        if local.table != EntityTable::Demand {
            return Err(malformed(self.process_id(), "input token is not a demand"));
        }

        changes.update_demand(
            local.id,
            DemandUpdate {
                latest_token_id: Some(token.token_id),
                ..Default::default()
            },
        );
        changes.insert_comment(Comment {
            id: matched_tx.map(|tx| tx.local_id).unwrap_or_else(Uuid::new_v4),
            demand_id: local.id,
            owner: sender.to_string(),
            created_at: Utc::now(),
        });
        settle(&mut changes, matched_tx);
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::Change;
    use crate::entities::{TransactionApiType, TransactionState, TransactionType};

    fn output(token: u64) -> ResolvedOutput {
        ResolvedOutput::new(token)
    }

    fn tx(local_id: Uuid, hash: &str) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            local_id,
            api_type: TransactionApiType::DemandA,
            transaction_type: TransactionType::Creation,
            state: TransactionState::Submitted,
            hash: hash.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn create_without_transaction_inserts_new_demand() {
        let changes = DemandCreate
            .run(1, None, "5GrwvaEF", &[], &[output(7)])
            .unwrap();

        assert_eq!(changes.demands.len(), 1);
        let change = changes.demands.values().next().unwrap();
        match change {
            Change::Insert(d) => {
                assert_eq!(d.owner, "5GrwvaEF");
                assert_eq!(d.state, DemandState::Created);
                assert_eq!(d.latest_token_id, Some(7));
                assert_eq!(d.original_token_id, Some(7));
            }
            other => panic!("expected insert, got {other:?}"),
        }
        assert!(changes.transactions.is_empty());
    }

    #[test]
    fn create_with_transaction_promotes_pending_row() {
        let demand_id = Uuid::new_v4();
        let t = tx(demand_id, "0xcall");
        let changes = DemandCreate
            .run(1, Some(&t), "5GrwvaEF", &[], &[output(7)])
            .unwrap();

        match changes.demands.get(&demand_id) {
            Some(Change::Update(u)) => {
                assert_eq!(u.state, Some(DemandState::Created));
                assert_eq!(u.latest_token_id, Some(7));
                assert_eq!(u.original_token_id, Some(7));
            }
            other => panic!("expected update, got {other:?}"),
        }
        assert_eq!(
            changes.transactions.get(&t.id).map(|u| u.state),
            Some(TransactionState::Finalised)
        );
        assert_eq!(changes.conflicts.len(), 1);
        assert_eq!(changes.conflicts[0].local_id, demand_id);
    }

    #[test]
    fn create_with_inputs_is_malformed() {
        let input = ResolvedInput {
            token_id: 3,
            local: None,
        };
        let err = DemandCreate
            .run(1, None, "5GrwvaEF", &[input], &[output(7)])
            .unwrap_err();
        assert!(matches!(err, IndexerError::MalformedEvent { .. }));
    }

    #[test]
    fn comment_on_untracked_demand_stages_nothing() {
        let input = ResolvedInput {
            token_id: 3,
            local: None,
        };
        let changes = DemandComment
            .run(1, None, "5GrwvaEF", &[input], &[output(4)])
            .unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn comment_on_untracked_demand_still_settles_matched_transaction() {
        let t = tx(Uuid::new_v4(), "0xcall");
        let input = ResolvedInput {
            token_id: 3,
            local: None,
        };
        let changes = DemandComment
            .run(1, Some(&t), "5GrwvaEF", &[input], &[output(4)])
            .unwrap();

        assert!(changes.demands.is_empty());
        assert!(changes.comments.is_empty());
        assert_eq!(
            changes.transactions.get(&t.id).map(|u| u.state),
            Some(TransactionState::Finalised)
        );
    }

    #[test]
    fn comment_transitions_demand_token_and_inserts_comment() {
        use crate::changeset::LocalRef;
        let demand_id = Uuid::new_v4();
        let input = ResolvedInput {
            token_id: 3,
            local: Some(LocalRef {
                table: EntityTable::Demand,
                id: demand_id,
                state: Some(crate::changeset::EntityStateSnapshot::Demand(
                    DemandState::Created,
                )),
            }),
        };
        let changes = DemandComment
            .run(1, None, "5GrwvaEF", &[input], &[output(4)])
            .unwrap();

        match changes.demands.get(&demand_id) {
            Some(Change::Update(u)) => assert_eq!(u.latest_token_id, Some(4)),
            other => panic!("expected update, got {other:?}"),
        }
        assert_eq!(changes.comments.len(), 1);
        let comment = changes.comments.values().next().unwrap();
        assert_eq!(comment.demand_id, demand_id);
        assert_eq!(comment.owner, "5GrwvaEF");
    }
}
