//! Processors for the permission lifecycle.

use uuid::Uuid;

use crate::changeset::ChangeSet;
use crate::entities::{EntityTable, Permission, PermissionState, PermissionUpdate, Transaction};
use crate::error::IndexerError;
use crate::handler::{ResolvedInput, ResolvedOutput};

use super::{check_version, malformed, settle, EventProcessor};

/// `permission_create` — mints one permission token, consumes nothing.
pub struct PermissionCreate;

impl EventProcessor for PermissionCreate {
    fn process_id(&self) -> &'static str {
        "permission_create"
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
                changes.update_permission(
                    tx.local_id,
                    PermissionUpdate {
                        state: Some(PermissionState::Created),
                        latest_token_id: Some(token.token_id),
                        original_token_id: Some(token.token_id),
                    },
                );
                settle(&mut changes, matched_tx);
            }
            None => changes.insert_permission(Permission {
                id: Uuid::new_v4(),
                owner: sender.to_string(),
                state: PermissionState::Created,
                latest_token_id: Some(token.token_id),
                original_token_id: Some(token.token_id),
            }),
        }
        Ok(changes)
    }
}

/// `permission_revoke` — burns the permission token; a replacement output is
/// optional (some runtimes mint a tombstone token).
pub struct PermissionRevoke;

impl EventProcessor for PermissionRevoke {
    fn process_id(&self) -> &'static str {
        "permission_revoke"
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
        let input = inputs
            .first()
            .ok_or_else(|| malformed(self.process_id(), "consumes one permission token"))?;
        let local = input.local.as_ref().ok_or(IndexerError::UnresolvedToken {
            token_id: input.token_id,
        })?;
        if local.table != EntityTable::Permission {
            return Err(malformed(
                self.process_id(),
                "input token is not a permission",
            ));
        }

        let mut changes = ChangeSet::new();
        changes.update_permission(
            local.id,
            PermissionUpdate {
                state: Some(PermissionState::Revoked),
                latest_token_id: outputs.first().map(|o| o.token_id),
                ..Default::default()
            },
        );
        settle(&mut changes, matched_tx);
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::{Change, EntityStateSnapshot, LocalRef};

    #[test]
    fn create_inserts_permission_for_sender() {
        let changes = PermissionCreate
            .run(1, None, "5GrwvaEF", &[], &[ResolvedOutput::new(30)])
            .unwrap();
        let change = changes.permissions.values().next().unwrap();
        match change {
            Change::Insert(p) => {
                assert_eq!(p.owner, "5GrwvaEF");
                assert_eq!(p.state, PermissionState::Created);
                assert_eq!(p.latest_token_id, Some(30));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn revoke_requires_a_tracked_permission() {
        let input = ResolvedInput {
            token_id: 30,
            local: None,
        };
        let err = PermissionRevoke
            .run(1, None, "5GrwvaEF", &[input], &[])
            .unwrap_err();
        assert!(matches!(err, IndexerError::UnresolvedToken { token_id: 30 }));
    }

    #[test]
    fn revoke_transitions_state() {
        let id = Uuid::new_v4();
        let input = ResolvedInput {
            token_id: 30,
            local: Some(LocalRef {
                table: EntityTable::Permission,
                id,
                state: Some(EntityStateSnapshot::Permission(PermissionState::Created)),
            }),
        };
        let changes = PermissionRevoke
            .run(1, None, "5GrwvaEF", &[input], &[])
            .unwrap();
        match changes.permissions.get(&id) {
            Some(Change::Update(u)) => assert_eq!(u.state, Some(PermissionState::Revoked)),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
