//! Domain entity rows mirrored from the ledger, plus transaction records.
//!
//! Every token-bearing entity carries `latest_token_id` (the token currently
//! representing it on-chain, replaced by every state-transitioning event) and
//! `original_token_id` (the first token ever minted for it, immutable once
//! set).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::TokenId;

/// Application-level identifier for a domain entity, distinct from any token id.
pub type LocalId = Uuid;

/// The domain tables a ledger event can mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityTable {
    Demand,
    Match2,
    Permission,
    Comment,
}

// ─── Demand ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandSubtype {
    DemandA,
    DemandB,
}

impl DemandSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DemandA => "demand_a",
            Self::DemandB => "demand_b",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "demand_a" => Some(Self::DemandA),
            "demand_b" => Some(Self::DemandB),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandState {
    /// Created locally, not yet observed on-chain.
    Pending,
    Created,
    /// Locked into a finalised match.
    Allocated,
    Cancelled,
}

impl DemandState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Created => "created",
            Self::Allocated => "allocated",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "created" => Some(Self::Created),
            "allocated" => Some(Self::Allocated),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    pub id: LocalId,
    /// On-chain address of the owning member.
    pub owner: String,
    pub subtype: DemandSubtype,
    pub state: DemandState,
    pub latest_token_id: Option<TokenId>,
    pub original_token_id: Option<TokenId>,
}

/// Partial update staged against an existing demand row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandUpdate {
    pub state: Option<DemandState>,
    pub latest_token_id: Option<TokenId>,
    pub original_token_id: Option<TokenId>,
}

impl Demand {
    /// Apply a partial update to this row in place.
    pub fn apply(&mut self, patch: &DemandUpdate) {
        if let Some(state) = patch.state {
            self.state = state;
        }
        if let Some(token) = patch.latest_token_id {
            self.latest_token_id = Some(token);
        }
        if let Some(token) = patch.original_token_id {
            self.original_token_id = Some(token);
        }
    }
}

impl DemandUpdate {
    /// Field-wise overlay: fields set in `newer` win.
    pub fn overlay(self, newer: DemandUpdate) -> DemandUpdate {
        DemandUpdate {
            state: newer.state.or(self.state),
            latest_token_id: newer.latest_token_id.or(self.latest_token_id),
            original_token_id: newer.original_token_id.or(self.original_token_id),
        }
    }
}

// ─── Match2 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Match2State {
    Pending,
    Proposed,
    AcceptedA,
    AcceptedB,
    AcceptedFinal,
    Rejected,
    Cancelled,
}

impl Match2State {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Proposed => "proposed",
            Self::AcceptedA => "accepted_a",
            Self::AcceptedB => "accepted_b",
            Self::AcceptedFinal => "accepted_final",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "proposed" => Some(Self::Proposed),
            "accepted_a" => Some(Self::AcceptedA),
            "accepted_b" => Some(Self::AcceptedB),
            "accepted_final" => Some(Self::AcceptedFinal),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A two-sided match pairing a `demand_a` with a `demand_b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match2 {
    pub id: LocalId,
    pub state: Match2State,
    pub member_a: String,
    pub member_b: String,
    pub demand_a_id: LocalId,
    pub demand_b_id: LocalId,
    pub latest_token_id: Option<TokenId>,
    pub original_token_id: Option<TokenId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match2Update {
    pub state: Option<Match2State>,
    pub latest_token_id: Option<TokenId>,
    pub original_token_id: Option<TokenId>,
}

impl Match2 {
    pub fn apply(&mut self, patch: &Match2Update) {
        if let Some(state) = patch.state {
            self.state = state;
        }
        if let Some(token) = patch.latest_token_id {
            self.latest_token_id = Some(token);
        }
        if let Some(token) = patch.original_token_id {
            self.original_token_id = Some(token);
        }
    }
}

impl Match2Update {
    pub fn overlay(self, newer: Match2Update) -> Match2Update {
        Match2Update {
            state: newer.state.or(self.state),
            latest_token_id: newer.latest_token_id.or(self.latest_token_id),
            original_token_id: newer.original_token_id.or(self.original_token_id),
        }
    }
}

// ─── Permission ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Pending,
    Created,
    Revoked,
}

impl PermissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Created => "created",
            Self::Revoked => "revoked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "created" => Some(Self::Created),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: LocalId,
    pub owner: String,
    pub state: PermissionState,
    pub latest_token_id: Option<TokenId>,
    pub original_token_id: Option<TokenId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionUpdate {
    pub state: Option<PermissionState>,
    pub latest_token_id: Option<TokenId>,
    pub original_token_id: Option<TokenId>,
}

impl Permission {
    pub fn apply(&mut self, patch: &PermissionUpdate) {
        if let Some(state) = patch.state {
            self.state = state;
        }
        if let Some(token) = patch.latest_token_id {
            self.latest_token_id = Some(token);
        }
        if let Some(token) = patch.original_token_id {
            self.original_token_id = Some(token);
        }
    }
}

impl PermissionUpdate {
    pub fn overlay(self, newer: PermissionUpdate) -> PermissionUpdate {
        PermissionUpdate {
            state: newer.state.or(self.state),
            latest_token_id: newer.latest_token_id.or(self.latest_token_id),
            original_token_id: newer.original_token_id.or(self.original_token_id),
        }
    }
}

// ─── Comment ─────────────────────────────────────────────────────────────────

/// A comment attached to a demand. Carries no token ids of its own — the
/// commented demand's token is transitioned instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: LocalId,
    pub demand_id: LocalId,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

// ─── Transaction records ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Submitted,
    InBlock,
    Finalised,
    Failed,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::InBlock => "in_block",
            Self::Finalised => "finalised",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(Self::Submitted),
            "in_block" => Some(Self::InBlock),
            "finalised" => Some(Self::Finalised),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// States that can still lose a race against a competing submission.
    pub fn is_settleable(&self) -> bool {
        matches!(self, Self::Submitted | Self::InBlock)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionApiType {
    DemandA,
    DemandB,
    Match2,
    Permission,
}

impl TransactionApiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DemandA => "demand_a",
            Self::DemandB => "demand_b",
            Self::Match2 => "match2",
            Self::Permission => "permission",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "demand_a" => Some(Self::DemandA),
            "demand_b" => Some(Self::DemandB),
            "match2" => Some(Self::Match2),
            "permission" => Some(Self::Permission),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Creation,
    Proposal,
    Accept,
    Comment,
    Rejection,
    Cancellation,
    Revocation,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::Proposal => "proposal",
            Self::Accept => "accept",
            Self::Comment => "comment",
            Self::Rejection => "rejection",
            Self::Cancellation => "cancellation",
            Self::Revocation => "revocation",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "creation" => Some(Self::Creation),
            "proposal" => Some(Self::Proposal),
            "accept" => Some(Self::Accept),
            "comment" => Some(Self::Comment),
            "rejection" => Some(Self::Rejection),
            "cancellation" => Some(Self::Cancellation),
            "revocation" => Some(Self::Revocation),
            _ => None,
        }
    }
}

/// Record of a locally-submitted extrinsic, correlated with its eventual
/// on-chain outcome via `hash` (the call hash).
///
/// Several records may share a `local_id` (competing submissions for the same
/// entity); at most one ever reaches `Finalised` for a given causal slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub local_id: LocalId,
    pub api_type: TransactionApiType,
    pub transaction_type: TransactionType,
    pub state: TransactionState,
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
