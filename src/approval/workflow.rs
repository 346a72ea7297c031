use serde::{Deserialize, Serialize};
use tracing::info;

use crate::approval::store::ApprovalStore;
use crate::error::{AppError, AppResult};

/// A participant identity as supplied by the provisioning step: a username
/// and a PEM-encoded public key. The key is carried verbatim and never used
/// cryptographically here. No uniqueness constraint is enforced anywhere;
/// duplicate usernames are permitted by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub username: String,
    pub pub_key: String,
}

/// An identity awaiting operator approval, with its server-assigned
/// submission timestamp (Unix seconds).
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub identity: Identity,
    pub submitted_at: i64,
}

/// An identity promoted by the operator. Persisted; never removed (there is
/// no revoke).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovedUser {
    #[serde(flatten)]
    pub identity: Identity,
}

/// The join/approval state machine: Unknown → Pending → Approved. There is
/// no Denied state. Both queues are owned here exclusively; callers reach
/// them through one shared `Mutex` around the workflow.
pub struct JoinWorkflow {
    pending: Vec<PendingRequest>,
    approved: Vec<ApprovedUser>,
    store: ApprovalStore,
}

impl JoinWorkflow {
    pub fn new(store: ApprovalStore, approved: Vec<ApprovedUser>) -> Self {
        Self {
            pending: Vec::new(),
            approved,
            store,
        }
    }

    /// Queue a join request with a server-assigned timestamp. No dedup
    /// against existing pending entries or already-approved users; repeated
    /// requests accumulate.
    pub fn submit(&mut self, identity: Identity) {
        info!(username = %identity.username, "join request queued");
        self.pending.push(PendingRequest {
            identity,
            submitted_at: chrono::Utc::now().timestamp(),
        });
    }

    /// Pending requests in insertion order, for operator inspection.
    pub fn pending(&self) -> &[PendingRequest] {
        &self.pending
    }

    pub fn approved(&self) -> &[ApprovedUser] {
        &self.approved
    }

    /// Promote the earliest pending request matching `username`: remove that
    /// one entry (duplicates stay pending), append to the approved set, and
    /// persist the full set.
    ///
    /// If persistence fails the in-memory promotion stands and the error is
    /// returned for the caller to report, so the sets may drift from disk
    /// across a restart.
    pub async fn approve(&mut self, username: &str) -> AppResult<()> {
        let index = self
            .pending
            .iter()
            .position(|request| request.identity.username == username)
            .ok_or_else(|| AppError::PendingNotFound(username.to_string()))?;

        let request = self.pending.remove(index);
        info!(username = %request.identity.username, "approving user");
        self.approved.push(ApprovedUser {
            identity: request.identity,
        });

        self.store.save(&self.approved).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(username: &str, pub_key: &str) -> Identity {
        Identity {
            username: username.to_string(),
            pub_key: pub_key.to_string(),
        }
    }

    fn workflow_in(dir: &tempfile::TempDir) -> JoinWorkflow {
        let store = ApprovalStore::new(dir.path().join("approved_users.json"));
        JoinWorkflow::new(store, Vec::new())
    }

    #[tokio::test]
    async fn approve_promotes_the_earliest_duplicate_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut workflow = workflow_in(&dir);
        workflow.submit(identity("alice", "<PEM-first>"));
        workflow.submit(identity("alice", "<PEM-second>"));

        workflow.approve("alice").await.unwrap();

        assert_eq!(workflow.pending().len(), 1);
        assert_eq!(workflow.pending()[0].identity.pub_key, "<PEM-second>");
        assert_eq!(workflow.approved().len(), 1);
        assert_eq!(workflow.approved()[0].identity.pub_key, "<PEM-first>");
    }

    #[tokio::test]
    async fn approve_unknown_username_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut workflow = workflow_in(&dir);
        workflow.submit(identity("alice", "<PEM>"));

        let err = workflow.approve("mallory").await.unwrap_err();
        assert!(matches!(err, AppError::PendingNotFound(name) if name == "mallory"));
        assert_eq!(workflow.pending().len(), 1);
        assert!(workflow.approved().is_empty());
    }

    #[tokio::test]
    async fn already_approved_username_still_queues() {
        let dir = tempfile::tempdir().unwrap();
        let mut workflow = workflow_in(&dir);
        workflow.submit(identity("bob", "<PEM1>"));
        workflow.approve("bob").await.unwrap();

        workflow.submit(identity("bob", "<PEM2>"));
        assert_eq!(workflow.pending().len(), 1);
        assert_eq!(workflow.approved().len(), 1);
    }

    #[tokio::test]
    async fn failed_persistence_keeps_the_in_memory_promotion() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist, so the store write fails.
        let store = ApprovalStore::new(dir.path().join("missing").join("approved_users.json"));
        let mut workflow = JoinWorkflow::new(store, Vec::new());
        workflow.submit(identity("alice", "<PEM>"));

        let err = workflow.approve("alice").await.unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
        assert!(workflow.pending().is_empty());
        assert_eq!(workflow.approved().len(), 1);
    }
}
