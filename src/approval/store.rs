use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::approval::workflow::ApprovedUser;
use crate::error::AppResult;

/// Durable approved-user list: one JSON array of `{username, pub_key}`
/// records, rewritten as a whole on every approval. The O(n) rewrite is an
/// accepted cost; approvals are operator-paced and the list is small.
pub struct ApprovalStore {
    path: PathBuf,
}

impl ApprovalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted set. A missing file is an empty set, not an
    /// error; an unreadable or unparseable file is an error the caller must
    /// handle (at startup it is fatal).
    pub async fn load(&self) -> AppResult<Vec<ApprovedUser>> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    /// Write the full serialized list to a sibling temp path, then rename
    /// onto the canonical path. The rename is the single commit point; a
    /// crash mid-write never leaves a truncated store.
    pub async fn save(&self, users: &[ApprovedUser]) -> AppResult<()> {
        let data = serde_json::to_vec_pretty(users)?;

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, &data).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
