//! Queries and the store that records their status.

use std::{fmt, str::FromStr};

use medchain_ledger::MedchainLedgerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A query id of the form `token:project:action`.
///
/// The token is a client-chosen nonce that keeps ids unique within one
/// project and action.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryId {
    text: String,
    project_start: usize,
    action_start: usize,
}

impl QueryId {
    /// The client nonce.
    pub fn token(&self) -> &str {
        &self.text[..self.project_start - 1]
    }

    /// The project the query targets.
    pub fn project(&self) -> &str {
        &self.text[self.project_start..self.action_start - 1]
    }

    /// The action the query asks to perform.
    pub fn action(&self) -> &str {
        &self.text[self.action_start..]
    }

    /// Full textual form.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for QueryId {
    type Err = MedchainLedgerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let fields = value.split(':').collect::<Vec<_>>();
        match fields.as_slice() {
            [token, project, action]
                if !token.is_empty() && !project.is_empty() && !action.is_empty() =>
            {
                Ok(QueryId {
                    text: value.to_string(),
                    project_start: token.len() + 1,
                    action_start: token.len() + project.len() + 2,
                })
            }
            _ => Err(MedchainLedgerError::InvalidArgument(format!(
                "query id '{value}' is not token:project:action"
            ))),
        }
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryId({})", self.text)
    }
}

impl Serialize for QueryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for QueryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Where a query is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryStatus {
    /// Recorded, not yet decided
    Submitted,
    /// Every signer was authorized
    Authorized,
    /// At least one signer was not authorized
    Rejected,
    /// Run after authorization
    Executed,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryStatus::Submitted => "Submitted",
            QueryStatus::Authorized => "Authorized",
            QueryStatus::Rejected => "Rejected",
            QueryStatus::Executed => "Executed",
        })
    }
}

impl FromStr for QueryStatus {
    type Err = MedchainLedgerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Submitted" => Ok(QueryStatus::Submitted),
            "Authorized" => Ok(QueryStatus::Authorized),
            "Rejected" => Ok(QueryStatus::Rejected),
            "Executed" => Ok(QueryStatus::Executed),
            _ => Err(MedchainLedgerError::InvalidArgument(format!(
                "unknown query status '{value}'"
            ))),
        }
    }
}

/// One query record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Query id
    pub id: QueryId,
    /// Current status
    pub status: QueryStatus,
}

/// Ordered query records of one project, keyed by id.
///
/// Records are never removed. Updating an existing id overwrites its status
/// in place; updating an unknown id appends a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryStore(Vec<Query>);

impl QueryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The record for `id`.
    pub fn get(&self, id: &QueryId) -> Option<&Query> {
        self.0.iter().find(|query| &query.id == id)
    }

    /// Add a new record; fails if `id` is already present.
    pub fn spawn(&mut self, id: QueryId, status: QueryStatus) -> Result<(), MedchainLedgerError> {
        if self.get(&id).is_some() {
            return Err(MedchainLedgerError::InvalidArgument(format!(
                "query {id} already exists"
            )));
        }
        self.0.push(Query { id, status });
        Ok(())
    }

    /// Overwrite the status of `id` in place, or append a new record.
    pub fn update(&mut self, id: QueryId, status: QueryStatus) {
        match self.0.iter_mut().find(|query| query.id == id) {
            Some(query) => query.status = status,
            None => self.0.push(Query { id, status }),
        }
    }

    /// Succeeds only if `id` is recorded as `Authorized`.
    pub fn verify_status(&self, id: &QueryId) -> Result<(), MedchainLedgerError> {
        match self.get(id) {
            None => Err(MedchainLedgerError::NotFound(format!("query {id}"))),
            Some(query) if query.status == QueryStatus::Authorized => Ok(()),
            Some(query) => Err(MedchainLedgerError::Denied(format!(
                "query {id} is {}, not Authorized",
                query.status
            ))),
        }
    }

    /// Records with the given status, in store order.
    pub fn search(&self, status: QueryStatus) -> Vec<&Query> {
        self.0.iter().filter(|query| query.status == status).collect()
    }

    /// All records in store order.
    pub fn iter(&self) -> impl Iterator<Item = &Query> {
        self.0.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No records.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
