//! Keeps the on-device event cache in step with the hosted backend and
//! maintains the user↔event saved relation and the user's profile record.

pub mod backend;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod platform;
pub mod profile;
pub mod relations;

pub use backend::{AuthSession, Connectivity, ObjectStorage, RealtimeDatabase};
pub use coordinator::{Observation, RefreshOutcome, SyncCoordinator};
pub use error::{BackendError, FetchError, ProfileWriteError, RelationWriteError};
pub use gateway::RemoteEventGateway;
pub use profile::ProfileWriter;
pub use relations::SavedEventRelations;
