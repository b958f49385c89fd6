pub mod assigner;
pub mod attribution;
pub mod error;
pub mod mapper;
pub mod platform;
pub mod serializer;
pub mod snapshot;

pub use assigner::{RetryPolicy, RoleAssigner};
pub use attribution::attribute;
pub use error::{AssignError, MappingError, PlatformError, SerializerError, SnapshotError};
pub use mapper::{MappedRole, RoleMapper, RoleMapping};
pub use platform::Platform;
pub use serializer::{JoinOutcome, JoinSerializer, RoleOutcome};
pub use snapshot::InviteSnapshotStore;
