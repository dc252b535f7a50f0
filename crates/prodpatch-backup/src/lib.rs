mod descriptor;
mod error;
mod layout;
mod names;
mod store;

pub use descriptor::{read_descriptor, write_descriptor, Descriptor};
pub use error::BackupError;
pub use layout::{default_state_root, StateLayout};
pub use names::{BackupName, PRISTINE_NAME, TIMESTAMP_FORMAT};
pub use store::{BackupEntry, BackupOptions, BackupOutcome, BackupStore};
