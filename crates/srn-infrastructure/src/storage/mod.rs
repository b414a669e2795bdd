//! Storage primitives shared by the file-backed repositories and adapters.
//!
//! - **ACID guarantees**: Atomic writes, file locking, fsync
//! - **Format neutral**: TOML for records and config, JSON for stored items

mod atomic_file;

pub use atomic_file::{AtomicFile, FileFormat, FileLock, write_atomic};
