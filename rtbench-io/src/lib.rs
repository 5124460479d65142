//! rtbench I/O: the platform layer.
//!
//! Everything here talks to the kernel directly: page locking, CPU affinity,
//! scheduler policy validation and thread creation with explicit scheduling
//! attributes. Nothing in this crate decides whether a failure is fatal; every
//! operation returns a [`PlatformError`] and the caller picks the policy.

pub mod error;
pub mod platform;

pub use error::PlatformError;
pub use platform::affinity::{self, pin_thread_to_core, DEFAULT_CPU};
pub use platform::lock_memory_pages as lock_all_memory;
pub use platform::sched::{SchedAttrs, SchedPolicy};
pub use platform::thread::{spawn_explicit, RawThread};
pub use platform::topology::SystemTopology;
