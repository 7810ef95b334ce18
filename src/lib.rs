//! # elastomeric
//!
//! In-process, thread-safe, observable key-value store.
//!
//! One shared model maps typed keys ([`Elastomer`]) to values. Every read,
//! write, and subscription is funneled through a single-consumer serializer
//! task, so all callers observe one total order of mutations without any
//! locking. Observers are notified asynchronously, each on the execution
//! context it registered with.
//!
//! ## Architecture
//!
//! ```text
//! Callers (any task, any thread)
//!     │
//!     ├── Elastomer (domain/)        typed key descriptor
//!     ├── Archive handle (archive/)  stage / express / observe / retire
//!     │        │
//!     │   command queue (one per archive)
//!     │        │
//!     ├── Serializer task            sole owner of model + registry
//!     │        │
//!     └── ExecutionContext (context/)  per-observer delivery, FIFO
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use elastomeric::{Archive, Elastomer, ExecutionContext, SerialContext};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let archive = Archive::new();
//! let door_open = Elastomer::new::<bool>("door_open");
//!
//! // Writes enqueue and return immediately; reads are async and
//! // linearized with writes, so a caller reads its own writes.
//! archive.stage(&door_open, true, true);
//! assert_eq!(archive.express_as::<bool>(&door_open).await, Ok(Some(true)));
//!
//! // A write of the wrong type is silently ignored.
//! archive.stage(&door_open, 27i64, true);
//! assert_eq!(archive.express_as::<bool>(&door_open).await, Ok(Some(true)));
//!
//! // Observers run on an execution context captured at registration.
//! let context: Arc<dyn ExecutionContext> = Arc::new(SerialContext::new());
//! let receipt = archive.observe(&door_open, context, |mutation| {
//!     if let (Some(was), Some(now)) = (mutation.old_as::<bool>(), mutation.new_as::<bool>()) {
//!         println!("door_open: {was} -> {now}");
//!     }
//! });
//!
//! archive.stage(&door_open, false, true);
//! archive.retire(receipt);
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;

pub use archive::Archive;
pub use config::ArchiveConfig;
pub use context::{ExecutionContext, SerialContext, Task};
pub use domain::{Elastomer, ErasedValue, Mutation, ObserverReceipt, erase};
pub use error::ArchiveError;
