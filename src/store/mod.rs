//! On-disk attachment store: naming, deduplication, checkpointing.

pub mod checkpoint;
pub mod filter;
pub mod guard;

pub use checkpoint::StoreIndex;
pub use filter::{resolve_attachment, AttachmentTarget, ALLOWED_EXTENSIONS};
pub use guard::{store_attachment, StoreOutcome};
