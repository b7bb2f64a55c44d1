//! MathSpace Context Layer
//!
//! Everything the pipeline knows about the past and the present:
//!
//! - [`ConversationStore`]: durable, capacity-bounded log of [`Turn`]s
//! - [`summarize`]: compact [`ContextDigest`] over the newest turns
//! - [`CurrentArtifactInspector`]: fresh snapshot of the live scene file
//! - [`Workspace`]: on-disk layout, reset and output publishing
//!
//! Snapshots and digests are recomputed on every request and never cached.
//!
//! # Example
//!
//! ```rust,ignore
//! use mathspace_context::{summarize, ConversationStore, Workspace};
//!
//! let workspace = Workspace::new("static", "temp_gen");
//! workspace.ensure_layout()?;
//!
//! let store = ConversationStore::new(workspace.history_path(), 15);
//! let digest = summarize(&store.load_all());
//! println!("{}", digest.text);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod history;
pub mod inspector;
pub mod store;
pub mod summary;
pub mod workspace;

pub use error::{StoreError, WorkspaceError};
pub use history::{ConversationHistory, Turn};
pub use inspector::{CurrentArtifactInspector, CurrentArtifactSnapshot, LiveArtifact};
pub use store::ConversationStore;
pub use summary::{summarize, summarize_window, ContextDigest, IntentTrend, StyleMarker, DIGEST_WINDOW};
pub use workspace::{Workspace, NO_CURRENT_CODE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
