// grantdesk-core/src/runtime/mod.rs
// ============================================================================
// Module: Grantdesk Runtime
// Description: Lifecycle engine and in-memory storage for tests and tools.
// Purpose: Group the runtime surfaces that hosts embed.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Runtime modules implement proposal lifecycle evaluation on top of the
//! port traits in [`crate::interfaces`]. Hosts construct a
//! [`LifecycleEngine`] with their chosen storage, document store, and
//! notifier; [`InMemoryStorage`] backs tests and ephemeral tooling.

/// Proposal lifecycle engine.
pub mod engine;
/// In-memory storage implementation.
pub mod memory;

pub use engine::CallPatch;
pub use engine::DashboardStats;
pub use engine::EngineError;
pub use engine::LifecycleEngine;
pub use engine::NewCall;
pub use engine::NewProposal;
pub use engine::NewRevision;
pub use engine::ProposalDetail;
pub use engine::ReviewDecision;
pub use memory::InMemoryStorage;
pub use memory::MemoryDocumentStore;
pub use memory::RecordingNotifier;
