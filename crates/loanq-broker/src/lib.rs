// crates/loanq-broker/src/lib.rs
// ============================================================================
// Module: LoanQ Broker Library
// Description: Reference `RemoteCache` and `WriteBackQueue` adapters.
// Purpose: Stand in for the out-of-scope key/value client and message-queue
// client in tests and local runs.
// Dependencies: loanq-core, async-trait, rmp-serde, tokio
// ============================================================================

//! ## Overview
//! `loanq-broker` provides two reference collaborators: [`InMemoryRemoteCache`]
//! (a [`loanq_core::RemoteCache`] backed by an in-process map rather than a
//! real key/value store) and [`ChannelWriteBackQueue`] (a
//! [`loanq_core::WriteBackQueue`] backed by a bounded Tokio channel rather
//! than a real message broker). Production deployments supply real clients
//! instead; these exist so the rest of the pipeline has a fully working
//! collaborator to run against.

#![deny(missing_docs)]

pub mod cache;
pub mod queue;

pub use cache::InMemoryRemoteCache;
pub use queue::ChannelWriteBackQueue;
pub use queue::WriteBackMessage;
