// crates/loanq-eval/src/lib.rs
// ============================================================================
// Module: LoanQ Evaluation Library
// Description: State Loader, State Cache, Question Evaluator, Queue Builder,
// and Answer Handler — the runtime pipeline over loanq-core and loanq-rules.
// Purpose: Turn a proposal pid into an ordered question queue, and an answer
// submission into updated loan state, within the per-call latency budget.
// Dependencies: loanq-core, loanq-rules, rayon, tokio, thiserror
// ============================================================================

//! ## Overview
//! `loanq-eval` wires the narrow interfaces from `loanq-core`
//! ([`loanq_core::SystemOfRecord`], [`loanq_core::RemoteCache`],
//! [`loanq_core::WriteBackQueue`]) and the compiled criteria from
//! `loanq-rules` into the pipeline a `GetQuestions`/`SubmitAnswer` RPC call
//! actually runs: [`loader::StateLoader`] resolves a pid against the system
//! of record, [`cache::StateCache`] makes that resolution read-through and
//! write-through against the remote cache, [`evaluator::QuestionEvaluator`]
//! runs compiled criteria against merged context under a latency budget, and
//! [`queue::QueueBuilder`]/[`answer::AnswerHandler`] turn the result into the
//! ordered queue and the answer-submission side effects.

#![deny(missing_docs)]

pub mod answer;
pub mod cache;
pub mod evaluator;
pub mod loader;
pub mod queue;

pub use answer::AnswerError;
pub use answer::AnswerHandler;
pub use cache::StateCache;
pub use cache::StateCacheError;
pub use evaluator::EvaluatorConfig;
pub use evaluator::QuestionEvaluator;
pub use loader::LoaderError;
pub use loader::StateLoader;
pub use queue::CanAskTogetherGroup;
pub use queue::QueueBuilder;
pub use queue::QuestionQueueResponse;
