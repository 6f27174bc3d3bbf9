//! Batched, cached neural-net inference for the search engine.
//!
//! - [`Backend`]: one forward pass over a batch of encoded positions
//! - [`NnEvaluator`]: the shared service that queues requests from many
//!   search threads, batches them for the backend, applies board
//!   symmetries and caches the post-processed [`NnOutput`]s
//!
//! Two model-free backends are provided for testing: [`UniformBackend`]
//! and [`RandomBackend`].

pub mod backend;
pub mod cache;
pub mod error;
pub mod evaluator;
pub mod output;
pub mod symmetry;

pub use backend::{Backend, BackendError, InputBatch, RandomBackend, RawOutput, UniformBackend};
pub use cache::NnCache;
pub use error::NnEvalError;
pub use evaluator::{NnEvalOptions, NnEvaluator};
pub use output::{masked_softmax, NnOutput};
pub use symmetry::SymmetryPolicy;

#[cfg(test)]
mod tests;
