//! Data access for documents and evaluations.

pub mod documents;
pub mod evaluations;

pub use documents::{DocumentRepository, NewDocument};
pub use evaluations::{EvaluationRepository, EvaluationResult};
