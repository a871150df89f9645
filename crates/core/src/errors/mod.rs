//! Failure normalization

mod normalizer;

pub use normalizer::{classify, ErrorNormalizer, FailureContext};
