//! Transcript text normalization.

pub mod normalize;

pub use normalize::{general_cleanup, language_normalize, TextNormalizer};
