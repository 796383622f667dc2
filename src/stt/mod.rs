//! Speech recognition: the black-box engine contract and the per-batch
//! invoker.

pub mod engine;
pub mod invoker;

pub use engine::{MockRecognizer, RecognitionEngine, RecognitionStream};
pub use invoker::RecognitionInvoker;
