//! Transcript cleanup: local punctuation normalisation plus the LLM gateway.
//!
//! The LLM is an external black box behind [`TextCleaner`].  Whatever it
//! returns (or however it fails), the pipeline always completes — cleanup
//! failure degrades to delivering the raw transcript.

pub mod cleaner;
pub mod punct;

pub use cleaner::{ApiCleaner, CleanupError, TextCleaner};
pub use punct::collapse_punctuation;
