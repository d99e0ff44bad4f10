//! Text splitters for Fabula.
//!
//! Splitters turn a novel's text into bounded, overlapping spans whose
//! byte offsets are tracked exactly, so any chunk can be mapped back to
//! its place in the source and the source can be reconstructed from the
//! chunk spans.
//!
//! # Example
//!
//! ```
//! use fabula_text_splitters::{RecursiveCharacterTextSplitter, TextSplitter};
//!
//! let splitter = RecursiveCharacterTextSplitter::new()
//!     .with_chunk_size(500)
//!     .with_chunk_overlap(50);
//! let chunks = splitter.split_text("Some novel text...").unwrap();
//! assert_eq!(chunks.len(), 1);
//! ```

mod character;
mod error;
mod split_utils;
mod traits;

pub use character::{CharacterTextSplitter, RecursiveCharacterTextSplitter};
pub use error::{Error, Result};
pub use split_utils::split_by_length;
pub use traits::{TextSplitter, TextSplitterConfig};
