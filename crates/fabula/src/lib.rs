//! Fabula core: the data model and building blocks of a
//! retrieval-augmented character knowledge engine for novels.
//!
//! A novel is loaded as a [`Document`], split into offset-tracked
//! [`Chunk`]s, embedded into a [`ChunkIndex`], and analyzed into
//! [`Chapter`] and [`Character`] records. Chat turns ground character
//! replies in chunks retrieved by a [`ChunkRetriever`].
//!
//! External collaborators sit behind three traits: [`Embeddings`],
//! [`ChatModel`] and [`BlobStore`]. Everything returns [`Result`] with a
//! single [`Error`] taxonomy; transient collaborator failures are marked
//! retryable and handled by [`retry::with_retry`].

pub mod documents;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod language_models;
pub mod messages;
pub mod novel;
pub mod retrievers;
pub mod retry;
pub mod storage;
pub mod usage;

pub use documents::{clean_text, Chunk, Document, TextStats};
pub use embeddings::{Embeddings, MockEmbeddings};
pub use error::{Error, Result};
pub use index::{cosine_similarity, ChunkIndex, DEFAULT_EMBED_BATCH_SIZE};
pub use language_models::ChatModel;
pub use messages::{Message, Role};
pub use novel::{Chapter, Character};
pub use retrievers::ChunkRetriever;
pub use retry::{with_retry, RetryPolicy};
pub use storage::{BlobStore, FileBlobStore, InMemoryBlobStore};
