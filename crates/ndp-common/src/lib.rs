//! NDP Common Library
//!
//! Shared types, utilities, and error handling for the ndp workspace:
//!
//! - **Error Handling**: the shared error enum and result alias
//! - **Logging**: tracing subscriber initialization
//! - **Object Storage**: the S3-backed artifact store
//! - **Gene Index**: the serialized gene-id → display-name lookup

pub mod error;
pub mod gene_index;
pub mod logging;
pub mod storage;

// Re-export commonly used types
pub use error::{NdpError, Result};
