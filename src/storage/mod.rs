//! Object storage
//!
//! URL-addressed blob stores: S3, local files, and a scheme router.

pub mod blob;
pub mod local;
pub mod router;
pub mod s3;

pub use blob::{BlobStore, S3Location};
pub use local::LocalStore;
pub use router::BlobRouter;
pub use s3::{S3Config, S3Store};
