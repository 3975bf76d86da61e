//! Cloud provider plumbing
//!
//! Instance metadata, credentials, request signing, autoscaling and DDNS.

pub mod autoscaling;
pub mod credentials;
pub mod ddns;
pub mod metadata;
pub mod sigv4;

pub use autoscaling::{AutoScalingClient, ClusterControl};
pub use credentials::{CredentialSource, Credentials, DefaultCredentialChain};
pub use ddns::update_ddns;
pub use metadata::MetadataClient;
