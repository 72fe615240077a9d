//! Adapters between the reconciler and the cluster API

mod cluster;
mod kube_cluster;
pub mod memory;
pub mod secret;

pub use cluster::*;
pub use kube_cluster::*;
pub use memory::InMemoryCluster;
