//! Mock Kubernetes API server for testing.
//!
//! Provides an HTTP server that can be used with kubeconfig-based connections.
//! It stores whatever manifests it is seeded with, answers GET/PATCH/POST on
//! their API paths and can be told to reject writes to specific objects.

pub mod catalog;
mod helpers;
pub mod http;

pub use catalog::{CatalogEntry, ResourceCatalog};
pub use http::{HttpMockK8sServer, RunningHttpMockK8sServer};
