//! Transport clients
//!
//! Implementations of [`TransportClient`](crate::domain::ports::TransportClient)
//! per platform. Only Kubernetes has one today.

pub mod k8s;

pub use k8s::K8sTransportClient;
