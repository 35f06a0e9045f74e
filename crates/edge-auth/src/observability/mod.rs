//! Observability for the edge gate.
//!
//! Provides the Prometheus recorder and metric recording helpers.

pub mod metrics;
