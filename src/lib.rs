//! Recyclable-waste detection service.
//!
//! Layout follows ports and adapters: `domain` holds the value types and
//! error taxonomy, `application` the use cases (image resolution, detector
//! cache, normalization, orchestration) and the ports they depend on, and
//! `adapters` the ONNX detector, the HTTP image fetcher and the axum API.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
