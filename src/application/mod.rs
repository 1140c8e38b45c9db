pub mod detector_cache;
pub mod dto;
pub mod image_source;
pub mod normalizer;
pub mod ports;
pub mod services;
