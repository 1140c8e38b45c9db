pub mod detection;
pub mod errors;
pub mod image;
pub mod model;
pub mod result;
pub mod stats;
