use std::sync::Arc;

use crate::adapters::http::error::ApiError;
use crate::application::services::DetectionService;
use crate::domain::errors::DomainError;

/// Estado compartido para los manejadores HTTP de Axum.
/// Siguiendo la Arquitectura Hexagonal, el estado contiene los casos de uso.
#[derive(Clone)]
pub struct HttpState {
    /// Servicio de detección, junto con la caché de modelos que utiliza.
    pub detection: Arc<DetectionService>,
    /// Si está activo, las respuestas de error incluyen el detalle interno en `details`.
    pub debug: bool,
    pub max_upload_bytes: usize,
}

impl HttpState {
    pub fn fail(&self, error: DomainError) -> ApiError {
        ApiError { error, debug: self.debug }
    }
}
