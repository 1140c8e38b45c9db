use axum::http::HeaderValue;
use clap::Parser;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use recyclable_detector::{
    adapters::{
        fetch::http_fetcher::HttpImageFetcher,
        http::{router, state::HttpState},
        onnx::model_catalog::OnnxModelLoader,
    },
    application::{
        detector_cache::DetectorCache,
        image_source::ImageResolver,
        services::DetectionService,
    },
    config::AppConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Inicializar logs (RUST_LOG=info por defecto)
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cfg = AppConfig::parse();
    tracing::info!("🔧 Inicializando adaptadores de infraestructura...");

    // 2. Instanciar Adaptadores (Capa de Infraestructura)
    let loader = Arc::new(OnnxModelLoader::new(cfg.input_size, cfg.intra_threads));
    let fetcher = Arc::new(HttpImageFetcher::new(cfg.fetch_timeout(), cfg.max_upload_bytes)?);

    // 3. Casos de uso. La caché de modelos se crea aquí y se entrega al servicio.
    let cache = Arc::new(DetectorCache::new(loader, cfg.default_model()));
    let resolver = ImageResolver::new(fetcher).with_max_dimension(cfg.max_image_dimension);
    let detection = Arc::new(DetectionService::new(resolver, cache.clone()));

    if cfg.preload {
        match cache.acquire().await {
            Ok(c) => tracing::info!("✅ Modelo precargado: {} en {}", c.config().model_path, c.device()),
            Err(e) => tracing::warn!("⚠️ No se pudo precargar el modelo {}: {}", cfg.model_path, e),
        }
    }

    // 4. Configurar el Estado y el Router de la API
    let state = HttpState {
        detection,
        debug: cfg.debug,
        max_upload_bytes: cfg.max_upload_bytes,
    };
    let cors = match cfg.cors_origin_list() {
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
        }
    };
    let app = router(state).layer(cors).layer(TraceLayer::new_for_http());

    // 5. Lanzar el Servidor
    let addr = cfg.bind_addr();
    tracing::info!("🚀 API de detección iniciada en http://{}", addr);
    if cfg.debug {
        tracing::warn!("Debug mode: error responses include internal details");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
