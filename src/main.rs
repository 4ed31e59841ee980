use axum_server::tls_rustls::RustlsConfig;
use cham::{
    IoResult, cli,
    config::{Level, string_to_ip},
    router::router,
    state::AppState,
};
use std::{
    net::SocketAddr,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceBuilder;
use tower_http::{
    CompressionLevel,
    compression::{
        CompressionLayer, Predicate,
        predicate::{NotForContentType, SizeAbove},
    },
    decompression::RequestDecompressionLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{
    field::MakeExt,
    fmt::{Subscriber, format::debug_fn},
};

mod cham;

static APP_START: once_cell::sync::Lazy<u64> = once_cell::sync::Lazy::new(|| {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
});

#[tokio::main]
async fn main() -> IoResult<()> {
    let formatter =
        debug_fn(|writer, field, value| write!(writer, "{field}: {value:?}")).delimited(",");

    let config = cli::init().unwrap_or_else(|e| panic!("Failed to load config: {e}"));
    let level = Level::try_from(config.logging().level.as_str());

    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    Subscriber::builder()
        .with_max_level(level.as_ref().copied().unwrap_or(Level::INFO).0)
        .fmt_fields(formatter)
        .with_ansi(true)
        .init();

    if let Err(e) = level {
        warn!("{e}, falling back to INFO");
    }

    // Uptime counts from here.
    once_cell::sync::Lazy::force(&APP_START);

    let root = config.site().root.clone().unwrap_or_else(|| {
        error!("Invalid root path");
        PathBuf::new()
    });

    if !root.exists() || !root.is_dir() {
        warn!("Root path is empty or failed to unwrap, will only resolve 404 page.");
    }

    debug!("root: {root:?}");

    let state = AppState::new(&config).map_err(std::io::Error::other)?;

    let compression_predicate = SizeAbove::new(256).and(NotForContentType::IMAGES);

    let app = router(state, root).layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http().make_span_with(
                    DefaultMakeSpan::new()
                        .level(tracing::Level::INFO)
                        .include_headers(false),
                ),
            )
            .layer(RequestDecompressionLayer::new())
            .layer(
                CompressionLayer::new()
                    .no_br()
                    .no_deflate()
                    .gzip(true)
                    .zstd(true)
                    .quality(CompressionLevel::Fastest)
                    .compress_when(compression_predicate),
            ),
    );
    //
    // This adds compression and decompression to the request and response
    // body streams, don't remove it!
    //

    let ip = string_to_ip(&config.network().ip).unwrap_or_else(|e| panic!("invalid ip: {e}"));
    let addr = SocketAddr::from((ip, config.network().port));

    if config.tls().enable {
        let cert_path = config
            .tls()
            .cert
            .clone()
            .unwrap_or_else(|| panic!("invalid cert path"));
        let key_path = config
            .tls()
            .key
            .clone()
            .unwrap_or_else(|| panic!("invalid key path"));

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path).await?;
        info!("serving https on {addr}");
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
    } else {
        info!("serving http on {addr}");
        axum_server::bind(addr)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
    }
}
