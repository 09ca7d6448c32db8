use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use signqueue::{routes, settings::Settings, state::ServiceCollection};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().json().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Could not init tracing.");

    let settings = Settings::from_env();
    for key in settings.missing_required() {
        warn!("Missing env var {}", key);
    }
    if settings.dry_run {
        info!("Dry run enabled, files are returned unsigned");
    }
    let port = settings.port;

    let services = ServiceCollection::build(settings).await.expect("Could not create upload directory.");
    let app = routes::create_router(services);

    let addr = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port);
    info!("listening on {}", &addr);
    axum::Server::bind(&addr).serve(app.into_make_service()).await.expect("Server failed.");
}
