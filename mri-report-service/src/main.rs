use mri_report_service::create_app;
use tokio::net::TcpListener;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Check required environment variables
    for var in [
        "OPENROUTER_API_KEY",
        "FIREBASE_API_KEY",
        "FIREBASE_DB_URL",
        "FIREBASE_STORAGE_BUCKET",
    ] {
        if std::env::var(var).is_err() {
            eprintln!("Error: {var} environment variable is required");
            std::process::exit(1);
        }
    }

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);

    let app = create_app().await;
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    let addr = listener.local_addr()?;

    info!("MRI Report Service starting on {}", addr);
    info!("Report endpoint: POST http://{}/reports", addr);
    info!(
        "Chat endpoints: POST http://{}/chat/enter, POST http://{}/chat/query",
        addr, addr
    );

    axum::serve(listener, app).await?;

    Ok(())
}
