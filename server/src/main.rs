#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let config = todos_server::config::Config::from_env()?;
    todos_server::web::start_web_server(config).await
}
