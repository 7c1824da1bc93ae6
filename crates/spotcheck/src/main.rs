use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = cli::App::parse();
    spotcheck::telemetry::init(app.log_level.as_deref());
    app.execute().await
}
