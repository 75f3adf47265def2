use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    formpilot_cli::cli::app::run().await
}
