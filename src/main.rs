#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fundamentals_sync::run().await
}
