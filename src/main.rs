#[tokio::main]
async fn main() -> anyhow::Result<()> {
    code_timer_lib::run().await
}
