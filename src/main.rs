#[tokio::main]
async fn main() {
    civic::start_server().await;
}
