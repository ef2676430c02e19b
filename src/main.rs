#[tokio::main]
async fn main() {
    gorestro::start_server().await;
}
