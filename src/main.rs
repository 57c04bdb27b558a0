use std::io;

mod app;

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();
    app::run().await
}
