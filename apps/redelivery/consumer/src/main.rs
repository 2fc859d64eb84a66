//! Redelivery Consumer
//!
//! Binary entry point.

#[tokio::main]
async fn main() {
    if let Err(e) = redelivery_consumer::run().await {
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}
