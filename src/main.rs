#[tokio::main]
async fn main() {
    if let Err(e) = tytronis_lib::run().await {
        eprintln!("tytronis: {}", e);
        std::process::exit(1);
    }
}
