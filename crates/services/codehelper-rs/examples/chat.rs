//! Example streaming one chat answer to stdout.
//!
//! Run with: cargo run --example chat -- 42 "explain this stack trace"
//!
//! Expects the backend at `$CODEHELPER_BASE_URL` or `http://localhost:8081/api`.

use codehelper_rs::{ChatRequest, ClientBuilder};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let session = args.next().unwrap_or_else(|| "1".to_string());
    let message = args.next().unwrap_or_else(|| "hello".to_string());

    let client = ClientBuilder::new().build()?;
    println!("Backend: {}", client.base_url());

    if !client.check_health().await {
        println!("Backend is not reachable.");
        return Ok(());
    }

    let mut sub = client.subscribe_chat(ChatRequest::new(session, message));
    let mut stdout = std::io::stdout();
    while let Some(item) = sub.recv().await {
        match item {
            Ok(chunk) => {
                stdout.write_all(chunk.as_bytes())?;
                stdout.flush()?;
            }
            Err(e) => eprintln!("\nstream error: {e}"),
        }
    }
    println!();

    Ok(())
}
