//! Dump the wallet API's OpenAPI document as JSON.
//!
//! Usage:
//!   cargo run --bin export_openapi > openapi.json
//!   cargo run --bin export_openapi -- --output docs/openapi.json

use utoipa::OpenApi;
use walletd::gateway::openapi::ApiDoc;

fn main() {
    let doc = ApiDoc::openapi();
    let json = doc
        .to_pretty_json()
        .expect("OpenAPI document failed to serialize");

    let args: Vec<String> = std::env::args().collect();
    match args.iter().position(|a| a == "--output") {
        Some(i) => {
            let path = args
                .get(i + 1)
                .expect("--output requires a file path argument");
            std::fs::write(path, &json).expect("Failed to write file");
            eprintln!("✅ OpenAPI document written to {}", path);
        }
        None => println!("{}", json),
    }
}
