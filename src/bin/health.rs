use std::env;
use std::error;

use reqwest::Url;

/// Exits non-zero unless `<base url>/health` answers with a success status.
fn main() -> Result<(), Box<dyn error::Error>> {
    let base = env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:25566".to_string());

    let url = Url::parse(&base)?.join("/health")?;

    let response = reqwest::blocking::get(url)?;
    if !response.status().is_success() {
        return Err(format!("Health check failed with status {}", response.status()).into());
    }

    Ok(())
}
