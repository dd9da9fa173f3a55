use std::sync::Arc;

use bearer_dispatch::{
    BearerAuth, Config, RequestDescriptor, RequestManager, TokenRefresh, WaitingQueue,
};

#[derive(serde::Deserialize, Debug)]
struct Profile {
    id: u64,
    name: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional: enable basic logging for the example
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    // Prefer a JSON file next to the binary, fall back to BEARER_DISPATCH_* variables
    let cfg = Config::from_file("config.json").or_else(|_| Config::from_env())?;
    let manager = RequestManager::from_config(&cfg, WaitingQueue::shared())?;

    let auth = BearerAuth::new(std::env::var("API_TOKEN").ok(), || async {
        match std::env::var("API_REFRESH_TOKEN") {
            Ok(token) => TokenRefresh::Token(token),
            Err(e) => TokenRefresh::Failed(e.to_string()),
        }
    })?;

    let request =
        RequestDescriptor::get("https://api.example.com/v1/me").with_auth(Arc::new(auth.clone()));
    let profile: Profile = manager.fire_json(Arc::new(request)).await?;
    println!("signed in as {} (id={})", profile.name, profile.id);

    let update = RequestDescriptor::patch("https://api.example.com/v1/me")
        .with_json(&serde_json::json!({ "name": profile.name }))?
        .with_auth(Arc::new(auth));
    let body = manager.fire_async(Arc::new(update)).await?;
    println!("update acknowledged ({} bytes)", body.len());
    Ok(())
}
