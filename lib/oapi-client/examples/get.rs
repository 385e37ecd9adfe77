#![allow(dead_code)]

use http::Method;
use oapi_client::{ApiClient, Hooks, OperationConfig, OperationOptions, Operations};
use serde::Deserialize;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().pretty().init();

    let operations = Operations::new("Dog CEO", "1")
        .with_operation(
            "listBreeds",
            OperationConfig::new(Method::GET, "/breeds/list", false),
        )
        .with_operation(
            "listBreedImages",
            OperationConfig::new(Method::GET, "/breed/{breed}/images", false),
        );

    // Create a client
    let client = ApiClient::builder()
        .with_base_url("https://dog.ceo")
        .with_base_path("/api")
        .with_operations(operations)
        .with_hooks(
            Hooks::default()
                .with_on_request(|request| {
                    info!(method = %request.method, url = %request.url, "request");
                })
                .with_on_client_error(|err| warn!(%err, "client error")),
        )
        .build()?;

    // Simple call with no parameters
    let breeds: BreedsList = client
        .operation("listBreeds")?
        .call_as(OperationOptions::new())
        .await?;
    info!(?breeds, "breeds");

    // Call with a path parameter
    let images: BreedImages = client
        .operation("listBreedImages")?
        .call_as(OperationOptions::new().with_param("breed", "hound")?)
        .await?;
    info!(?images, "images");

    Ok(())
}

type BreedsList = DogCeoResult<Vec<String>>;

type BreedImages = DogCeoResult<Vec<String>>;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum DogCeoResult<T> {
    Success { message: T },
    Error { code: u16, message: String },
}
