//! Basic usage example - install a model from a gallery and poll its job

use std::time::Duration;

use modelgate_core::{AppConfig, Gallery, GalleryOp, GalleryService, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let reference = args.next().unwrap_or_else(|| "llama".to_string());
    let gallery_url = args
        .next()
        .unwrap_or_else(|| "./example-gallery/index.json".to_string());

    let config = AppConfig::new("./example-models")
        .with_galleries([Gallery::new("default", gallery_url)]);
    let service = GalleryService::start(config.clone()).await?;

    println!("Installing {}...", reference);
    service
        .submit(GalleryOp::from_gallery("example", &reference, config.galleries))
        .await?;

    loop {
        if let Some(status) = service.get_status("example") {
            println!(
                "  {} {:.1}% {}",
                status.message, status.progress, status.file_name
            );
            if status.processed {
                if let Some(error) = status.error {
                    println!("Failed: {}", error);
                }
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    service.shutdown().await;
    Ok(())
}
