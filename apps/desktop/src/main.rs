use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use client_core::{
    remote::{BackendConfig, RemoteBlobStore, RemoteRecordStore, RemoteSession},
    BucketListController, ControllerEvent, CreateItemInput, ImageUpload,
};
use shared::domain::ItemId;

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Backend base URL; overrides the settings file and environment.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current bucket list.
    List,
    /// Create a bucket-list item, optionally attaching an image file.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Delete an item by id.
    Delete {
        #[arg(long)]
        id: String,
    },
}

async fn read_image(path: PathBuf) -> Result<ImageUpload> {
    let bytes = tokio::fs::read(&path).await?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("image path has no file name: {}", path.display()))?;
    Ok(ImageUpload { filename, bytes })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let settings = config::load_settings();
    let api_url = args.api_url.unwrap_or(settings.api_url);
    tracing::debug!(api_url = %api_url, "backend configured");
    let backend = BackendConfig::new(api_url);

    let session = RemoteSession::connect(&backend);
    let identity = session.sign_in(&args.username, &args.password).await?;
    println!("Signed in as {identity}");

    let records = Arc::new(RemoteRecordStore::new(Arc::clone(&session)));
    let blobs = Arc::new(RemoteBlobStore::new(Arc::clone(&session)));
    let controller = BucketListController::new(Arc::clone(&session), records, blobs);
    let mut events = controller.subscribe_events();

    match args.command {
        Command::List => controller.refresh().await,
        Command::Add {
            title,
            description,
            image,
        } => {
            let image = match image {
                Some(path) => Some(read_image(path).await?),
                None => None,
            };
            controller
                .create_item(CreateItemInput {
                    title,
                    description,
                    image,
                })
                .await;
        }
        Command::Delete { id } => controller.delete_item(&ItemId::new(id)).await,
    }

    while let Ok(event) = events.try_recv() {
        if let ControllerEvent::Error(message) = event {
            eprintln!("error: {message}");
        }
    }

    println!("My Bucket List");
    for item in controller.items().await {
        match &item.image {
            Some(url) => println!("- [{}] {}: {} ({url})", item.id, item.title, item.description),
            None => println!("- [{}] {}: {}", item.id, item.title, item.description),
        }
    }

    session.sign_out().await;
    Ok(())
}
