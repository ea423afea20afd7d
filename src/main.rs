use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use shopping_wishlist::classifier;
use shopping_wishlist::fallback::JsonFileStore;
use shopping_wishlist::local_bookmarks::LocalBookmarkFile;
use shopping_wishlist::records::ProductRecord;
use shopping_wishlist::substrate::BookmarkSubstrate;
use shopping_wishlist::url_filter::is_restricted;
use shopping_wishlist::wishlist::Wishlist;

#[derive(Parser)]
#[command(name = "shopping-wishlist")]
#[command(about = "Bookmark-backed shopping wishlist with product page detection", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the bookmark and storage files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use flat key-value storage instead of the bookmark file
    #[arg(long, global = true)]
    flat_storage: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a saved page snapshot as product page or not
    Classify {
        /// Path to the page HTML snapshot
        #[arg(short, long)]
        file: PathBuf,

        /// URL the snapshot was captured from
        #[arg(short, long)]
        url: String,
    },

    /// Classify a snapshot and add it to the wishlist
    Add {
        /// Path to the page HTML snapshot
        #[arg(short, long)]
        file: PathBuf,

        /// URL the snapshot was captured from
        #[arg(short, long)]
        url: String,

        /// Add even when the page does not classify as a product page
        #[arg(long)]
        force: bool,
    },

    /// List wishlist entries in storage order
    List {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a wishlist entry by id
    Remove {
        /// Entry id as shown by `list`
        id: String,
    },
}

fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".shopping-wishlist"))
}

fn open_wishlist(data_dir: &PathBuf, flat_storage: bool) -> Result<Wishlist> {
    let kv = Arc::new(JsonFileStore::open(data_dir.join("storage.json"))?);

    let substrate: Option<Arc<dyn BookmarkSubstrate>> = if flat_storage {
        None
    } else {
        Some(Arc::new(LocalBookmarkFile::open(
            data_dir.join("Bookmarks.json"),
        )?))
    };

    Ok(Wishlist::open(substrate, kv))
}

fn load_snapshot(file: &PathBuf, url: &str) -> Result<Option<String>> {
    if is_restricted(url) {
        warn!("⚠️  {} is a restricted URL, skipping classification", url);
        return Ok(None);
    }
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read snapshot {:?}", file))?;
    Ok(Some(html))
}

fn print_record(record: &ProductRecord) {
    println!("  Title:  {}", record.title);
    if let Some(price) = &record.price {
        println!("  Price:  {}", price);
    }
    if let Some(vendor) = &record.vendor {
        println!("  Vendor: {}", vendor);
    }
    if let Some(image) = &record.image_url {
        println!("  Image:  {}", image);
    }
    println!("  URL:    {}", record.url);
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };

    match cli.command {
        Commands::Classify { file, url } => {
            let Some(html) = load_snapshot(&file, &url)? else {
                println!("Product page: no (restricted URL)");
                return Ok(());
            };

            let result = classifier::classify(&html, &url);
            if result.is_product_page {
                println!("Product page: yes");
                if let Some(record) = &result.record {
                    print_record(record);
                }
            } else {
                println!("Product page: no");
            }
        }

        Commands::Add { file, url, force } => {
            let Some(html) = load_snapshot(&file, &url)? else {
                anyhow::bail!("Refusing to add restricted URL {}", url);
            };

            let record = if force {
                classifier::extract(&html, &url)?
            } else {
                let result = classifier::classify(&html, &url);
                match result.record {
                    Some(record) => record,
                    None => anyhow::bail!(
                        "{} does not look like a product page (use --force to add anyway)",
                        url
                    ),
                }
            };

            let wishlist = open_wishlist(&data_dir, cli.flat_storage)?;
            let entry = wishlist.add(&record).await?;
            info!("✅ Added \"{}\" as entry {}", entry.title, entry.id);
        }

        Commands::List { json } => {
            let wishlist = open_wishlist(&data_dir, cli.flat_storage)?;
            let entries = wishlist.list().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("Wishlist is empty");
            } else {
                for entry in &entries {
                    let price = entry.price.as_deref().unwrap_or("-");
                    let vendor = entry.vendor.as_deref().unwrap_or("-");
                    println!(
                        "{}  {}  {}  {}  {}",
                        entry.id, entry.title, price, vendor, entry.url
                    );
                }
                info!("📊 {} wishlist entries", entries.len());
            }
        }

        Commands::Remove { id } => {
            let wishlist = open_wishlist(&data_dir, cli.flat_storage)?;
            wishlist.remove(&id).await?;
            info!("✅ Removed entry {}", id);
        }
    }

    Ok(())
}
