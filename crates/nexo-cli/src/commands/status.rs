//! Status command handler

use anyhow::Result;

use nexo_core::{Config, Session, SyncController, SyncState};

use crate::output::{Output, OutputFormat};

/// Show status information
pub async fn show(
    sync: &SyncController,
    config: &Config,
    session: Option<&Session>,
    output: &Output,
) -> Result<()> {
    let available = sync.store_available().await;
    let counts = sync.cache().category_counts();
    let reviews = sync.cache().reviews().len();
    let loaded = sync.state() == SyncState::SyncedOrDegraded;
    let author = Session::author_name(session);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "store": sync.store_name(),
                    "available": available,
                    "loaded": loaded,
                    "api_url": config.api_url,
                    "user_id": config.user_id,
                    "author": author,
                    "data_dir": config.data_dir,
                    "counts": {
                        "reviews": reviews,
                        "library": counts
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", if available { "available" } else { "unavailable" });
        }
        OutputFormat::Human => {
            println!("Nexo Status");
            println!("===========");
            println!();
            println!("Store:");
            println!("  Backend: {}", sync.store_name());
            println!(
                "  Status:  {}",
                if available {
                    "available"
                } else {
                    "unavailable (changes last for this session only)"
                }
            );
            if let Some(ref url) = config.api_url {
                println!("  Server:  {}", url);
            }
            println!("  Data:    {}", config.data_dir.display());
            println!();
            println!("Session:");
            println!("  User:    {}", config.user_id);
            println!("  Author:  {}", author);
            println!();
            println!("Contents:");
            println!("  Reviews: {}", reviews);
            println!("  Library: {}", counts.total());
        }
    }

    Ok(())
}
