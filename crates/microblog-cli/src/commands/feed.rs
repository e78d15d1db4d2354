use anyhow::Result;
use microblog_core::Core;

use crate::ui;

pub async fn run(core: &Core, username: &str, json: bool) -> Result<()> {
    let entries = core.feed_entries(username).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    ui::header(&format!("Feed for {}", username));
    if entries.is_empty() {
        ui::info("Nothing here yet. Follow someone or write a post.");
        println!();
        return Ok(());
    }

    for entry in &entries {
        ui::info(&format!("{}: {}", entry.author, entry.body));
        ui::dim(&entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
    println!();
    Ok(())
}
