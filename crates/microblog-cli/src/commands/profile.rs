use anyhow::Result;
use microblog_core::Core;

use crate::ui;

pub async fn run(core: &Core, username: &str, json: bool) -> Result<()> {
    let profile = core.profile(username).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    ui::header(&profile.user.username);
    ui::info(&format!(
        "{} followers, {} following",
        profile.followers.len(),
        profile.following.len()
    ));
    if !profile.following.is_empty() {
        ui::dim(&format!("following: {}", profile.following.join(", ")));
    }
    if !profile.followers.is_empty() {
        ui::dim(&format!("followers: {}", profile.followers.join(", ")));
    }
    println!();

    for post in &profile.posts {
        ui::info(&post.body);
        ui::dim(&post.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
    if !profile.posts.is_empty() {
        println!();
    }
    Ok(())
}

pub async fn stats(core: &Core, json: bool) -> Result<()> {
    let stats = core.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    ui::header("Microblog");
    ui::info(&format!("Users:   {}", stats.users));
    ui::info(&format!("Posts:   {}", stats.posts));
    ui::info(&format!("Follows: {}", stats.follows));
    println!();
    Ok(())
}
