use anyhow::Result;
use microblog_core::Core;

use crate::ui;

pub async fn register(core: &Core, username: &str, email: &str) -> Result<()> {
    let user = core.register(username, email).await?;
    ui::success(&format!("Registered {} (id {}).", user.username, user.id));
    Ok(())
}

pub async fn post(core: &Core, username: &str, body: &str) -> Result<()> {
    let post = core.publish(username, body).await?;
    ui::success(&format!("Posted #{} as {}.", post.id, username));
    Ok(())
}
