use anyhow::Result;
use microblog_core::Core;

use crate::ui;

pub async fn follow(core: &Core, follower: &str, followed: &str) -> Result<()> {
    if core.follow(follower, followed).await? {
        ui::success(&format!("{} is following {}.", follower, followed));
    } else {
        ui::info(&format!("{} already follows {}.", follower, followed));
    }
    Ok(())
}

pub async fn unfollow(core: &Core, follower: &str, followed: &str) -> Result<()> {
    if core.unfollow(follower, followed).await? {
        ui::success(&format!("{} is no longer following {}.", follower, followed));
    } else {
        ui::info(&format!("{} was not following {}.", follower, followed));
    }
    Ok(())
}
