pub mod account;
pub mod feed;
pub mod follow;
pub mod profile;
