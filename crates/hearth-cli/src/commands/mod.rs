pub mod config;
pub mod items;
pub mod lists;
pub mod urgent;
pub mod watch;
