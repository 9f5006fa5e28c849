pub mod channels;
pub mod search;
pub mod serve;
pub mod show_config;
