pub mod cluster;
pub mod config;
pub mod provider;
pub mod template;
pub mod tools;
