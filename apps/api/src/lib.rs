pub mod config;
pub mod db;
pub mod errors;
pub mod export;
pub mod illustration;
pub mod image_client;
pub mod layout;
pub mod models;
pub mod pagination;
pub mod reader;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;
pub mod stories;

#[cfg(test)]
mod testing;
