pub mod auth;
pub mod config;
pub mod notify;
pub mod runner;
pub mod storage;
pub mod task;
pub mod utils;
pub mod web;

use std::{env, sync::Arc};

use auth::Auth;
use once_cell::sync::Lazy;
use task::TaskController;

pub struct AppContext {
    pub auth: Arc<Auth>,
    pub controller: Arc<TaskController>,
}

const ADOC_SQLITE_PATH: &str = "sqlite://./adoc_data/database/storage.db?mode=rwc";
const ADOC_DATA_PATH: &str = "./adoc_data/audio/";

pub static SQLITE_PATH: Lazy<String> = Lazy::new(|| {
    match env::var("ADOC_SQLITE_PATH") {
        Ok(path) => path,
        Err(_) => dotenv::var("ADOC_SQLITE_PATH").unwrap_or_else(|_| ADOC_SQLITE_PATH.to_string()),
    }
});

pub static DATA_PATH: Lazy<String> = Lazy::new(|| {
    match env::var("ADOC_DATA_PATH") {
        Ok(path) => path,
        Err(_) => dotenv::var("ADOC_DATA_PATH").unwrap_or_else(|_| ADOC_DATA_PATH.to_string()),
    }
});

pub fn init_env() {
    dotenv::dotenv().ok();

    if let Some(db_path) = SQLITE_PATH.strip_prefix("sqlite://") {
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        if let Some(dir) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(dir).unwrap_or_else(|e| {
                eprintln!("Failed to create database directory: {}", e);
            });
        }
    }
}
