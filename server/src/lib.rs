pub mod backend;
mod config;
pub mod object_store;
pub mod records;
mod service;
pub mod storage;
pub mod util;

pub use crate::{config::Config, service::SecureStorage};
