pub mod content;
pub mod crypto;
