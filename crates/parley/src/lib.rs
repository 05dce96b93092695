pub mod conversation;
pub mod errors;
pub mod key_manager;
pub mod models;
pub mod pricing;
pub mod providers;
pub mod tools;
