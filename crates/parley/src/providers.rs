pub mod accumulator;
pub mod anthropic;
pub mod base;
pub mod configs;
pub mod errors;
pub mod mock;
pub mod sse;
pub mod utils;
