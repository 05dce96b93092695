//! These models represent the objects passed around during a turn
//!
//! Two related formats meet here:
//! - the simplified history entries owned by whoever persists the chat
//! - the block-structured messages the model API expects
//!
//! The internal structs are a close match to the wire format so that an assistant turn
//! which requested tools can be replayed back exactly.
pub mod message;
pub mod role;
pub mod tool;
