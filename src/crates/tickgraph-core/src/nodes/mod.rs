//! Built-in node kinds and their factories.

pub mod authority;
pub mod channel;
pub mod constant;
pub mod route;
pub mod stage;
pub mod time;
