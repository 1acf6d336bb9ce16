//! Credential holder, bearer token models, and the credential event broadcast.

pub mod broadcast;
pub mod holder;
pub mod token;

pub use broadcast::*;
pub use holder::*;
pub use token::*;
