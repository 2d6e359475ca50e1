//! Infrastructure layer.

pub mod database;
pub mod feed;
pub mod retry;
pub mod shift;

pub use self::{database::Database, feed::Feed, shift::Shift};
