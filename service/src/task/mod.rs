//! Background [`Task`]s definitions.

pub mod auto_redeem;
mod background;

pub use common::Handler as Task;

pub use self::{auto_redeem::AutoRedeem, background::Background};
