//! Domain definitions.

pub mod account;
pub mod code;
pub mod notification;
pub mod outcome;
pub mod platform;
pub mod progress;
pub mod redemption;
pub mod session;
pub mod settings;

pub use self::{
    account::{Email, Password},
    code::{Code, Game, ShiftCode},
    notification::Notification,
    outcome::Outcome,
    platform::Platform,
    progress::Progress,
    redemption::{FailedCode, Form, HistoryEntry},
    session::Session,
    settings::Settings,
};
