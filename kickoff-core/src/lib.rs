pub mod error;
pub mod models;

pub use error::{KickoffError, Result};
pub use models::*;
