//! Safety-gated motion of the mobile base and joints.

mod config;
mod controller;
mod error;
mod guard;

pub use config::*;
pub use controller::*;
pub use error::*;
pub use guard::*;
