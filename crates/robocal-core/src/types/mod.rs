mod chain;
mod configuration;
mod observation;

pub use chain::*;
pub use configuration::*;
pub use observation::*;
