mod definition;
mod key;
mod service;

pub use definition::*;
pub use key::*;
pub use service::*;
