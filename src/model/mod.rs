pub mod business;
pub mod common;
pub mod profile;
pub mod session;

pub use business::*;
pub use common::*;
pub use profile::*;
pub use session::*;
