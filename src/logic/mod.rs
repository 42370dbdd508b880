pub mod binding;
pub mod bindings;
pub mod graph;
pub mod views;

pub use binding::*;
pub use bindings::*;
pub use graph::*;
pub use views::*;
