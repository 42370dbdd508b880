pub mod memory;
pub mod query;
pub mod rpc;
pub mod supabase;
pub mod tables;
pub mod traits;

pub use memory::*;
pub use query::*;
pub use rpc::*;
pub use supabase::*;
pub use traits::*;
