pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod ident;
pub mod types;

pub use error::FilterError;
pub use filter::Filter;
pub use types::*;
