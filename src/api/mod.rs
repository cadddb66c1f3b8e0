pub mod format;
pub mod pagination;
pub mod params;

pub use format::Expander;
pub use pagination::{Page, Paginator};
