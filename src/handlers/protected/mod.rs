// Handlers behind the bearer-token middleware

pub mod assumption;
pub mod finance_model;
pub mod line_item;
pub mod period;
pub mod profile;
pub mod scenario;
