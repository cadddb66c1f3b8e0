pub mod assumption;
pub mod financial_model;
pub mod line_item;
pub mod period;
pub mod scenario;
pub mod user;

pub use assumption::{Assumption, AssumptionChanges, AssumptionFilter, NewAssumption};
pub use financial_model::{FinancialModel, FinancialModelChanges, NewFinancialModel};
pub use line_item::{LineItem, LineItemChanges, LineItemFilter, NewLineItem};
pub use period::{NewPeriod, Period, PeriodFilter};
pub use scenario::{NewScenario, Scenario, ScenarioChanges, ScenarioFilter};
pub use user::{NewUser, ProfileChanges, User};
