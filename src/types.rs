/// Shared types used across the codebase

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Raised when a stored or submitted tag is outside its closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{value}\" is not a valid choice.")]
pub struct InvalidChoice {
    pub value: String,
}

/// Declares a closed set of string tags.
/// Tags carry no behavior; they are stored and serialized verbatim.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $tag:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }
        }

        impl FromStr for $name {
            type Err = InvalidChoice;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok($name::$variant),)+
                    other => Err(InvalidChoice { value: other.to_string() }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidChoice;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Kind of financial model. A label only; nothing is computed from it.
    pub enum ModelType {
        Dcf => "DCF",
        Forecast => "Forecast",
        Budget => "Budget",
        Scenario => "Scenario",
        CashFlow => "CashFlow",
        Valuation => "Valuation",
        Lbo => "LBO",
        MergersAcquisitions => "M&A",
        Sensitivity => "Sensitivity",
        BreakEven => "BreakEven",
        Kpi => "KPI",
        ThreeStatement => "3Statement",
        Rolling => "Rolling",
        CapTable => "CapTable",
        MonteCarlo => "MonteCarlo",
        Irr => "IRR",
    }
}

string_enum! {
    pub enum PeriodType {
        Monthly => "monthly",
        Quarterly => "quarterly",
        Yearly => "yearly",
    }
}

string_enum! {
    pub enum Category {
        Revenue => "Revenue",
        Expense => "Expense",
        Asset => "Asset",
        Liability => "Liability",
        Equity => "Equity",
        Other => "Other",
    }
}
