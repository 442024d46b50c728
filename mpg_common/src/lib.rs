mod minor_units;

pub mod helpers;
pub mod op;
mod secret;

pub use minor_units::{MinorUnits, MinorUnitsConversionError, CURRENCY_CODE, MINOR_UNITS_PER_MAJOR};
pub use secret::Secret;
