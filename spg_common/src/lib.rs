mod money;

pub mod op;
mod secret;
mod status;

pub use money::{Money, MoneyConversionError, CURRENCY_CODE, CURRENCY_CODE_LOWER};
pub use secret::Secret;
pub use status::PaymentStatus;
