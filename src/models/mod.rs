mod amount;
mod position;
mod price;
mod stats;
mod token;

pub use amount::{TokenAmount, TokenAmounts};
pub use position::{EventKind, Position, PositionEvent};
pub use price::Price;
pub use stats::{Apr, PositionStats};
pub use token::Token;
