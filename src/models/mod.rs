// Re-export all model types
pub use self::dish::*;
pub use self::enums::*;
pub use self::errors::*;
pub use self::restaurant::*;
pub use self::user::*;
pub use self::validation::*;
pub use self::vote::*;

mod dish;
mod enums;
mod errors;
mod restaurant;
mod user;
mod validation;
mod vote;
