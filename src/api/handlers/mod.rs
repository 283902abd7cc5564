pub mod collar;
pub use self::collar::collar;

pub mod health;
pub use self::health::health;

pub mod reunite;
pub use self::reunite::redeem;

pub mod session;
pub use self::session::session;
