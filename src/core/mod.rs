pub mod error;

pub use error::{ConnectError, DbError, Result};
