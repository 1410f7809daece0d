pub mod error;
pub mod message;
pub mod name;

pub use error::{Error, Result};
pub use message::{KeyId, Message, ObjectHash};
pub use name::{Name, NameComponent};
