//! Shared types: errors and the records exchanged with the backend

mod emoji;
mod error;
mod principal;

pub use emoji::EmojiRecord;
pub use error::{Error, ErrorKind, Result};
pub use principal::{Principal, PrincipalInfo, PrincipalUpdate, Profile};
