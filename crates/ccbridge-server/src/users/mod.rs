//! In-memory user directory.

mod store;

pub use store::{NewUser, User, UserError, UserStore};
