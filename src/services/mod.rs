//! Services layer - Business logic
//!
//! Services implement the business rules on top of the repositories and
//! handle validation and error cases.

pub mod entry;
pub mod password;
pub mod user;

pub use entry::{EntryService, EntryServiceError};
pub use password::{hash_password, verify_password};
pub use user::{LoginInput, SignupInput, UserService, UserServiceError};
