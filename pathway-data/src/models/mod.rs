//! Domain models returned by the repositories

pub mod opportunity;
pub mod pagination;
pub mod user;
pub mod validation;

pub use opportunity::{Media, MediaType, Opportunity, Tag};
pub use pagination::{Cursor, Page};
pub use user::{Role, StudentInfo, StudentPoints, User, UserInfo, UserRecord};
pub use validation::ValidationError;
