pub mod entities;
pub mod error;
pub mod groups;
pub mod posts;
pub mod types;
pub mod users;
