//! Store request and response models, separate from the API models in
//! [`crate::api::models`].

pub mod comments;
pub mod users;
