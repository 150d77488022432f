pub mod feed;
pub mod store;

pub use feed::ThoughtFeed;
pub use store::{StoreError, ThoughtStore};
