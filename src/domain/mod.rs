pub mod feed;
pub mod item;
pub mod subscription;
pub mod user;

pub use feed::{Feed, FeedWithOwner};
pub use item::Item;
pub use subscription::{FollowedFeed, Subscription};
pub use user::User;
