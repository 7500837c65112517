//! Ad delivery: the platform state container that wires the catalog, event
//! log, ranker and A/B test engine together for the feed.

pub mod catalog;
pub mod feed;
pub mod fixtures;
pub mod platform;

pub use catalog::AdCatalog;
pub use feed::plan_feed_slots;
pub use fixtures::PlatformFixtures;
pub use platform::AdPlatform;
