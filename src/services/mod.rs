pub mod admission;
pub mod droid;
pub mod envelope;
pub mod extractor;
pub mod listing_scraper;
pub mod search_orchestrator;
pub mod testing;
pub mod webhook_relay;

pub use admission::*;
pub use droid::*;
pub use listing_scraper::*;
pub use search_orchestrator::*;
pub use webhook_relay::*;
