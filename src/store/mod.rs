//! MongoDB-backed persistence: the OAuth token singleton and event entries.

pub mod entries;
pub mod tokens;

pub use entries::{EntryRecord, EntryStore, MongoEntryStore};
pub use tokens::{MongoTokenStore, TokenStore};
