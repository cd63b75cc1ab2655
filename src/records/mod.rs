//! Record collections and their on-disk snapshot.
//!
//! A collection is an ordered, append-mostly list of records. The snapshot
//! is the JSON document holding every collection at the last checkpoint.

mod collection;
mod snapshot;

pub use collection::Collection;
pub use snapshot::{decode_snapshot, encode_snapshot, read_snapshot, write_snapshot, DecodedSnapshot};
