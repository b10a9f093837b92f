//! The place-name gazetteer: a read-only SQLite store built out-of-band from
//! the Kartverket SSR registry, and the resolver that ranks lookups from it.

pub mod resolver;
pub mod store;

pub use resolver::{MatchKind, PlaceMatch, PlaceQuery, Resolver};
pub use store::{GazetteerError, PlaceRecord, PlaceStore};
