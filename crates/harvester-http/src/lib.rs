//! `harvester-http` — reqwest-backed implementations of the external
//! collaborators: [`HttpCaller`] for job calls and [`HttpLookup`] for
//! `LOOKUP` sources served over HTTP.

pub mod caller;
pub mod error;
pub mod json_path;
pub mod lookup;

pub use caller::HttpCaller;
pub use error::HttpError;
pub use lookup::HttpLookup;
