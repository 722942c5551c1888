//! `harvester-params` — turns a job's parameter sources into concrete
//! parameter maps.
//!
//! # Pipeline
//!
//! 1. [`resolver::ValueSourceResolver`] resolves each source into an ordered
//!    list of string values. Failures degrade to an empty list plus a
//!    [`SourceWarning`].
//! 2. [`expander::ParameterSpaceExpander`] merges those lists with the base
//!    parameters according to the job's expansion mode.
//!
//! | Source kind   | Spec payload                                             |
//! |---------------|----------------------------------------------------------|
//! | `STATIC_LIST` | `["A","B"]`                                              |
//! | `DATE_RANGE`  | `{"startDate","endDate","format"?,"interval"?}`          |
//! | `LOOKUP`      | `region_codes` or `{"lookup":"region_codes"}`            |
//! | `COMPUTED`    | `{"rule":"LAST_N_MONTHS","count":3,"format"?}`           |

pub mod computed;
pub mod date_range;
pub mod error;
pub mod expander;
pub mod lookup;
pub mod resolver;

pub use error::{SourceError, SourceWarning};
pub use expander::{Expansion, ExpansionWarning, ParameterSpaceExpander};
pub use lookup::{LookupError, LookupProvider, LookupRegistry, StaticLookup};
pub use resolver::{Resolution, ValueSourceResolver};
