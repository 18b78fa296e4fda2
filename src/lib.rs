//! `castle-core`: the streaming (k,l)-anonymity clustering engine from
//! Cao, Carminati, Ferrari and Tan's CASTLE algorithm
//! (*Continuously Anonymizing STreaming data via adaptive cLustEring*).
//!
//! The crate ingests an unbounded stream of records ("tuples"), each tagged
//! with a person id and a sensitive attribute, and releases a reordered
//! sequence of generalized records that satisfy (k, l)-anonymity with a
//! bounded per-tuple delay δ. An optional differential-privacy layer
//! perturbs numeric quasi-identifiers before clustering ([`dp`]).
//!
//! The engine ([`engine::Castle`]) owns two collections of clusters: Γ, the
//! active clusters not yet known to satisfy k-anonymity/l-diversity, and Ω,
//! retired clusters whose generalization envelope can still shelter a late
//! tuple. [`cluster::Cluster`] tracks a [`range::Range`] envelope per
//! quasi-identifier header and the information loss of generalizing to it;
//! [`engine::Castle::insert`] is the sole entry point, admitting one record
//! at a time and triggering a release decision once the global queue
//! outgrows [`params::Parameters::delta`].
//!
//! Concrete stream sources (CSV readers, CLIs, synthetic generators) are
//! external collaborators; [`driver::StreamSource`] is the only interface
//! contract this crate defines for them.

pub mod cluster;
pub mod dp;
pub mod driver;
pub mod engine;
pub mod error;
pub mod item;
pub mod params;
pub mod range;

pub use cluster::{ClusterId, GeneralizedField, GeneralizedRecord};
pub use engine::{Castle, InsertOutcome};
pub use error::{CastleError, ConfigError, RecordError};
pub use item::RawRecord;
pub use params::Parameters;
pub use range::Range;
