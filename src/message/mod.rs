pub mod envelope;
pub mod query;

pub use envelope::{parse_message, Envelope, EnvelopeKind};
pub use query::QueryKind;
