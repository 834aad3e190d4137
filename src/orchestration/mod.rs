//! Pipelines that tie the resolver, matcher, store and pricer together.

pub mod journal;
pub mod quoter;

pub use journal::{ImportSummary, Journal, JournalError};
pub use quoter::{OptionQuote, OptionQuoter, QuoteError};
