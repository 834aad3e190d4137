pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod instruments;
pub mod marketdata;
pub mod orchestration;
pub mod pricing;
pub mod telemetry;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Decimal, Execution, InstrumentDescriptor, InstrumentType, OptionContractSpec, OptionType,
    PricingMethod, PricingResult, ResolvedInstrument, Side, TimeMs, Trade, TradeStatus,
};
pub use engine::{match_executions, FlipPolicy, MatchConfig, MatchError, Matcher};
pub use error::AppError;
pub use instruments::{InstrumentResolver, InstrumentStore, MemoryInstrumentStore};
pub use marketdata::{MarketData, MockMarketData, PolygonClient};
pub use orchestration::{Journal, OptionQuoter};
pub use pricing::{PricingEngine, PricingError, PricingRequest};
pub use telemetry::init_tracing;
