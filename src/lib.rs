//! A delay-based congestion controller for datagram transports.
//!
//! [`MarkovianCc`] sits inside a transport sender: the sender reports every packet it sends and
//! every cumulative ack it receives, and in return reads back a congestion window and a pacing
//! interval. The controller steers the window toward `rtt / queueing_delay`, infers losses from
//! gaps below each ack, and keeps the objective parameters (`delta`, the delay bound) that an
//! external utility layer uses.

pub mod clock;
pub mod config;
mod congestion;
mod ema;
pub mod inflight;
pub mod pacer;
pub mod percentile;
pub mod trace;

pub use clock::{Clock, RealClock, SimClock};
pub use config::{ConfigError, MarkovianConfig, UtilityConfig, UtilityMode};
pub use congestion::*;
pub use ema::EmaCalculator;
pub use trace::{init_cc_tracing, CcTraceEvt};

/// A packet sequence number.
pub type Seqno = u64;
