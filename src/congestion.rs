mod markovian;
pub use markovian::*;

use crate::Seqno;

/// What a transport sender needs from a congestion controller. Calls on one instance must be
/// serialized.
pub trait CongestionControl {
    /// Resets per-flow state at the start of a flow
    fn init(&mut self);

    /// React to a packet being sent
    fn on_pkt_sent(&mut self, seqno: Seqno);

    /// React to a cumulative acknowledgement. `ack` names the next expected seqno, and
    /// `sent_time` is the send timestamp echoed back by the receiver.
    fn on_ack(&mut self, ack: Seqno, receiver_timestamp: f64, sent_time: f64);

    /// Tears down the current flow
    fn close(&mut self);

    /// How long to wait between sends, as last computed
    fn intersend_time(&self) -> f64;

    /// Gets the current CWND
    fn cwnd(&self) -> f64;

    /// Suggested retransmission timeout, in milliseconds
    fn timeout(&self) -> f64;
}
