use std::sync::Arc;

use crate::{
    clock::{Clock, RealClock},
    config::{ConfigError, MarkovianConfig, UtilityConfig, UtilityMode},
    ema::EmaCalculator,
    inflight::{Inflight, InflightEntry},
    pacer::IntersendRandomizer,
    percentile::PercentileTracker,
    trace::{CcTraceCtx, CcTraceEvt},
    Seqno,
};

use super::CongestionControl;

/// Delay-based congestion control.
///
/// The window is pulled toward `rtt / queueing_delay` in steps of `1 / window`, and the pacing
/// interval follows the window. Losses are inferred from gaps below a cumulative ack and folded
/// into a decaying "pseudo-delay" that the utility layer reads, alongside the objective picked
/// with [`MarkovianCc::interpret_config_str`].
///
/// All timestamps are milliseconds, as reported by the clock `C`.
pub struct MarkovianCc<C: Clock = RealClock> {
    cfg: MarkovianConfig,
    clock: C,
    trace: CcTraceCtx,
    randomizer: IntersendRandomizer,

    min_rtt: f64,
    rtt_acked: EmaCalculator,
    rtt_unacked: EmaCalculator,
    interarrival_time: EmaCalculator,
    loss_rate: EmaCalculator,

    the_window: f64,
    intersend_time: f64,
    cur_intersend_time: f64,
    intersend_time_vel: f64,
    prev_intersend_time: f64,
    prev_intersend_time_vel: f64,
    timeout: f64,

    unacknowledged: Inflight,

    monitor_interval_start: f64,
    num_losses: u64,
    prev_num_losses: u64,
    interval_acks: u64,
    prev_ack_time: Option<f64>,
    pseudo_delay: f64,
    prev_pseudo_delay: f64,

    num_pkts_acked: u64,
    num_pkts_lost: u64,
    flow_length: u64,

    // survives init()
    utility_mode: UtilityMode,
    delta: f64,
    delay_bound: Option<f64>,

    percentile_delay: PercentileTracker,
    closed: bool,
}

impl MarkovianCc<RealClock> {
    /// Creates a controller driven by the wall clock.
    pub fn with_real_clock(cfg: MarkovianConfig) -> Self {
        Self::new(cfg, RealClock::new())
    }
}

impl<C: Clock> MarkovianCc<C> {
    /// Creates a new controller, ready for its first flow.
    pub fn new(cfg: MarkovianConfig, clock: C) -> Self {
        let horizon = cfg.ema_horizon;
        let mut this = Self {
            randomizer: IntersendRandomizer::new(cfg.jitter, cfg.jitter_seed),
            percentile_delay: PercentileTracker::new(cfg.percentile_window),
            clock,
            trace: CcTraceCtx::new_random(),

            min_rtt: f64::INFINITY,
            rtt_acked: EmaCalculator::new_unset(horizon),
            rtt_unacked: EmaCalculator::new_unset(horizon),
            interarrival_time: EmaCalculator::new_unset(horizon),
            loss_rate: EmaCalculator::new_unset(horizon),

            the_window: 0.0,
            intersend_time: 0.0,
            cur_intersend_time: 0.0,
            intersend_time_vel: 0.0,
            prev_intersend_time: 0.0,
            prev_intersend_time_vel: 0.0,
            timeout: cfg.timeout_ms,

            unacknowledged: Inflight::new(),

            monitor_interval_start: 0.0,
            num_losses: 0,
            prev_num_losses: 0,
            interval_acks: 0,
            prev_ack_time: None,
            pseudo_delay: 0.0,
            prev_pseudo_delay: 0.0,

            num_pkts_acked: 0,
            num_pkts_lost: 0,
            flow_length: 0,

            utility_mode: UtilityMode::ConstantDelta,
            delta: 1.0,
            delay_bound: None,

            closed: false,
            cfg,
        };
        this.reset_flow();
        this
    }

    /// Sends this controller's trace events to `sink` rather than the process-wide sink.
    pub fn set_trace_sink(&mut self, sink: impl Fn(&CcTraceEvt) + Send + Sync + 'static) {
        self.trace.set_local_sink(Arc::new(sink))
    }

    fn probe_window(&self) -> f64 {
        self.cfg.num_probe_pkts.max(1) as f64
    }

    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn reset_flow(&mut self) {
        self.min_rtt = f64::INFINITY;
        self.unacknowledged.clear();

        self.rtt_acked.reset();
        self.rtt_unacked.reset();
        self.interarrival_time.reset();
        self.loss_rate.reset();

        self.prev_intersend_time = 0.0;
        self.intersend_time_vel = 0.0;
        self.prev_intersend_time_vel = 0.0;
        self.intersend_time = 0.0;
        self.cur_intersend_time = 0.0;
        self.the_window = self.probe_window();
        self.timeout = self.cfg.timeout_ms;

        self.monitor_interval_start = 0.0;
        self.num_losses = 0;
        self.prev_num_losses = 0;
        self.interval_acks = 0;
        self.prev_ack_time = None;
        self.pseudo_delay = 0.0;
        self.prev_pseudo_delay = 0.0;

        self.num_pkts_acked = 0;
        self.num_pkts_lost = 0;
        self.flow_length = 0;

        self.percentile_delay.clear();
        self.closed = false;
        self.clock.reset_epoch();
    }

    /// Recomputes the window and the pacing interval from the current RTT estimates.
    pub fn update_intersend_time(&mut self) {
        let now = self.now();
        // still probing
        if self.num_pkts_acked + 1 < self.cfg.num_probe_pkts {
            return;
        }

        let rtt_ewma = self.rtt_acked.mean().max(self.rtt_unacked.mean());
        let queueing_delay = rtt_ewma - self.min_rtt;
        if queueing_delay == 0.0 {
            return;
        }
        let target_window = rtt_ewma / queueing_delay;

        if self.the_window == self.probe_window() && self.intersend_time == 0.0 {
            self.trace.trace(CcTraceEvt::Start {
                timestamp: now,
                window: self.the_window,
            });
            self.the_window = target_window;
        } else if self.the_window < target_window {
            self.the_window += 1.0 / self.the_window;
        } else {
            self.the_window -= 1.0 / self.the_window;
        }
        self.the_window = self.the_window.max(1.0);
        self.trace.trace(CcTraceEvt::Window {
            timestamp: now,
            window: self.the_window,
            rtt_ewma,
            min_rtt: self.min_rtt,
            target_window,
        });

        self.cur_intersend_time = 0.5 * self.the_window / rtt_ewma;
        self.intersend_time = self.randomizer.randomize(self.cur_intersend_time);
    }

    /// Closes the current monitor interval and opens a new one at `now`.
    fn roll_monitor_interval(&mut self, now: f64) {
        self.monitor_interval_start = now;
        self.prev_pseudo_delay = if self.prev_pseudo_delay != 0.0 {
            self.pseudo_delay
        } else {
            self.rtt_acked.mean() - self.min_rtt
        };
        let total = self.num_losses + self.interval_acks;
        if total > 0 {
            self.loss_rate
                .update(self.num_losses as f64 / total as f64, now / self.min_rtt);
        }
        self.prev_num_losses = self.num_losses;
        self.num_losses = 0;
        self.interval_acks = 0;
    }

    /// Drops everything up to and including `seqno` from the ledger, counting the packets below
    /// it as lost.
    fn drain_acked(&mut self, seqno: Seqno) {
        let mut last_seen = None;
        for (scanned, entry) in self.unacknowledged.drain_through(seqno) {
            assert!(
                last_seen.map_or(true, |last| last < scanned),
                "inflight ledger scanned out of order"
            );
            last_seen = Some(scanned);
            self.prev_intersend_time = entry.intersend_time;
            self.prev_intersend_time_vel = entry.intersend_time_vel;
            if scanned < seqno {
                tracing::debug!("lost {} (acked {})", scanned, seqno);
                self.num_losses += 1;
                self.num_pkts_lost += 1;
                self.pseudo_delay += self.interarrival_time.mean();
                if self.prev_pseudo_delay != 0.0 {
                    self.pseudo_delay = self.pseudo_delay.min(2.0 * self.prev_pseudo_delay);
                }
            }
        }
    }

    /// Picks the objective from a `<mode>[:<param>...]` string.
    ///
    /// Never fails: an unusable string selects `constant_delta` with a delta of 1, logs a warning,
    /// and the rejection is handed back to the caller.
    pub fn interpret_config_str(&mut self, config: &str) -> Option<ConfigError> {
        self.delta = 1.0;
        match config.parse::<UtilityConfig>() {
            Ok(parsed) => {
                self.utility_mode = parsed.mode;
                self.delta = parsed.delta;
                if let Some(bound) = parsed.delay_bound {
                    self.delay_bound = Some(bound);
                }
                tracing::debug!(
                    "utility mode {} (delta = {}, delay bound = {:?} s)",
                    self.utility_mode,
                    self.delta,
                    self.delay_bound
                );
                None
            }
            Err(err) => {
                tracing::warn!(
                    "incorrect configuration string {:?} ({}), using constant_delta with delta = 1",
                    config,
                    err
                );
                self.utility_mode = UtilityMode::ConstantDelta;
                self.delta = 1.0;
                Some(err)
            }
        }
    }

    pub fn config(&self) -> &MarkovianConfig {
        &self.cfg
    }

    /// Smallest RTT seen this flow; infinite until the first ack.
    pub fn min_rtt(&self) -> f64 {
        self.min_rtt
    }

    pub fn rtt_acked(&self) -> &EmaCalculator {
        &self.rtt_acked
    }

    pub fn rtt_unacked(&self) -> &EmaCalculator {
        &self.rtt_unacked
    }

    pub fn interarrival_time(&self) -> &EmaCalculator {
        &self.interarrival_time
    }

    /// Decayed fraction of packets lost per monitor interval.
    pub fn loss_rate(&self) -> &EmaCalculator {
        &self.loss_rate
    }

    /// The pacing interval before randomization.
    pub fn cur_intersend_time(&self) -> f64 {
        self.cur_intersend_time
    }

    pub fn intersend_time_vel(&self) -> f64 {
        self.intersend_time_vel
    }

    /// Sets the velocity recorded with packets sent from now on.
    pub fn set_intersend_time_vel(&mut self, vel: f64) {
        self.intersend_time_vel = vel
    }

    pub fn prev_intersend_time(&self) -> f64 {
        self.prev_intersend_time
    }

    pub fn prev_intersend_time_vel(&self) -> f64 {
        self.prev_intersend_time_vel
    }

    pub fn inflight(&self) -> &Inflight {
        &self.unacknowledged
    }

    pub fn monitor_interval_start(&self) -> f64 {
        self.monitor_interval_start
    }

    /// Losses seen in the current monitor interval.
    pub fn num_losses(&self) -> u64 {
        self.num_losses
    }

    /// Losses seen in the previous monitor interval.
    pub fn prev_num_losses(&self) -> u64 {
        self.prev_num_losses
    }

    pub fn pseudo_delay(&self) -> f64 {
        self.pseudo_delay
    }

    pub fn prev_pseudo_delay(&self) -> f64 {
        self.prev_pseudo_delay
    }

    pub fn num_pkts_acked(&self) -> u64 {
        self.num_pkts_acked
    }

    pub fn num_pkts_lost(&self) -> u64 {
        self.num_pkts_lost
    }

    /// Packets sent this flow.
    pub fn flow_length(&self) -> u64 {
        self.flow_length
    }

    pub fn utility_mode(&self) -> UtilityMode {
        self.utility_mode
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Delay bound in seconds, if a `bounded_*` mode was ever selected.
    pub fn delay_bound(&self) -> Option<f64> {
        self.delay_bound
    }

    pub fn percentile_delay(&self) -> &PercentileTracker {
        &self.percentile_delay
    }
}

impl<C: Clock> CongestionControl for MarkovianCc<C> {
    fn init(&mut self) {
        if self.num_pkts_acked != 0 {
            let percent_lost = 100.0 * self.num_pkts_lost as f64
                / (self.num_pkts_acked + self.num_pkts_lost) as f64;
            self.trace.trace(CcTraceEvt::LossSummary { percent_lost });
        }
        self.reset_flow();
    }

    fn on_pkt_sent(&mut self, seqno: Seqno) {
        let now = self.now();
        self.flow_length += 1;
        self.unacknowledged.insert(
            seqno,
            InflightEntry {
                sent_time: now,
                intersend_time: self.cur_intersend_time,
                intersend_time_vel: self.intersend_time_vel,
            },
        );

        let stamp = now / self.min_rtt;
        self.rtt_unacked.force_set(self.rtt_acked.mean(), stamp);
        // oldest first; stop at the first packet that hasn't been waiting longer than the bound
        for (_, entry) in self.unacknowledged.iter() {
            let age = now - entry.sent_time;
            if self.rtt_unacked < age {
                self.rtt_unacked.update(age, stamp);
                self.prev_intersend_time = entry.intersend_time;
                self.prev_intersend_time_vel = entry.intersend_time_vel;
            } else {
                break;
            }
        }
        tracing::trace!(
            "sent {} at {} (rtt_acked = {}, rtt_unacked = {})",
            seqno,
            now,
            self.rtt_acked.mean(),
            self.rtt_unacked.mean()
        );

        self.intersend_time = self.randomizer.randomize(self.cur_intersend_time);
    }

    fn on_ack(&mut self, ack: Seqno, _receiver_timestamp: f64, sent_time: f64) {
        let seqno = ack.checked_sub(1);
        let now = self.now();
        assert!(
            now > sent_time,
            "ack at {} for a packet sent at {}",
            now,
            sent_time
        );
        let rtt = now - sent_time;

        self.rtt_acked.update(rtt, now / self.min_rtt);
        self.min_rtt = self.min_rtt.min(rtt);
        if self.rtt_acked < self.min_rtt {
            tracing::warn!(
                "RTT estimate {} < min_rtt {}",
                self.rtt_acked.mean(),
                self.min_rtt
            );
        }

        if let Some(prev_ack_time) = self.prev_ack_time {
            self.interarrival_time
                .update(now - prev_ack_time, now / self.min_rtt);
        }
        let since_prev_ack = now - self.prev_ack_time.unwrap_or(0.0);
        self.pseudo_delay *= self
            .cfg
            .delta_decay_rate
            .powf(since_prev_ack / self.min_rtt);
        self.prev_ack_time = Some(now);

        if now - self.monitor_interval_start > self.rtt_acked.mean().max(self.rtt_unacked.mean())
        {
            self.roll_monitor_interval(now);
        }
        self.interval_acks += 1;

        self.percentile_delay.push(rtt);
        self.update_intersend_time();

        if let Some(seqno) = seqno {
            let matches = self
                .unacknowledged
                .get(seqno)
                .map_or(false, |entry| entry.sent_time == sent_time);
            if matches {
                self.drain_acked(seqno);
            } else {
                tracing::trace!("ack {} matches nothing inflight", ack);
            }
        }

        self.num_pkts_acked += 1;
    }

    fn close(&mut self) {
        if self.closed {
            tracing::warn!("flow closed twice");
            return;
        }
        self.closed = true;
        if let (Some(median), Some(p95)) = (
            self.percentile_delay.percentile(50.0),
            self.percentile_delay.percentile(95.0),
        ) {
            tracing::debug!(
                "flow {} done: median delay {} ms, 95th percentile {} ms",
                self.trace.flow_uniqid(),
                median,
                p95
            );
        }
        self.percentile_delay.clear();
    }

    fn intersend_time(&self) -> f64 {
        self.intersend_time
    }

    fn cwnd(&self) -> f64 {
        self.the_window
    }

    fn timeout(&self) -> f64 {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::clock::SimClock;

    fn controller() -> (MarkovianCc<SimClock>, SimClock) {
        let clock = SimClock::new();
        let mut cc = MarkovianCc::new(MarkovianConfig::default(), clock.clone());
        cc.init();
        (cc, clock)
    }

    fn send_at(cc: &mut MarkovianCc<SimClock>, clock: &SimClock, seqno: Seqno, t: f64) {
        clock.set(t);
        cc.on_pkt_sent(seqno);
    }

    fn ack_at(cc: &mut MarkovianCc<SimClock>, clock: &SimClock, seqno: Seqno, t: f64) {
        clock.set(t);
        let sent_time = cc.inflight().get(seqno).map(|e| e.sent_time).unwrap();
        cc.on_ack(seqno + 1, t, sent_time);
    }

    #[test]
    fn fresh_flow_state() {
        let (cc, _) = controller();
        assert_eq!(cc.min_rtt(), f64::INFINITY);
        assert_eq!(cc.cwnd(), 10.0);
        assert_eq!(cc.intersend_time(), 0.0);
        assert_eq!(cc.timeout(), 1000.0);
        assert_eq!(cc.utility_mode(), UtilityMode::ConstantDelta);
        assert_eq!(cc.delta(), 1.0);
        assert!(cc.inflight().is_empty());
    }

    /// Sends 0..10 at 10ms spacing, each acked 50ms after it left. Returns the last ack time.
    fn probe(cc: &mut MarkovianCc<SimClock>, clock: &SimClock) -> f64 {
        for t in (0..=14).map(|k| k as f64 * 10.0) {
            if t >= 50.0 {
                ack_at(cc, clock, ((t - 50.0) / 10.0) as Seqno, t);
            }
            if t <= 90.0 {
                send_at(cc, clock, (t / 10.0) as Seqno, t);
            }
        }
        140.0
    }

    #[test]
    fn probing_keeps_window() {
        let (mut cc, clock) = controller();
        for seqno in 0..9 {
            let t = seqno as f64 * 100.0;
            send_at(&mut cc, &clock, seqno, t);
            ack_at(&mut cc, &clock, seqno, t + 20.0 + seqno as f64 * 7.0);
        }
        // heavy queueing, but only nine acks so far
        assert!(cc.rtt_acked().mean() > cc.min_rtt());
        assert_eq!(cc.cwnd(), 10.0);
        assert_eq!(cc.cur_intersend_time(), 0.0);
    }

    #[test]
    fn startup_jumps_to_target() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (mut cc, clock) = controller();
        let sink = events.clone();
        cc.set_trace_sink(move |evt| sink.lock().push(*evt));

        let mut t = 0.0;
        for seqno in 0..10 {
            send_at(&mut cc, &clock, seqno, t);
            ack_at(&mut cc, &clock, seqno, t + 50.0);
            t += 60.0;
        }
        assert_eq!(cc.cwnd(), 10.0);
        send_at(&mut cc, &clock, 10, t);
        ack_at(&mut cc, &clock, 10, t + 100.0);

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            CcTraceEvt::Start {
                timestamp: t + 100.0,
                window: 10.0
            }
        );
        match events[1] {
            CcTraceEvt::Window {
                window,
                rtt_ewma,
                min_rtt,
                target_window,
                ..
            } => {
                assert_eq!(min_rtt, 50.0);
                assert!(rtt_ewma > 50.0 && rtt_ewma <= 100.0);
                assert_eq!(window, target_window.max(1.0));
                assert_eq!(window, cc.cwnd());
                assert!((cc.cur_intersend_time() - 0.5 * window / rtt_ewma).abs() < 1e-12);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(cc.intersend_time() > 0.0);
    }

    #[test]
    fn window_steps_toward_target() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (mut cc, clock) = controller();
        let sink = events.clone();
        cc.set_trace_sink(move |evt| sink.lock().push(*evt));

        let mut t = probe(&mut cc, &clock);
        for seqno in 10..40 {
            t += 200.0;
            send_at(&mut cc, &clock, seqno, t);
            ack_at(&mut cc, &clock, seqno, t + 50.0 + (seqno % 5) as f64 * 10.0);
        }

        let events = events.lock();
        let start = events
            .iter()
            .position(|evt| matches!(evt, CcTraceEvt::Start { .. }))
            .unwrap();
        let windows: Vec<(f64, f64)> = events[start + 1..]
            .iter()
            .map(|evt| match evt {
                CcTraceEvt::Window {
                    window,
                    target_window,
                    ..
                } => (*window, *target_window),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert!(windows.len() > 10);
        for pair in windows.windows(2) {
            let (prev, _) = pair[0];
            let (window, target) = pair[1];
            let expected = if prev < target {
                prev + 1.0 / prev
            } else {
                prev - 1.0 / prev
            };
            assert!((window - expected.max(1.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn window_never_below_one() {
        let (mut cc, clock) = controller();
        let mut t = 0.0;
        for seqno in 0..10 {
            send_at(&mut cc, &clock, seqno, t);
            ack_at(&mut cc, &clock, seqno, t + 10.0);
            t += 20.0;
        }
        for seqno in 10..200 {
            send_at(&mut cc, &clock, seqno, t);
            ack_at(&mut cc, &clock, seqno, t + 1000.0 + seqno as f64);
            t += 1100.0 + seqno as f64;
            assert!(cc.cwnd() >= 1.0, "window {}", cc.cwnd());
        }
    }

    #[test]
    #[should_panic]
    fn ack_from_the_future_panics() {
        let (mut cc, clock) = controller();
        send_at(&mut cc, &clock, 0, 5.0);
        clock.set(5.0);
        cc.on_ack(1, 5.0, 5.0);
    }

    #[test]
    fn ack_zero_matches_nothing() {
        let (mut cc, clock) = controller();
        send_at(&mut cc, &clock, 0, 0.0);
        clock.set(10.0);
        cc.on_ack(0, 10.0, 0.0);
        assert_eq!(cc.inflight().unacked(), 1);
        assert_eq!(cc.num_pkts_acked(), 1);
        assert_eq!(cc.min_rtt(), 10.0);
    }

    #[test]
    fn sent_packets_record_pacing_state() {
        let (mut cc, clock) = controller();
        cc.set_intersend_time_vel(0.25);
        send_at(&mut cc, &clock, 3, 7.0);
        assert_eq!(cc.flow_length(), 1);
        assert_eq!(
            cc.inflight().get(3),
            Some(&InflightEntry {
                sent_time: 7.0,
                intersend_time: 0.0,
                intersend_time_vel: 0.25,
            })
        );
        ack_at(&mut cc, &clock, 3, 20.0);
        assert_eq!(cc.prev_intersend_time_vel(), 0.25);
    }

    #[test]
    fn unacked_rtt_rises_with_stale_packets() {
        let (mut cc, clock) = controller();
        send_at(&mut cc, &clock, 0, 0.0);
        ack_at(&mut cc, &clock, 0, 10.0);
        // 1 is never acked and keeps aging
        send_at(&mut cc, &clock, 1, 10.0);
        send_at(&mut cc, &clock, 2, 200.0);
        assert_eq!(cc.rtt_acked().mean(), 10.0);
        assert!(cc.rtt_unacked().mean() > 10.0);
        assert!(cc.rtt_unacked().mean() <= 190.0);
    }

    #[test]
    fn pseudo_delay_decays_between_acks() {
        let (mut cc, clock) = controller();
        probe(&mut cc, &clock);
        for seqno in 10..13 {
            send_at(&mut cc, &clock, seqno, 150.0 + (seqno - 10) as f64 * 10.0);
        }
        ack_at(&mut cc, &clock, 12, 220.0);
        let inflated = cc.pseudo_delay();
        assert_eq!(inflated, 2.0 * cc.interarrival_time().mean());

        send_at(&mut cc, &clock, 13, 220.0);
        ack_at(&mut cc, &clock, 13, 320.0);
        // two min-RTTs without acks
        let expected = inflated * 0.8f64.powf(2.0);
        assert!((cc.pseudo_delay() - expected).abs() < 1e-9);
    }

    #[test]
    fn loss_burst_is_capped_by_seeded_baseline() {
        let (mut cc, clock) = controller();
        // queueing builds up 5ms per packet, and every ack opens a new monitor interval
        let mut t = 0.0;
        for seqno in 0..10 {
            send_at(&mut cc, &clock, seqno, t);
            t += 50.0 + 5.0 * seqno as f64;
            ack_at(&mut cc, &clock, seqno, t);
            t += 10.0;
        }
        let last_ack = t - 10.0;
        assert_eq!(cc.monitor_interval_start(), last_ack);
        assert_eq!(cc.min_rtt(), 50.0);
        assert_eq!(cc.pseudo_delay(), 0.0);
        // no baseline yet, so the rollover seeds it from the queueing delay
        let seeded = cc.rtt_acked().mean() - cc.min_rtt();
        assert!(seeded > 0.0);
        assert_eq!(cc.prev_pseudo_delay(), seeded);

        for seqno in 10..60 {
            send_at(&mut cc, &clock, seqno, last_ack + 0.01 * (seqno - 10) as f64);
        }
        ack_at(&mut cc, &clock, 59, last_ack + 51.0);

        assert_eq!(cc.monitor_interval_start(), last_ack);
        assert_eq!(cc.num_pkts_lost(), 49);
        assert!(49.0 * cc.interarrival_time().mean() > 2.0 * seeded);
        assert_eq!(cc.prev_pseudo_delay(), seeded);
        assert_eq!(cc.pseudo_delay(), 2.0 * seeded);
    }

    #[test]
    fn loss_rate_follows_monitor_intervals() {
        let (mut cc, clock) = controller();
        probe(&mut cc, &clock);
        assert_eq!(cc.loss_rate().mean(), 0.0);
        for seqno in 10..13 {
            send_at(&mut cc, &clock, seqno, 150.0 + (seqno - 10) as f64 * 10.0);
        }
        ack_at(&mut cc, &clock, 12, 220.0);
        assert_eq!(cc.num_losses(), 2);

        send_at(&mut cc, &clock, 13, 230.0);
        ack_at(&mut cc, &clock, 13, 280.0);
        assert_eq!(cc.monitor_interval_start(), 280.0);
        assert_eq!(cc.prev_num_losses(), 2);
        assert_eq!(cc.num_losses(), 0);
        assert!(cc.loss_rate().mean() > 0.0 && cc.loss_rate().mean() < 2.0 / 3.0);
    }

    #[test]
    fn config_fallback() {
        let (mut cc, _) = controller();
        assert!(cc.interpret_config_str("bounded_delay_end:0.2").is_none());
        assert_eq!(cc.utility_mode(), UtilityMode::BoundedDelayEnd);
        assert_eq!(cc.delay_bound(), Some(0.2));

        assert!(cc.interpret_config_str("constant_delta:0.5").is_none());
        assert_eq!(cc.delta(), 0.5);

        let err = cc.interpret_config_str("garbage");
        assert_eq!(err, Some(ConfigError::UnknownMode("garbage".into())));
        assert_eq!(cc.utility_mode(), UtilityMode::ConstantDelta);
        assert_eq!(cc.delta(), 1.0);
        // untouched by modes without a bound
        assert_eq!(cc.delay_bound(), Some(0.2));
    }

    #[test]
    fn objective_survives_init() {
        let (mut cc, _) = controller();
        cc.interpret_config_str("bounded_percentile_delay_end:0.05");
        cc.init();
        assert_eq!(cc.utility_mode(), UtilityMode::BoundedPercentileDelayEnd);
        assert_eq!(cc.delay_bound(), Some(0.05));
    }

    #[test]
    fn close_is_idempotent() {
        let (mut cc, clock) = controller();
        send_at(&mut cc, &clock, 0, 0.0);
        ack_at(&mut cc, &clock, 0, 30.0);
        assert_eq!(cc.percentile_delay().len(), 1);
        cc.close();
        cc.close();
        assert!(cc.percentile_delay().is_empty());
        assert_eq!(cc.num_pkts_acked(), 1);
    }

    #[test]
    fn boxed_as_trait_object() {
        let clock = SimClock::new();
        let mut cc: Box<dyn CongestionControl + Send> =
            Box::new(MarkovianCc::new(MarkovianConfig::default(), clock.clone()));
        cc.init();
        clock.set(1.0);
        cc.on_pkt_sent(0);
        clock.set(2.0);
        cc.on_ack(1, 2.0, 1.0);
        assert_eq!(cc.cwnd(), 10.0);
    }
}
