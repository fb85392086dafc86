use std::{
    collections::{BTreeMap, VecDeque},
    path::PathBuf,
};

use anyhow::Context;
use argh::FromArgs;
use markovian_cc::{
    init_cc_tracing, CongestionControl, MarkovianCc, MarkovianConfig, Seqno, SimClock,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(FromArgs, Debug)]
/// Drives the controller over a simulated single-bottleneck link, printing its trace lines.
struct Args {
    /// utility configuration string, such as constant_delta:0.5 or bounded_delay:0.1
    #[argh(option, default = "String::from(\"constant_delta:1\")")]
    config: String,

    /// JSON file with controller tunables
    #[argh(option)]
    params: Option<PathBuf>,

    /// bottleneck service rate, in packets per millisecond
    #[argh(option, default = "1.0")]
    rate: f64,

    /// one-way propagation delay, in milliseconds
    #[argh(option, default = "25.0")]
    delay: f64,

    /// bottleneck buffer, in packets
    #[argh(option, default = "100")]
    buffer: usize,

    /// probability that the link drops a packet at random
    #[argh(option, default = "0.0")]
    loss: f64,

    /// length of each flow, in milliseconds
    #[argh(option, default = "10000.0")]
    duration: f64,

    /// number of back-to-back flows
    #[argh(option, default = "1")]
    flows: usize,

    /// simulation step, in milliseconds
    #[argh(option, default = "0.1")]
    tick: f64,

    /// seed for the link's random losses
    #[argh(option, default = "0")]
    seed: u64,
}

/// A FIFO bottleneck with a drop-tail buffer, followed by a fixed propagation delay.
struct Link {
    rate: f64,
    delay: f64,
    buffer: usize,
    loss: f64,
    rng: ChaCha8Rng,
    queue: VecDeque<(Seqno, f64)>,
    free_at: f64,
    // (arrival time at the sender, seqno, send time), in arrival order
    acks: VecDeque<(f64, Seqno, f64)>,
}

impl Link {
    fn new(args: &Args) -> Self {
        Self {
            rate: args.rate,
            delay: args.delay,
            buffer: args.buffer,
            loss: args.loss,
            rng: ChaCha8Rng::seed_from_u64(args.seed),
            queue: VecDeque::new(),
            free_at: 0.0,
            acks: VecDeque::new(),
        }
    }

    fn enqueue(&mut self, seqno: Seqno, sent_time: f64) -> bool {
        if self.queue.len() >= self.buffer || self.rng.gen::<f64>() < self.loss {
            tracing::trace!("link dropped {}", seqno);
            return false;
        }
        self.queue.push_back((seqno, sent_time));
        true
    }

    fn service(&mut self, now: f64) {
        while self.free_at <= now {
            let (seqno, sent_time) = match self.queue.pop_front() {
                Some(pkt) => pkt,
                None => break,
            };
            self.free_at = self.free_at.max(now) + 1.0 / self.rate;
            self.acks
                .push_back((self.free_at + 2.0 * self.delay, seqno, sent_time));
        }
    }

    fn next_ack(&mut self, now: f64) -> Option<(Seqno, f64)> {
        if self.acks.front()?.0 <= now {
            self.acks.pop_front().map(|(_, seqno, sent_time)| (seqno, sent_time))
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
struct FlowStats {
    sent: u64,
    acked: u64,
    timeouts: u64,
}

fn run_flow(
    cc: &mut MarkovianCc<SimClock>,
    clock: &SimClock,
    link: &mut Link,
    args: &Args,
) -> FlowStats {
    let mut stats = FlowStats::default();
    // driver-side view of what is outstanding, for window accounting and timeouts
    let mut outstanding: BTreeMap<Seqno, f64> = BTreeMap::new();
    let mut next_seqno: Seqno = 0;
    let mut next_send_time = 0.0;
    let mut now = 0.0;

    cc.init();
    link.queue.clear();
    link.acks.clear();
    link.free_at = 0.0;

    while now < args.duration {
        clock.set(now);

        while let Some((seqno, sent_time)) = link.next_ack(now) {
            cc.on_ack(seqno + 1, now, sent_time);
            stats.acked += 1;
            outstanding = outstanding.split_off(&(seqno + 1));
        }

        loop {
            let (seqno, sent_time) = match outstanding.iter().next() {
                Some((&seqno, &sent_time)) if now - sent_time > cc.timeout() => (seqno, sent_time),
                _ => break,
            };
            tracing::debug!("{} timed out (sent at {})", seqno, sent_time);
            outstanding.remove(&seqno);
            stats.timeouts += 1;
        }

        link.service(now);

        while (outstanding.len() as f64) < cc.cwnd() && now >= next_send_time {
            let seqno = next_seqno;
            next_seqno += 1;
            cc.on_pkt_sent(seqno);
            outstanding.insert(seqno, now);
            link.enqueue(seqno, now);
            stats.sent += 1;
            next_send_time = now + cc.intersend_time();
        }

        now += args.tick;
    }
    stats
}

/// Runs every flow back to back, printing a summary line after each.
fn simulate(
    cc: &mut MarkovianCc<SimClock>,
    clock: &SimClock,
    link: &mut Link,
    args: &Args,
) -> Vec<FlowStats> {
    let mut all = Vec::with_capacity(args.flows);
    for flow in 0..args.flows {
        let stats = run_flow(cc, clock, link, args);
        println!(
            "# flow {}: sent {} acked {} lost {} timeouts {} window {:.3} min_rtt {} p95 delay {:?} mode {} delta {}",
            flow,
            stats.sent,
            stats.acked,
            cc.num_pkts_lost(),
            stats.timeouts,
            cc.cwnd(),
            cc.min_rtt(),
            cc.percentile_delay().percentile(95.0),
            cc.utility_mode(),
            cc.delta(),
        );
        cc.close();
        all.push(stats);
    }
    // the loss summary of a flow is reported when the next one starts
    cc.init();
    all
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = argh::from_env();
    anyhow::ensure!(args.rate > 0.0, "rate must be positive");
    anyhow::ensure!(args.tick > 0.0, "tick must be positive");
    anyhow::ensure!(args.delay >= 0.0, "delay cannot be negative");
    anyhow::ensure!(
        (0.0..1.0).contains(&args.loss),
        "loss must be in [0, 1)"
    );

    let cfg = match &args.params {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            MarkovianConfig::from_json(&json)
                .with_context(|| format!("cannot parse {}", path.display()))?
        }
        None => MarkovianConfig::default(),
    };
    tracing::debug!("controller config: {:?}", cfg);

    init_cc_tracing(|line| println!("{}", line))?;

    let clock = SimClock::new();
    let mut cc = MarkovianCc::new(cfg, clock.clone());
    cc.interpret_config_str(&args.config);

    let mut link = Link::new(&args);
    simulate(&mut cc, &clock, &mut link, &args);
    Ok(())
}
