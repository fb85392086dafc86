use std::{fmt, sync::Arc};

use once_cell::sync::OnceCell;
use serde::Serialize;

/// Process-wide trace-line sink
static CC_TRACE_SINK: OnceCell<Box<dyn Fn(String) + Sync + Send>> = OnceCell::new();

/// Initialize the process-wide trace-line sink. Can only be done once.
pub fn init_cc_tracing(per_line: impl Fn(String) + Send + Sync + 'static) -> anyhow::Result<()> {
    if CC_TRACE_SINK.set(Box::new(per_line)).is_err() {
        anyhow::bail!("congestion-control trace sink already initialized")
    }
    Ok(())
}

/// Something the controller reports for offline analysis.
///
/// The `Display` form is the line format that analysis scripts parse, so field order matters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CcTraceEvt {
    /// The window jumped straight to its first target.
    Start { timestamp: f64, window: f64 },
    /// The window was recomputed.
    Window {
        timestamp: f64,
        window: f64,
        rtt_ewma: f64,
        min_rtt: f64,
        target_window: f64,
    },
    /// Loss summary of the flow that just ended.
    LossSummary { percent_lost: f64 },
}

impl fmt::Display for CcTraceEvt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CcTraceEvt::Start { timestamp, window } => write!(f, "S {} {}", timestamp, window),
            CcTraceEvt::Window {
                timestamp,
                window,
                rtt_ewma,
                min_rtt,
                target_window,
            } => write!(
                f,
                "W {} {} {} {} {}",
                timestamp, window, rtt_ewma, min_rtt, target_window
            ),
            CcTraceEvt::LossSummary { percent_lost } => {
                write!(f, "% Packets Lost: {}", percent_lost)
            }
        }
    }
}

pub type LocalSink = Arc<dyn Fn(&CcTraceEvt) + Send + Sync>;

/// A per-controller tracing context.
#[derive(Clone)]
pub struct CcTraceCtx {
    flow_uniqid: u64,
    local: Option<LocalSink>,
}

impl fmt::Debug for CcTraceCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CcTraceCtx")
            .field("flow_uniqid", &self.flow_uniqid)
            .field("local", &self.local.is_some())
            .finish()
    }
}

impl CcTraceCtx {
    /// Creates a new, unique context.
    pub fn new_random() -> Self {
        Self {
            flow_uniqid: rand::random(),
            local: None,
        }
    }

    pub fn flow_uniqid(&self) -> u64 {
        self.flow_uniqid
    }

    /// Routes this context's events to `sink` instead of the process-wide sink.
    pub fn set_local_sink(&mut self, sink: LocalSink) {
        self.local = Some(sink)
    }

    /// Traces an event.
    pub fn trace(&self, evt: CcTraceEvt) {
        // tracing's `log` fallback has no subscriber, so ask the logger too
        if tracing::enabled!(tracing::Level::TRACE) || log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(&evt) {
                tracing::trace!(flow = self.flow_uniqid, "cc_trace: {}", json);
            }
        }
        if let Some(local) = &self.local {
            local(&evt);
        } else if let Some(cb) = CC_TRACE_SINK.get() {
            cb(evt.to_string());
        }
    }
}
