//! Display-rate loop driving modulation and visual updates.
//!
//! The host delivers animation frames one request at a time. Each accepted
//! frame re-arms the next request; hiding the display cancels the pending
//! request and showing it again re-arms. Whether work runs on a given frame
//! is up to a [`FramePolicy`].

pub trait FramePolicy {
    /// Decide whether to do work for the frame at `timestamp` (seconds).
    fn should_run(&mut self, timestamp: f64) -> bool;
}

/// Run on every frame.
pub struct EveryFrame;

impl FramePolicy for EveryFrame {
    fn should_run(&mut self, _timestamp: f64) -> bool {
        true
    }
}

/// Run at most once per `min_interval` seconds.
pub struct Throttled {
    min_interval: f64,
    last_run: Option<f64>,
}

impl Throttled {
    pub fn new(min_interval: f64) -> Self {
        Self {
            min_interval: min_interval.max(0.0),
            last_run: None,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(ms as f64 / 1000.0)
    }
}

impl FramePolicy for Throttled {
    fn should_run(&mut self, timestamp: f64) -> bool {
        match self.last_run {
            Some(last) if timestamp - last < self.min_interval => false,
            _ => {
                self.last_run = Some(timestamp);
                true
            }
        }
    }
}

/// One outstanding frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

pub struct FrameLoop {
    policy: Box<dyn FramePolicy>,
    running: bool,
    visible: bool,
    pending: Option<FrameRequest>,
    next_request: u64,
}

impl FrameLoop {
    pub fn new(policy: Box<dyn FramePolicy>) -> Self {
        Self {
            policy,
            running: false,
            visible: true,
            pending: None,
            next_request: 1,
        }
    }

    fn request(&mut self) -> FrameRequest {
        let request = FrameRequest(self.next_request);
        self.next_request += 1;
        self.pending = Some(request);
        request
    }

    /// Start the loop. Returns the request the host should fulfil, if any.
    pub fn start(&mut self) -> Option<FrameRequest> {
        self.running = true;
        if self.visible && self.pending.is_none() {
            Some(self.request())
        } else {
            self.pending
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.cancel();
    }

    /// Cancel the pending request, if any.
    pub fn cancel(&mut self) -> Option<FrameRequest> {
        self.pending.take()
    }

    /// Hidden displays get no frames at all; becoming visible re-arms.
    pub fn set_visible(&mut self, visible: bool) -> Option<FrameRequest> {
        if self.visible == visible {
            return self.pending;
        }
        self.visible = visible;
        if !visible {
            if let Some(request) = self.pending.take() {
                log::debug!(target: "modsynth::modulation", "display hidden; cancelled frame {:?}", request);
            }
            None
        } else if self.running {
            Some(self.request())
        } else {
            None
        }
    }

    /// Accept a delivered frame. Returns whether work should run; stale or
    /// cancelled requests return false and do not re-arm.
    pub fn on_frame(&mut self, request: FrameRequest, timestamp: f64) -> bool {
        if self.pending != Some(request) || !self.running || !self.visible {
            return false;
        }
        self.request();
        self.policy.should_run(timestamp)
    }

    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}
