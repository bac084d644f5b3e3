//! Background hotplug poll.
//!
//! The poller never touches window manager state. It only enqueues
//! [`Event::RefreshMonitors`], which the reactor handles on its own thread.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info_span};

use crate::actor::reactor::{self, Event};

pub struct MonitorPoller {
    events_tx: reactor::Sender,
    interval: Duration,
}

impl MonitorPoller {
    pub fn new(events_tx: reactor::Sender, interval: Duration) -> Self { MonitorPoller { events_tx, interval } }

    /// Starts the poll thread. It exits once the reactor's channel closes.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new().name("monitor-poller".to_string()).spawn(move || self.run())
    }

    fn run(self) {
        debug!(interval = ?self.interval, "monitor poller started");
        loop {
            thread::sleep(self.interval);
            let _span = info_span!("monitor_poller::tick").entered();
            if self.events_tx.try_send(Event::RefreshMonitors).is_err() {
                debug!("reactor gone, monitor poller exiting");
                return;
            }
        }
    }
}
