use std::{
    sync::Mutex,
    time::Duration,
};
use reqwest::blocking::Client;

use crate::error::AgentResult;


/// Something that can tell whether the remote side is reachable right now.
pub trait Probe: Send + Sync {
    fn is_reachable(&self) -> bool;
}


/// Probes the uplink with a `HEAD` request. Any HTTP response, even an error
/// status, means the network path is up.
pub struct HttpProbe {
    client: Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: &str, timeout: Duration) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(HttpProbe {
            client,
            url: url.to_owned(),
        })
    }
}

impl Probe for HttpProbe {
    fn is_reachable(&self) -> bool {
        match self.client.head(&self.url).send() {
            Ok(_) => true,
            Err(err) => {
                debug!("Probe to {} failed: {}", self.url, err);
                false
            },
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Unknown,
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CameOnline,
    WentOffline,
    Unchanged,
}


/// Turns periodic probe results into online/offline transitions.
pub struct ConnectivityMonitor {
    probe: Box<dyn Probe>,
    link: Mutex<Link>,
}

impl ConnectivityMonitor {
    pub fn new(probe: Box<dyn Probe>) -> Self {
        ConnectivityMonitor {
            probe,
            link: Mutex::new(Link::Unknown),
        }
    }

    pub fn poll(&self) -> Transition {
        let now = if self.probe.is_reachable() { Link::Online } else { Link::Offline };
        self.observe(now)
    }

    /// Records an observed link state. The first `Online` observation after
    /// start counts as coming online.
    pub fn observe(&self, now: Link) -> Transition {
        let mut link = self.link.lock().unwrap_or_else(|p| p.into_inner());
        let before = *link;
        *link = now;

        match (before, now) {
            (Link::Online, Link::Online) => Transition::Unchanged,
            (_, Link::Online) => {
                info!("Uplink is online");
                Transition::CameOnline
            },
            (Link::Online, Link::Offline) => {
                warn!("Uplink went offline");
                Transition::WentOffline
            },
            _ => Transition::Unchanged,
        }
    }

    pub fn link(&self) -> Link {
        *self.link.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Last observed state, without probing.
    pub fn is_online(&self) -> bool {
        self.link() == Link::Online
    }
}


#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    /// Probe whose answer the test flips by hand.
    #[derive(Clone)]
    pub struct SwitchProbe(pub Arc<AtomicBool>);

    impl SwitchProbe {
        pub fn new(up: bool) -> Self {
            SwitchProbe(Arc::new(AtomicBool::new(up)))
        }

        pub fn set(&self, up: bool) {
            self.0.store(up, Ordering::SeqCst);
        }
    }

    impl Probe for SwitchProbe {
        fn is_reachable(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn online_at_start_counts_as_transition() {
        let monitor = ConnectivityMonitor::new(Box::new(SwitchProbe::new(true)));
        assert_eq!(monitor.link(), Link::Unknown);
        assert!(!monitor.is_online());

        assert_eq!(monitor.poll(), Transition::CameOnline);
        assert!(monitor.is_online());
        assert_eq!(monitor.poll(), Transition::Unchanged);
    }

    #[test]
    fn offline_at_start_is_not_a_transition() {
        let monitor = ConnectivityMonitor::new(Box::new(SwitchProbe::new(false)));
        assert_eq!(monitor.poll(), Transition::Unchanged);
        assert_eq!(monitor.link(), Link::Offline);
    }

    #[test]
    fn tracks_flapping_link() {
        let probe = SwitchProbe::new(true);
        let monitor = ConnectivityMonitor::new(Box::new(probe.clone()));

        assert_eq!(monitor.poll(), Transition::CameOnline);
        probe.set(false);
        assert_eq!(monitor.poll(), Transition::WentOffline);
        assert_eq!(monitor.poll(), Transition::Unchanged);
        probe.set(true);
        assert_eq!(monitor.poll(), Transition::CameOnline);
    }
}
