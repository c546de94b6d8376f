//! Connection quality advice
//!
//! Advisory only: preloading decisions consult the advisor, explicit loads
//! never do. The advisor is an injected capability with an explicit sensor
//! lifecycle rather than an ambient singleton.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Minimum advised downlink for preloading on a borderline connection, in Mbps
pub const PRELOAD_DOWNLINK_FLOOR_MBPS: f64 = 1.5;

/// Effective connection class as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveConnectionType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

/// A point-in-time report of network quality
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionAdvice {
    /// Effective connection class
    pub effective_type: EffectiveConnectionType,

    /// Estimated downlink throughput, in Mbps
    pub downlink_mbps: f64,

    /// User has requested reduced data usage
    pub save_data: bool,
}

impl ConnectionAdvice {
    /// Whether speculative loading is advisable right now.
    ///
    /// Very slow classes are suppressed outright; the borderline 3g class is
    /// suppressed only below a fixed downlink floor. Save-data always
    /// suppresses. Explicit `load` calls bypass this entirely.
    pub fn permits_preload(&self) -> bool {
        if self.save_data {
            return false;
        }
        match self.effective_type {
            EffectiveConnectionType::Slow2g | EffectiveConnectionType::TwoG => false,
            EffectiveConnectionType::ThreeG => self.downlink_mbps >= PRELOAD_DOWNLINK_FLOOR_MBPS,
            EffectiveConnectionType::FourG => true,
        }
    }
}

impl Default for ConnectionAdvice {
    fn default() -> Self {
        Self {
            effective_type: EffectiveConnectionType::FourG,
            downlink_mbps: 10.0,
            save_data: false,
        }
    }
}

/// Source of connection advice
pub trait ConnectionAdvisor: Send + Sync {
    /// Current advice
    fn advice(&self) -> ConnectionAdvice;
}

/// Advisor that always reports the same advice
#[derive(Debug, Clone)]
pub struct FixedAdvisor(pub ConnectionAdvice);

impl ConnectionAdvisor for FixedAdvisor {
    fn advice(&self) -> ConnectionAdvice {
        self.0
    }
}

impl Default for FixedAdvisor {
    fn default() -> Self {
        Self(ConnectionAdvice::default())
    }
}

/// Publisher half of a live connection feed
#[derive(Debug)]
pub struct ConnectionSensor {
    tx: watch::Sender<ConnectionAdvice>,
}

impl ConnectionSensor {
    /// Publish updated advice to all subscribed advisors
    pub fn report(&self, advice: ConnectionAdvice) {
        let _ = self.tx.send(advice);
    }
}

/// Advisor fed by a `ConnectionSensor`
#[derive(Debug, Clone)]
pub struct WatchAdvisor {
    rx: watch::Receiver<ConnectionAdvice>,
}

impl ConnectionAdvisor for WatchAdvisor {
    fn advice(&self) -> ConnectionAdvice {
        *self.rx.borrow()
    }
}

/// Create a connected sensor/advisor pair. Dropping the sensor freezes the
/// advisor at the last reported advice.
pub fn connection_channel(initial: ConnectionAdvice) -> (ConnectionSensor, WatchAdvisor) {
    let (tx, rx) = watch::channel(initial);
    (ConnectionSensor { tx }, WatchAdvisor { rx })
}
