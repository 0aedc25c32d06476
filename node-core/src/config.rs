//! Static node configuration.
//!
//! [`NodeConfig::default`] reproduces the reference build: registration and
//! steady-state traffic on the short-range link, every link fitted, a 30 s
//! inactivity window, and the button plus wake-up timer armed as deep-sleep
//! wake sources.

use core::time::Duration;

use crate::links::{LinkSet, LinkType};

/// Slots in the event queue shared between interrupt and task context.
pub const EVENT_QUEUE_DEPTH: usize = 10;

/// Idle window after which the node starts its deep-sleep sequence.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Interval programmed into the wake-up timer and the external radio sleep.
pub const WAKEUP_INTERVAL: Duration = Duration::from_millis(30_000);

/// Qualification identifier reported in the device profile.
pub const QUALIFICATION_ID: u16 = 0x0002;

/// Mobility class advertised to the network.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceClass {
    Static,
    Mobile,
}

/// Power source advertised to the network.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerSource {
    LinePowered,
    Battery,
}

/// Device attributes forwarded with every stack initialization.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceProfile {
    pub class: DeviceClass,
    pub power: PowerSource,
    pub qualification_id: u16,
}

impl DeviceProfile {
    /// Static, line-powered profile used by the reference build.
    #[must_use]
    pub const fn reference() -> Self {
        Self {
            class: DeviceClass::Static,
            power: PowerSource::LinePowered,
            qualification_id: QUALIFICATION_ID,
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::reference()
    }
}

/// How the short-range link decides to hold a connection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionPolicy {
    /// Connect only when the application asks for it.
    OnDemand,
    /// Keep reconnecting while the link is started.
    AutoConnect,
}

/// Preference the stack applies when several links are started together.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MultiLinkPolicy {
    Default,
    PowerSave,
    Performance,
    Latency,
    Reliability,
}

/// Optional policy hints applied right after a fresh stack init.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PolicyHints {
    pub connection: Option<ConnectionPolicy>,
    pub multi_link: Option<MultiLinkPolicy>,
}

impl PolicyHints {
    /// No hints configured.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            connection: None,
            multi_link: None,
        }
    }
}

/// Sources allowed to wake the node from retention-less sleep.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WakeSources {
    /// Wake-up timer interval, if the timer is armed.
    pub timer: Option<Duration>,
    /// Wake on the dedicated wake button.
    pub button: bool,
}

impl WakeSources {
    #[must_use]
    pub const fn reference() -> Self {
        Self {
            timer: Some(WAKEUP_INTERVAL),
            button: true,
        }
    }
}

impl Default for WakeSources {
    fn default() -> Self {
        Self::reference()
    }
}

/// Build-time configuration for the node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeConfig {
    /// Link started first, used to complete registration.
    pub registration_link: LinkType,
    /// Link the node moves to once registered.
    pub default_link: LinkType,
    /// Links the hardware can run.
    pub available: LinkSet,
    /// Idle window before the deep-sleep sequence starts.
    pub inactivity_timeout: Duration,
    /// Whether a separate sub-GHz radio is fitted and must be put to sleep.
    pub external_radio: bool,
    /// Sleep interval handed to the external radio.
    pub radio_sleep: Duration,
    pub wake_sources: WakeSources,
    pub policy: PolicyHints,
    pub device: DeviceProfile,
}

impl NodeConfig {
    /// Reference configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registration_link: LinkType::Ble,
            default_link: LinkType::Ble,
            available: LinkSet::ALL,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            external_radio: false,
            radio_sleep: WAKEUP_INTERVAL,
            wake_sources: WakeSources::reference(),
            policy: PolicyHints::none(),
            device: DeviceProfile::reference(),
        }
    }

    /// Replaces the available link set.
    #[must_use]
    pub const fn with_links(mut self, available: LinkSet) -> Self {
        self.available = available;
        self
    }

    /// Replaces the post-registration default link.
    #[must_use]
    pub const fn with_default_link(mut self, link: LinkType) -> Self {
        self.default_link = link;
        self
    }

    /// Replaces the registration link.
    #[must_use]
    pub const fn with_registration_link(mut self, link: LinkType) -> Self {
        self.registration_link = link;
        self
    }

    /// Declares whether an external sub-GHz radio is fitted.
    #[must_use]
    pub const fn with_external_radio(mut self, fitted: bool) -> Self {
        self.external_radio = fitted;
        self
    }

    #[must_use]
    pub const fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: PolicyHints) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new()
    }
}
