//! Link lifecycle: owning the stack handle and moving it between links.
//!
//! [`LinkLifecycle`] is the only place a stack handle is created or destroyed.
//! Its invariant is that `link_mask` names the links the live handle was
//! started with, and a missing handle always pairs with [`LinkMask::NONE`].

use core::fmt;

use crate::config::NodeConfig;
use crate::links::{LinkMask, LinkType};
use crate::log;
use crate::stack::{LinkConfig, StackError, StackOption, WirelessStack};

/// Transition step that failed while bringing a link up.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LifecycleStep {
    /// Tearing down the previous handle.
    Deinit,
    Init,
    /// Applying a connection or multi-link policy hint.
    Policy,
    Start,
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleStep::Deinit => "deinit",
            LifecycleStep::Init => "init",
            LifecycleStep::Policy => "policy",
            LifecycleStep::Start => "start",
        };
        f.write_str(label)
    }
}

/// Failure of a link transition. The lifecycle is left without a handle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkError {
    pub link: LinkType,
    pub step: LifecycleStep,
    pub cause: StackError,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "link {} failed during {}: {}",
            self.link, self.step, self.cause
        )
    }
}

/// Result of a successful [`LinkLifecycle::init_and_start`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkTransition {
    /// The handle was already running on the requested link.
    Unchanged,
    /// A fresh handle was created and started.
    Started,
}

/// Outcome of [`LinkLifecycle::link_switch`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SwitchOutcome {
    /// Moved to the contained link.
    Switched(LinkType),
    /// Only one link is available; nothing changed.
    SingleLink(LinkType),
}

/// Owner of the stack handle and the link it runs on.
pub struct LinkLifecycle<H> {
    handle: Option<H>,
    link_mask: LinkMask,
    current: LinkType,
    connection_requested: bool,
}

impl<H> LinkLifecycle<H> {
    /// Creates a lifecycle with no handle; `current` names the link the node
    /// will register on.
    #[must_use]
    pub const fn new(current: LinkType) -> Self {
        Self {
            handle: None,
            link_mask: LinkMask::NONE,
            current,
            connection_requested: false,
        }
    }

    /// Links the live handle was started with.
    #[must_use]
    pub const fn link_mask(&self) -> LinkMask {
        self.link_mask
    }

    /// Link most recently brought up successfully.
    #[must_use]
    pub const fn current_link(&self) -> LinkType {
        self.current
    }

    #[must_use]
    pub const fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    /// Removes the handle, leaving the lifecycle in the `(None, NONE)` state.
    pub fn take_handle(&mut self) -> Option<H> {
        self.link_mask = LinkMask::NONE;
        self.handle.take()
    }

    #[must_use]
    pub const fn connection_requested(&self) -> bool {
        self.connection_requested
    }

    pub fn set_connection_requested(&mut self, requested: bool) {
        self.connection_requested = requested;
    }

    /// Brings the stack up on `requested`.
    ///
    /// Performs no stack call when the live handle already runs that link.
    /// Otherwise the old handle is deinitialized, a fresh one is created,
    /// policy hints are applied, and the link is started. Any failure leaves
    /// the lifecycle with no handle and an empty mask.
    pub fn init_and_start<S>(
        &mut self,
        stack: &mut S,
        config: &NodeConfig,
        requested: LinkType,
    ) -> Result<LinkTransition, LinkError>
    where
        S: WirelessStack<Handle = H>,
    {
        let mask = requested.mask();
        if self.link_mask == mask {
            self.settle(requested);
            return Ok(LinkTransition::Unchanged);
        }

        let fail = |step, cause| LinkError {
            link: requested,
            step,
            cause,
        };

        if let Some(old) = self.take_handle() {
            if let Err(cause) = stack.deinit(old) {
                log::link_step_failed(requested, LifecycleStep::Deinit, cause);
                return Err(fail(LifecycleStep::Deinit, cause));
            }
            log::link_deinitialized(self.current);
        }

        let link_config = LinkConfig::new(mask, config.device);
        let mut handle = match stack.init(&link_config) {
            Ok(handle) => handle,
            Err(cause) => {
                log::link_step_failed(requested, LifecycleStep::Init, cause);
                return Err(fail(LifecycleStep::Init, cause));
            }
        };

        let hints = [
            config.policy.connection.map(StackOption::ConnectionPolicy),
            config.policy.multi_link.map(StackOption::MultiLinkPolicy),
        ];
        for option in hints.into_iter().flatten() {
            match stack.set_option(&mut handle, option) {
                Ok(()) => log::policy_applied(option),
                Err(StackError::NoSupport) => log::policy_unsupported(option),
                Err(cause) => {
                    log::link_step_failed(requested, LifecycleStep::Policy, cause);
                    discard(stack, handle);
                    return Err(fail(LifecycleStep::Policy, cause));
                }
            }
        }

        if let Err(cause) = stack.start(&mut handle, mask) {
            log::link_step_failed(requested, LifecycleStep::Start, cause);
            discard(stack, handle);
            return Err(fail(LifecycleStep::Start, cause));
        }

        self.handle = Some(handle);
        self.link_mask = mask;
        self.settle(requested);
        log::link_started(requested);
        Ok(LinkTransition::Started)
    }

    /// Moves to the next available link in cyclic order.
    ///
    /// A single-link build keeps the current link and reports
    /// [`SwitchOutcome::SingleLink`]. Errors are those of
    /// [`LinkLifecycle::init_and_start`].
    pub fn link_switch<S>(
        &mut self,
        stack: &mut S,
        config: &NodeConfig,
    ) -> Result<SwitchOutcome, LinkError>
    where
        S: WirelessStack<Handle = H>,
    {
        let current = if self.link_mask.is_empty() {
            None
        } else {
            Some(self.current)
        };

        let Some(next) = config.available.next_after(current) else {
            // An empty capability set cannot start anything.
            return Err(LinkError {
                link: self.current,
                step: LifecycleStep::Init,
                cause: StackError::NoSupport,
            });
        };

        if Some(next) == current {
            log::single_link_available(next);
            return Ok(SwitchOutcome::SingleLink(next));
        }

        self.init_and_start(stack, config, next)?;
        Ok(SwitchOutcome::Switched(next))
    }

    fn settle(&mut self, link: LinkType) {
        self.current = link;
        self.connection_requested = false;
    }
}

fn discard<S: WirelessStack>(stack: &mut S, handle: S::Handle) {
    if let Err(cause) = stack.deinit(handle) {
        log::teardown_failed(cause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::{ConnectionPolicy, MultiLinkPolicy, PolicyHints};
    use crate::links::LinkSet;
    use crate::stack::{
        MessageDescriptor, MessageId, StackCallbacks, Timestamp,
    };

    #[derive(Default)]
    struct CountingStack {
        calls: usize,
        fail_start: bool,
        option_error: Option<StackError>,
        deinits: usize,
    }

    impl WirelessStack for CountingStack {
        type Handle = u8;

        fn init(&mut self, _: &LinkConfig) -> Result<u8, StackError> {
            self.calls += 1;
            Ok(1)
        }

        fn deinit(&mut self, _: u8) -> Result<(), StackError> {
            self.calls += 1;
            self.deinits += 1;
            Ok(())
        }

        fn start(&mut self, _: &mut u8, _: LinkMask) -> Result<(), StackError> {
            self.calls += 1;
            if self.fail_start {
                Err(StackError::Radio)
            } else {
                Ok(())
            }
        }

        fn stop(&mut self, _: &mut u8, _: LinkMask) -> Result<(), StackError> {
            self.calls += 1;
            Ok(())
        }

        fn set_option(&mut self, _: &mut u8, _: StackOption) -> Result<(), StackError> {
            self.calls += 1;
            self.option_error.map_or(Ok(()), Err)
        }

        fn submit_message(
            &mut self,
            _: &mut u8,
            _: &[u8],
            _: &MessageDescriptor,
        ) -> Result<MessageId, StackError> {
            Ok(0)
        }

        fn query_time(&mut self, _: &mut u8) -> Result<Timestamp, StackError> {
            Ok(Timestamp::default())
        }

        fn query_mtu(&mut self, _: &mut u8, _: LinkMask) -> Result<usize, StackError> {
            Ok(0)
        }

        fn request_factory_reset(&mut self, _: &mut u8) -> Result<(), StackError> {
            Ok(())
        }

        fn last_error(&mut self, _: &mut u8) -> StackError {
            StackError::Other(0)
        }

        fn request_connection(&mut self, _: &mut u8, _: bool) -> Result<(), StackError> {
            Ok(())
        }

        fn process(
            &mut self,
            _: &mut u8,
            _: &mut dyn StackCallbacks,
        ) -> Result<(), StackError> {
            Ok(())
        }
    }

    #[test]
    fn matching_mask_makes_no_stack_calls() {
        let mut stack = CountingStack::default();
        let config = NodeConfig::default();
        let mut lifecycle = LinkLifecycle::new(LinkType::Ble);

        lifecycle
            .init_and_start(&mut stack, &config, LinkType::Ble)
            .expect("first start");
        let calls = stack.calls;
        lifecycle.set_connection_requested(true);

        let transition = lifecycle
            .init_and_start(&mut stack, &config, LinkType::Ble)
            .expect("repeat start");

        assert_eq!(transition, LinkTransition::Unchanged);
        assert_eq!(stack.calls, calls);
        assert!(!lifecycle.connection_requested());
    }

    #[test]
    fn start_failure_discards_handle() {
        let mut stack = CountingStack {
            fail_start: true,
            ..CountingStack::default()
        };
        let config = NodeConfig::default();
        let mut lifecycle = LinkLifecycle::new(LinkType::Ble);

        let error = lifecycle
            .init_and_start(&mut stack, &config, LinkType::Fsk)
            .expect_err("start must fail");

        assert_eq!(error.step, LifecycleStep::Start);
        assert_eq!(error.cause, StackError::Radio);
        assert!(!lifecycle.has_handle());
        assert_eq!(lifecycle.link_mask(), LinkMask::NONE);
        assert_eq!(stack.deinits, 1, "failed handle should be released");
    }

    #[test]
    fn unsupported_policy_is_tolerated() {
        let mut stack = CountingStack {
            option_error: Some(StackError::NoSupport),
            ..CountingStack::default()
        };
        let config = NodeConfig::default().with_policy(PolicyHints {
            connection: Some(ConnectionPolicy::OnDemand),
            multi_link: Some(MultiLinkPolicy::PowerSave),
        });
        let mut lifecycle = LinkLifecycle::new(LinkType::Ble);

        let transition = lifecycle
            .init_and_start(&mut stack, &config, LinkType::Css)
            .expect("unsupported hints are warnings");

        assert_eq!(transition, LinkTransition::Started);
        assert_eq!(lifecycle.link_mask(), LinkMask::LINK_3);
        assert_eq!(lifecycle.current_link(), LinkType::Css);
    }

    #[test]
    fn rejected_policy_fails_transition() {
        let mut stack = CountingStack {
            option_error: Some(StackError::InvalidArgs),
            ..CountingStack::default()
        };
        let config = NodeConfig::default().with_policy(PolicyHints {
            connection: Some(ConnectionPolicy::AutoConnect),
            multi_link: None,
        });
        let mut lifecycle = LinkLifecycle::new(LinkType::Ble);

        let error = lifecycle
            .init_and_start(&mut stack, &config, LinkType::Ble)
            .expect_err("invalid policy is fatal");

        assert_eq!(error.step, LifecycleStep::Policy);
        assert!(!lifecycle.has_handle());
    }

    #[test]
    fn single_link_switch_is_a_no_op() {
        let mut stack = CountingStack::default();
        let config = NodeConfig::default().with_links(LinkSet::only(LinkType::Ble));
        let mut lifecycle = LinkLifecycle::new(LinkType::Ble);
        lifecycle
            .init_and_start(&mut stack, &config, LinkType::Ble)
            .expect("start");
        let calls = stack.calls;

        let outcome = lifecycle
            .link_switch(&mut stack, &config)
            .expect("switch");

        assert_eq!(outcome, SwitchOutcome::SingleLink(LinkType::Ble));
        assert_eq!(stack.calls, calls);
    }
}
