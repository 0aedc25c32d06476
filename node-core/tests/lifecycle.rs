mod support;

use node_core::config::{ConnectionPolicy, MultiLinkPolicy, NodeConfig, PolicyHints};
use node_core::lifecycle::{LifecycleStep, LinkError, LinkLifecycle, LinkTransition, SwitchOutcome};
use node_core::links::{LinkMask, LinkSet, LinkType};
use node_core::stack::{StackError, StackOption};

use support::{Call, RecordingStack, take_calls, trace};

fn started(
    stack: &mut RecordingStack,
    config: &NodeConfig,
    link: LinkType,
) -> LinkLifecycle<u32> {
    let mut lifecycle = LinkLifecycle::new(config.registration_link);
    lifecycle
        .init_and_start(stack, config, link)
        .expect("initial start should succeed");
    lifecycle
}

#[test]
fn fresh_start_inits_then_starts_requested_link() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    let config = NodeConfig::new();
    let mut lifecycle = LinkLifecycle::new(LinkType::Ble);

    let transition = lifecycle
        .init_and_start(&mut stack, &config, LinkType::Fsk)
        .expect("start should succeed");

    assert_eq!(transition, LinkTransition::Started);
    assert_eq!(
        take_calls(&trace),
        vec![Call::Init(LinkMask::LINK_2), Call::Start(1, LinkMask::LINK_2)]
    );
    assert_eq!(lifecycle.link_mask(), LinkMask::LINK_2);
    assert_eq!(lifecycle.current_link(), LinkType::Fsk);
    assert!(lifecycle.has_handle());
}

#[test]
fn restarting_the_running_link_touches_nothing() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    let config = NodeConfig::new();
    let mut lifecycle = started(&mut stack, &config, LinkType::Ble);
    take_calls(&trace);

    let transition = lifecycle
        .init_and_start(&mut stack, &config, LinkType::Ble)
        .expect("same link is a no-op");

    assert_eq!(transition, LinkTransition::Unchanged);
    assert!(take_calls(&trace).is_empty(), "no stack calls for an unchanged mask");
    assert_eq!(lifecycle.link_mask(), LinkMask::LINK_1);
}

#[test]
fn changing_link_deinitializes_the_old_handle_first() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    let config = NodeConfig::new();
    let mut lifecycle = started(&mut stack, &config, LinkType::Ble);
    take_calls(&trace);

    lifecycle
        .init_and_start(&mut stack, &config, LinkType::Css)
        .expect("switch to css");

    assert_eq!(
        take_calls(&trace),
        vec![
            Call::Deinit(1),
            Call::Init(LinkMask::LINK_3),
            Call::Start(2, LinkMask::LINK_3),
        ]
    );
}

#[test]
fn failed_init_leaves_no_handle_and_empty_mask() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    let config = NodeConfig::new();
    let mut lifecycle = started(&mut stack, &config, LinkType::Ble);
    stack.faults.init = Some(StackError::OutOfMemory);

    let error = lifecycle
        .init_and_start(&mut stack, &config, LinkType::Fsk)
        .expect_err("init fault must surface");

    assert_eq!(
        error,
        LinkError {
            link: LinkType::Fsk,
            step: LifecycleStep::Init,
            cause: StackError::OutOfMemory,
        }
    );
    assert!(!lifecycle.has_handle());
    assert!(lifecycle.link_mask().is_empty());
}

#[test]
fn failed_start_discards_the_fresh_handle() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    stack.faults.start = Some(StackError::Radio);
    let config = NodeConfig::new();
    let mut lifecycle = LinkLifecycle::new(LinkType::Ble);

    let error = lifecycle
        .init_and_start(&mut stack, &config, LinkType::Ble)
        .expect_err("start fault must surface");

    assert_eq!(error.step, LifecycleStep::Start);
    assert_eq!(
        take_calls(&trace),
        vec![
            Call::Init(LinkMask::LINK_1),
            Call::Start(1, LinkMask::LINK_1),
            Call::Deinit(1),
        ]
    );
    assert!(!lifecycle.has_handle());
    assert!(lifecycle.link_mask().is_empty());
}

#[test]
fn failed_deinit_of_old_handle_aborts_before_init() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    let config = NodeConfig::new();
    let mut lifecycle = started(&mut stack, &config, LinkType::Ble);
    take_calls(&trace);
    stack.faults.deinit = Some(StackError::Busy);

    let error = lifecycle
        .init_and_start(&mut stack, &config, LinkType::Fsk)
        .expect_err("deinit fault must surface");

    assert_eq!(error.step, LifecycleStep::Deinit);
    assert_eq!(take_calls(&trace), vec![Call::Deinit(1)]);
    assert!(!lifecycle.has_handle());
}

#[test]
fn unsupported_policy_hint_is_not_fatal() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    stack.faults.set_option = Some(StackError::NoSupport);
    let config = NodeConfig::new().with_policy(PolicyHints {
        connection: Some(ConnectionPolicy::AutoConnect),
        multi_link: Some(MultiLinkPolicy::PowerSave),
    });
    let mut lifecycle = LinkLifecycle::new(LinkType::Ble);

    lifecycle
        .init_and_start(&mut stack, &config, LinkType::Ble)
        .expect("NoSupport hints are skipped");

    assert_eq!(
        take_calls(&trace),
        vec![
            Call::Init(LinkMask::LINK_1),
            Call::SetOption(StackOption::ConnectionPolicy(ConnectionPolicy::AutoConnect)),
            Call::SetOption(StackOption::MultiLinkPolicy(MultiLinkPolicy::PowerSave)),
            Call::Start(1, LinkMask::LINK_1),
        ]
    );
}

#[test]
fn rejected_policy_hint_is_fatal() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    stack.faults.set_option = Some(StackError::InvalidArgs);
    let config = NodeConfig::new().with_policy(PolicyHints {
        connection: Some(ConnectionPolicy::OnDemand),
        multi_link: None,
    });
    let mut lifecycle = LinkLifecycle::new(LinkType::Ble);

    let error = lifecycle
        .init_and_start(&mut stack, &config, LinkType::Ble)
        .expect_err("invalid hint must surface");

    assert_eq!(error.step, LifecycleStep::Policy);
    assert!(!lifecycle.has_handle());
    assert_eq!(take_calls(&trace).last(), Some(&Call::Deinit(1)));
}

#[test]
fn link_switch_cycles_through_available_links() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    let config = NodeConfig::new();
    let mut lifecycle = started(&mut stack, &config, LinkType::Ble);

    let mut visited = Vec::new();
    for _ in 0..3 {
        match lifecycle.link_switch(&mut stack, &config) {
            Ok(SwitchOutcome::Switched(link)) => visited.push(link),
            other => panic!("unexpected switch outcome: {other:?}"),
        }
    }

    assert_eq!(visited, vec![LinkType::Fsk, LinkType::Css, LinkType::Ble]);
    assert_eq!(lifecycle.link_mask(), LinkMask::LINK_1);
}

#[test]
fn link_switch_skips_links_the_build_lacks() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    let config = NodeConfig::new().with_links(LinkSet::only(LinkType::Ble).with(LinkType::Css));
    let mut lifecycle = started(&mut stack, &config, LinkType::Ble);

    let outcome = lifecycle
        .link_switch(&mut stack, &config)
        .expect("switch should succeed");

    assert_eq!(outcome, SwitchOutcome::Switched(LinkType::Css));
}

#[test]
fn single_link_switch_is_idempotent() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    let config = NodeConfig::new()
        .with_links(LinkSet::only(LinkType::Fsk))
        .with_registration_link(LinkType::Fsk)
        .with_default_link(LinkType::Fsk);
    let mut lifecycle = started(&mut stack, &config, LinkType::Fsk);
    take_calls(&trace);

    for _ in 0..2 {
        let outcome = lifecycle
            .link_switch(&mut stack, &config)
            .expect("single link switch");
        assert_eq!(outcome, SwitchOutcome::SingleLink(LinkType::Fsk));
    }

    assert!(take_calls(&trace).is_empty());
    assert_eq!(lifecycle.link_mask(), LinkMask::LINK_2);
}

#[test]
fn switch_after_lost_handle_starts_first_available_link() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    let config = NodeConfig::new();
    let mut lifecycle = started(&mut stack, &config, LinkType::Css);
    let handle = lifecycle.take_handle().expect("handle present");
    assert_eq!(handle, 1);
    take_calls(&trace);

    let outcome = lifecycle
        .link_switch(&mut stack, &config)
        .expect("restart from nothing");

    assert_eq!(outcome, SwitchOutcome::Switched(LinkType::Ble));
    assert_eq!(
        take_calls(&trace),
        vec![Call::Init(LinkMask::LINK_1), Call::Start(2, LinkMask::LINK_1)]
    );
}

#[test]
fn switch_with_no_available_links_fails() {
    let trace = trace();
    let mut stack = RecordingStack::new(&trace);
    let config = NodeConfig::new().with_links(LinkSet::empty());
    let mut lifecycle: LinkLifecycle<u32> = LinkLifecycle::new(LinkType::Ble);

    let error = lifecycle
        .link_switch(&mut stack, &config)
        .expect_err("nothing to start");

    assert_eq!(error.cause, StackError::NoSupport);
    assert!(take_calls(&trace).is_empty());
}
