//! Button press classification and mapping to node triggers.

use core::time::Duration;

use node_core::events::{EventProducer, QueueFull};
use node_core::triggers::Triggers;

/// Holding the user button at least this long counts as a long press.
pub const LONG_PRESS: Duration = Duration::from_millis(1_000);

/// Presses shorter than this are contact bounce.
pub const DEBOUNCE: Duration = Duration::from_millis(30);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Button {
    /// The user button present on every board.
    User,
    /// The wake-capable button on dual-button boards.
    Wake,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum PressKind {
    Short,
    Long,
}

/// Which buttons the board has.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ButtonLayout {
    /// One button: short press sends, long press sleeps.
    Single,
    /// User button sleeps, wake button sends.
    Dual,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum ButtonAction {
    ConnectAndSend,
    IdleSleep,
}

/// Classifies a press by how long the button was held. Bounces yield `None`.
pub fn classify(held: Duration) -> Option<PressKind> {
    if held < DEBOUNCE {
        None
    } else if held >= LONG_PRESS {
        Some(PressKind::Long)
    } else {
        Some(PressKind::Short)
    }
}

/// Maps a press to its action for the given layout.
pub fn action(layout: ButtonLayout, button: Button, press: PressKind) -> Option<ButtonAction> {
    match (layout, button, press) {
        (ButtonLayout::Single, Button::User, PressKind::Short)
        | (ButtonLayout::Dual, Button::Wake, _) => Some(ButtonAction::ConnectAndSend),
        (ButtonLayout::Single, Button::User, PressKind::Long)
        | (ButtonLayout::Dual, Button::User, _) => Some(ButtonAction::IdleSleep),
        (ButtonLayout::Single, Button::Wake, _) => None,
    }
}

/// Fires the trigger behind `action`.
pub fn fire<Q: EventProducer>(
    action: ButtonAction,
    triggers: &Triggers<'_, Q>,
) -> Result<(), QueueFull> {
    match action {
        ButtonAction::ConnectAndSend => triggers.trigger_connect_and_send().map(|_| ()),
        ButtonAction::IdleSleep => triggers.trigger_idle_sleep(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use node_core::events::{Event, LocalEventQueue};
    use node_core::links::LinkType;
    use node_core::status::{NodeState, SharedStatus};

    #[test]
    fn presses_are_classified_by_hold_time() {
        assert_eq!(classify(Duration::from_millis(5)), None);
        assert_eq!(classify(Duration::from_millis(200)), Some(PressKind::Short));
        assert_eq!(classify(LONG_PRESS), Some(PressKind::Long));
    }

    #[test]
    fn single_button_layout_uses_press_length() {
        assert_eq!(
            action(ButtonLayout::Single, Button::User, PressKind::Short),
            Some(ButtonAction::ConnectAndSend)
        );
        assert_eq!(
            action(ButtonLayout::Single, Button::User, PressKind::Long),
            Some(ButtonAction::IdleSleep)
        );
        assert_eq!(action(ButtonLayout::Single, Button::Wake, PressKind::Short), None);
    }

    #[test]
    fn dual_button_layout_splits_actions_by_button() {
        assert_eq!(
            action(ButtonLayout::Dual, Button::User, PressKind::Short),
            Some(ButtonAction::IdleSleep)
        );
        assert_eq!(
            action(ButtonLayout::Dual, Button::Wake, PressKind::Long),
            Some(ButtonAction::ConnectAndSend)
        );
    }

    #[test]
    fn fire_enqueues_matching_event() {
        let queue: LocalEventQueue = LocalEventQueue::new();
        let status = SharedStatus::new();
        status.publish_link(LinkType::Css);
        status.publish_state(NodeState::StackReady);
        let triggers = Triggers::new(&queue, &status);

        fire(ButtonAction::ConnectAndSend, &triggers).expect("room");
        fire(ButtonAction::IdleSleep, &triggers).expect("room");

        assert_eq!(queue.try_pop(), Some(Event::SendCounterUpdate));
        assert_eq!(queue.try_pop(), Some(Event::IdleTimeout));
    }
}
