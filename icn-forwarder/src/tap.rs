use icn_core::Message;

/// Observation points of the message processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapEvent {
    Receive,
    Send,
    Drop,
}

/// Passive observer of messages flowing through the processor.
///
/// A tap never influences forwarding. At most one tap is installed on a
/// processor at a time.
pub trait Tap: Send {
    fn is_tap_on_receive(&self) -> bool {
        true
    }

    fn is_tap_on_send(&self) -> bool {
        true
    }

    fn is_tap_on_drop(&self) -> bool {
        true
    }

    fn on_receive(&mut self, _message: &Message) {}

    fn on_send(&mut self, _message: &Message) {}

    fn on_drop(&mut self, _message: &Message) {}
}

pub(crate) fn notify(tap: &mut Option<Box<dyn Tap>>, event: TapEvent, message: &Message) {
    let Some(tap) = tap.as_mut() else {
        return;
    };
    match event {
        TapEvent::Receive if tap.is_tap_on_receive() => tap.on_receive(message),
        TapEvent::Send if tap.is_tap_on_send() => tap.on_send(message),
        TapEvent::Drop if tap.is_tap_on_drop() => tap.on_drop(message),
        _ => {}
    }
}
