use crossbeam_channel::{SendError, unbounded};
use tracing::Span;

pub mod monitor_poller;
pub mod mouse;
pub mod reactor;

pub struct Sender<Event>(crossbeam_channel::Sender<(Span, Event)>);
pub type Receiver<Event> = crossbeam_channel::Receiver<(Span, Event)>;

pub fn channel<Event>() -> (Sender<Event>, Receiver<Event>) {
    let (tx, rx) = unbounded();
    (Sender(tx), rx)
}

impl<Event> Sender<Event> {
    pub fn send(&self, event: Event) {
        // Send errors only mean the reactor is shutting down.
        _ = self.try_send(event)
    }

    pub fn try_send(&self, event: Event) -> Result<(), SendError<(Span, Event)>> {
        self.0.send((Span::current(), event))
    }
}

impl<Event> Clone for Sender<Event> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}
