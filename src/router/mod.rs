//! Event router
//!
//! A single polling loop drains the keyboard's pending messages and the
//! remote trigger queue, dispatches each one, then sleeps for the poll
//! interval. Dispatching only ever spawns work, so a slow animation or a slow
//! write never holds up the next poll.

pub mod actions;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::midi::{KeyState, MidiMessage};
use crate::ripple::RippleScheduler;
use crate::sysex::{parse_frame, Inbound, SysexHeader};
use crate::transport::{KeyboardEvent, MidiSink, MidiSource};

pub use actions::{
    default_actions, note_color_name, Action, ActionResolver, EventSource, RemoteEvent,
    RemoteTrigger,
};

/// What the router did with one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// A ripple was started around the note
    Ripple { note: u8 },
    /// The key was lit
    Lit { note: u8 },
    /// The key was turned off
    Unlit { note: u8 },
    /// A release, logged only
    Released { note: u8 },
    /// Inbound sysex, classified for diagnostics
    Sysex(Inbound),
    /// Nothing to do
    Ignored,
}

/// Routes keyboard and remote events to lighting actions
pub struct EventRouter {
    sink: Arc<dyn MidiSink>,
    ripples: RippleScheduler,
    header: SysexHeader,
    resolver: ActionResolver,
    channel: u8,
    play_velocity: u8,
    poll_interval: Duration,
}

impl EventRouter {
    /// Create a router writing to `sink`, with the default action table
    pub fn new(config: &AppConfig, sink: Arc<dyn MidiSink>) -> Self {
        Self {
            ripples: RippleScheduler::new(Arc::clone(&sink), &config.ripple, config.midi.channel),
            sink,
            header: config.sysex.clone(),
            resolver: default_actions,
            channel: config.midi.channel,
            play_velocity: config.router.play_velocity,
            poll_interval: config.router.poll_interval(),
        }
    }

    /// Replace the action table
    pub fn with_resolver(mut self, resolver: ActionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Handle one message from the keyboard
    pub fn handle_event(&self, event: &KeyboardEvent) -> Routed {
        match &event.message {
            MidiMessage::SysEx { data } => Routed::Sysex(parse_frame(&self.header, data)),
            message => match message.key_state() {
                Some(KeyState::Pressed { note, velocity }) => {
                    debug!("Received note_on: Note {}, Velocity {}", note, velocity);
                    self.resolve(EventSource::User, true, note)
                }
                Some(KeyState::Released { note }) => {
                    debug!("Received note_off: Note {}", note);
                    self.resolve(EventSource::User, false, note)
                }
                None => {
                    debug!("Ignoring {}", message);
                    Routed::Ignored
                }
            },
        }
    }

    /// Handle one validated remote notification
    pub fn handle_remote(&self, trigger: &RemoteTrigger) -> Routed {
        self.resolve(trigger.source, trigger.active, trigger.note)
    }

    fn resolve(&self, source: EventSource, active: bool, note: u8) -> Routed {
        match (self.resolver)(source, active) {
            Some(action) => self.dispatch(action, note),
            None => Routed::Ignored,
        }
    }

    /// Carry out `action` for `note` without waiting on the output
    pub fn dispatch(&self, action: Action, note: u8) -> Routed {
        info!("{}: {}", action, note_color_name(note));

        match action {
            Action::Pressed => {
                self.ripples.trigger(note);
                Routed::Ripple { note }
            }
            Action::Released => Routed::Released { note },
            Action::Play => {
                self.spawn_send(MidiMessage::NoteOn {
                    channel: self.channel,
                    note,
                    velocity: self.play_velocity,
                });
                Routed::Lit { note }
            }
            Action::Stop => {
                self.spawn_send(MidiMessage::NoteOff { channel: self.channel, note, velocity: 0 });
                Routed::Unlit { note }
            }
        }
    }

    fn spawn_send(&self, message: MidiMessage) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(e) = sink.send(&message).await {
                warn!("Failed to send {}: {}", message, e);
            }
        });
    }

    /// Drain and dispatch everything pending; returns the number of events handled
    pub fn poll_once<S: MidiSource>(
        &self,
        source: &mut S,
        remote: &mut mpsc::Receiver<RemoteTrigger>,
    ) -> usize {
        let events = source.drain_pending();
        let mut handled = events.len();
        for event in &events {
            self.handle_event(event);
        }

        while let Ok(trigger) = remote.try_recv() {
            self.handle_remote(&trigger);
            handled += 1;
        }

        handled
    }

    /// Poll until `shutdown` completes
    pub async fn run<S: MidiSource>(
        &self,
        mut source: S,
        mut remote: mpsc::Receiver<RemoteTrigger>,
        shutdown: impl Future<Output = ()>,
    ) {
        info!("Listening for MIDI input (poll every {:?})", self.poll_interval);
        tokio::pin!(shutdown);

        loop {
            self.poll_once(&mut source, &mut remote);

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Router stopped");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
