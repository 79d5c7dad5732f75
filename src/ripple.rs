//! Ripple lighting animation
//!
//! A key press lights its neighbours in widening symmetric pairs. Each lit
//! key is turned off by its own delayed task, so the animation fades out
//! behind the wave front.
//!
//! Ripples are detached tasks: they always run to completion, never share
//! state, and any number of them may overlap.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RippleConfig;
use crate::error::Result;
use crate::midi::MidiMessage;
use crate::transport::MidiSink;

const MAX_NOTE: i16 = 127;

/// One wave front: the pair of keys lit `shift` keys away from the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RippleStep {
    pub shift: u8,
    pub forward: u8,
    pub backward: u8,
}

/// Steps of a ripple, shifts `1..strength`, notes clamped to 0-127
pub fn ripple_steps(origin: u8, strength: u8) -> impl Iterator<Item = RippleStep> {
    let origin = i16::from(origin);
    (1..strength).map(move |shift| {
        let offset = i16::from(shift);
        RippleStep {
            shift,
            forward: (origin + offset).clamp(0, MAX_NOTE) as u8,
            backward: (origin - offset).clamp(0, MAX_NOTE) as u8,
        }
    })
}

/// Launches ripples on a shared output
#[derive(Clone)]
pub struct RippleScheduler {
    sink: Arc<dyn MidiSink>,
    channel: u8,
    strength: u8,
    velocity: u8,
    step_delay: Duration,
    off_delay: Duration,
}

impl RippleScheduler {
    pub fn new(sink: Arc<dyn MidiSink>, config: &RippleConfig, channel: u8) -> Self {
        Self {
            sink,
            channel,
            strength: config.strength,
            velocity: config.velocity,
            step_delay: config.step_delay(),
            off_delay: config.off_delay(),
        }
    }

    /// Start a ripple around `origin` without waiting for it
    ///
    /// Write failures end the ripple early and are logged; they never reach
    /// the caller.
    pub fn trigger(&self, origin: u8) -> JoinHandle<()> {
        let ripple = self.clone();
        tokio::spawn(async move {
            if let Err(e) = ripple.run(origin).await {
                warn!("Ripple from note {} stopped: {}", origin, e);
            }
        })
    }

    /// Drive a ripple to completion
    pub async fn run(&self, origin: u8) -> Result<()> {
        debug!("Ripple from note {}", origin);

        for step in ripple_steps(origin, self.strength) {
            let forward = self.note_on(step.forward);
            let backward = self.note_on(step.backward);
            tokio::try_join!(self.sink.send(&forward), self.sink.send(&backward))?;

            self.schedule_off(step.forward);
            self.schedule_off(step.backward);

            sleep(self.step_delay).await;
        }

        Ok(())
    }

    fn note_on(&self, note: u8) -> MidiMessage {
        MidiMessage::NoteOn { channel: self.channel, note, velocity: self.velocity }
    }

    /// Turn `note` off after the configured delay, in its own task
    fn schedule_off(&self, note: u8) {
        let sink = Arc::clone(&self.sink);
        let off = MidiMessage::NoteOff { channel: self.channel, note, velocity: 0 };
        let delay = self.off_delay;

        tokio::spawn(async move {
            sleep(delay).await;
            if let Err(e) = sink.send(&off).await {
                warn!("Failed to release note {}: {}", note, e);
            }
        });
    }
}
