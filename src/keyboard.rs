//! LUMI Keys driver
//!
//! Handles MIDI communication with the keyboard block.

use anyhow::{Context, Result};
use async_trait::async_trait;
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::LumiError;
use crate::midi::{format_hex, MidiMessage};
use crate::sysex::{ensure_seven_bit, parse_hex_string, LumiCommand, SysexHeader};
use crate::transport::{KeyboardEvent, MidiSink};

/// Capacity of the inbound event queue
const EVENT_QUEUE: usize = 1000;

/// Shared handle to the output connection
///
/// Cloned into every animation task; writes are serialized by the lock.
#[derive(Clone, Default)]
pub struct OutputHandle {
    conn: Arc<Mutex<Option<MidiOutputConnection>>>,
}

impl OutputHandle {
    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Send raw MIDI bytes
    pub fn send_bytes(&self, data: &[u8]) -> Result<(), LumiError> {
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| LumiError::TransportWriteFailure("output port not connected".to_string()))?;

        conn.send(data)
            .map_err(|e| LumiError::TransportWriteFailure(e.to_string()))?;

        debug!("Sent raw: {}", format_hex(data));
        Ok(())
    }

    fn replace(&self, conn: Option<MidiOutputConnection>) {
        *self.conn.lock() = conn;
    }
}

#[async_trait]
impl MidiSink for OutputHandle {
    async fn send(&self, message: &MidiMessage) -> Result<(), LumiError> {
        self.send_bytes(&message.encode())
    }
}

/// Keyboard driver for hardware communication
pub struct LumiKeyboard {
    /// MIDI input connection
    input_conn: Option<MidiInputConnection<()>>,

    /// MIDI output connection
    output: OutputHandle,

    /// Event sender for incoming MIDI
    event_tx: mpsc::Sender<KeyboardEvent>,

    /// Event receiver
    event_rx: Option<mpsc::Receiver<KeyboardEvent>>,

    /// Id bytes for framed commands
    header: SysexHeader,

    /// Input port name pattern
    input_port_name: String,

    /// Output port name pattern
    output_port_name: String,
}

impl LumiKeyboard {
    /// Create a new keyboard driver
    pub fn new(config: &AppConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);

        Self {
            input_conn: None,
            output: OutputHandle::default(),
            event_tx,
            event_rx: Some(event_rx),
            header: config.sysex.clone(),
            input_port_name: config.midi.input_pattern().to_string(),
            output_port_name: config.midi.output_pattern().to_string(),
        }
    }

    /// Find a port whose name contains `pattern`, ignoring case
    fn find_port<P>(ports: Vec<P>, name_of: impl Fn(&P) -> Option<String>, pattern: &str) -> Option<(P, String)> {
        let pattern = pattern.to_lowercase();
        ports.into_iter().find_map(|port| {
            let name = name_of(&port)?;
            if name.to_lowercase().contains(&pattern) {
                debug!("Found port '{}' matching pattern '{}'", name, pattern);
                Some((port, name))
            } else {
                None
            }
        })
    }

    /// Connect to the keyboard's MIDI ports
    ///
    /// Both ports are opened before either is kept, so a failure leaves the
    /// driver fully disconnected.
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();

        info!(
            "Connecting to keyboard - Input: '{}', Output: '{}'",
            self.input_port_name, self.output_port_name
        );

        let midi_in = MidiInput::new("LUMI-GW-Input").context("Failed to create MIDI input")?;
        debug!("Found {} MIDI input ports", midi_in.port_count());

        let (in_port, port_name) = Self::find_port(midi_in.ports(), |p| midi_in.port_name(p).ok(), &self.input_port_name)
            .ok_or_else(|| LumiError::DeviceUnavailable(self.input_port_name.clone()))?;

        info!("Connecting to input port: {}", port_name);

        let event_tx = self.event_tx.clone();
        let input_conn = midi_in
            .connect(
                &in_port,
                "LUMI-GW",
                move |_timestamp, data, _| match MidiMessage::parse(data) {
                    // Never block the MIDI thread; a full queue drops the event
                    Some(message) => {
                        let _ = event_tx.try_send(KeyboardEvent::new(message));
                    }
                    None => debug!("Failed to parse MIDI: {}", format_hex(data)),
                },
                (),
            )
            .map_err(|e| anyhow::anyhow!("{}", e))
            .context("Failed to connect to input port")?;

        // An early return from here on drops (and closes) `input_conn`
        let midi_out = MidiOutput::new("LUMI-GW-Output").context("Failed to create MIDI output")?;
        debug!("Found {} MIDI output ports", midi_out.port_count());

        let (out_port, port_name) = Self::find_port(midi_out.ports(), |p| midi_out.port_name(p).ok(), &self.output_port_name)
            .ok_or_else(|| LumiError::DeviceUnavailable(self.output_port_name.clone()))?;

        info!("Connecting to output port: {}", port_name);

        let output_conn = midi_out
            .connect(&out_port, "LUMI-GW")
            .map_err(|e| anyhow::anyhow!("{}", e))
            .context("Failed to connect to output port")?;

        self.input_conn = Some(input_conn);
        self.output.replace(Some(output_conn));

        info!("Keyboard connected");
        Ok(())
    }

    /// Disconnect from MIDI ports
    pub fn disconnect(&mut self) {
        if self.is_connected() {
            info!("Keyboard disconnected");
        }
        self.input_conn = None;
        self.output.replace(None);
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.input_conn.is_some() && self.output.is_open()
    }

    /// Shared output, for animation tasks
    pub fn output(&self) -> OutputHandle {
        self.output.clone()
    }

    /// Take the event receiver (for the router to drain)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<KeyboardEvent>> {
        self.event_rx.take()
    }

    /// Command sender writing to this driver's output
    ///
    /// Presence is checked against the live output port listing.
    pub fn commands(&self) -> CommandSender {
        let pattern = self.output_port_name.to_lowercase();
        CommandSender::new(
            Arc::new(self.output.clone()),
            self.header.clone(),
            self.output_port_name.clone(),
            Arc::new(move || {
                discovery::discover_output_ports()
                    .map(|ports| ports.iter().any(|p| p.name.to_lowercase().contains(&pattern)))
                    .unwrap_or(false)
            }),
        )
    }

    /// Send a MIDI message to the keyboard
    pub async fn send(&self, message: &MidiMessage) -> Result<(), LumiError> {
        self.output.send(message).await
    }

    /// Send a lighting command
    pub async fn send_command(&self, command: LumiCommand) -> Result<(), LumiError> {
        self.commands().send_command(command).await
    }

    /// Send a command typed as hex tokens, see [`CommandSender::send_hex`]
    pub async fn send_hex(&self, text: &str, raw: bool) -> Result<(), LumiError> {
        self.commands().send_hex(text, raw).await
    }
}

/// Reports whether the keyboard is currently attached
pub type PresenceCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Sends sysex commands, framed or raw, to one device
#[derive(Clone)]
pub struct CommandSender {
    sink: Arc<dyn MidiSink>,
    header: SysexHeader,
    device: String,
    present: PresenceCheck,
}

impl CommandSender {
    pub fn new(sink: Arc<dyn MidiSink>, header: SysexHeader, device: String, present: PresenceCheck) -> Self {
        Self { sink, header, device, present }
    }

    /// Fail with `DeviceUnavailable` unless the device is attached
    pub fn ensure_present(&self) -> Result<(), LumiError> {
        if (self.present)() {
            Ok(())
        } else {
            Err(LumiError::DeviceUnavailable(self.device.clone()))
        }
    }

    /// Frame `payload` with the configured header and checksum, then send it
    pub async fn send_payload(&self, payload: &[u8]) -> Result<(), LumiError> {
        let frame = self.header.frame(payload)?;
        self.ensure_present()?;
        info!("[  Sent  ]: '{}'", frame.hex());
        self.sink.send(&frame.into_message()).await
    }

    /// Send a lighting command
    pub async fn send_command(&self, command: LumiCommand) -> Result<(), LumiError> {
        info!("Setting {}", command);
        self.send_payload(&command.payload()).await
    }

    /// Send a command typed as hex tokens
    ///
    /// With `raw` the bytes go out exactly as typed (they must already carry
    /// the id bytes and checksum); otherwise they are framed first. Either
    /// way every byte must fit in 7 bits.
    pub async fn send_hex(&self, text: &str, raw: bool) -> Result<(), LumiError> {
        let bytes = parse_hex_string(text)?;

        if !raw {
            return self.send_payload(&bytes).await;
        }

        ensure_seven_bit(&bytes)?;
        self.ensure_present()?;
        info!("[Sent raw]: '{}'", format_hex(&bytes));
        self.sink.send(&MidiMessage::SysEx { data: bytes }).await
    }
}

/// Port discovery utilities
pub mod discovery {
    use super::*;
    use colored::Colorize;

    /// Information about a MIDI port
    #[derive(Debug, Clone)]
    pub struct PortInfo {
        pub index: usize,
        pub name: String,
    }

    /// Discover input ports
    pub fn discover_input_ports() -> Result<Vec<PortInfo>> {
        let midi_in = MidiInput::new("LUMI-GW-Discovery")?;
        Ok(midi_in
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| midi_in.port_name(port).ok().map(|name| PortInfo { index, name }))
            .collect())
    }

    /// Discover output ports
    pub fn discover_output_ports() -> Result<Vec<PortInfo>> {
        let midi_out = MidiOutput::new("LUMI-GW-Discovery")?;
        Ok(midi_out
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| midi_out.port_name(port).ok().map(|name| PortInfo { index, name }))
            .collect())
    }

    /// Print discovered ports, highlighting the ones matching `device`
    pub fn print_ports(device: &str) {
        let pattern = device.to_lowercase();
        let print = |title: &str, ports: Result<Vec<PortInfo>>| {
            println!("\n{}", format!("=== MIDI {} Ports ===", title).bold().cyan());
            match ports {
                Ok(ports) if ports.is_empty() => println!("  {}", "(none)".dimmed()),
                Ok(ports) => {
                    for port in ports {
                        if port.name.to_lowercase().contains(&pattern) {
                            println!("  {}: {}", port.index, port.name.green());
                        } else {
                            println!("  {}: {}", port.index, port.name);
                        }
                    }
                }
                Err(e) => println!("  {}", e.to_string().red()),
            }
        };

        print("Input", discover_input_ports());
        print("Output", discover_output_ports());
        println!();
    }
}
