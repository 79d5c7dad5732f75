//! Tests for the event router

use super::*;
use crate::transport::testing::RecordingSink;
use tokio::time::{sleep, Instant};

fn make_router(sink: Arc<RecordingSink>) -> EventRouter {
    EventRouter::new(&AppConfig::default(), sink)
}

fn note_on(note: u8, velocity: u8) -> KeyboardEvent {
    KeyboardEvent::new(MidiMessage::NoteOn { channel: 0, note, velocity })
}

fn lit_notes(sink: &RecordingSink) -> Vec<u8> {
    sink.messages()
        .iter()
        .filter_map(|m| match *m {
            MidiMessage::NoteOn { note, .. } => Some(note),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_note_on_starts_ripple() {
    let sink = Arc::new(RecordingSink::new());
    let router = make_router(sink.clone());

    assert_eq!(router.handle_event(&note_on(60, 100)), Routed::Ripple { note: 60 });

    sleep(Duration::from_secs(1)).await;
    let messages = sink.messages();
    assert_eq!(messages.len(), 36);
    assert!(!lit_notes(&sink).contains(&60));
}

#[tokio::test(start_paused = true)]
async fn test_releases_are_logged_only() {
    let sink = Arc::new(RecordingSink::new());
    let router = make_router(sink.clone());

    assert_eq!(router.handle_event(&note_on(60, 0)), Routed::Released { note: 60 });
    let off = KeyboardEvent::new(MidiMessage::NoteOff { channel: 0, note: 61, velocity: 64 });
    assert_eq!(router.handle_event(&off), Routed::Released { note: 61 });

    sleep(Duration::from_secs(1)).await;
    assert!(sink.messages().is_empty());
}

#[tokio::test]
async fn test_sysex_is_classified_only() {
    let sink = Arc::new(RecordingSink::new());
    let router = make_router(sink.clone());

    let heartbeat = KeyboardEvent::new(MidiMessage::SysEx { data: crate::sysex::HEARTBEAT.to_vec() });
    assert_eq!(router.handle_event(&heartbeat), Routed::Sysex(Inbound::Heartbeat));

    let reply = KeyboardEvent::new(MidiMessage::SysEx { data: vec![0x00, 0x21, 0x10, 0x77, 0x66, 0x01, 0x05] });
    assert!(matches!(router.handle_event(&reply), Routed::Sysex(Inbound::Reply(_))));

    tokio::task::yield_now().await;
    assert!(sink.messages().is_empty());
}

#[tokio::test]
async fn test_other_messages_ignored() {
    let router = make_router(Arc::new(RecordingSink::new()));

    let cc = KeyboardEvent::new(MidiMessage::ControlChange { channel: 0, cc: 1, value: 64 });
    assert_eq!(router.handle_event(&cc), Routed::Ignored);

    let clock = KeyboardEvent::new(MidiMessage::Other { data: vec![0xF8] });
    assert_eq!(router.handle_event(&clock), Routed::Ignored);
}

#[tokio::test(start_paused = true)]
async fn test_remote_play_and_stop_light_the_key() {
    let sink = Arc::new(RecordingSink::new());
    let router = make_router(sink.clone());

    let play = RemoteTrigger { source: EventSource::File, active: true, note: 64 };
    assert_eq!(router.handle_remote(&play), Routed::Lit { note: 64 });
    sleep(Duration::from_millis(10)).await;

    let stop = RemoteTrigger { source: EventSource::File, active: false, note: 64 };
    assert_eq!(router.handle_remote(&stop), Routed::Unlit { note: 64 });
    sleep(Duration::from_millis(10)).await;

    assert_eq!(
        sink.messages(),
        vec![
            MidiMessage::NoteOn { channel: 0, note: 64, velocity: 127 },
            MidiMessage::NoteOff { channel: 0, note: 64, velocity: 0 },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_remote_user_press_ripples() {
    let sink = Arc::new(RecordingSink::new());
    let router = make_router(sink.clone());

    let press = RemoteTrigger { source: EventSource::User, active: true, note: 40 };
    assert_eq!(router.handle_remote(&press), Routed::Ripple { note: 40 });

    sleep(Duration::from_secs(1)).await;
    assert_eq!(lit_notes(&sink).len(), 18);
}

#[tokio::test(start_paused = true)]
async fn test_custom_resolver() {
    fn everything_ripples(_: EventSource, active: bool) -> Option<Action> {
        active.then_some(Action::Pressed)
    }

    let sink = Arc::new(RecordingSink::new());
    let router = make_router(sink.clone()).with_resolver(everything_ripples);

    let play = RemoteTrigger { source: EventSource::File, active: true, note: 64 };
    assert_eq!(router.handle_remote(&play), Routed::Ripple { note: 64 });

    let stop = RemoteTrigger { source: EventSource::File, active: false, note: 64 };
    assert_eq!(router.handle_remote(&stop), Routed::Ignored);
}

#[tokio::test(start_paused = true)]
async fn test_poll_once_drains_both_queues() {
    let router = make_router(Arc::new(RecordingSink::new()));
    let (event_tx, mut events) = mpsc::channel(8);
    let (remote_tx, mut remote) = mpsc::channel(8);

    event_tx.try_send(note_on(60, 90)).unwrap();
    event_tx.try_send(note_on(60, 0)).unwrap();
    remote_tx
        .try_send(RemoteTrigger { source: EventSource::File, active: true, note: 70 })
        .unwrap();

    assert_eq!(router.poll_once(&mut events, &mut remote), 3);
    assert_eq!(router.poll_once(&mut events, &mut remote), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_until_shutdown() {
    let sink = Arc::new(RecordingSink::new());
    let router = make_router(sink.clone());
    let (event_tx, events) = mpsc::channel(8);
    let (_remote_tx, remote) = mpsc::channel(8);

    let feeder = tokio::spawn(async move {
        sleep(Duration::from_millis(100)).await;
        event_tx.send(note_on(60, 90)).await.unwrap();
    });

    router.run(events, remote, sleep(Duration::from_millis(300))).await;
    feeder.await.unwrap();
    sleep(Duration::from_secs(1)).await;

    // The ripple started inside the loop outlives it
    assert_eq!(lit_notes(&sink).len(), 18);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_ripples_progress_independently() {
    // Writes for keys around 35 take a second each
    let sink = Arc::new(RecordingSink::slow_for(30..=40, Duration::from_secs(1)));
    let router = make_router(sink.clone());
    let (event_tx, mut events) = mpsc::channel(8);
    let (_remote_tx, mut remote) = mpsc::channel(8);

    let start = Instant::now();
    event_tx.try_send(note_on(35, 90)).unwrap();
    event_tx.try_send(note_on(100, 90)).unwrap();
    assert_eq!(router.poll_once(&mut events, &mut remote), 2);

    sleep(Duration::from_secs(20)).await;

    let timed = sink.timed();
    let fast: Vec<_> = timed
        .iter()
        .filter(|(_, m)| matches!(*m, MidiMessage::NoteOn { note, .. } if note > 90))
        .map(|(at, _)| *at - start)
        .collect();
    assert_eq!(fast.len(), 18);
    assert!(fast.iter().all(|&elapsed| elapsed <= Duration::from_millis(400)));

    let slow_first = timed
        .iter()
        .filter(|(_, m)| matches!(*m, MidiMessage::NoteOn { note, .. } if note < 50))
        .map(|(at, _)| *at - start)
        .min()
        .unwrap();
    assert!(slow_first >= Duration::from_secs(1));
    assert_eq!(lit_notes(&sink).iter().filter(|&&n| n < 50).count(), 18);
}
