use keysynth::{
    midi::MidiEvent,
    new_synth,
    note::Note,
    synth::{VoiceParams, Waveform},
    AudioOutput, KeyEvent, KeyPress, SynthConfig,
};
use midir::{Ignore, MidiInput};
use std::{
    sync::mpsc::{self, Sender},
    time::Duration,
};
use tracing::{error, info, warn};

fn main() {
    tracing_subscriber::fmt::init();

    let mut config = SynthConfig::default();
    config.voice.waveform = Waveform::Pluck;

    let (mut controller, renderer) = match new_synth(&config) {
        Ok(synth) => synth,
        Err(err) => {
            error!("invalid synth configuration: {}", err);
            return;
        }
    };

    // Without a working device the input side keeps running, it just isn't heard.
    let _output = match AudioOutput::open_default(&config, renderer) {
        Ok(output) => {
            info!("Output device: {}", output.device_name());
            Some(output)
        }
        Err(err) => {
            error!("audio output disabled: {}", err);
            None
        }
    };

    let (tx, rx) = mpsc::channel();
    let defaults = *controller.defaults();
    let midi_connection = connect_midi(tx.clone(), defaults);
    if midi_connection.is_none() {
        spawn_arpeggio(tx);
    }

    // Producer loop: drain input events once per update.
    loop {
        match rx.recv_timeout(Duration::from_millis(10)) {
            Ok(event) => {
                controller.handle(event);
                while let Ok(event) = rx.try_recv() {
                    controller.handle(event);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Connects to the first MIDI input port, forwarding note messages as key events.
fn connect_midi(tx: Sender<KeyEvent>, defaults: VoiceParams) -> Option<midir::MidiInputConnection<()>> {
    let mut midi_in = match MidiInput::new("keysynth input") {
        Ok(midi_in) => midi_in,
        Err(err) => {
            warn!("MIDI unavailable: {}", err);
            return None;
        }
    };
    midi_in.ignore(Ignore::ActiveSense);

    let ports = midi_in.ports();
    let Some(port) = ports.first() else {
        info!("No MIDI input ports available.");
        return None;
    };
    if let Ok(name) = midi_in.port_name(port) {
        info!("MIDI input: {}", name);
    }

    let callback = move |_, message: &[u8], _: &mut ()| {
        let event = MidiEvent::from_raw(message);
        if let Some(event) = event.to_key_event(&defaults) {
            tx.send(event).ok();
        }
    };
    match midi_in.connect(port, "keysynth-read-connection", callback, ()) {
        Ok(connection) => Some(connection),
        Err(err) => {
            warn!("failed to connect MIDI input: {}", err);
            None
        }
    }
}

/// Plays a repeating arpeggio when no MIDI device is connected.
fn spawn_arpeggio(tx: Sender<KeyEvent>) {
    std::thread::spawn(move || loop {
        for i in [0, 4, 7, 12, 7, 4] {
            let note = Note::middle_c().transpose(i);
            let key = note.0 as u32;
            if tx.send(KeyEvent::Down(KeyPress::new(key).with_pitch(note))).is_err() {
                return;
            }
            std::thread::sleep(Duration::from_millis(200));
            tx.send(KeyEvent::Up(key)).ok();
            std::thread::sleep(Duration::from_millis(50));
        }
    });
}
