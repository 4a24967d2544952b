pub mod config;
pub mod midi;
pub mod note;
pub mod output;
pub mod synth;
mod util;

pub use config::{ConfigError, SampleFormat, SynthConfig};
pub use output::{AudioOutput, OutputError};
pub use synth::{new_synth, KeyEvent, KeyPress, NoteOn, SynthController, SynthRenderer};
