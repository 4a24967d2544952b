use super::{
    envelope::EnvelopePhase,
    frequency::FrequencyTable,
    shared::{ConsumerHandle, VoiceMask},
    voice::Voice,
};
use cpal::{FromSample, SizedSample};

/// Consumer side of the synthesizer, driven by the audio callback.
///
/// Rendering never blocks, allocates or locks. Time is measured by a sample counter, so the output
/// only depends on the events and the sample positions at which they were observed.
pub struct SynthRenderer {
    shared: ConsumerHandle,
    voices: Box<[Voice]>,
    running: VoiceMask,
    released: VoiceMask,
    /// Voices that reached `Finished` during the current block.
    finished: VoiceMask,
    /// Voices named by a pending stop-all request.
    stopping: VoiceMask,
    frequencies: FrequencyTable,
    channels: usize,
    inv_sample_rate: f64,
    counter: u64,
}

impl SynthRenderer {
    pub(super) fn new(shared: ConsumerHandle, frequencies: FrequencyTable, sample_rate: u32, channels: u16) -> Self {
        let voices = shared.voices();
        Self {
            shared,
            voices: vec![Voice::default(); voices].into_boxed_slice(),
            running: VoiceMask::new(voices),
            released: VoiceMask::new(voices),
            finished: VoiceMask::new(voices),
            stopping: VoiceMask::new(voices),
            frequencies,
            channels: channels as usize,
            inv_sample_rate: (sample_rate as f64).recip(),
            counter: 0,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Samples rendered since the engine was created.
    pub fn sample_counter(&self) -> u64 {
        self.counter
    }

    /// Envelope phase of a slot as last seen by the renderer, `None` when idle.
    pub fn voice_phase(&self, slot: usize) -> Option<EnvelopePhase> {
        self.voices.get(slot).and_then(Voice::phase)
    }

    /// Fills an interleaved buffer, writing the same mixed sample to every channel of a frame.
    pub fn render<T>(&mut self, data: &mut [T])
    where
        T: SizedSample + FromSample<f32>,
    {
        self.begin_block();
        for frame in data.chunks_mut(self.channels) {
            let sample = T::from_sample(self.next_sample());
            frame.fill(sample);
        }
        self.end_block();
    }

    /// Handles a pending stop-all, then takes this block's snapshot and starts newly published voices.
    fn begin_block(&mut self) {
        if self.shared.take_stop_requests(&mut self.stopping) {
            // Slots published before the request may not have been picked up yet; reclaim them too.
            for index in self.stopping.iter() {
                self.voices[index].stop();
            }
            self.shared.reclaim(&self.stopping);
        }

        self.shared.snapshot(&mut self.running, &mut self.released);
        for index in self.running.iter() {
            let voice = &mut self.voices[index];
            if voice.is_active() {
                continue;
            }
            if let Some(params) = self.shared.params(index) {
                let frequency = self.frequencies.frequency(params.pitch);
                voice.start(params, frequency, self.counter);
            }
        }
    }

    fn next_sample(&mut self) -> f32 {
        let now = self.counter;
        let mut total = 0.0;
        for index in self.running.iter() {
            let voice = &mut self.voices[index];
            total += voice.process(now, self.inv_sample_rate, self.released.contains(index));
            if voice.is_finished() {
                self.finished.insert(index);
            }
        }
        self.counter += 1;
        total.clamp(-1.0, 1.0)
    }

    /// Returns finished voices to the free pool in a single batched update.
    fn end_block(&mut self) {
        for index in self.finished.iter() {
            self.voices[index].stop();
        }
        self.shared.reclaim(&self.finished);
        self.finished.clear();
    }
}
