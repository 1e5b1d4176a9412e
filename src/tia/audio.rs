//! TIA audio: two channels of pulse/noise generators clocked twice per
//! scanline, mixed through a volume table and resampled to the host rate
//! into `AudioQueue` fragments.

use std::sync::Arc;

use crate::audio_queue::{AudioQueue, Fragment};
use crate::error::{CoreError, StateError};
use crate::serializer::Serializer;

const PHASE0_A: u32 = 9;
const PHASE0_B: u32 = 81;
const PHASE1_A: u32 = 37;
const PHASE1_B: u32 = 149;
const LINE_CLOCKS: u32 = 228;

const R_MAX: f64 = 30.0;

fn mixing_level(v: u32, vmax: u32) -> i16 {
    let (v, vmax) = (v as f64, vmax as f64);
    (0x7fff as f64 * v / vmax * (R_MAX + vmax) / (R_MAX + v)).floor() as i16
}

/// Output amplitude for the sum of both channel volumes (0..=30).
pub fn mixed_amplitude(sample0: u8, sample1: u8) -> i16 {
    mixing_level((sample0 + sample1) as u32, 0x1e)
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AudioChannel {
    audc: u8,
    audv: u8,
    audf: u8,

    clock_enable: bool,
    noise_feedback: bool,
    noise_counter_bit4: bool,
    pulse_counter_hold: bool,

    div_counter: u8,
    pulse_counter: u8,
    noise_counter: u8,
}

impl AudioChannel {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn audc(&mut self, value: u8) {
        self.audc = value & 0x0F;
    }

    #[inline]
    pub fn audv(&mut self, value: u8) {
        self.audv = value & 0x0F;
    }

    #[inline]
    pub fn audf(&mut self, value: u8) {
        self.audf = value & 0x1F;
    }

    /// First half of the audio clock: frequency divider and noise feedback.
    pub fn phase0(&mut self) {
        if self.clock_enable {
            self.noise_counter_bit4 = self.noise_counter & 0x01 != 0;

            self.pulse_counter_hold = match self.audc & 0x03 {
                0x02 => self.noise_counter & 0x1E != 0x02,
                0x03 => !self.noise_counter_bit4,
                _ => false,
            };

            self.noise_feedback = if self.audc & 0x03 == 0 {
                (self.pulse_counter ^ self.noise_counter) & 0x01 != 0
                    || !(self.noise_counter != 0 || self.pulse_counter != 0x0A)
                    || self.audc & 0x0C == 0
            } else {
                ((self.noise_counter & 0x04 != 0) ^ (self.noise_counter & 0x01 != 0))
                    || self.noise_counter == 0
            };
        }

        self.clock_enable = self.div_counter == self.audf;
        if self.div_counter == self.audf || self.div_counter == 0x1F {
            self.div_counter = 0;
        } else {
            self.div_counter += 1;
        }
    }

    /// Second half: shift the counters, returns the channel's output level.
    pub fn phase1(&mut self) -> u8 {
        if self.clock_enable {
            let pulse_feedback = match self.audc >> 2 {
                0x00 => {
                    ((self.pulse_counter & 0x02 != 0) ^ (self.pulse_counter & 0x01 != 0))
                        && self.pulse_counter != 0x0A
                        && self.audc & 0x03 != 0
                }
                0x01 => self.pulse_counter & 0x08 == 0,
                0x02 => !self.noise_counter_bit4,
                _ => !(self.pulse_counter & 0x02 != 0 || self.pulse_counter & 0x0E == 0),
            };

            self.noise_counter >>= 1;
            if self.noise_feedback {
                self.noise_counter |= 0x10;
            }

            if !self.pulse_counter_hold {
                self.pulse_counter = !(self.pulse_counter >> 1) & 0x07;
                if pulse_feedback {
                    self.pulse_counter |= 0x08;
                }
            }
        }

        (self.pulse_counter & 0x01) * self.audv
    }

    pub fn registers(&self) -> (u8, u8, u8) {
        (self.audc, self.audf, self.audv)
    }

    fn save_state(&self, out: &mut Serializer) {
        out.put_byte(self.audc);
        out.put_byte(self.audv);
        out.put_byte(self.audf);
        out.put_bool(self.clock_enable);
        out.put_bool(self.noise_feedback);
        out.put_bool(self.noise_counter_bit4);
        out.put_bool(self.pulse_counter_hold);
        out.put_byte(self.div_counter);
        out.put_byte(self.pulse_counter);
        out.put_byte(self.noise_counter);
    }

    fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        self.audc(input.get_byte()?);
        self.audv(input.get_byte()?);
        self.audf(input.get_byte()?);
        self.clock_enable = input.get_bool()?;
        self.noise_feedback = input.get_bool()?;
        self.noise_counter_bit4 = input.get_bool()?;
        self.pulse_counter_hold = input.get_bool()?;
        self.div_counter = input.get_byte()?;
        self.pulse_counter = input.get_byte()?;
        self.noise_counter = input.get_byte()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mixer and output
// ---------------------------------------------------------------------------

pub struct Audio {
    pub channel0: AudioChannel,
    pub channel1: AudioChannel,
    counter: u32,

    mix_sum: [i16; 31],
    mix_individual: [i16; 16],

    native_rate: u32,
    queue: Option<Arc<AudioQueue>>,
    fragment: Option<Fragment>,
    sample_index: usize,
    resample_acc: u32,
}

impl Audio {
    pub fn new(native_rate: u32) -> Self {
        let mut mix_sum = [0i16; 31];
        for (v, slot) in mix_sum.iter_mut().enumerate() {
            *slot = mixing_level(v as u32, 0x1e);
        }
        let mut mix_individual = [0i16; 16];
        for (v, slot) in mix_individual.iter_mut().enumerate() {
            *slot = mixing_level(v as u32, 0x0f);
        }

        Self {
            channel0: AudioChannel::default(),
            channel1: AudioChannel::default(),
            counter: 0,
            mix_sum,
            mix_individual,
            native_rate,
            queue: None,
            fragment: None,
            sample_index: 0,
            resample_acc: 0,
        }
    }

    pub fn reset(&mut self) {
        self.counter = 0;
        self.sample_index = 0;
        self.resample_acc = 0;
        self.channel0.reset();
        self.channel1.reset();
        if let Some(fragment) = self.fragment.as_mut() {
            fragment.fill(0);
        }
    }

    /// Route output into `queue`, claiming its producer bootstrap fragment.
    /// `None` detaches the current queue.
    pub fn set_queue(&mut self, queue: Option<Arc<AudioQueue>>) -> Result<(), CoreError> {
        self.fragment = match queue.as_ref() {
            Some(q) => Some(q.enqueue(None)?),
            None => None,
        };
        self.queue = queue;
        self.sample_index = 0;
        self.resample_acc = 0;
        Ok(())
    }

    pub fn queue(&self) -> Option<&Arc<AudioQueue>> {
        self.queue.as_ref()
    }

    #[inline]
    pub fn mix_sum(&self, volume: u8) -> i16 {
        self.mix_sum[volume as usize % self.mix_sum.len()]
    }

    /// One color clock.
    pub fn tick(&mut self) {
        match self.counter {
            PHASE0_A | PHASE0_B => {
                self.channel0.phase0();
                self.channel1.phase0();
            }
            PHASE1_A | PHASE1_B => {
                let s0 = self.channel0.phase1();
                let s1 = self.channel1.phase1();
                self.add_sample(s0, s1);
            }
            _ => {}
        }

        self.counter += 1;
        if self.counter == LINE_CLOCKS {
            self.counter = 0;
        }
    }

    fn add_sample(&mut self, s0: u8, s1: u8) {
        let Some(queue) = self.queue.as_ref() else {
            return;
        };

        self.resample_acc += queue.sample_rate();
        while self.resample_acc >= self.native_rate {
            self.resample_acc -= self.native_rate;

            let Some(fragment) = self.fragment.as_mut() else {
                return;
            };
            if queue.is_stereo() {
                fragment[2 * self.sample_index] = self.mix_individual[s0 as usize];
                fragment[2 * self.sample_index + 1] = self.mix_individual[s1 as usize];
            } else {
                fragment[self.sample_index] = self.mix_sum[(s0 + s1) as usize];
            }

            self.sample_index += 1;
            if self.sample_index == queue.fragment_size() {
                self.sample_index = 0;
                let full = self.fragment.take();
                match queue.enqueue(full) {
                    Ok(next) => self.fragment = Some(next),
                    Err(e) => {
                        log::error!("audio fragment rejected: {e}");
                        return;
                    }
                }
            }
        }
    }

    pub fn save_state(&self, out: &mut Serializer) -> Result<(), StateError> {
        self.channel0.save_state(out);
        self.channel1.save_state(out);
        out.put_int(self.counter);
        out.put_int(self.resample_acc);
        Ok(())
    }

    pub fn load_state(&mut self, input: &mut Serializer) -> Result<(), StateError> {
        self.channel0.load_state(input)?;
        self.channel1.load_state(input)?;
        self.counter = input.get_int()? % LINE_CLOCKS;
        self.resample_acc = input.get_int()? % self.native_rate.max(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_queue::Dequeued;

    #[test]
    fn mixing_tables_are_monotonic() {
        let audio = Audio::new(31_400);
        assert_eq!(audio.mix_sum[0], 0);
        assert_eq!(audio.mix_sum[30], 0x7fff);
        assert_eq!(audio.mix_individual[15], 0x7fff);
        assert!(audio.mix_sum.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(mixed_amplitude(15, 0), audio.mix_sum[15]);
    }

    #[test]
    fn constant_volume_with_pure_tone_register() {
        // With AUDC 0 the pulse counter settles on an odd value.
        let mut ch = AudioChannel::default();
        ch.audv(0x0F);
        let levels: Vec<u8> = (0..8)
            .map(|_| {
                ch.phase0();
                ch.phase1()
            })
            .collect();
        assert!(levels[2..].iter().all(|&l| l == 15));
    }

    #[test]
    fn native_rate_fills_one_sample_per_phase1() {
        let queue = Arc::new(AudioQueue::new(4, 2, false, 31_400).expect("queue"));
        let mut audio = Audio::new(31_400);
        audio.set_queue(Some(queue.clone())).expect("bootstrap");

        // Two phase-1 points per line, so two lines fill one fragment.
        for _ in 0..(2 * LINE_CLOCKS) {
            audio.tick();
        }
        assert_eq!(queue.size(), 1);
        match queue.dequeue(None).expect("dequeue") {
            Dequeued::Fragment(f) => assert_eq!(f, vec![0; 4]),
            Dequeued::Empty(_) => panic!("fragment expected"),
        }
    }

    #[test]
    fn upsampling_emits_more_samples() {
        let queue = Arc::new(AudioQueue::new(8, 4, true, 62_800).expect("queue"));
        let mut audio = Audio::new(31_400);
        audio.set_queue(Some(queue.clone())).expect("bootstrap");
        for _ in 0..(2 * LINE_CLOCKS) {
            audio.tick();
        }
        assert_eq!(queue.size(), 1);
    }
}
