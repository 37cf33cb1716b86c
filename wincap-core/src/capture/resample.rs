//! Streaming linear-interpolation resampler
//!
//! Operates on interleaved f32 frames. The read position and the last frame
//! of the previous chunk carry over, so consecutive chunks join without
//! clicks or dropped samples.

#[derive(Debug, Clone)]
pub struct LinearResampler {
    channels: usize,
    /// Input frames consumed per output frame
    step: f64,
    /// Read position relative to the current chunk's first frame.
    /// In [-1, 0) the left neighbour is `last`.
    position: f64,
    last: Vec<f32>,
    primed: bool,
}

impl LinearResampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: usize) -> Self {
        Self {
            channels,
            step: input_rate as f64 / output_rate as f64,
            position: 0.0,
            last: vec![0.0; channels],
            primed: false,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.step == 1.0
    }

    /// Resample one chunk of interleaved frames
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let channels = self.channels;
        if channels == 0 {
            return Vec::new();
        }
        let frames = input.len() / channels;
        if frames == 0 {
            return Vec::new();
        }
        if self.is_passthrough() {
            return input[..frames * channels].to_vec();
        }

        if !self.primed {
            self.last.copy_from_slice(&input[..channels]);
            self.primed = true;
        }

        let estimate = ((frames as f64 / self.step).ceil() as usize + 1) * channels;
        let mut output = Vec::with_capacity(estimate);
        let limit = (frames - 1) as f64;

        while self.position < limit {
            let index = self.position.floor();
            let frac = (self.position - index) as f32;
            let index = index as isize;
            for ch in 0..channels {
                let a = if index < 0 {
                    self.last[ch]
                } else {
                    input[index as usize * channels + ch]
                };
                let b = input[(index + 1) as usize * channels + ch];
                output.push(a + (b - a) * frac);
            }
            self.position += self.step;
        }

        self.position -= frames as f64;
        let tail = (frames - 1) * channels;
        self.last.copy_from_slice(&input[tail..tail + channels]);
        output
    }
}
