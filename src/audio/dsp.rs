//! Small sample-level helpers shared by capture and playback

/// Root-mean-square amplitude of a block; 0.0 for an empty block
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Average interleaved channels into mono
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() || from_rate == 0 || to_rate == 0 {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((input.len() as f64) / ratio).round() as usize;
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx.floor() as usize;
        let frac = (src_idx - idx0 as f64) as f32;
        let s0 = input.get(idx0).copied().unwrap_or(0.0);
        let s1 = input.get(idx0 + 1).copied().unwrap_or(s0);
        output.push(s0 + frac * (s1 - s0));
    }
    output
}

/// Linear resampler for a continuous stream delivered in chunks
///
/// Output sample `n` always sits at source position `n * from / to`, so
/// chunk boundaries introduce neither drift nor phase jumps. The last
/// input sample is kept to interpolate across the next boundary.
#[derive(Debug)]
pub struct StreamResampler {
    from_rate: u32,
    to_rate: u32,
    ratio: f64,
    consumed: u64,
    produced: u64,
    last: f32,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            from_rate,
            to_rate,
            ratio: from_rate as f64 / to_rate.max(1) as f64,
            consumed: 0,
            produced: 0,
            last: 0.0,
        }
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.from_rate == self.to_rate || self.from_rate == 0 || self.to_rate == 0 {
            return input.to_vec();
        }

        let available = input.len() as f64;
        let mut output = Vec::with_capacity((available / self.ratio) as usize + 1);
        loop {
            // Position relative to input[0]; -1 refers to the previous chunk's last sample
            let src = self.produced as f64 * self.ratio - self.consumed as f64;
            let idx0 = src.floor();
            if idx0 + 1.0 >= available {
                break;
            }
            let frac = (src - idx0) as f32;
            let s0 = if idx0 < 0.0 { self.last } else { input[idx0 as usize] };
            let s1 = input[(idx0 + 1.0) as usize];
            output.push(s0 + frac * (s1 - s0));
            self.produced += 1;
        }

        if let Some(&last) = input.last() {
            self.last = last;
        }
        self.consumed += input.len() as u64;
        output
    }
}

/// Accumulates arbitrary-length sample runs into fixed-size frames
#[derive(Debug)]
pub struct Reframer {
    frame_size: usize,
    pending: Vec<f32>,
}

impl Reframer {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size: frame_size.max(1),
            pending: Vec::with_capacity(frame_size * 2),
        }
    }

    /// Append samples and return every frame that is now complete
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.pending.extend_from_slice(samples);
        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_size {
            frames.push(self.pending.drain(..self.frame_size).collect());
        }
        frames
    }

    /// Samples waiting for a complete frame
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
