//! Fixed-size re-chunking of planar audio
//!
//! The MP3 encoder demands exactly `frame_size` samples per frame (1152)
//! except for the last one, while the filter graph emits frames of whatever
//! size the resampler produced. Samples are buffered per plane and handed out
//! in whole chunks; the remainder is carried across calls and released as a
//! final short chunk on [`PlanarChunker::take_remainder`].

/// Per-plane sample buffer that emits fixed-size chunks
#[derive(Debug, Clone)]
pub struct PlanarChunker {
    planes: Vec<Vec<u8>>,
    bytes_per_sample: usize,
    chunk_samples: usize,
}

impl PlanarChunker {
    /// `planes` is the channel count for planar formats.
    pub fn new(planes: usize, bytes_per_sample: usize, chunk_samples: usize) -> Self {
        Self {
            planes: vec![Vec::new(); planes.max(1)],
            bytes_per_sample: bytes_per_sample.max(1),
            chunk_samples: chunk_samples.max(1),
        }
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Samples per plane currently buffered
    pub fn buffered_samples(&self) -> usize {
        self.planes[0].len() / self.bytes_per_sample
    }

    /// Append one frame's worth of planes. Each slice holds at least
    /// `samples * bytes_per_sample` bytes; anything past that is padding.
    pub fn push(&mut self, planes: &[&[u8]], samples: usize) {
        let len = samples * self.bytes_per_sample;
        for (buf, data) in self.planes.iter_mut().zip(planes) {
            buf.extend_from_slice(&data[..len.min(data.len())]);
        }
    }

    /// Remove one full chunk, if enough samples are buffered
    pub fn pop_chunk(&mut self) -> Option<Vec<Vec<u8>>> {
        if self.buffered_samples() < self.chunk_samples {
            return None;
        }
        Some(self.split_front(self.chunk_samples))
    }

    /// Remove whatever is left, shorter than a full chunk. `None` when empty.
    pub fn take_remainder(&mut self) -> Option<Vec<Vec<u8>>> {
        let samples = self.buffered_samples();
        if samples == 0 {
            return None;
        }
        Some(self.split_front(samples))
    }

    fn split_front(&mut self, samples: usize) -> Vec<Vec<u8>> {
        let len = samples * self.bytes_per_sample;
        self.planes
            .iter_mut()
            .map(|buf| buf.drain(..len).collect())
            .collect()
    }
}
