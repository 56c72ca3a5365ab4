//! Grow-by-chunks builders for primitive arrays. Sparse buffers append values without knowing
//! the final count. Growing a single contiguous array would reallocate quadratically, so values
//! are collected into a list of chunks of bounded size and concatenated once on freeze. The chunk
//! bound keeps the largest single live allocation at roughly one percent of the logical buffer
//! size.

/// Chunks start out this small so that tiny sparse buffers stay tiny.
const INITIAL_CHUNK_LEN: usize = 16;

/// Each new chunk doubles the previous one until [`ChunkedBuilder::max_chunk_len`] is reached.
const GROWTH_FACTOR: usize = 2;

#[derive(Debug)]
pub(crate) struct ChunkedBuilder<T> {
    chunks: Vec<Vec<T>>,
    max_chunk_len: usize,
    len: usize,
}

impl<T: Copy> ChunkedBuilder<T> {
    /// A builder whose chunk size is capped in proportion to the logical size of the buffer the
    /// values are collected for.
    pub fn for_logical_size(logical_size: usize) -> Self {
        let max_chunk_len = (logical_size / 100).max(INITIAL_CHUNK_LEN);
        Self::with_max_chunk_len(max_chunk_len)
    }

    pub fn with_max_chunk_len(max_chunk_len: usize) -> Self {
        debug_assert!(max_chunk_len >= INITIAL_CHUNK_LEN);
        ChunkedBuilder {
            chunks: Vec::new(),
            max_chunk_len,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn push(&mut self, value: T) {
        let needs_chunk = match self.chunks.last() {
            None => true,
            Some(chunk) => chunk.len() == chunk.capacity(),
        };
        if needs_chunk {
            let capacity = match self.chunks.last() {
                None => INITIAL_CHUNK_LEN,
                Some(chunk) => (chunk.capacity() * GROWTH_FACTOR).min(self.max_chunk_len),
            };
            self.chunks.push(Vec::with_capacity(capacity));
        }
        self.chunks.last_mut().unwrap().push(value);
        self.len += 1;
    }

    /// Concatenate all chunks into one contiguous array, releasing the chunk list.
    pub fn into_vec(self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        for chunk in self.chunks {
            out.extend_from_slice(&chunk);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::ChunkedBuilder;

    #[test]
    fn collects_values_in_insertion_order() {
        let mut builder = ChunkedBuilder::with_max_chunk_len(64);
        for value in 0..1000i64 {
            builder.push(value);
        }
        assert_eq!(builder.len(), 1000);
        let values = builder.into_vec();
        assert_eq!(values.len(), 1000);
        assert!(values.iter().enumerate().all(|(i, &v)| v == i as i64));
    }

    #[test]
    fn chunks_never_exceed_the_bound() {
        let mut builder = ChunkedBuilder::with_max_chunk_len(32);
        for value in 0..500i32 {
            builder.push(value);
        }
        assert!(builder.chunks.iter().all(|chunk| chunk.capacity() <= 32));
    }

    #[test]
    fn empty_builder_yields_empty_vec() {
        let builder: ChunkedBuilder<f64> = ChunkedBuilder::for_logical_size(10_000);
        assert_eq!(builder.len(), 0);
        assert!(builder.into_vec().is_empty());
    }
}
