//! Per-stream DATA chunk reassembly.
//!
//! Each inbound stream owns one `Reassembler`. Chunks arrive out of TSN
//! order (DTLS preserves datagram boundaries but not fragment order across
//! packets); the reassembler buffers them by TSN and only emits a message
//! once a FIRST_FRAG..LAST_FRAG run is contiguous.

use super::chunk::DataChunk;

/// Buffers out-of-order DATA chunks for one stream and yields complete,
/// ordered user messages.
#[derive(Debug, Default)]
pub struct Reassembler {
    /// Pending chunks, kept sorted ascending by TSN (modular).
    pending: Vec<DataChunk>,
    /// The `stream_seq` of the next message expected to be emitted.
    expected_stream_seq: u16,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            expected_stream_seq: 0,
        }
    }

    /// Insert a chunk, dropping it if its TSN is already buffered.
    /// Otherwise inserts it in TSN order (modular, via `tsn_gt`).
    pub fn insert(&mut self, chunk: DataChunk) {
        if self.pending.iter().any(|c| c.tsn == chunk.tsn) {
            return;
        }
        let pos = self
            .pending
            .iter()
            .position(|c| super::association::tsn_gt(c.tsn, chunk.tsn))
            .unwrap_or(self.pending.len());
        self.pending.insert(pos, chunk);
    }

    /// Drain as many complete messages as the buffer currently allows.
    /// Returns `(ppid, user_data)` pairs in delivery order.
    pub fn drain(&mut self) -> Vec<(u32, Vec<u8>)> {
        let mut out = Vec::new();

        loop {
            let Some(head) = self.pending.first() else {
                break;
            };
            if head.stream_seq != self.expected_stream_seq {
                break;
            }
            if !head.beginning {
                break;
            }

            let mut accumulated = Vec::new();
            let mut consumed = 0usize;
            let mut last_tsn = None;
            let mut completed = false;
            let mut ppid = 0u32;

            for chunk in &self.pending {
                if chunk.stream_seq != self.expected_stream_seq {
                    break;
                }
                if let Some(prev) = last_tsn
                    && chunk.tsn != prev.wrapping_add(1)
                {
                    break;
                }
                accumulated.extend_from_slice(&chunk.data);
                ppid = chunk.ppid;
                last_tsn = Some(chunk.tsn);
                consumed += 1;
                if chunk.ending {
                    completed = true;
                    break;
                }
            }

            if !completed {
                break;
            }

            self.pending.drain(0..consumed);
            self.expected_stream_seq = self.expected_stream_seq.wrapping_add(1);
            out.push((ppid, accumulated));
        }

        out
    }
}
