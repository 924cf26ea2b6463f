use std::mem;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

pub const SENTENCE_CAPACITY: usize = 128;

const LINE_FEED: u8 = b'\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferHalf {
    A,
    B,
}

// One receive buffer. Exactly two exist per pair and ownership moves between
// the producer (filling) and the consumer (parsing), never both at once.
#[derive(Debug)]
pub struct SentenceBuffer {
    half: BufferHalf,
    bytes: [u8; SENTENCE_CAPACITY],
    len: usize,
}

impl SentenceBuffer {
    fn new(half: BufferHalf) -> Self {
        Self {
            half,
            bytes: [0; SENTENCE_CAPACITY],
            len: 0,
        }
    }

    pub fn half(&self) -> BufferHalf {
        self.half
    }

    // The captured line, '$' through LF.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    fn clear(&mut self) {
        self.bytes = [0; SENTENCE_CAPACITY];
        self.len = 0;
    }
}

// Sentence-boundary notification. `Dropped` means a line terminator was seen
// but no full line could be handed over (overflow, or the consumer still holds the spare buffer).
#[derive(Debug)]
pub enum Handoff {
    Line(SentenceBuffer),
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnd {
    HandedOver(BufferHalf),
    Dropped,
}

// Fills the current buffer from the serial byte stream and swaps at each LF.
pub struct SentenceProducer {
    filling: SentenceBuffer,
    capturing: bool,
    overflowed: bool,
    ready_tx: Sender<Handoff>,
    free_rx: Receiver<SentenceBuffer>,
    free_tx: Sender<SentenceBuffer>,
}

pub struct SentenceConsumer {
    ready_rx: Receiver<Handoff>,
    free_tx: Sender<SentenceBuffer>,
}

// Build a pair with buffer A filling and buffer B spare.
pub fn sentence_pair() -> (SentenceProducer, SentenceConsumer) {
    let (ready_tx, ready_rx) = mpsc::channel();
    let (free_tx, free_rx) = mpsc::channel();
    // Receiver is alive, send cannot fail.
    let _ = free_tx.send(SentenceBuffer::new(BufferHalf::B));

    let producer = SentenceProducer {
        filling: SentenceBuffer::new(BufferHalf::A),
        capturing: false,
        overflowed: false,
        ready_tx,
        free_rx,
        free_tx: free_tx.clone(),
    };
    (producer, SentenceConsumer { ready_rx, free_tx })
}

impl SentenceProducer {
    #[cfg(test)]
    pub fn filling_half(&self) -> BufferHalf {
        self.filling.half
    }

    // Drop any partial line and select buffer A when it is available.
    pub fn arm(&mut self) {
        self.reset_line();
        if self.filling.half == BufferHalf::B
            && let Ok(mut other) = self.free_rx.try_recv()
        {
            other.clear();
            let previous = mem::replace(&mut self.filling, other);
            let _ = self.free_tx.send(previous);
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> usize {
        bytes
            .iter()
            .filter_map(|&byte| self.push_byte(byte))
            .count()
    }

    // Feed one received byte. Returns the boundary event when the byte ends a line.
    pub fn push_byte(&mut self, byte: u8) -> Option<LineEnd> {
        if byte == b'$' {
            // Restart on every start marker to resynchronise after noise.
            self.reset_line();
            self.capturing = true;
            self.store(byte);
            return None;
        }
        if !self.capturing {
            return None;
        }
        if byte != LINE_FEED && !is_allowed_nmea_byte(byte) {
            self.reset_line();
            return None;
        }

        self.store(byte);
        if byte == LINE_FEED {
            return Some(self.complete_line());
        }
        None
    }

    fn store(&mut self, byte: u8) {
        if self.filling.len < SENTENCE_CAPACITY {
            self.filling.bytes[self.filling.len] = byte;
            self.filling.len += 1;
        } else {
            self.overflowed = true;
        }
    }

    fn complete_line(&mut self) -> LineEnd {
        let captured = !self.overflowed;
        self.capturing = false;
        self.overflowed = false;

        let next = match self.free_rx.try_recv() {
            Ok(next) if captured => next,
            Ok(next) => {
                let _ = self.free_tx.send(next);
                return self.drop_line();
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => return self.drop_line(),
        };

        let done = mem::replace(&mut self.filling, next);
        let half = done.half;
        match self.ready_tx.send(Handoff::Line(done)) {
            Ok(()) => LineEnd::HandedOver(half),
            // Consumer is gone; keep filling whichever buffer we hold.
            Err(_) => {
                self.filling.len = 0;
                LineEnd::Dropped
            }
        }
    }

    fn drop_line(&mut self) -> LineEnd {
        self.filling.len = 0;
        let _ = self.ready_tx.send(Handoff::Dropped);
        LineEnd::Dropped
    }

    fn reset_line(&mut self) {
        self.filling.len = 0;
        self.capturing = false;
        self.overflowed = false;
    }
}

impl SentenceConsumer {
    pub fn try_take(&self) -> Option<Handoff> {
        self.ready_rx.try_recv().ok()
    }

    // Block until the next boundary event or until `timeout` passes.
    pub fn wait(&self, timeout: Duration) -> Option<Handoff> {
        match self.ready_rx.recv_timeout(timeout) {
            Ok(handoff) => Some(handoff),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    // Give a parsed buffer back to the producer, zeroed.
    pub fn recycle(&self, mut buffer: SentenceBuffer) {
        buffer.clear();
        let _ = self.free_tx.send(buffer);
    }

    // Recycle anything left over from an earlier session.
    pub fn drain(&self) -> usize {
        let mut stale = 0_usize;
        while let Some(handoff) = self.try_take() {
            if let Handoff::Line(buffer) = handoff {
                self.recycle(buffer);
            }
            stale += 1;
        }
        stale
    }
}

fn is_allowed_nmea_byte(byte: u8) -> bool {
    byte == b'\r' || (0x20..=0x7E).contains(&byte)
}
