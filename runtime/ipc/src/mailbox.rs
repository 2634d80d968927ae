//! Single-slot mailbox with sequence numbers

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::{IpcError, Result};

/// A message copied out of the mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// Sequence number assigned by the producer (starts at 1)
    pub sequence: u32,
    /// Bytes written to the caller's buffer
    pub len: usize,
}

/// Fixed-capacity mailbox shared by exactly one producer and one consumer
///
/// # Type Parameters
/// * `N` - Payload capacity in bytes
///
/// # Memory Ordering
/// - Producer: payload and length writes happen before the Release store
///   of `published`
/// - Consumer: Acquire load of `published` before reading the payload, and
///   Release store of `consumed` after the copy completes
/// - Producer's Acquire load of `consumed` orders the next overwrite after
///   the consumer's copy
#[repr(C)]
pub struct SharedMailbox<const N: usize> {
    buffer: UnsafeCell<[u8; N]>,
    len: AtomicUsize,
    published: AtomicU32,
    consumed: AtomicU32,
    producer_claimed: AtomicBool,
    consumer_claimed: AtomicBool,
}

// The buffer is only written by the unique Producer while the slot is free
// and only read by the unique Consumer while it is occupied.
unsafe impl<const N: usize> Sync for SharedMailbox<N> {}

impl<const N: usize> Default for SharedMailbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SharedMailbox<N> {
    /// Create an empty mailbox
    pub const fn new() -> Self {
        Self {
            buffer: UnsafeCell::new([0; N]),
            len: AtomicUsize::new(0),
            published: AtomicU32::new(0),
            consumed: AtomicU32::new(0),
            producer_claimed: AtomicBool::new(false),
            consumer_claimed: AtomicBool::new(false),
        }
    }

    /// Payload capacity in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Claim the producer side
    ///
    /// The claim is held until the handle is dropped.
    ///
    /// # Errors
    /// `AlreadyClaimed` while another producer handle is live
    pub fn producer(&self) -> Result<Producer<'_, N>> {
        if self.producer_claimed.swap(true, Ordering::AcqRel) {
            return Err(IpcError::AlreadyClaimed { side: "producer" });
        }
        Ok(Producer { mailbox: self })
    }

    /// Claim the consumer side
    ///
    /// # Errors
    /// `AlreadyClaimed` while another consumer handle is live
    pub fn consumer(&self) -> Result<Consumer<'_, N>> {
        if self.consumer_claimed.swap(true, Ordering::AcqRel) {
            return Err(IpcError::AlreadyClaimed { side: "consumer" });
        }
        Ok(Consumer { mailbox: self })
    }

    /// Release the consumer claim of a handle that will never run again
    ///
    /// Used when the context owning the consumer is torn down without
    /// unwinding, e.g. a sandbox restarted after a fault.
    ///
    /// # Safety
    /// The abandoned handle must not be used afterwards.
    pub unsafe fn release_consumer(&self) {
        self.consumer_claimed.store(false, Ordering::Release);
    }

    /// Producer counterpart of [`Self::release_consumer`]
    ///
    /// # Safety
    /// The abandoned handle must not be used afterwards.
    pub unsafe fn release_producer(&self) {
        self.producer_claimed.store(false, Ordering::Release);
    }

    /// Whether a message is waiting to be consumed
    pub fn is_pending(&self) -> bool {
        self.published.load(Ordering::Acquire) != self.consumed.load(Ordering::Acquire)
    }

    /// Sequence number of the last published message (0 before the first)
    pub fn published(&self) -> u32 {
        self.published.load(Ordering::Acquire)
    }

    /// Sequence number of the last consumed message (0 before the first)
    pub fn consumed(&self) -> u32 {
        self.consumed.load(Ordering::Acquire)
    }
}

/// Producer handle (trusted side)
pub struct Producer<'a, const N: usize> {
    mailbox: &'a SharedMailbox<N>,
}

impl<const N: usize> Producer<'_, N> {
    /// Copy `payload` into the mailbox and publish it
    ///
    /// # Returns
    /// The sequence number assigned to the message
    ///
    /// # Errors
    /// - `TooLarge` if `payload` exceeds the capacity
    /// - `Busy` if the previous message is still unconsumed
    pub fn post(&mut self, payload: &[u8]) -> Result<u32> {
        if payload.len() > N {
            return Err(IpcError::TooLarge {
                len: payload.len(),
                capacity: N,
            });
        }

        let published = self.mailbox.published.load(Ordering::Relaxed);
        let consumed = self.mailbox.consumed.load(Ordering::Acquire);
        if published != consumed {
            return Err(IpcError::Busy { pending: published });
        }

        // SAFETY: slot is free, so the consumer is not reading the buffer,
        // and this is the only producer.
        unsafe {
            let buffer = &mut *self.mailbox.buffer.get();
            buffer[..payload.len()].copy_from_slice(payload);
        }
        self.mailbox.len.store(payload.len(), Ordering::Relaxed);

        let sequence = published.wrapping_add(1);
        self.mailbox.published.store(sequence, Ordering::Release);
        Ok(sequence)
    }

    /// Whether the slot can take a new message
    pub fn is_free(&self) -> bool {
        !self.mailbox.is_pending()
    }
}

impl<const N: usize> Drop for Producer<'_, N> {
    fn drop(&mut self) {
        self.mailbox.producer_claimed.store(false, Ordering::Release);
    }
}

/// Consumer handle (untrusted side)
pub struct Consumer<'a, const N: usize> {
    mailbox: &'a SharedMailbox<N>,
}

impl<const N: usize> Consumer<'_, N> {
    /// Copy the pending message into `out` and acknowledge it
    ///
    /// # Returns
    /// `None` if nothing new has been published
    ///
    /// # Errors
    /// `BufferTooSmall` if `out` cannot hold the message; the message stays
    /// pending
    pub fn take(&mut self, out: &mut [u8]) -> Result<Option<Message>> {
        let published = self.mailbox.published.load(Ordering::Acquire);
        let consumed = self.mailbox.consumed.load(Ordering::Relaxed);
        if published == consumed {
            return Ok(None);
        }

        let len = self.mailbox.len.load(Ordering::Relaxed);
        if out.len() < len {
            return Err(IpcError::BufferTooSmall {
                needed: len,
                available: out.len(),
            });
        }

        // SAFETY: slot is occupied, so the producer will not write until
        // `consumed` is released below.
        unsafe {
            let buffer = &*self.mailbox.buffer.get();
            out[..len].copy_from_slice(&buffer[..len]);
        }
        self.mailbox.consumed.store(published, Ordering::Release);

        Ok(Some(Message {
            sequence: published,
            len,
        }))
    }

    /// Whether a message is waiting
    pub fn has_message(&self) -> bool {
        self.mailbox.is_pending()
    }
}

impl<const N: usize> Drop for Consumer<'_, N> {
    fn drop(&mut self) {
        self.mailbox.consumer_claimed.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_then_take() {
        let mailbox = SharedMailbox::<32>::new();
        let mut tx = mailbox.producer().unwrap();
        let mut rx = mailbox.consumer().unwrap();

        assert_eq!(tx.post(b"hello").unwrap(), 1);
        assert!(rx.has_message());

        let mut out = [0u8; 32];
        let msg = rx.take(&mut out).unwrap().unwrap();
        assert_eq!(msg, Message { sequence: 1, len: 5 });
        assert_eq!(&out[..5], b"hello");
        assert!(!rx.has_message());
        assert_eq!(rx.take(&mut out).unwrap(), None);
    }

    #[test]
    fn test_busy_until_consumed() {
        let mailbox = SharedMailbox::<16>::new();
        let mut tx = mailbox.producer().unwrap();
        let mut rx = mailbox.consumer().unwrap();

        tx.post(b"first").unwrap();
        assert_eq!(tx.post(b"second"), Err(IpcError::Busy { pending: 1 }));

        let mut out = [0u8; 16];
        let msg = rx.take(&mut out).unwrap().unwrap();
        assert_eq!(&out[..msg.len], b"first");

        assert_eq!(tx.post(b"second").unwrap(), 2);
        assert_eq!(mailbox.published(), 2);
        assert_eq!(mailbox.consumed(), 1);
    }

    #[test]
    fn test_size_limits() {
        let mailbox = SharedMailbox::<4>::new();
        let mut tx = mailbox.producer().unwrap();
        let mut rx = mailbox.consumer().unwrap();

        assert_eq!(tx.post(b"toolong"), Err(IpcError::TooLarge { len: 7, capacity: 4 }));
        tx.post(b"abcd").unwrap();

        let mut small = [0u8; 2];
        assert_eq!(
            rx.take(&mut small),
            Err(IpcError::BufferTooSmall { needed: 4, available: 2 })
        );
        // message survives the failed take
        let mut out = [0u8; 4];
        assert_eq!(rx.take(&mut out).unwrap().map(|m| m.len), Some(4));
    }

    #[test]
    fn test_handles_claimed_once() {
        let mailbox = SharedMailbox::<4>::new();
        let _tx = mailbox.producer().unwrap();
        let _rx = mailbox.consumer().unwrap();
        assert!(matches!(mailbox.producer(), Err(IpcError::AlreadyClaimed { side: "producer" })));
        assert!(matches!(mailbox.consumer(), Err(IpcError::AlreadyClaimed { side: "consumer" })));
    }

    #[test]
    fn test_claim_released_on_drop() {
        let mailbox = SharedMailbox::<4>::new();
        let mut tx = mailbox.producer().unwrap();
        tx.post(b"kept").unwrap();
        drop(mailbox.consumer().unwrap());

        // The message outlives the handle that never read it
        let mut rx = mailbox.consumer().unwrap();
        let mut out = [0u8; 4];
        assert_eq!(rx.take(&mut out).unwrap().map(|m| m.sequence), Some(1));
    }

    #[test]
    fn test_release_abandoned_consumer() {
        let mailbox = SharedMailbox::<4>::new();
        let abandoned = mailbox.consumer().unwrap();
        core::mem::forget(abandoned);
        assert!(mailbox.consumer().is_err());
        unsafe { mailbox.release_consumer() };
        assert!(mailbox.consumer().is_ok());
    }

    #[test]
    fn test_empty_payload_is_a_message() {
        let mailbox = SharedMailbox::<4>::new();
        let mut tx = mailbox.producer().unwrap();
        let mut rx = mailbox.consumer().unwrap();
        tx.post(&[]).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(rx.take(&mut out).unwrap(), Some(Message { sequence: 1, len: 0 }));
    }
}
