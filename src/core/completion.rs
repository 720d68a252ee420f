use std::{ffi::c_void, thread, time::Duration};

use futures::channel::oneshot;
use log::warn;

use super::error::WaitError;

/// Upper bound on message bytes a callback copies out.
pub const MESSAGE_CAP: usize = 2048;

/// Drives queued native callbacks. Must not block.
pub trait EventPump {
    fn process_events(&self);
}

impl<F: Fn()> EventPump for F {
    fn process_events(&self) {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Pump until the callback fires, however long that takes.
    Unbounded,
    /// Pump at most `max_iters` times, sleeping `quantum` between pumps.
    Bounded { max_iters: u32, quantum: Duration },
}

impl WaitPolicy {
    /// Optional or unstable entry points that may never call back: ~2s.
    pub const OPTIONAL_API: WaitPolicy = WaitPolicy::Bounded {
        max_iters: 2000,
        quantum: Duration::from_millis(1),
    };

    /// Adapter and device requests: ~10s.
    pub const REQUEST: WaitPolicy = WaitPolicy::Bounded {
        max_iters: 10_000,
        quantum: Duration::from_millis(1),
    };

    fn exhausted(&self, iters: u32) -> bool {
        match self {
            WaitPolicy::Unbounded => false,
            WaitPolicy::Bounded { max_iters, .. } => iters >= *max_iters,
        }
    }

    fn pause(&self) {
        match self {
            WaitPolicy::Unbounded => thread::yield_now(),
            WaitPolicy::Bounded { quantum, .. } => thread::sleep(*quantum),
        }
    }
}

/// Producer half of a one-shot completion slot.
///
/// Travels through native code as `userdata1`; the callback trampoline turns
/// it back into a sender and writes the result exactly once.
pub struct CompletionSender<T> {
    tx: oneshot::Sender<T>,
}

/// Consumer half, owned by the waiting call.
pub struct Completion<T> {
    rx: oneshot::Receiver<T>,
}

pub fn completion<T>() -> (CompletionSender<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (CompletionSender { tx }, Completion { rx })
}

impl<T> CompletionSender<T> {
    /// Hands `value` to the waiter. If the waiter has already given up, the
    /// value comes back so the caller can dispose of what it owns.
    pub fn complete(self, value: T) -> Result<(), T> {
        self.tx.send(value)
    }

    pub fn into_userdata(self) -> *mut c_void {
        Box::into_raw(Box::new(self)).cast()
    }

    /// # Safety
    ///
    /// `userdata` must be null or come from `into_userdata` with the same `T`,
    /// and must not have been reclaimed already.
    pub unsafe fn from_userdata(userdata: *mut c_void) -> Option<Self> {
        if userdata.is_null() {
            return None;
        }
        Some(*Box::from_raw(userdata.cast::<CompletionSender<T>>()))
    }
}

impl<T> Completion<T> {
    pub fn try_take(&mut self) -> Result<Option<T>, WaitError> {
        self.rx.try_recv().map_err(|_| WaitError::Abandoned)
    }

    /// Pumps `pump` until the value arrives or `policy` runs out.
    pub fn wait(mut self, pump: &impl EventPump, policy: WaitPolicy) -> Result<T, WaitError> {
        profiling::scope!("Completion::wait");
        let mut iters = 0u32;
        loop {
            if let Some(value) = self.try_take()? {
                return Ok(value);
            }
            if policy.exhausted(iters) {
                warn!("native callback did not fire after {iters} pumps");
                return Err(WaitError::TimedOut);
            }
            pump.process_events();
            iters = iters.saturating_add(1);
            if let Some(value) = self.try_take()? {
                return Ok(value);
            }
            policy.pause();
        }
    }
}

/// Callback message text, truncated to `MESSAGE_CAP` bytes.
#[derive(Clone)]
pub struct BoundedMessage {
    bytes: [u8; MESSAGE_CAP],
    len: usize,
    true_len: usize,
}

impl Default for BoundedMessage {
    fn default() -> Self {
        BoundedMessage {
            bytes: [0; MESSAGE_CAP],
            len: 0,
            true_len: 0,
        }
    }
}

impl std::fmt::Debug for BoundedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedMessage")
            .field("text", &self.to_string_lossy())
            .field("true_len", &self.true_len)
            .finish()
    }
}

impl BoundedMessage {
    pub fn from_bytes(src: &[u8]) -> Self {
        let mut msg = BoundedMessage::default();
        msg.push(src);
        msg
    }

    /// Appends as much of `src` as fits; always accounts for its full length.
    pub fn push(&mut self, src: &[u8]) {
        let n = src.len().min(MESSAGE_CAP - self.len);
        self.bytes[self.len..self.len + n].copy_from_slice(&src[..n]);
        self.len += n;
        self.true_len = self.true_len.saturating_add(src.len());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn true_len(&self) -> usize {
        self.true_len
    }

    pub fn is_truncated(&self) -> bool {
        self.true_len > self.len
    }

    pub fn is_empty(&self) -> bool {
        self.true_len == 0
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    /// Copies the stored bytes into the front of `out`; false if they don't fit.
    pub fn copy_to(&self, out: &mut [u8]) -> bool {
        match out.get_mut(..self.len) {
            Some(dst) => {
                dst.copy_from_slice(self.as_bytes());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, time::Instant};

    use super::*;

    #[test]
    fn value_written_before_wait_is_returned() {
        let (tx, rx) = completion();
        tx.complete(7u32).unwrap();
        let pumps = Cell::new(0);
        let pump = || pumps.set(pumps.get() + 1);
        assert_eq!(rx.wait(&pump, WaitPolicy::Unbounded), Ok(7));
        assert_eq!(pumps.get(), 0);
    }

    #[test]
    fn callback_fired_from_pump() {
        let (tx, rx) = completion::<u32>();
        let userdata = tx.into_userdata();
        let pumps = Cell::new(0);
        let pump = || {
            pumps.set(pumps.get() + 1);
            if pumps.get() == 3 {
                let tx = unsafe { CompletionSender::<u32>::from_userdata(userdata) }.unwrap();
                tx.complete(42).unwrap();
            }
        };
        assert_eq!(rx.wait(&pump, WaitPolicy::Unbounded), Ok(42));
        assert_eq!(pumps.get(), 3);
    }

    #[test]
    fn bounded_wait_times_out() {
        let (_tx, rx) = completion::<u32>();
        let pumps = Cell::new(0u32);
        let pump = || pumps.set(pumps.get() + 1);
        let policy = WaitPolicy::Bounded {
            max_iters: 25,
            quantum: Duration::from_millis(1),
        };
        assert_eq!(rx.wait(&pump, policy), Err(WaitError::TimedOut));
        assert_eq!(pumps.get(), 25);
    }

    #[test]
    fn optional_api_policy_gives_up_in_time() {
        let (tx, rx) = completion::<u32>();
        let _leaked = tx.into_userdata();
        let start = Instant::now();
        assert_eq!(rx.wait(&|| {}, WaitPolicy::OPTIONAL_API), Err(WaitError::TimedOut));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn dropped_sender_is_abandoned() {
        let (tx, rx) = completion::<u32>();
        drop(tx);
        assert_eq!(rx.wait(&|| {}, WaitPolicy::Unbounded), Err(WaitError::Abandoned));
    }

    #[test]
    fn late_completion_after_timeout_is_harmless() {
        let (tx, rx) = completion::<u32>();
        let userdata = tx.into_userdata();
        let policy = WaitPolicy::Bounded {
            max_iters: 1,
            quantum: Duration::from_millis(1),
        };
        assert_eq!(rx.wait(&|| {}, policy), Err(WaitError::TimedOut));
        let tx = unsafe { CompletionSender::<u32>::from_userdata(userdata) }.unwrap();
        assert_eq!(tx.complete(1), Err(1));
    }

    #[test]
    fn complete_returns_value_when_waiter_is_gone() {
        let (tx, rx) = completion::<Vec<u8>>();
        drop(rx);
        assert_eq!(tx.complete(vec![1, 2]), Err(vec![1, 2]));
    }

    #[test]
    fn null_userdata() {
        assert!(unsafe { CompletionSender::<u32>::from_userdata(std::ptr::null_mut()) }.is_none());
    }

    #[test]
    fn message_truncates_and_keeps_true_length() {
        let long = vec![b'x'; MESSAGE_CAP + 100];
        let msg = BoundedMessage::from_bytes(&long);
        assert_eq!(msg.as_bytes().len(), MESSAGE_CAP);
        assert_eq!(msg.true_len(), MESSAGE_CAP + 100);
        assert!(msg.is_truncated());

        let short = BoundedMessage::from_bytes(b"error: bad");
        assert_eq!(short.as_bytes(), b"error: bad");
        assert!(!short.is_truncated());
    }

    #[test]
    fn message_push_stops_at_cap() {
        let mut msg = BoundedMessage::default();
        msg.push(&[b'a'; MESSAGE_CAP - 1]);
        msg.push(b"bcd");
        assert_eq!(msg.as_bytes().len(), MESSAGE_CAP);
        assert_eq!(*msg.as_bytes().last().unwrap(), b'b');
        assert_eq!(msg.true_len(), MESSAGE_CAP + 2);
        msg.push(b"more");
        assert_eq!(msg.as_bytes().len(), MESSAGE_CAP);
    }

    #[test]
    fn copy_to_checks_capacity() {
        let msg = BoundedMessage::from_bytes(b"hello");
        let mut small = [0u8; 4];
        assert!(!msg.copy_to(&mut small));
        assert_eq!(small, [0; 4]);
        let mut big = [0u8; 8];
        assert!(msg.copy_to(&mut big));
        assert_eq!(&big[..5], b"hello");
    }
}
