//! Fixed-layout shared control region
//!
//! A flat array of 32-bit integers shared between the host and each
//! execution thread. Every index has a stable meaning: scalar status slots
//! first, then a small key ring, then a character data buffer. Slots are
//! individually atomic; `wait`/`notify` park and wake threads watching a slot.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

/// Scalar slots at the start of the region, in positional order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum DataType {
    /// Debug command
    Dbg,
    /// Data buffer flag (a [`BufferType`] or -1)
    Buf,
    /// Video event
    Vdo,
    /// Video event index
    Vdx,
    /// Video selected
    Vse,
    /// Video load progress
    Vlp,
    /// Video position
    Vps,
    /// Video duration
    Vdr,
    /// Video audio track
    Vat,
    /// Video text track
    Vtt,
    /// Sound event
    Snd,
    /// Sound event index
    Sdx,
    /// Sound position
    Sps,
    /// Sound duration
    Sdr,
    Wav,
    Wav1,
    Wav2,
    Wav3,
    /// Memory used heap size
    Muhs,
    /// Memory heap size limit
    Mhsl,
    /// Measured bandwidth
    Mbwd,
    /// Consumer electronics control
    Cec,
    /// HDMI status
    Hdmi,
}

impl DataType {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Entries in the key ring
pub const KEY_BUFFER_SIZE: usize = 5;
/// Slots per key entry: remote id, key code, modifier
pub const KEY_ARRAY_SPOTS: usize = 3;
/// First slot of the key ring (remote id of entry 0)
pub const KEY_BUFFER_INDEX: usize = DataType::Hdmi.index() + 1;
/// First slot of the data buffer, right after the key ring
pub const DATA_BUFFER_INDEX: usize = KEY_BUFFER_INDEX + KEY_BUFFER_SIZE * KEY_ARRAY_SPOTS;
pub const DATA_BUFFER_SIZE: usize = 1024;
pub const REGION_LENGTH: usize = DATA_BUFFER_INDEX + DATA_BUFFER_SIZE;

const RID_OFFSET: usize = 0;
const KEY_OFFSET: usize = 1;
const MOD_OFFSET: usize = 2;

/// Commands written to the `Dbg` slot, in protocol order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DebugCommand {
    Bscs,
    Bt,
    Classes,
    Cont,
    Exit,
    Expr,
    Help,
    Last,
    List,
    Next,
    Stats,
    Step,
    Thread,
    Threads,
    Var,
    Break,
    Pause,
}

impl DebugCommand {
    const ALL: [DebugCommand; 17] = [
        DebugCommand::Bscs,
        DebugCommand::Bt,
        DebugCommand::Classes,
        DebugCommand::Cont,
        DebugCommand::Exit,
        DebugCommand::Expr,
        DebugCommand::Help,
        DebugCommand::Last,
        DebugCommand::List,
        DebugCommand::Next,
        DebugCommand::Stats,
        DebugCommand::Step,
        DebugCommand::Thread,
        DebugCommand::Threads,
        DebugCommand::Var,
        DebugCommand::Break,
        DebugCommand::Pause,
    ];

    pub fn from_i32(value: i32) -> Option<DebugCommand> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }
}

/// Kind of payload currently held in the data buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum BufferType {
    DebugExpr,
    MediaTracks,
    SysLog,
    Input,
}

impl BufferType {
    pub fn from_i32(value: i32) -> Option<BufferType> {
        match value {
            0 => Some(BufferType::DebugExpr),
            1 => Some(BufferType::MediaTracks),
            2 => Some(BufferType::SysLog),
            3 => Some(BufferType::Input),
            _ => None,
        }
    }
}

/// A key event read from the key ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub remote_id: i32,
    pub key: i32,
    pub modifier: i32,
}

/// Outcome of [`SharedRegion::wait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// Woken by a notify while the slot still held the expected value
    Ok,
    /// The slot did not hold the expected value
    NotEqual,
    TimedOut,
}

/// The shared control region
pub struct SharedRegion {
    slots: Box<[AtomicI32]>,
    lock: Mutex<()>,
    signal: Condvar,
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("len", &self.slots.len())
            .field("dbg", &self.load_type(DataType::Dbg))
            .finish()
    }
}

impl Default for SharedRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedRegion {
    /// A region with every slot set to -1
    pub fn new() -> Self {
        let slots = (0..REGION_LENGTH).map(|_| AtomicI32::new(-1)).collect();
        Self {
            slots,
            lock: Mutex::new(()),
            signal: Condvar::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Atomic load; out-of-range indexes read as -1
    pub fn load(&self, index: usize) -> i32 {
        self.slots
            .get(index)
            .map_or(-1, |slot| slot.load(Ordering::SeqCst))
    }

    /// Atomic store; out-of-range indexes are ignored
    pub fn store(&self, index: usize, value: i32) {
        if let Some(slot) = self.slots.get(index) {
            slot.store(value, Ordering::SeqCst);
        } else {
            log::warn!("store to shared region index {index} out of range");
        }
    }

    pub fn load_type(&self, slot: DataType) -> i32 {
        self.load(slot.index())
    }

    pub fn store_type(&self, slot: DataType, value: i32) {
        self.store(slot.index(), value);
    }

    /// Block while `index` holds `expected`, until notified or `timeout` elapses
    pub fn wait(&self, index: usize, expected: i32, timeout: Option<Duration>) -> WaitResult {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.lock.lock();
        if self.load(index) != expected {
            return WaitResult::NotEqual;
        }
        match deadline {
            Some(deadline) => {
                if self.signal.wait_until(&mut guard, deadline).timed_out() {
                    WaitResult::TimedOut
                } else {
                    WaitResult::Ok
                }
            }
            None => {
                self.signal.wait(&mut guard);
                WaitResult::Ok
            }
        }
    }

    /// Wake every thread parked in [`wait`](Self::wait); returns how many were woken
    pub fn notify(&self) -> usize {
        let _guard = self.lock.lock();
        self.signal.notify_all()
    }

    /// Store then notify waiters
    pub fn store_and_notify(&self, index: usize, value: i32) {
        {
            let _guard = self.lock.lock();
            self.store(index, value);
        }
        self.signal.notify_all();
    }

    // ---- debug command ----

    /// Post a debug command for the interpreter to pick up
    pub fn send_debug_command(&self, command: DebugCommand) {
        self.store_and_notify(DataType::Dbg.index(), command as i32);
    }

    /// Take the pending debug command, clearing the slot
    pub fn take_debug_command(&self) -> Option<DebugCommand> {
        let slot = &self.slots[DataType::Dbg.index()];
        let raw = slot.swap(-1, Ordering::SeqCst);
        DebugCommand::from_i32(raw)
    }

    // ---- key ring ----

    /// Append a key event; when the ring is full the oldest entry is dropped
    pub fn push_key(&self, event: KeyEvent) {
        let free = (0..KEY_BUFFER_SIZE)
            .map(|i| KEY_BUFFER_INDEX + i * KEY_ARRAY_SPOTS)
            .find(|&base| self.load(base + KEY_OFFSET) < 0);
        let base = match free {
            Some(base) => base,
            None => {
                for i in 1..KEY_BUFFER_SIZE {
                    let prev = KEY_BUFFER_INDEX + (i - 1) * KEY_ARRAY_SPOTS;
                    let next = KEY_BUFFER_INDEX + i * KEY_ARRAY_SPOTS;
                    for offset in [RID_OFFSET, KEY_OFFSET, MOD_OFFSET] {
                        self.store(prev + offset, self.load(next + offset));
                    }
                }
                KEY_BUFFER_INDEX + (KEY_BUFFER_SIZE - 1) * KEY_ARRAY_SPOTS
            }
        };
        self.store(base + RID_OFFSET, event.remote_id);
        self.store(base + MOD_OFFSET, event.modifier);
        self.store(base + KEY_OFFSET, event.key);
    }

    /// Remove and return the oldest key event
    pub fn take_key(&self) -> Option<KeyEvent> {
        let first = KEY_BUFFER_INDEX;
        let key = self.load(first + KEY_OFFSET);
        if key < 0 {
            return None;
        }
        let event = KeyEvent {
            remote_id: self.load(first + RID_OFFSET),
            key,
            modifier: self.load(first + MOD_OFFSET),
        };
        for i in 1..KEY_BUFFER_SIZE {
            let prev = KEY_BUFFER_INDEX + (i - 1) * KEY_ARRAY_SPOTS;
            let next = KEY_BUFFER_INDEX + i * KEY_ARRAY_SPOTS;
            for offset in [RID_OFFSET, KEY_OFFSET, MOD_OFFSET] {
                self.store(prev + offset, self.load(next + offset));
            }
        }
        let last = KEY_BUFFER_INDEX + (KEY_BUFFER_SIZE - 1) * KEY_ARRAY_SPOTS;
        for offset in [RID_OFFSET, KEY_OFFSET, MOD_OFFSET] {
            self.store(last + offset, -1);
        }
        Some(event)
    }

    // ---- data buffer ----

    /// Write `text` as NUL-terminated character codes and flag its type.
    /// Text longer than the buffer is truncated.
    pub fn write_data(&self, text: &str, kind: BufferType) {
        let mut written = 0;
        for c in text.chars().take(DATA_BUFFER_SIZE - 1) {
            self.store(DATA_BUFFER_INDEX + written, c as i32);
            written += 1;
        }
        self.store(DATA_BUFFER_INDEX + written, 0);
        self.store_and_notify(DataType::Buf.index(), kind as i32);
    }

    /// Kind of payload waiting in the data buffer, if any
    pub fn data_type(&self) -> Option<BufferType> {
        BufferType::from_i32(self.load_type(DataType::Buf))
    }

    /// Read the data buffer up to its terminator and clear the flag
    pub fn read_data(&self) -> String {
        let text = (DATA_BUFFER_INDEX..REGION_LENGTH)
            .map(|i| self.load(i))
            .take_while(|&code| code != 0)
            .filter(|&code| code > 0)
            .filter_map(|code| char::from_u32(code as u32))
            .collect();
        self.store_type(DataType::Buf, -1);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_layout_positions() {
        assert_eq!(DataType::Dbg.index(), 0);
        assert_eq!(DataType::Buf.index(), 1);
        assert_eq!(DataType::Hdmi.index(), 22);
        assert_eq!(KEY_BUFFER_INDEX, 23);
        assert_eq!(DATA_BUFFER_INDEX, 38);
        assert_eq!(REGION_LENGTH, 38 + 1024);
    }

    #[test]
    fn test_new_region_is_all_minus_one() {
        let region = SharedRegion::new();
        assert_eq!(region.len(), REGION_LENGTH);
        assert!((0..REGION_LENGTH).all(|i| region.load(i) == -1));
    }

    #[test]
    fn test_debug_command_order() {
        assert_eq!(DebugCommand::Bscs as i32, 0);
        assert_eq!(DebugCommand::Cont as i32, 3);
        assert_eq!(DebugCommand::Exit as i32, 4);
        assert_eq!(DebugCommand::Var as i32, 14);
        assert_eq!(DebugCommand::Break as i32, 15);
        assert_eq!(DebugCommand::from_i32(16), Some(DebugCommand::Pause));
        assert_eq!(DebugCommand::from_i32(17), None);
        assert_eq!(DebugCommand::from_i32(-1), None);
    }

    #[test]
    fn test_take_debug_command_clears_slot() {
        let region = SharedRegion::new();
        region.send_debug_command(DebugCommand::Break);
        assert_eq!(region.take_debug_command(), Some(DebugCommand::Break));
        assert_eq!(region.take_debug_command(), None);
        assert_eq!(region.load_type(DataType::Dbg), -1);
    }

    #[test]
    fn test_out_of_range_access() {
        let region = SharedRegion::new();
        region.store(REGION_LENGTH + 5, 7);
        assert_eq!(region.load(REGION_LENGTH + 5), -1);
    }

    #[test]
    fn test_data_buffer_round_trip() {
        let region = SharedRegion::new();
        region.write_data("{\"key\":\"ok\"}", BufferType::Input);
        assert_eq!(region.data_type(), Some(BufferType::Input));
        assert_eq!(region.read_data(), "{\"key\":\"ok\"}");
        assert_eq!(region.data_type(), None);
    }

    #[test]
    fn test_data_buffer_truncates() {
        let region = SharedRegion::new();
        let long = "x".repeat(DATA_BUFFER_SIZE + 10);
        region.write_data(&long, BufferType::SysLog);
        assert_eq!(region.read_data().len(), DATA_BUFFER_SIZE - 1);
    }

    #[test]
    fn test_key_ring_fifo() {
        let region = SharedRegion::new();
        for key in 0..3 {
            region.push_key(KeyEvent {
                remote_id: 10,
                key,
                modifier: 0,
            });
        }
        assert_eq!(region.take_key().map(|e| e.key), Some(0));
        assert_eq!(region.take_key().map(|e| e.key), Some(1));
        assert_eq!(region.take_key().map(|e| e.key), Some(2));
        assert_eq!(region.take_key(), None);
    }

    #[test]
    fn test_key_ring_drops_oldest_when_full() {
        let region = SharedRegion::new();
        for key in 0..(KEY_BUFFER_SIZE as i32 + 2) {
            region.push_key(KeyEvent {
                remote_id: 10,
                key,
                modifier: 100,
            });
        }
        let first = region.take_key().unwrap();
        assert_eq!(first.key, 2);
        assert_eq!(first.modifier, 100);
    }

    #[test]
    fn test_wait_not_equal_returns_immediately() {
        let region = SharedRegion::new();
        region.store(0, 5);
        assert_eq!(region.wait(0, 1, None), WaitResult::NotEqual);
    }

    #[test]
    fn test_wait_times_out() {
        let region = SharedRegion::new();
        let result = region.wait(0, -1, Some(Duration::from_millis(10)));
        assert_eq!(result, WaitResult::TimedOut);
    }

    #[test]
    fn test_wait_woken_by_other_thread() {
        let region = Arc::new(SharedRegion::new());
        let writer = Arc::clone(&region);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.send_debug_command(DebugCommand::Cont);
        });
        let mut result = WaitResult::Ok;
        while region.load_type(DataType::Dbg) == -1 {
            result = region.wait(0, -1, Some(Duration::from_secs(5)));
        }
        handle.join().unwrap();
        assert_ne!(result, WaitResult::TimedOut);
        assert_eq!(region.take_debug_command(), Some(DebugCommand::Cont));
    }
}
