//! The sensor link boundary.
//!
//! The bus transport itself lives outside this crate. Whatever talks to the
//! IMU only has to hand out [`RawReading`]s, either by implementing
//! [`SensorLink`] directly or by pushing readings into a [`ChannelLink`]
//! from its own thread.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::SensorError;
use crate::types::RawReading;

/// MPU-6050 default I2C address (AD0 low)
pub const DEFAULT_ADDRESS: u8 = 0x68;
/// Power management register; writing 0x00 wakes the device
pub const PWR_MGMT_1: u8 = 0x6B;
/// First register of the accel/temp/gyro burst
pub const ACCEL_XOUT_H: u8 = 0x3B;
/// accel (6) + temperature (2) + gyro (6)
pub const BURST_LEN: usize = 14;

/// Source of raw IMU readings.
pub trait SensorLink {
    /// Read one fresh 6-axis sample.
    fn read_raw(&mut self) -> Result<RawReading, SensorError>;
}

impl<L: SensorLink + ?Sized> SensorLink for &mut L {
    fn read_raw(&mut self) -> Result<RawReading, SensorError> {
        (**self).read_raw()
    }
}

impl<L: SensorLink + ?Sized> SensorLink for Box<L> {
    fn read_raw(&mut self) -> Result<RawReading, SensorError> {
        (**self).read_raw()
    }
}

/// Decodes a burst read starting at `ACCEL_XOUT_H`.
///
/// Registers are big-endian pairs; the temperature word is skipped.
pub fn decode_burst(bytes: &[u8]) -> Result<RawReading, SensorError> {
    if bytes.len() < BURST_LEN {
        return Err(SensorError::ShortBurst {
            needed: BURST_LEN,
            got: bytes.len(),
        });
    }

    let word = |offset: usize| i16::from_be_bytes([bytes[offset], bytes[offset + 1]]);

    Ok(RawReading {
        accel_x: word(0),  // 0x3B ACCEL_XOUT_H / 0x3C ACCEL_XOUT_L
        accel_y: word(2),  // 0x3D / 0x3E
        accel_z: word(4),  // 0x3F / 0x40
        gyro_x: word(8),   // 0x43 / 0x44
        gyro_y: word(10),  // 0x45 / 0x46
        gyro_z: word(12),  // 0x47 / 0x48
    })
}

/// Readings buffered between a transport thread and its [`ChannelLink`].
/// The transport replaces the pending reading rather than queueing behind it.
pub const LINK_CAPACITY: usize = 1;

/// Link fed by a transport thread through a bounded channel.
///
/// A read returns the newest reading already delivered and discards older
/// ones; otherwise it waits at most `timeout` for the next one, which gives
/// the pipeline a way out when the bus stalls.
pub struct ChannelLink {
    rx: Receiver<RawReading>,
    timeout: Duration,
    timeouts: u64,
    skipped: u64,
    // Held only so the transport thread notices when the link is dropped.
    _alive: Option<Arc<()>>,
}

impl ChannelLink {
    pub fn new(rx: Receiver<RawReading>, timeout: Duration) -> Self {
        Self {
            rx,
            timeout,
            timeouts: 0,
            skipped: 0,
            _alive: None,
        }
    }

    /// Creates a connected sender / link pair.
    pub fn pair(capacity: usize, timeout: Duration) -> (Sender<RawReading>, Self) {
        let (tx, rx) = bounded(capacity);
        (tx, Self::new(rx, timeout))
    }

    /// Reads that hit the timeout so far
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    /// Stale readings discarded in favour of a newer one
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl SensorLink for ChannelLink {
    fn read_raw(&mut self) -> Result<RawReading, SensorError> {
        let mut latest = None;
        for reading in self.rx.try_iter() {
            if latest.replace(reading).is_some() {
                self.skipped += 1;
            }
        }
        if let Some(reading) = latest {
            return Ok(reading);
        }

        match self.rx.recv_timeout(self.timeout) {
            Ok(reading) => Ok(reading),
            Err(RecvTimeoutError::Timeout) => {
                self.timeouts += 1;
                Err(SensorError::Timeout {
                    waited: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(SensorError::Disconnected),
        }
    }
}

/// Offers `reading` to the link, evicting the pending one if the channel is full.
fn publish_latest(tx: &Sender<RawReading>, evict: &Receiver<RawReading>, reading: RawReading) {
    if let Err(TrySendError::Full(reading)) = tx.try_send(reading) {
        let _ = evict.try_recv();
        let _ = tx.try_send(reading);
    }
}

/// Runs `source` on a background thread, publishing one reading per `pace`.
///
/// Only the newest reading is kept for the consumer, so a link left idle
/// (during inference, say) never hands out a backlog. The thread stops when
/// the source reports `Exhausted` or `Disconnected`, or when the returned
/// link is dropped. Other errors are logged and skipped, so the consumer sees
/// them as timeouts.
pub fn spawn_link<L>(
    mut source: L,
    pace: Duration,
    timeout: Duration,
) -> (ChannelLink, JoinHandle<()>)
where
    L: SensorLink + Send + 'static,
{
    let (tx, mut link) = ChannelLink::pair(LINK_CAPACITY, timeout);
    let evict = link.rx.clone();
    let alive = Arc::new(());
    let consumer = Arc::downgrade(&alive);
    link._alive = Some(alive);

    let handle = std::thread::spawn(move || loop {
        if consumer.strong_count() == 0 {
            debug!("sensor consumer dropped, stopping transport thread");
            return;
        }
        match source.read_raw() {
            Ok(reading) => publish_latest(&tx, &evict, reading),
            Err(SensorError::Exhausted) | Err(SensorError::Disconnected) => {
                debug!("sensor source finished");
                return;
            }
            Err(e) => warn!("sensor read failed: {}", e),
        }
        if !pace.is_zero() {
            std::thread::sleep(pace);
        }
    });

    (link, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        next: i16,
        limit: i16,
    }

    impl SensorLink for Counting {
        fn read_raw(&mut self) -> Result<RawReading, SensorError> {
            if self.next >= self.limit {
                return Err(SensorError::Exhausted);
            }
            self.next += 1;
            Ok(RawReading::new([self.next, 0, 0], [0, 0, 0]))
        }
    }

    #[test]
    fn decode_burst_skips_temperature() {
        let bytes = [
            0x40, 0x00, // ax = 16384
            0xFF, 0xFE, // ay = -2
            0x00, 0x10, // az = 16
            0x12, 0x34, // temperature
            0x00, 0x83, // gx = 131
            0x80, 0x00, // gy = -32768
            0x7F, 0xFF, // gz = 32767
        ];
        let raw = decode_burst(&bytes).unwrap();
        assert_eq!(raw, RawReading::new([16384, -2, 16], [131, -32768, 32767]));
    }

    #[test]
    fn decode_burst_rejects_short_input() {
        let err = decode_burst(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, SensorError::ShortBurst { needed: 14, got: 10 }));
    }

    #[test]
    fn channel_link_times_out_then_disconnects() {
        let (tx, mut link) = ChannelLink::pair(4, Duration::from_millis(5));

        tx.send(RawReading::default()).unwrap();
        assert!(link.read_raw().is_ok());

        assert!(matches!(link.read_raw(), Err(SensorError::Timeout { .. })));
        assert_eq!(link.timeouts(), 1);

        drop(tx);
        assert!(matches!(link.read_raw(), Err(SensorError::Disconnected)));
    }

    #[test]
    fn channel_link_skips_to_newest_reading() {
        let (tx, mut link) = ChannelLink::pair(4, Duration::from_millis(5));
        for x in 1..=3 {
            tx.send(RawReading::new([x, 0, 0], [0, 0, 0])).unwrap();
        }

        assert_eq!(link.read_raw().unwrap().accel_x, 3);
        assert_eq!(link.skipped(), 2);
        assert!(matches!(link.read_raw(), Err(SensorError::Timeout { .. })));
    }

    #[test]
    fn idle_spawned_link_serves_fresh_reading() {
        let (mut link, handle) = spawn_link(
            Counting {
                next: 0,
                limit: i16::MAX,
            },
            Duration::from_millis(2),
            Duration::from_secs(1),
        );

        std::thread::sleep(Duration::from_millis(300));
        let first = link.read_raw().unwrap().accel_x;
        assert!(first > 50, "read a backlogged reading: {}", first);

        let next = link.read_raw().unwrap().accel_x;
        assert!(next >= first);

        drop(link);
        handle.join().unwrap();
    }

    #[test]
    fn spawned_link_keeps_last_reading_then_disconnects() {
        let (mut link, handle) = spawn_link(
            Counting { next: 0, limit: 5 },
            Duration::ZERO,
            Duration::from_secs(1),
        );

        handle.join().unwrap();
        assert_eq!(link.read_raw().unwrap().accel_x, 5);
        assert!(matches!(link.read_raw(), Err(SensorError::Disconnected)));
    }

    fn read_once<L: SensorLink>(mut link: L) -> Result<RawReading, SensorError> {
        link.read_raw()
    }

    #[test]
    fn references_and_boxes_are_links() {
        let mut source = Counting { next: 0, limit: 2 };
        assert_eq!(read_once(&mut source).unwrap().accel_x, 1);
        assert_eq!(read_once(&mut source).unwrap().accel_x, 2);
        assert!(matches!(read_once(&mut source), Err(SensorError::Exhausted)));

        let boxed: Box<dyn SensorLink> = Box::new(Counting { next: 0, limit: 1 });
        assert!(read_once(boxed).is_ok());
    }
}
