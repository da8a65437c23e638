// Fieldgate - Wireless field-bus sensor gateway
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Wall-clock sources
//!
//! The poller stamps readings through the [`TimeSource`] trait. Besides
//! the host clock, this module ships a decoder for battery-backed RTC
//! chips that expose their calendar as a 7-byte BCD register block
//! (seconds, minutes, hours with a 12/24-hour flag, weekday, day, month,
//! year since 2000). The bus access itself sits behind [`RtcBus`].

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::ClockError;

/// 12-hour mode flag in the hour register
const HOUR_12_FLAG: u8 = 0x40;
/// PM flag, meaningful only in 12-hour mode
const HOUR_PM_FLAG: u8 = 0x20;
/// Hour digits in 12-hour mode
const HOUR_12_MASK: u8 = 0x1f;
/// Hour digits in 24-hour mode
const HOUR_24_MASK: u8 = 0x3f;
/// Month digits (the top bit is the century flag, unused here)
const MONTH_MASK: u8 = 0x1f;
/// The chip stores years as an offset from 2000
const YEAR_BASE: i32 = 2000;

/// Wall-clock read access
pub trait TimeSource: Send {
    /// Read the current calendar time
    fn now(&mut self) -> Result<NaiveDateTime, ClockError>;
}

/// Host system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&mut self) -> Result<NaiveDateTime, ClockError> {
        Ok(chrono::Local::now().naive_local())
    }
}

/// Clock that always returns the same instant, for tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    at: NaiveDateTime,
}

impl FixedClock {
    /// Create a clock pinned to the given instant
    pub fn new(at: NaiveDateTime) -> Self {
        Self { at }
    }
}

impl TimeSource for FixedClock {
    fn now(&mut self) -> Result<NaiveDateTime, ClockError> {
        Ok(self.at)
    }
}

/// Clock whose every read fails, for tests
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingClock;

impl TimeSource for FailingClock {
    fn now(&mut self) -> Result<NaiveDateTime, ClockError> {
        Err(ClockError::Read {
            reason: "scripted failure".to_string(),
        })
    }
}

/// Byte-level access to an RTC chip's clock registers
///
/// The implementation owns addressing and bus error mapping; the codec
/// above it only sees the 7 calendar bytes.
pub trait RtcBus: Send {
    /// Read the 7 clock registers
    fn read_clock(&mut self, buf: &mut [u8; 7]) -> Result<(), ClockError>;

    /// Write the 7 clock registers
    fn write_clock(&mut self, buf: &[u8; 7]) -> Result<(), ClockError>;
}

/// BCD calendar codec over an [`RtcBus`]
#[derive(Debug)]
pub struct BcdRtc<B: RtcBus> {
    bus: B,
}

fn bcd_to_dec(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0f)
}

fn dec_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) + (value % 10)
}

impl<B: RtcBus> BcdRtc<B> {
    /// Create a codec over the given bus
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Set the chip to the given calendar time
    ///
    /// Hours are always written in 24-hour mode.
    pub fn set_time(&mut self, time: NaiveDateTime) -> Result<(), ClockError> {
        let year = time.year();
        if !(YEAR_BASE..YEAR_BASE + 100).contains(&year) {
            return Err(ClockError::YearOutOfRange { year });
        }

        let buf = [
            dec_to_bcd(time.second() as u8),
            dec_to_bcd(time.minute() as u8),
            dec_to_bcd(time.hour() as u8),
            // chip weekdays run 1-7 starting Sunday
            dec_to_bcd(time.weekday().num_days_from_sunday() as u8 + 1),
            dec_to_bcd(time.day() as u8),
            dec_to_bcd(time.month() as u8),
            dec_to_bcd((year - YEAR_BASE) as u8),
        ];
        self.bus.write_clock(&buf)
    }

    fn decode(buf: &[u8; 7]) -> Result<NaiveDateTime, ClockError> {
        let second = bcd_to_dec(buf[0]);
        if second > 59 {
            return Err(ClockError::InvalidField {
                field: "seconds",
                value: buf[0],
            });
        }

        let minute = bcd_to_dec(buf[1]);
        if minute > 59 {
            return Err(ClockError::InvalidField {
                field: "minutes",
                value: buf[1],
            });
        }

        let hour = if buf[2] & HOUR_12_FLAG != 0 {
            // 12-hour mode: digits 1-12 plus the PM flag
            let digits = bcd_to_dec(buf[2] & HOUR_12_MASK);
            if !(1..=12).contains(&digits) {
                return Err(ClockError::InvalidField {
                    field: "hours",
                    value: buf[2],
                });
            }
            let pm = buf[2] & HOUR_PM_FLAG != 0;
            (digits % 12) + if pm { 12 } else { 0 }
        } else {
            let digits = bcd_to_dec(buf[2] & HOUR_24_MASK);
            if digits > 23 {
                return Err(ClockError::InvalidField {
                    field: "hours",
                    value: buf[2],
                });
            }
            digits
        };

        // buf[3] is the weekday register; it is redundant with the date

        let day = bcd_to_dec(buf[4]);
        let month = bcd_to_dec(buf[5] & MONTH_MASK);
        if !(1..=12).contains(&month) {
            return Err(ClockError::InvalidField {
                field: "month",
                value: buf[5],
            });
        }
        let year = YEAR_BASE + bcd_to_dec(buf[6]) as i32;

        let date = NaiveDate::from_ymd_opt(year, month as u32, day as u32).ok_or(
            ClockError::InvalidField {
                field: "day",
                value: buf[4],
            },
        )?;
        date.and_hms_opt(hour as u32, minute as u32, second as u32)
            .ok_or(ClockError::InvalidField {
                field: "hours",
                value: buf[2],
            })
    }
}

impl<B: RtcBus> TimeSource for BcdRtc<B> {
    fn now(&mut self) -> Result<NaiveDateTime, ClockError> {
        let mut buf = [0u8; 7];
        self.bus.read_clock(&mut buf)?;
        Self::decode(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeBus {
        registers: [u8; 7],
        written: Option<[u8; 7]>,
        fail: bool,
    }

    impl RtcBus for FakeBus {
        fn read_clock(&mut self, buf: &mut [u8; 7]) -> Result<(), ClockError> {
            if self.fail {
                return Err(ClockError::Read {
                    reason: "bus nack".to_string(),
                });
            }
            *buf = self.registers;
            Ok(())
        }

        fn write_clock(&mut self, buf: &[u8; 7]) -> Result<(), ClockError> {
            self.written = Some(*buf);
            Ok(())
        }
    }

    #[test]
    fn test_bcd_helpers() {
        assert_eq!(bcd_to_dec(0x59), 59);
        assert_eq!(dec_to_bcd(59), 0x59);
        assert_eq!(bcd_to_dec(dec_to_bcd(7)), 7);
    }

    #[test]
    fn test_decode_24_hour() {
        let bus = FakeBus {
            registers: [0x30, 0x59, 0x23, 0x06, 0x28, 0x02, 0x25],
            ..Default::default()
        };
        let mut rtc = BcdRtc::new(bus);
        let time = rtc.now().unwrap();
        assert_eq!(
            time,
            NaiveDate::from_ymd_opt(2025, 2, 28)
                .unwrap()
                .and_hms_opt(23, 59, 30)
                .unwrap()
        );
    }

    #[test]
    fn test_decode_12_hour_pm() {
        // 11 PM: 12-hour flag + PM flag + BCD 11
        let bus = FakeBus {
            registers: [0x00, 0x00, HOUR_12_FLAG | HOUR_PM_FLAG | 0x11, 0x01, 0x01, 0x01, 0x25],
            ..Default::default()
        };
        let mut rtc = BcdRtc::new(bus);
        assert_eq!(rtc.now().unwrap().hour(), 23);
    }

    #[test]
    fn test_decode_12_hour_midnight() {
        // 12 AM decodes to hour 0
        let bus = FakeBus {
            registers: [0x00, 0x00, HOUR_12_FLAG | 0x12, 0x01, 0x01, 0x01, 0x25],
            ..Default::default()
        };
        let mut rtc = BcdRtc::new(bus);
        assert_eq!(rtc.now().unwrap().hour(), 0);
    }

    #[test]
    fn test_decode_invalid_seconds() {
        let bus = FakeBus {
            registers: [0x99, 0x00, 0x00, 0x01, 0x01, 0x01, 0x25],
            ..Default::default()
        };
        let mut rtc = BcdRtc::new(bus);
        assert!(matches!(
            rtc.now(),
            Err(ClockError::InvalidField {
                field: "seconds",
                ..
            })
        ));
    }

    #[test]
    fn test_read_failure_propagates() {
        let bus = FakeBus {
            fail: true,
            ..Default::default()
        };
        let mut rtc = BcdRtc::new(bus);
        assert!(matches!(rtc.now(), Err(ClockError::Read { .. })));
    }

    #[test]
    fn test_set_time_encodes_bcd() {
        let mut rtc = BcdRtc::new(FakeBus::default());
        // 2025-02-28 is a Friday
        let time = NaiveDate::from_ymd_opt(2025, 2, 28)
            .unwrap()
            .and_hms_opt(23, 59, 30)
            .unwrap();
        rtc.set_time(time).unwrap();

        let written = rtc.bus.written.unwrap();
        assert_eq!(written, [0x30, 0x59, 0x23, 0x06, 0x28, 0x02, 0x25]);
    }

    #[test]
    fn test_set_time_year_out_of_range() {
        let mut rtc = BcdRtc::new(FakeBus::default());
        let time = NaiveDate::from_ymd_opt(1999, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(matches!(
            rtc.set_time(time),
            Err(ClockError::YearOutOfRange { year: 1999 })
        ));
    }

    #[test]
    fn test_fixed_and_failing_clocks() {
        let at = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(FixedClock::new(at).now().unwrap(), at);
        assert!(FailingClock.now().is_err());
    }
}
