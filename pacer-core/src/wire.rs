//! Binary layout of the probe and feedback datagrams.
//!
//! Both messages are built out of the same 20 bytes [`Record`]:
//!
//! | Offset | Size | Field   |
//! |--------|------|---------|
//! | 0      | 4    | `seq`   |
//! | 4      | 8    | `ts`    |
//! | 12     | 8    | `value` |
//!
//! all in network byte order. A [`ProbeHeader`] is exactly one record. A
//! [`Feedback`] is a report record (receiver clock and cumulative loss)
//! followed by the record of the probe that triggered it.

use crate::Time;
use bytes::{Buf, BufMut};
use thiserror::Error;

/// Size in bytes of a single [`Record`].
pub const RECORD_SIZE: usize = 4 + 8 + 8;

/// Size in bytes of an encoded [`ProbeHeader`].
pub const PROBE_HEADER_SIZE: usize = RECORD_SIZE;

/// Size in bytes of an encoded [`Feedback`].
pub const FEEDBACK_SIZE: usize = 2 * RECORD_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("Malformed header: expecting at least {expected} bytes, got {actual}")]
    MalformedHeader { expected: usize, actual: usize },
    #[error("Cumulative lost count ({0}) does not fit in 32 bits")]
    LostOutOfRange(u64),
}

/// Reinterpret the two's-complement bit pattern of `value` as unsigned.
#[inline(always)]
pub const fn to_wire_bits(value: i64) -> u64 {
    u64::from_ne_bytes(value.to_ne_bytes())
}

/// Inverse of [`to_wire_bits`].
#[inline(always)]
pub const fn from_wire_bits(bits: u64) -> i64 {
    i64::from_ne_bytes(bits.to_ne_bytes())
}

/// The common `4 + 8 + 8` bytes layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub seq: u32,
    pub ts: i64,
    pub value: u64,
}

impl Record {
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.seq);
        buf.put_u64(to_wire_bits(self.ts));
        buf.put_u64(self.value);
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        if buf.remaining() < RECORD_SIZE {
            return Err(WireError::MalformedHeader {
                expected: RECORD_SIZE,
                actual: buf.remaining(),
            });
        }
        let seq = buf.get_u32();
        let ts = from_wire_bits(buf.get_u64());
        let value = buf.get_u64();
        Ok(Self { seq, ts, value })
    }
}

/// Header carried at the front of every probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeHeader {
    pub seq: u32,
    pub send_timestamp: Time,
    /// the pacing interval in effect when the probe was sent
    pub interval: Time,
}

impl ProbeHeader {
    pub fn new(seq: u32, send_timestamp: Time, interval: Time) -> Self {
        Self {
            seq,
            send_timestamp,
            interval,
        }
    }

    fn record(&self) -> Record {
        Record {
            seq: self.seq,
            ts: self.send_timestamp.as_nanos(),
            value: to_wire_bits(self.interval.as_nanos()),
        }
    }

    fn from_record(record: Record) -> Self {
        Self {
            seq: record.seq,
            send_timestamp: Time::from_nanos(record.ts),
            interval: Time::from_nanos(from_wire_bits(record.value)),
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        self.record().encode(buf)
    }

    pub fn to_bytes(&self) -> [u8; PROBE_HEADER_SIZE] {
        let mut bytes = [0; PROBE_HEADER_SIZE];
        self.encode(&mut bytes.as_mut_slice());
        bytes
    }

    /// Encode the header followed by zero padding up to `packet_size`
    /// bytes. A `packet_size` smaller than the header yields just the
    /// header.
    pub fn encode_with_padding(&self, packet_size: usize) -> Vec<u8> {
        let mut datagram = Vec::with_capacity(packet_size.max(PROBE_HEADER_SIZE));
        self.encode(&mut datagram);
        datagram.resize(packet_size.max(PROBE_HEADER_SIZE), 0);
        datagram
    }

    /// Decode the header from the front of `buf`, trailing bytes are
    /// left untouched.
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Record::decode(buf).map(Self::from_record)
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, WireError> {
        Self::decode(&mut bytes)
    }
}

/// Report sent back by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    /// receiver's clock reading when the report was emitted
    pub receiver_timestamp: Time,
    /// running total of losses detected by the receiver
    pub cumulative_lost: u32,
    /// header of the probe which triggered this report
    pub echo: ProbeHeader,
}

impl Feedback {
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        Record {
            seq: self.echo.seq,
            ts: self.receiver_timestamp.as_nanos(),
            value: u64::from(self.cumulative_lost),
        }
        .encode(buf);
        self.echo.encode(buf);
    }

    pub fn to_bytes(&self) -> [u8; FEEDBACK_SIZE] {
        let mut bytes = [0; FEEDBACK_SIZE];
        self.encode(&mut bytes.as_mut_slice());
        bytes
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        if buf.remaining() < FEEDBACK_SIZE {
            return Err(WireError::MalformedHeader {
                expected: FEEDBACK_SIZE,
                actual: buf.remaining(),
            });
        }
        let report = Record::decode(buf)?;
        let echo = ProbeHeader::decode(buf)?;
        let cumulative_lost =
            u32::try_from(report.value).map_err(|_| WireError::LostOutOfRange(report.value))?;

        Ok(Self {
            receiver_timestamp: Time::from_nanos(report.ts),
            cumulative_lost,
            echo,
        })
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, WireError> {
        Self::decode(&mut bytes)
    }
}
