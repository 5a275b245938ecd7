//! ## RTP: A Transport Protocol for Real-Time Applications (RTP/RTCP)
//!
//! [RFC3550]: https://tools.ietf.org/html/rfc3550
//! [Section 5]: https://tools.ietf.org/html/rfc3550#section-5
//! [Section 6]: https://tools.ietf.org/html/rfc3550#section-6
//!
//! RTP provides end-to-end network transport functions suitable for
//! applications transmitting real-time data, such as audio, video or
//! simulation data, over multicast or unicast network services.  The
//! data transport is augmented by a control protocol (RTCP) to allow
//! monitoring of the data delivery in a manner scalable to large
//! multicast networks, and to provide minimal control and
//! identification functionality.  The RTP data packet format is
//! described in [Section 5], the RTCP control packet formats in
//! [Section 6].
//!
//! This crate carries the wire representation only: the fixed 12-byte
//! RTP data header and the four RTCP control packet kinds (SR, RR,
//! SDES, BYE) together with their compound container.  Session state
//! and report scheduling live one layer up.

pub mod rtcp;
pub mod rtp;

use std::{array::TryFromSliceError, str::Utf8Error};

#[derive(Debug)]
pub enum Error {
    InvalidInput,
    UnknownPacketKind,
    UnknownSdesKind,
    InvalidVersion,
    TooManyReports,
    TooManyChunks,
    Utf8Error(Utf8Error),
    TryFromSliceError(TryFromSliceError),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

impl From<TryFromSliceError> for Error {
    fn from(value: TryFromSliceError) -> Self {
        Self::TryFromSliceError(value)
    }
}
