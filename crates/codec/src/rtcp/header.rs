use bytes::{BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::Error;

const VERSION_MASK: u8 = 0b11000000;
const PADDING_MASK: u8 = 0b00100000;
const COUNT_MASK: u8 = 0b00011111;

/// The size of the common RTCP header shared by every packet kind.
pub const HEADER_SIZE: usize = 4;

/// packet type (PT): 8 bits
///
/// Identifies the RTCP packet kind.  The four kinds handled by this
/// implementation are the mandatory minimum defined in rfc3550
/// section-6.1; APP (204) and the extended report types are not
/// carried.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum PacketKind {
    SenderReport = 200,
    ReceiverReport = 201,
    SourceDescription = 202,
    Goodbye = 203,
}

/// # RTCP common header
///
/// ```text
///     0                   1                   2                   3
///     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |V=2|P|  count  |      PT       |             length            |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// padding (P): 1 bit
    /// If the padding bit is set, this individual RTCP packet contains
    /// some additional padding octets at the end which are not part of
    /// the control information but are included in the length field.
    /// In a compound RTCP packet, padding MUST only be added to the
    /// last individual packet per rfc3550 section-9.1.
    pub padding: bool,
    /// count: 5 bits
    /// The number of reception report blocks (SR/RR), chunks (SDES) or
    /// sources (BYE) contained in this packet.  A value of zero is
    /// valid.
    pub count: u8,
    /// packet type (PT): 8 bits
    pub kind: PacketKind,
}

impl Header {
    /// length: 16 bits
    /// The length of this RTCP packet in 32-bit words minus one,
    /// including the header and any padding.  (The offset of one makes
    /// zero a valid length and avoids a possible infinite loop in
    /// scanning a compound RTCP packet, while counting 32-bit words
    /// avoids a validity check for a multiple of 4.)
    ///
    /// # Test
    ///
    /// ```
    /// use rtp_endpoint_codec::rtcp::header::Header;
    ///
    /// let buffer = [
    ///     0x80, 0xc8, 0x00, 0x06, 0x79, 0x26, 0x69, 0x55,
    ///     0xe8, 0xe2, 0xe2, 0x17, 0xd4, 0x2f, 0x05, 0x91,
    ///     0x36, 0x01, 0xb0, 0xaf, 0x34, 0x85, 0x78, 0x5e,
    ///     0x2d, 0xbc, 0x2a, 0x98,
    /// ];
    ///
    /// assert_eq!(Header::peek_len(&buffer), 28);
    /// ```
    pub fn peek_len(buf: &[u8]) -> usize {
        assert!(buf.len() >= 4);
        let size = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        (size + 1) * 4
    }

    /// Write the header of a packet whose total encoded size is
    /// `size` bytes.  `size` must be a multiple of four.
    pub fn encode(&self, size: usize, bytes: &mut BytesMut) {
        debug_assert!(size % 4 == 0);

        let mut first = 2 << 6;
        if self.padding {
            first |= PADDING_MASK;
        }

        bytes.put_u8(first | (self.count & COUNT_MASK));
        bytes.put_u8(self.kind.into());
        bytes.put_u16((size / 4 - 1) as u16);
    }

    /// # Test
    ///
    /// ```
    /// use rtp_endpoint_codec::rtcp::header::{Header, PacketKind};
    ///
    /// let buffer = [
    ///     0x80, 0xc8, 0x00, 0x06, 0x79, 0x26, 0x69, 0x55,
    /// ];
    ///
    /// let header = Header::decode(&buffer).unwrap();
    ///
    /// assert_eq!(header.padding, false);
    /// assert_eq!(header.count, 0);
    /// assert_eq!(header.kind, PacketKind::SenderReport);
    /// ```
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::InvalidInput);
        }

        if (buf[0] & VERSION_MASK) >> 6 != 2 {
            return Err(Error::InvalidVersion);
        }

        Ok(Self {
            padding: (buf[0] & PADDING_MASK) != 0,
            count: buf[0] & COUNT_MASK,
            kind: PacketKind::try_from(buf[1]).map_err(|_| Error::UnknownPacketKind)?,
        })
    }
}
