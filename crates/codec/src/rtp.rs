use bytes::{BufMut, Bytes, BytesMut};

use super::Error;

/// The fixed RTP data header is always 12 bytes long because this
/// implementation never emits contributing sources (CC = 0).
pub const HEADER_SIZE: usize = 12;

const VERSION_MASK: u8 = 0b11000000;
const PADDING_MASK: u8 = 0b00100000;
const EXTENSION_MASK: u8 = 0b00010000;
const CSRC_COUNT_MASK: u8 = 0b00001111;
const MARKER_MASK: u8 = 0b10000000;
const PAYLOAD_TYPE_MASK: u8 = 0b01111111;

/// # RTP Fixed Header Fields
///
/// ```text
///     0                   1                   2                   3
///     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |V=2|P|X|  CC   |M|     PT      |       sequence number         |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |                           timestamp                           |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |           synchronization source (SSRC) identifier            |
///    +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// ```
///
/// The first twelve octets are present in every RTP packet, while the
/// list of CSRC identifiers is present only when inserted by a mixer.
/// Mixers are out of scope here, so the CSRC count is always zero and
/// the header is always twelve bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// padding (P): 1 bit
    /// If the padding bit is set, the packet contains one or more
    /// additional padding octets at the end which are not part of the
    /// payload.
    pub padding: bool,
    /// extension (X): 1 bit
    /// If the extension bit is set, the fixed header MUST be followed
    /// by exactly one header extension.  Extensions are carried
    /// opaquely; this implementation never emits one.
    pub extension: bool,
    /// marker (M): 1 bit
    /// The interpretation of the marker is defined by a profile.  It
    /// is intended to allow significant events such as frame
    /// boundaries to be marked in the packet stream.
    pub marker: bool,
    /// payload type (PT): 7 bits
    /// This field identifies the format of the RTP payload and
    /// determines its interpretation by the application.
    pub payload_type: u8,
    /// sequence number: 16 bits
    /// The sequence number increments by one for each RTP data packet
    /// sent, and may be used by the receiver to detect packet loss and
    /// to restore packet sequence.
    pub sequence_number: u16,
    /// timestamp: 32 bits
    /// The timestamp reflects the sampling instant of the first octet
    /// in the RTP data packet.  The sampling instant MUST be derived
    /// from a clock that increments monotonically and linearly in time.
    pub timestamp: u32,
    /// SSRC: 32 bits
    /// The SSRC field identifies the synchronization source.  This
    /// identifier SHOULD be chosen randomly, with the intent that no
    /// two synchronization sources within the same RTP session will
    /// have the same SSRC identifier.
    pub ssrc: u32,
    pub payload: Bytes,
}

impl RtpPacket {
    /// Encoded size of the packet: fixed header plus payload.
    pub fn len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// # Test
    ///
    /// ```
    /// use bytes::{Bytes, BytesMut};
    /// use rtp_endpoint_codec::rtp::RtpPacket;
    ///
    /// let packet = RtpPacket {
    ///     padding: false,
    ///     extension: false,
    ///     marker: true,
    ///     payload_type: 96,
    ///     sequence_number: 1,
    ///     timestamp: 16000,
    ///     ssrc: 0x79266955,
    ///     payload: Bytes::from_static(b"panda"),
    /// };
    ///
    /// let mut bytes = BytesMut::with_capacity(1500);
    /// packet.encode(&mut bytes);
    ///
    /// assert_eq!(
    ///     &bytes[..],
    ///     &[
    ///         0x80, 0xe0, 0x00, 0x01, 0x00, 0x00, 0x3e, 0x80,
    ///         0x79, 0x26, 0x69, 0x55, 0x70, 0x61, 0x6e, 0x64,
    ///         0x61,
    ///     ]
    /// );
    /// ```
    pub fn encode(&self, bytes: &mut BytesMut) {
        let mut first = 2 << 6;
        if self.padding {
            first |= PADDING_MASK;
        }

        if self.extension {
            first |= EXTENSION_MASK;
        }

        bytes.put_u8(first);
        bytes.put_u8(if self.marker { MARKER_MASK } else { 0 } | (self.payload_type & PAYLOAD_TYPE_MASK));
        bytes.put_u16(self.sequence_number);
        bytes.put_u32(self.timestamp);
        bytes.put_u32(self.ssrc);
        bytes.extend_from_slice(&self.payload);
    }

    /// # Test
    ///
    /// ```
    /// use rtp_endpoint_codec::rtp::RtpPacket;
    ///
    /// let buffer = [
    ///     0x80, 0xe0, 0x00, 0x01, 0x00, 0x00, 0x3e, 0x80,
    ///     0x79, 0x26, 0x69, 0x55, 0x70, 0x61, 0x6e, 0x64,
    ///     0x61,
    /// ];
    ///
    /// let packet = RtpPacket::decode(&buffer).unwrap();
    ///
    /// assert_eq!(packet.marker, true);
    /// assert_eq!(packet.payload_type, 96);
    /// assert_eq!(packet.sequence_number, 1);
    /// assert_eq!(packet.timestamp, 16000);
    /// assert_eq!(packet.ssrc, 0x79266955);
    /// assert_eq!(&packet.payload[..], b"panda");
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::InvalidInput);
        }

        if (bytes[0] & VERSION_MASK) >> 6 != 2 {
            return Err(Error::InvalidVersion);
        }

        // Mixers insert contributing sources; this endpoint is not a
        // mixer, so any CSRC list is treated as malformed input.
        if bytes[0] & CSRC_COUNT_MASK != 0 {
            return Err(Error::InvalidInput);
        }

        Ok(Self {
            padding: bytes[0] & PADDING_MASK != 0,
            extension: bytes[0] & EXTENSION_MASK != 0,
            marker: bytes[1] & MARKER_MASK != 0,
            payload_type: bytes[1] & PAYLOAD_TYPE_MASK,
            sequence_number: u16::from_be_bytes(bytes[2..4].try_into()?),
            timestamp: u32::from_be_bytes(bytes[4..8].try_into()?),
            ssrc: u32::from_be_bytes(bytes[8..12].try_into()?),
            payload: Bytes::copy_from_slice(&bytes[HEADER_SIZE..]),
        })
    }
}
