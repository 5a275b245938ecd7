pub mod bye;
pub mod header;
pub mod report;
pub mod rr;
pub mod sdes;
pub mod sr;

use bytes::{BufMut, BytesMut};

use crate::Error;

use self::{
    bye::Goodbye,
    header::{HEADER_SIZE, Header, PacketKind},
    rr::ReceiverReport,
    sdes::SourceDescription,
    sr::SenderReport,
};

/// One individual RTCP packet.
///
/// The RTCP packet kinds form a closed set; dispatching on the packet
/// type byte selects the variant.  Each variant owns its body, so
/// moving a packet between containers transfers ownership of the
/// nested reports and chunks with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpPacket {
    SenderReport(SenderReport),
    ReceiverReport(ReceiverReport),
    SourceDescription(SourceDescription),
    Goodbye(Goodbye),
}

impl RtcpPacket {
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::SenderReport(_) => PacketKind::SenderReport,
            Self::ReceiverReport(_) => PacketKind::ReceiverReport,
            Self::SourceDescription(_) => PacketKind::SourceDescription,
            Self::Goodbye(_) => PacketKind::Goodbye,
        }
    }

    /// Encoded size of the packet, header included.
    pub fn len(&self) -> usize {
        match self {
            Self::SenderReport(sr) => sr.len(),
            Self::ReceiverReport(rr) => rr.len(),
            Self::SourceDescription(sdes) => sdes.len(),
            Self::Goodbye(bye) => bye.len(),
        }
    }

    fn count(&self) -> u8 {
        match self {
            Self::SenderReport(sr) => sr.reports().len() as u8,
            Self::ReceiverReport(rr) => rr.reports().len() as u8,
            Self::SourceDescription(sdes) => sdes.chunks().len() as u8,
            Self::Goodbye(_) => 1,
        }
    }

    pub fn encode(&self, bytes: &mut BytesMut) {
        Header {
            padding: false,
            count: self.count(),
            kind: self.kind(),
        }
        .encode(self.len(), bytes);

        match self {
            Self::SenderReport(sr) => {
                bytes.put_u32(sr.ssrc);
                sr.sender_info.encode(bytes);
                for report in sr.reports() {
                    report.encode(bytes);
                }
            }
            Self::ReceiverReport(rr) => {
                bytes.put_u32(rr.ssrc);
                for report in rr.reports() {
                    report.encode(bytes);
                }
            }
            Self::SourceDescription(sdes) => {
                for chunk in sdes.chunks() {
                    chunk.encode(bytes);
                }
            }
            Self::Goodbye(bye) => {
                bytes.put_u32(bye.ssrc);
            }
        }
    }

    /// Decode one packet from the start of `buf`.  `buf` must cover
    /// the whole packet as declared by the length field; the caller is
    /// expected to have sized it with [`Header::peek_len`].
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let header = Header::decode(buf)?;
        let size = Header::peek_len(buf);
        if buf.len() < size {
            return Err(Error::InvalidInput);
        }

        let body = &buf[HEADER_SIZE..size];

        Ok(match header.kind {
            PacketKind::SenderReport => Self::SenderReport(SenderReport::decode(header.count, body)?),
            PacketKind::ReceiverReport => {
                Self::ReceiverReport(ReceiverReport::decode(header.count, body)?)
            }
            PacketKind::SourceDescription => {
                Self::SourceDescription(SourceDescription::decode(header.count, body)?)
            }
            PacketKind::Goodbye => Self::Goodbye(Goodbye::decode(body)?),
        })
    }
}

/// # Compound RTCP packet
///
/// All RTCP packets MUST be sent in a compound packet of at least two
/// individual packets: the first MUST always be a report packet (SR or
/// RR), followed by an SDES containing a CNAME, with BYE last when the
/// sender is leaving.  The ordering rule is a property of the sender;
/// it is not enforced at encode time, mirroring the wire format's own
/// tolerance on receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundPacket {
    packets: Vec<RtcpPacket>,
}

impl CompoundPacket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> &[RtcpPacket] {
        &self.packets
    }

    pub fn into_packets(self) -> Vec<RtcpPacket> {
        self.packets
    }

    /// Append a sub-packet; the compound's total length grows by the
    /// sub-packet's encoded length.
    pub fn push(&mut self, packet: RtcpPacket) {
        self.packets.push(packet);
    }

    /// Encoded size of the whole compound: the sum of its sub-packet
    /// lengths.
    pub fn len(&self) -> usize {
        self.packets.iter().map(|packet| packet.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use rtp_endpoint_codec::rtcp::{CompoundPacket, RtcpPacket};
    /// use rtp_endpoint_codec::rtcp::bye::Goodbye;
    /// use rtp_endpoint_codec::rtcp::report::SenderInfo;
    /// use rtp_endpoint_codec::rtcp::sdes::{SdesChunk, SdesItem, SourceDescription};
    /// use rtp_endpoint_codec::rtcp::sr::SenderReport;
    ///
    /// let mut compound = CompoundPacket::new();
    /// compound.push(RtcpPacket::SenderReport(SenderReport::new(
    ///     0x79266955,
    ///     SenderInfo {
    ///         ntp_timestamp: 0xe8e2e217_d42f0591,
    ///         rtp_timestamp: 0x3601b0af,
    ///         packet_count: 0x3485785e,
    ///         byte_count: 0x2dbc2a98,
    ///     },
    /// )));
    ///
    /// let mut chunk = SdesChunk::new(0x79266955);
    /// chunk.add_item(SdesItem::cname("panda"));
    /// let mut sdes = SourceDescription::new();
    /// sdes.add_chunk(chunk).unwrap();
    /// compound.push(RtcpPacket::SourceDescription(sdes));
    /// compound.push(RtcpPacket::Goodbye(Goodbye { ssrc: 0x79266955 }));
    ///
    /// let mut bytes = BytesMut::with_capacity(1500);
    /// compound.encode(&mut bytes);
    ///
    /// assert_eq!(bytes.len(), compound.len());
    /// assert_eq!(
    ///     &bytes[..],
    ///     &[
    ///         0x80, 0xc8, 0x00, 0x06, 0x79, 0x26, 0x69, 0x55,
    ///         0xe8, 0xe2, 0xe2, 0x17, 0xd4, 0x2f, 0x05, 0x91,
    ///         0x36, 0x01, 0xb0, 0xaf, 0x34, 0x85, 0x78, 0x5e,
    ///         0x2d, 0xbc, 0x2a, 0x98, 0x81, 0xca, 0x00, 0x03,
    ///         0x79, 0x26, 0x69, 0x55, 0x01, 0x05, 0x70, 0x61,
    ///         0x6e, 0x64, 0x61, 0x00, 0x81, 0xcb, 0x00, 0x01,
    ///         0x79, 0x26, 0x69, 0x55,
    ///     ]
    /// );
    /// ```
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        for packet in &self.packets {
            packet.encode(bytes);
        }
    }

    /// # Test
    ///
    /// ```
    /// use rtp_endpoint_codec::rtcp::CompoundPacket;
    /// use rtp_endpoint_codec::rtcp::header::PacketKind;
    ///
    /// let buffer = [
    ///     0x80, 0xc8, 0x00, 0x06, 0x79, 0x26, 0x69, 0x55,
    ///     0xe8, 0xe2, 0xe2, 0x17, 0xd4, 0x2f, 0x05, 0x91,
    ///     0x36, 0x01, 0xb0, 0xaf, 0x34, 0x85, 0x78, 0x5e,
    ///     0x2d, 0xbc, 0x2a, 0x98, 0x81, 0xcb, 0x00, 0x01,
    ///     0x79, 0x26, 0x69, 0x55,
    /// ];
    ///
    /// let compound = CompoundPacket::decode(&buffer).unwrap();
    ///
    /// assert_eq!(compound.packets().len(), 2);
    /// assert_eq!(compound.packets()[0].kind(), PacketKind::SenderReport);
    /// assert_eq!(compound.packets()[1].kind(), PacketKind::Goodbye);
    /// ```
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let mut packets = Vec::with_capacity(4);
        let mut offset = 0;

        while offset < buf.len() {
            if buf.len() - offset < HEADER_SIZE {
                return Err(Error::InvalidInput);
            }

            let size = Header::peek_len(&buf[offset..]);
            if offset + size > buf.len() {
                return Err(Error::InvalidInput);
            }

            packets.push(RtcpPacket::decode(&buf[offset..offset + size])?);
            offset += size;
        }

        Ok(Self { packets })
    }
}

#[cfg(test)]
mod tests {
    use super::report::{ReceptionReport, SenderInfo};
    use super::sdes::SdesItem;
    use super::sdes::SdesChunk;
    use super::*;

    fn report(ssrc: u32) -> ReceptionReport {
        ReceptionReport {
            ssrc,
            fraction_lost: 12,
            cumulative_lost: 34,
            extended_highest_sequence_number: 0x0001_0002,
            jitter: 7,
            last_sr: 0xe2e217d4,
            delay_since_last_sr: 0x0001_0000,
        }
    }

    #[test]
    fn length_grows_with_each_append() {
        let mut rr = ReceiverReport::new(1);
        assert_eq!(rr.len(), 8);

        for i in 0..31 {
            rr.add_reception_report(report(i)).unwrap();
            assert_eq!(rr.len(), 8 + (i as usize + 1) * 24);
        }

        assert!(rr.add_reception_report(report(31)).is_err());
    }

    #[test]
    fn compound_length_is_sum_of_parts() {
        let mut compound = CompoundPacket::new();
        let mut expected = 0;

        let mut rr = ReceiverReport::new(1);
        rr.add_reception_report(report(2)).unwrap();
        expected += rr.len();
        compound.push(RtcpPacket::ReceiverReport(rr));
        assert_eq!(compound.len(), expected);

        let mut chunk = SdesChunk::new(1);
        chunk.add_item(SdesItem::cname("panda@localhost"));
        let mut sdes = SourceDescription::new();
        sdes.add_chunk(chunk).unwrap();
        expected += sdes.len();
        compound.push(RtcpPacket::SourceDescription(sdes));
        assert_eq!(compound.len(), expected);

        compound.push(RtcpPacket::Goodbye(Goodbye { ssrc: 1 }));
        assert_eq!(compound.len(), expected + 8);
    }

    #[test]
    fn compound_round_trip() {
        let mut sr = SenderReport::new(
            0xdeadbeef,
            SenderInfo {
                ntp_timestamp: 0x0123_4567_89ab_cdef,
                rtp_timestamp: 16000,
                packet_count: 10,
                byte_count: 1400,
            },
        );
        sr.add_reception_report(report(0xcafe)).unwrap();

        let mut chunk = SdesChunk::new(0xdeadbeef);
        chunk.add_item(SdesItem::cname("panda@raspberry"));
        let mut sdes = SourceDescription::new();
        sdes.add_chunk(chunk).unwrap();

        let mut compound = CompoundPacket::new();
        compound.push(RtcpPacket::SenderReport(sr));
        compound.push(RtcpPacket::SourceDescription(sdes));
        compound.push(RtcpPacket::Goodbye(Goodbye { ssrc: 0xdeadbeef }));

        let mut bytes = BytesMut::with_capacity(1500);
        compound.encode(&mut bytes);
        assert_eq!(bytes.len(), compound.len());

        let decoded = CompoundPacket::decode(&bytes).unwrap();
        assert_eq!(decoded, compound);
    }

    #[test]
    fn truncated_compound_is_rejected() {
        let mut compound = CompoundPacket::new();
        compound.push(RtcpPacket::ReceiverReport(ReceiverReport::new(1)));

        let mut bytes = BytesMut::new();
        compound.encode(&mut bytes);

        assert!(CompoundPacket::decode(&bytes[..bytes.len() - 1]).is_err());
    }
}
