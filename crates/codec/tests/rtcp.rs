use anyhow::Result;
use bytes::BytesMut;
use rtp_endpoint_codec::rtcp::{
    CompoundPacket, RtcpPacket,
    bye::Goodbye,
    report::SenderInfo,
    sdes::{SdesChunk, SdesItem, SdesItemKind, SourceDescription},
    sr::SenderReport,
};

#[rustfmt::skip]
const SR_SDES_BYE: &[u8] = &[
    // SR, no reception reports
    0x80, 0xc8, 0x00, 0x06, 0x79, 0x26, 0x69, 0x55,
    0xe8, 0xe2, 0xe2, 0x17, 0xd4, 0x2f, 0x05, 0x91,
    0x36, 0x01, 0xb0, 0xaf, 0x34, 0x85, 0x78, 0x5e,
    0x2d, 0xbc, 0x2a, 0x98,
    // SDES, one chunk, CNAME "panda"
    0x81, 0xca, 0x00, 0x03, 0x79, 0x26, 0x69, 0x55,
    0x01, 0x05, 0x70, 0x61, 0x6e, 0x64, 0x61, 0x00,
    // BYE
    0x81, 0xcb, 0x00, 0x01, 0x79, 0x26, 0x69, 0x55,
];

#[test]
fn test_rtp_endpoint_codec() -> Result<()> {
    let compound = CompoundPacket::decode(SR_SDES_BYE)?;
    assert_eq!(compound.packets().len(), 3);

    {
        let RtcpPacket::SenderReport(sr) = &compound.packets()[0] else {
            return Err(anyhow::anyhow!("Expected SenderReport"));
        };

        assert_eq!(sr.ssrc, 0x79266955);
        assert_eq!(sr.sender_info.ntp_timestamp, 0xe8e2e217_d42f0591);
        assert_eq!(sr.sender_info.rtp_timestamp, 0x3601b0af);
        assert_eq!(sr.sender_info.packet_count, 0x3485785e);
        assert_eq!(sr.sender_info.byte_count, 0x2dbc2a98);
        assert_eq!(sr.reports().len(), 0);
    }

    {
        let RtcpPacket::SourceDescription(sdes) = &compound.packets()[1] else {
            return Err(anyhow::anyhow!("Expected SourceDescription"));
        };

        assert_eq!(sdes.chunks().len(), 1);
        assert_eq!(sdes.chunks()[0].ssrc, 0x79266955);
        assert_eq!(
            sdes.chunks()[0].item(SdesItemKind::Cname).unwrap().content,
            "panda"
        );
    }

    {
        let RtcpPacket::Goodbye(bye) = &compound.packets()[2] else {
            return Err(anyhow::anyhow!("Expected Goodbye"));
        };

        assert_eq!(bye.ssrc, 0x79266955);
    }

    // Re-encoding the decoded compound reproduces the original bytes
    // in the original order.
    let mut bytes = BytesMut::with_capacity(1500);
    compound.encode(&mut bytes);
    assert_eq!(&bytes[..], SR_SDES_BYE);

    Ok(())
}

#[test]
fn test_build_then_decode() -> Result<()> {
    let mut chunk = SdesChunk::new(0x79266955);
    chunk.add_item(SdesItem::cname("panda"));
    let mut sdes = SourceDescription::new();
    sdes.add_chunk(chunk)?;

    let mut compound = CompoundPacket::new();
    compound.push(RtcpPacket::SenderReport(SenderReport::new(
        0x79266955,
        SenderInfo {
            ntp_timestamp: 0xe8e2e217_d42f0591,
            rtp_timestamp: 0x3601b0af,
            packet_count: 0x3485785e,
            byte_count: 0x2dbc2a98,
        },
    )));
    compound.push(RtcpPacket::SourceDescription(sdes));
    compound.push(RtcpPacket::Goodbye(Goodbye { ssrc: 0x79266955 }));

    let mut bytes = BytesMut::with_capacity(1500);
    compound.encode(&mut bytes);

    assert_eq!(&bytes[..], SR_SDES_BYE);
    assert_eq!(CompoundPacket::decode(&bytes)?, compound);

    Ok(())
}
