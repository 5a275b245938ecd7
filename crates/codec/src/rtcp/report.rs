use bytes::{BufMut, BytesMut};

use crate::Error;

/// Encoded size of the sender info block carried by every SR.
pub const SENDER_INFO_SIZE: usize = 20;

/// Encoded size of one reception report block.
pub const RECEPTION_REPORT_SIZE: usize = 24;

/// The second section of an SR, the sender information, is 20 octets
/// long and is present in every sender report packet.  It summarizes
/// the data transmissions from this sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderInfo {
    /// NTP timestamp: 64 bits
    /// Indicates the wallclock time when this report was sent so that
    /// it may be used in combination with timestamps returned in
    /// reception reports from other receivers to measure round-trip
    /// propagation to those receivers.
    pub ntp_timestamp: u64,
    /// RTP timestamp: 32 bits
    /// Corresponds to the same time as the NTP timestamp (above), but
    /// in the same units and with the same random offset as the RTP
    /// timestamps in data packets.
    pub rtp_timestamp: u32,
    /// sender's packet count: 32 bits
    /// The total number of RTP data packets transmitted by the sender
    /// since starting transmission up until the time this SR packet
    /// was generated.
    pub packet_count: u32,
    /// sender's octet count: 32 bits
    /// The total number of payload octets (i.e., not including header
    /// or padding) transmitted in RTP data packets by the sender since
    /// starting transmission.  This field can be used to estimate the
    /// average payload data rate.
    pub byte_count: u32,
}

impl SenderInfo {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.put_u64(self.ntp_timestamp);
        bytes.put_u32(self.rtp_timestamp);
        bytes.put_u32(self.packet_count);
        bytes.put_u32(self.byte_count);
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < SENDER_INFO_SIZE {
            return Err(Error::InvalidInput);
        }

        Ok(Self {
            ntp_timestamp: u64::from_be_bytes(buf[0..8].try_into()?),
            rtp_timestamp: u32::from_be_bytes(buf[8..12].try_into()?),
            packet_count: u32::from_be_bytes(buf[12..16].try_into()?),
            byte_count: u32::from_be_bytes(buf[16..20].try_into()?),
        })
    }
}

/// # Reception report block
///
/// ```text
///     0                   1                   2                   3
///     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |                 SSRC_1 (SSRC of first source)                 |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    | fraction lost |       cumulative number of packets lost       |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |           extended highest sequence number received           |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |                      interarrival jitter                      |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |                         last SR (LSR)                         |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |                   delay since last SR (DLSR)                  |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Each reception report block conveys statistics on the reception of
/// RTP packets from a single synchronization source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceptionReport {
    /// SSRC_n (source identifier): 32 bits
    /// The SSRC identifier of the source to which the information in
    /// this reception report block pertains.
    pub ssrc: u32,
    /// fraction lost: 8 bits
    /// The fraction of RTP data packets from source SSRC_n lost since
    /// the previous SR or RR packet was sent, expressed as a fixed
    /// point number with the binary point at the left edge of the
    /// field.
    pub fraction_lost: u8,
    /// cumulative number of packets lost: 24 bits
    /// The total number of RTP data packets from source SSRC_n that
    /// have been lost since the beginning of reception.  This number
    /// may be negative if there are duplicates.
    pub cumulative_lost: i32,
    /// extended highest sequence number received: 32 bits
    /// The low 16 bits contain the highest sequence number received in
    /// an RTP data packet from source SSRC_n, and the most significant
    /// 16 bits extend that sequence number with the corresponding
    /// count of sequence number cycles.
    pub extended_highest_sequence_number: u32,
    /// interarrival jitter: 32 bits
    /// An estimate of the statistical variance of the RTP data packet
    /// interarrival time, measured in timestamp units and expressed as
    /// an unsigned integer.
    pub jitter: u32,
    /// last SR timestamp (LSR): 32 bits
    /// The middle 32 bits out of 64 in the NTP timestamp received as
    /// part of the most recent RTCP sender report (SR) packet from
    /// source SSRC_n.  If no SR has been received yet, the field is
    /// set to zero.
    pub last_sr: u32,
    /// delay since last SR (DLSR): 32 bits
    /// The delay, expressed in units of 1/65536 seconds, between
    /// receiving the last SR packet from source SSRC_n and sending
    /// this reception report block.
    pub delay_since_last_sr: u32,
}

impl ReceptionReport {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.put_u32(self.ssrc);
        bytes.put_u8(self.fraction_lost);

        // cumulative lost is a 24-bit signed quantity on the wire.
        let lost = self.cumulative_lost.clamp(-(1 << 23), (1 << 23) - 1) as u32;
        bytes.put_u8((lost >> 16) as u8);
        bytes.put_u8((lost >> 8) as u8);
        bytes.put_u8(lost as u8);

        bytes.put_u32(self.extended_highest_sequence_number);
        bytes.put_u32(self.jitter);
        bytes.put_u32(self.last_sr);
        bytes.put_u32(self.delay_since_last_sr);
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < RECEPTION_REPORT_SIZE {
            return Err(Error::InvalidInput);
        }

        // Sign-extend the 24-bit cumulative lost field.
        let lost = u32::from_be_bytes([0, buf[5], buf[6], buf[7]]);
        let cumulative_lost = if lost & 0x0080_0000 != 0 {
            (lost | 0xFF00_0000) as i32
        } else {
            lost as i32
        };

        Ok(Self {
            ssrc: u32::from_be_bytes(buf[0..4].try_into()?),
            fraction_lost: buf[4],
            cumulative_lost,
            extended_highest_sequence_number: u32::from_be_bytes(buf[8..12].try_into()?),
            jitter: u32::from_be_bytes(buf[12..16].try_into()?),
            last_sr: u32::from_be_bytes(buf[16..20].try_into()?),
            delay_since_last_sr: u32::from_be_bytes(buf[20..24].try_into()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reception_report_negative_cumulative_lost() {
        let report = ReceptionReport {
            ssrc: 1,
            fraction_lost: 0,
            cumulative_lost: -5,
            extended_highest_sequence_number: 100,
            jitter: 0,
            last_sr: 0,
            delay_since_last_sr: 0,
        };

        let mut bytes = BytesMut::new();
        report.encode(&mut bytes);

        assert_eq!(bytes.len(), RECEPTION_REPORT_SIZE);
        assert_eq!(ReceptionReport::decode(&bytes).unwrap(), report);
    }
}
