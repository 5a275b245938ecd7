use crate::Error;

use super::report::{RECEPTION_REPORT_SIZE, SENDER_INFO_SIZE, ReceptionReport, SenderInfo};

/// # SR: Sender Report RTCP Packet
///
/// ```text
///        0                   1                   2                   3
///        0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// header |V=2|P|    RC   |   PT=SR=200   |             length            |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                         SSRC of sender                        |
///        +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// sender |              NTP timestamp, most significant word             |
/// info   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |             NTP timestamp, least significant word             |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                         RTP timestamp                         |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                     sender's packet count                     |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                      sender's octet count                     |
///        +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// report |                 SSRC_1 (SSRC of first source)                 |
/// block  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///   1    :                               ...                             :
///        +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// ```
///
/// The sender report packet consists of three sections: the header,
/// the 20-octet sender information summarizing the data transmissions
/// from this sender, and zero or more reception report blocks
/// conveying statistics on the reception of RTP packets from other
/// sources heard by this sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderReport {
    /// SSRC: 32 bits
    /// The synchronization source identifier for the originator of
    /// this SR packet.
    pub ssrc: u32,
    pub sender_info: SenderInfo,
    reports: Vec<ReceptionReport>,
}

impl SenderReport {
    pub fn new(ssrc: u32, sender_info: SenderInfo) -> Self {
        Self {
            ssrc,
            sender_info,
            reports: Vec::new(),
        }
    }

    pub fn reports(&self) -> &[ReceptionReport] {
        &self.reports
    }

    /// Append a reception report block, at most 31 per packet.
    pub fn add_reception_report(&mut self, report: ReceptionReport) -> Result<(), Error> {
        if self.reports.len() >= 31 {
            return Err(Error::TooManyReports);
        }

        self.reports.push(report);
        Ok(())
    }

    /// Encoded size of the packet, header included.
    pub fn len(&self) -> usize {
        8 + SENDER_INFO_SIZE + self.reports.len() * RECEPTION_REPORT_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub(super) fn decode(count: u8, body: &[u8]) -> Result<Self, Error> {
        if body.len() < 4 + SENDER_INFO_SIZE + count as usize * RECEPTION_REPORT_SIZE {
            return Err(Error::InvalidInput);
        }

        let mut this = Self::new(
            u32::from_be_bytes(body[0..4].try_into()?),
            SenderInfo::decode(&body[4..])?,
        );

        for i in 0..count as usize {
            let offset = 4 + SENDER_INFO_SIZE + i * RECEPTION_REPORT_SIZE;
            this.reports.push(ReceptionReport::decode(&body[offset..])?);
        }

        Ok(this)
    }
}
