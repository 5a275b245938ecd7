use crate::Error;

use super::report::{RECEPTION_REPORT_SIZE, ReceptionReport};

/// # RR: Receiver Report RTCP Packet
///
/// ```text
///        0                   1                   2                   3
///        0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// header |V=2|P|    RC   |   PT=RR=201   |             length            |
///        +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///        |                     SSRC of packet sender                     |
///        +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// report |                 SSRC_1 (SSRC of first source)                 |
/// block  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///   1    :                               ...                             :
///        +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// ```
///
/// The format of the receiver report (RR) packet is the same as that
/// of the SR packet except that the packet type field contains the
/// constant 201 and the five words of sender information are omitted.
/// The remaining fields have the same meaning as for the SR packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverReport {
    /// SSRC: 32 bits
    /// The synchronization source identifier for the originator of
    /// this RR packet.
    pub ssrc: u32,
    reports: Vec<ReceptionReport>,
}

impl ReceiverReport {
    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrc,
            reports: Vec::new(),
        }
    }

    pub fn reports(&self) -> &[ReceptionReport] {
        &self.reports
    }

    /// Append a reception report block.  The reception report count
    /// (RC) field is 5 bits wide, so a packet carries at most 31
    /// blocks.
    pub fn add_reception_report(&mut self, report: ReceptionReport) -> Result<(), Error> {
        if self.reports.len() >= 31 {
            return Err(Error::TooManyReports);
        }

        self.reports.push(report);
        Ok(())
    }

    /// Encoded size of the packet, header included.  Each appended
    /// block adds a fixed 24 bytes.
    pub fn len(&self) -> usize {
        8 + self.reports.len() * RECEPTION_REPORT_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub(super) fn decode(count: u8, body: &[u8]) -> Result<Self, Error> {
        if body.len() < 4 + count as usize * RECEPTION_REPORT_SIZE {
            return Err(Error::InvalidInput);
        }

        let mut this = Self::new(u32::from_be_bytes(body[0..4].try_into()?));
        for i in 0..count as usize {
            let offset = 4 + i * RECEPTION_REPORT_SIZE;
            this.reports.push(ReceptionReport::decode(&body[offset..])?);
        }

        Ok(this)
    }
}
