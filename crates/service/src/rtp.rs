use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use codec::rtp::RtpPacket;
use rand::Rng;

use crate::SessionHandler;
use crate::rtcp::{RtcpSession, RtcpSessionOptions};

/// The RTP session: a thin layer that stamps outbound payloads into
/// data packets and forwards a copy of every data packet, in either
/// direction, to the RTCP controller for statistics.
pub struct RtpSession<T> {
    rtcp: RtcpSession<T>,
    payload_type: u8,
}

impl<T: SessionHandler> RtpSession<T> {
    pub fn new(
        options: RtcpSessionOptions,
        payload_type: u8,
        handler: T,
        now: Duration,
        rng: &mut impl Rng,
    ) -> Self {
        Self {
            rtcp: RtcpSession::new(options, handler, now, rng),
            payload_type,
        }
    }

    pub fn rtcp(&self) -> &RtcpSession<T> {
        &self.rtcp
    }

    pub fn rtcp_mut(&mut self) -> &mut RtcpSession<T> {
        &mut self.rtcp
    }

    /// Stamp one payload into an outbound data packet: next sequence
    /// number, media timestamp for `now`, the local SSRC.  Returns
    /// `None` while RTCP has not yet chosen an SSRC; data transmission
    /// must wait for the first report interval.
    pub fn send_payload(&mut self, payload: Bytes, marker: bool, now: Duration) -> Option<RtpPacket> {
        let ssrc = self.rtcp.ssrc()?;

        let local = self.rtcp.local_mut();
        let packet = RtpPacket {
            padding: false,
            extension: false,
            marker,
            payload_type: self.payload_type,
            sequence_number: local.next_sequence_number(),
            timestamp: local.rtp_timestamp(now),
            ssrc,
            payload,
        };

        local.process_rtp_packet(&packet);
        Some(packet)
    }

    /// Decode one inbound datagram as a data packet and fold it into
    /// the reception statistics of its source.
    pub fn receive(
        &mut self,
        buf: &[u8],
        source: SocketAddr,
        now: Duration,
    ) -> Result<RtpPacket, codec::Error> {
        let packet = RtpPacket::decode(buf)?;
        self.rtcp.process_rtp_packet(&packet, source, now);
        Ok(packet)
    }
}
