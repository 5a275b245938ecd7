use std::net::SocketAddr;
use std::time::Duration;

use codec::{
    rtcp::{
        report::{ReceptionReport, SenderInfo},
        sdes::{SdesChunk, SdesItem},
    },
    rtp::RtpPacket,
};

/// Seconds between the NTP epoch (1900) and the unix epoch (1970).
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// A participant that has sent no RTP data for this many consecutive
/// report intervals is no longer counted as a sender.
const SENDER_SILENCE_LIMIT: u32 = 1;

/// A participant from which no RTCP item arrived for this many
/// consecutive report intervals is considered inactive.
const INACTIVE_INTERVAL_LIMIT: u32 = 5;

/// A participant is validated once this many items (RTP packets,
/// reports or SDES chunks) have been received from it.
const VALIDATION_ITEM_COUNT: u32 = 5;

/// A validated participant that stays inactive for this long is stale
/// and gets dropped from the table.
const STALE_TIMEOUT: Duration = Duration::from_secs(1800);

/// Convert a wallclock duration since the unix epoch into the 64-bit
/// NTP timestamp format: seconds in the upper word, fractional seconds
/// in the lower.
pub fn ntp_timestamp(now: Duration) -> u64 {
    let secs = now.as_secs() + NTP_UNIX_OFFSET;
    let frac = ((now.subsec_nanos() as u64) << 32) / 1_000_000_000;
    (secs << 32) | frac
}

/// The local participant: the single sending identity of this session.
///
/// Created once when the session initializes; its SSRC stays
/// unassigned until the RTCP controller chooses one.  Unlike remote
/// participants it is never aged out of the table.
pub struct LocalParticipant {
    sdes: SdesChunk,
    silent_intervals: u32,
    start_time: Duration,
    clock_rate: u32,
    timestamp_base: u32,
    sequence_number: u16,
    packets_sent: u32,
    bytes_sent: u32,
    feedback: Option<ReceptionReport>,
}

impl LocalParticipant {
    pub fn new(cname: &str, clock_rate: u32, start_time: Duration, rng: &mut impl rand::Rng) -> Self {
        let mut sdes = SdesChunk::new(0);
        sdes.add_item(SdesItem::cname(cname));

        Self {
            sdes,
            silent_intervals: 0,
            start_time,
            clock_rate,
            timestamp_base: rng.random(),
            sequence_number: rng.random(),
            packets_sent: 0,
            bytes_sent: 0,
            feedback: None,
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.sdes.ssrc
    }

    pub fn set_ssrc(&mut self, ssrc: u32) {
        self.sdes.ssrc = ssrc;
    }

    pub fn sdes(&self) -> &SdesChunk {
        &self.sdes
    }

    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    /// The RTP media timestamp for the given wallclock instant.
    pub fn rtp_timestamp(&self, now: Duration) -> u32 {
        let elapsed = now.saturating_sub(self.start_time).as_secs_f64();
        self.timestamp_base
            .wrapping_add((elapsed * self.clock_rate as f64) as u32)
    }

    /// Take the sequence number for the next outbound data packet.
    pub fn next_sequence_number(&mut self) -> u16 {
        let seq = self.sequence_number;
        self.sequence_number = seq.wrapping_add(1);
        seq
    }

    /// Account for one outbound RTP data packet.
    pub fn process_rtp_packet(&mut self, packet: &RtpPacket) {
        self.packets_sent = self.packets_sent.wrapping_add(1);
        self.bytes_sent = self.bytes_sent.wrapping_add(packet.payload.len() as u32);
        self.silent_intervals = 0;
    }

    /// A participant counts as a sender while it has transmitted data
    /// within the last two report intervals.
    pub fn is_sender(&self) -> bool {
        self.silent_intervals <= SENDER_SILENCE_LIMIT
    }

    pub fn next_interval(&mut self) {
        self.silent_intervals += 1;
    }

    /// The sender info block for an outbound SR.
    pub fn sender_report(&self, now: Duration) -> SenderInfo {
        SenderInfo {
            ntp_timestamp: ntp_timestamp(now),
            rtp_timestamp: self.rtp_timestamp(now),
            packet_count: self.packets_sent,
            byte_count: self.bytes_sent,
        }
    }

    /// Fold in a reception report a peer sent about this sender.
    pub fn process_reception_report(&mut self, report: ReceptionReport) {
        self.feedback = Some(report);
    }

    /// The most recent reception statistics a peer reported about us.
    pub fn feedback(&self) -> Option<&ReceptionReport> {
        self.feedback.as_ref()
    }
}

/// One remote participant, created lazily on first contact: the first
/// RTP data packet, SR/RR or SDES chunk naming its SSRC.
pub struct RemoteParticipant {
    sdes: SdesChunk,
    address: Option<SocketAddr>,
    silent_intervals: u32,

    // sequence number tracking
    sequence_number_base: u32,
    highest_sequence_number: u32,
    extended_highest_prior: Option<u32>,
    sequence_number_cycles: u32,
    packets_received: u32,
    packets_received_prior: u32,

    // jitter state
    jitter: f64,
    clock_rate: f64,
    last_sr_rtp_timestamp: u32,
    last_sr_ntp_timestamp: u64,
    last_packet_rtp_timestamp: u32,
    last_packet_arrival: Option<Duration>,
    last_sr_arrival: Option<Duration>,

    // liveness
    inactive_intervals: u32,
    start_of_inactivity: Option<Duration>,
    items_received: u32,
}

impl RemoteParticipant {
    pub fn new(ssrc: u32) -> Self {
        Self {
            sdes: SdesChunk::new(ssrc),
            address: None,
            silent_intervals: 0,
            sequence_number_base: 0,
            highest_sequence_number: 0,
            extended_highest_prior: None,
            sequence_number_cycles: 0,
            packets_received: 0,
            packets_received_prior: 0,
            jitter: 0.0,
            clock_rate: 0.0,
            last_sr_rtp_timestamp: 0,
            last_sr_ntp_timestamp: 0,
            last_packet_rtp_timestamp: 0,
            last_packet_arrival: None,
            last_sr_arrival: None,
            inactive_intervals: 0,
            start_of_inactivity: None,
            items_received: 0,
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.sdes.ssrc
    }

    pub fn sdes(&self) -> &SdesChunk {
        &self.sdes
    }

    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }

    pub fn set_address(&mut self, address: SocketAddr) {
        self.address = Some(address);
    }

    /// The estimated interarrival jitter in seconds.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// The media clock rate derived from consecutive sender reports,
    /// or zero while still unknown.
    pub fn clock_rate(&self) -> f64 {
        self.clock_rate
    }

    pub fn packets_received(&self) -> u32 {
        self.packets_received
    }

    /// The highest sequence number seen, extended by the count of
    /// sequence number cycles.
    pub fn extended_highest_sequence_number(&self) -> u32 {
        self.sequence_number_cycles + self.highest_sequence_number
    }

    fn note_item(&mut self) {
        self.items_received = self.items_received.saturating_add(1);
        self.inactive_intervals = 0;
        self.start_of_inactivity = None;
    }

    /// Account for one inbound RTP data packet from this source:
    /// sequence number tracking and the RFC 3550 section-6.4.1 jitter
    /// estimate.
    pub fn process_rtp_packet(&mut self, packet: &RtpPacket, now: Duration) {
        self.note_item();
        self.silent_intervals = 0;

        let seq = packet.sequence_number as u32;
        if self.packets_received == 0 {
            self.sequence_number_base = seq;
            self.highest_sequence_number = seq;
        } else if seq > self.highest_sequence_number {
            // A jump from near the bottom of the range to near the
            // top is a late packet from before the wrap, not a new
            // highest.
            if !(seq > 0xFFEF && self.highest_sequence_number < 0x10) {
                self.highest_sequence_number = seq;
            }
        } else if seq < 0x10 && self.highest_sequence_number > 0xFFEF {
            // The sequence number wrapped past 0xFFFF.
            self.sequence_number_cycles += 0x10000;
            self.highest_sequence_number = seq;
        }

        self.packets_received = self.packets_received.wrapping_add(1);

        // The jitter estimate needs the media clock rate, which is
        // only known once two sender reports have been seen.
        if self.clock_rate != 0.0 {
            if let Some(last_arrival) = self.last_packet_arrival {
                let arrival_delta = now.saturating_sub(last_arrival).as_secs_f64();
                // The wrapped difference is reinterpreted as signed so
                // a reordered packet yields a small negative delta
                // rather than one of nearly 2^32 ticks.
                let timestamp_delta = packet
                    .timestamp
                    .wrapping_sub(self.last_packet_rtp_timestamp)
                    as i32 as f64
                    / self.clock_rate;

                let d = (arrival_delta - timestamp_delta).abs();
                self.jitter += (d - self.jitter) / 16.0;
            }
        }

        self.last_packet_rtp_timestamp = packet.timestamp;
        self.last_packet_arrival = Some(now);
    }

    /// Fold in the sender info block of an SR from this source.
    ///
    /// The first report latches the NTP/RTP timestamp baseline; the
    /// second derives the media clock rate from the deltas.  The
    /// derived rate is an approximation and stays fixed afterwards.
    pub fn process_sender_report(&mut self, info: SenderInfo, now: Duration) {
        self.note_item();
        self.last_sr_arrival = Some(now);

        if self.last_sr_ntp_timestamp == 0 {
            self.last_sr_ntp_timestamp = info.ntp_timestamp;
            self.last_sr_rtp_timestamp = info.rtp_timestamp;
            return;
        }

        if self.clock_rate == 0.0 {
            let ntp_delta = info.ntp_timestamp.wrapping_sub(self.last_sr_ntp_timestamp) as f64
                / (1u64 << 32) as f64;
            let rtp_delta = info.rtp_timestamp.wrapping_sub(self.last_sr_rtp_timestamp) as f64;
            if ntp_delta > 0.0 {
                self.clock_rate = rtp_delta / ntp_delta;
            }
        }

        self.last_sr_ntp_timestamp = info.ntp_timestamp;
        self.last_sr_rtp_timestamp = info.rtp_timestamp;
    }

    /// Fold in an RR from this source.  The report blocks themselves
    /// concern other senders; for this participant the packet only
    /// proves liveness.
    pub fn process_receiver_report(&mut self) {
        self.note_item();
    }

    /// Merge an SDES chunk into this participant's own description,
    /// replacing items kind by kind.
    pub fn process_sdes_chunk(&mut self, chunk: &SdesChunk) {
        self.sdes.merge(chunk);
        self.note_item();
    }

    pub fn is_sender(&self) -> bool {
        self.silent_intervals <= SENDER_SILENCE_LIMIT
    }

    pub fn is_active(&self) -> bool {
        self.inactive_intervals < INACTIVE_INTERVAL_LIMIT
    }

    pub fn is_valid(&self) -> bool {
        self.items_received >= VALIDATION_ITEM_COUNT
    }

    /// Advance the liveness counters by one report interval.
    pub fn next_interval(&mut self, now: Duration) {
        self.silent_intervals += 1;
        self.inactive_intervals += 1;
        if self.inactive_intervals == INACTIVE_INTERVAL_LIMIT {
            self.start_of_inactivity = Some(now);
        }
    }

    /// Whether this participant should be dropped from the table: an
    /// unvalidated participant as soon as it goes inactive, a
    /// validated one only after staying inactive past the stale
    /// timeout.
    pub fn to_be_deleted(&self, now: Duration) -> bool {
        if self.is_active() {
            return false;
        }

        if !self.is_valid() {
            return true;
        }

        match self.start_of_inactivity {
            Some(start) => now.saturating_sub(start) > STALE_TIMEOUT,
            None => false,
        }
    }

    /// Produce the reception report block describing this source, or
    /// `None` when the source is not an active sender (or nothing has
    /// been received yet).
    pub fn reception_report(&mut self, now: Duration) -> Option<ReceptionReport> {
        if !self.is_sender() || self.packets_received == 0 {
            return None;
        }

        let extended = self.extended_highest_sequence_number();
        let expected = extended as i64 - self.sequence_number_base as i64 + 1;
        let lost = expected - self.packets_received as i64;

        let expected_prior = match self.extended_highest_prior {
            Some(prior) => prior as i64 - self.sequence_number_base as i64 + 1,
            None => 0,
        };
        let expected_interval = expected - expected_prior;
        let received_interval = (self.packets_received - self.packets_received_prior) as i64;
        let lost_interval = expected_interval - received_interval;

        let fraction_lost = if expected_interval > 0 && lost_interval > 0 {
            ((lost_interval << 8) / expected_interval).min(255) as u8
        } else {
            0
        };

        self.extended_highest_prior = Some(extended);
        self.packets_received_prior = self.packets_received;

        let (last_sr, delay_since_last_sr) = match self.last_sr_arrival {
            Some(arrival) => (
                // The middle 32 bits of the last SR's NTP timestamp.
                (self.last_sr_ntp_timestamp >> 16) as u32,
                (now.saturating_sub(arrival).as_secs_f64() * 65536.0) as u32,
            ),
            None => (0, 0),
        };

        Some(ReceptionReport {
            ssrc: self.ssrc(),
            fraction_lost,
            cumulative_lost: lost.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            extended_highest_sequence_number: extended,
            jitter: (self.jitter * self.clock_rate) as u32,
            last_sr,
            delay_since_last_sr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn data_packet(sequence_number: u16, timestamp: u32) -> RtpPacket {
        RtpPacket {
            padding: false,
            extension: false,
            marker: false,
            payload_type: 96,
            sequence_number,
            timestamp,
            ssrc: 0xcafe,
            payload: Bytes::from_static(&[0u8; 140]),
        }
    }

    fn seconds(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn sequence_cycles_extend_monotonically() {
        let mut peer = RemoteParticipant::new(0xcafe);

        // Walk the sequence space across two wraps; the extended
        // highest sequence number must strictly increase.
        let mut seq: u16 = 0xFF00;
        let mut previous = None;
        for i in 0..0x2_0000u32 {
            peer.process_rtp_packet(&data_packet(seq, i * 160), seconds(i as u64));

            let extended = peer.extended_highest_sequence_number();
            if let Some(previous) = previous {
                assert!(extended > previous, "extended regressed at step {}", i);
            }

            previous = Some(extended);
            seq = seq.wrapping_add(1);
        }

        assert_eq!(peer.sequence_number_cycles, 2 * 0x10000);
    }

    #[test]
    fn late_packet_from_before_wrap_is_suppressed() {
        let mut peer = RemoteParticipant::new(0xcafe);

        // Wrap: 0xFFFE, 0xFFFF, 0x0000, 0x0001.
        for (i, seq) in [0xFFFEu16, 0xFFFF, 0x0000, 0x0001].into_iter().enumerate() {
            peer.process_rtp_packet(&data_packet(seq, i as u32 * 160), seconds(i as u64));
        }

        assert_eq!(peer.sequence_number_cycles, 0x10000);
        let extended = peer.extended_highest_sequence_number();

        // A straggler from before the wrap must not become the new
        // highest.
        peer.process_rtp_packet(&data_packet(0xFFFA, 5 * 160), seconds(5));
        assert_eq!(peer.extended_highest_sequence_number(), extended);
    }

    #[test]
    fn liveness_transitions() {
        let mut peer = RemoteParticipant::new(0xcafe);
        peer.process_rtp_packet(&data_packet(0, 0), seconds(0));

        assert!(peer.is_active());
        assert!(!peer.is_valid());

        for i in 0..4 {
            peer.next_interval(seconds(10 + i));
            assert!(peer.is_active());
            assert!(!peer.to_be_deleted(seconds(10 + i)));
        }

        // The fifth silent interval tips the participant inactive;
        // unvalidated and inactive means immediate deletion.
        peer.next_interval(seconds(14));
        assert!(!peer.is_active());
        assert!(peer.to_be_deleted(seconds(14)));
    }

    #[test]
    fn validated_participant_ages_out_slowly() {
        let mut peer = RemoteParticipant::new(0xcafe);
        for i in 0..5u16 {
            peer.process_rtp_packet(&data_packet(i, i as u32 * 160), seconds(i as u64));
        }
        assert!(peer.is_valid());

        for i in 0..5 {
            peer.next_interval(seconds(100 + i));
        }
        assert!(!peer.is_active());

        // Validated participants survive inactivity until the stale
        // timeout elapses, measured from the instant they turned
        // inactive.
        assert!(!peer.to_be_deleted(seconds(104)));
        assert!(!peer.to_be_deleted(seconds(104 + 1800)));
        assert!(peer.to_be_deleted(seconds(105 + 1800)));
    }

    #[test]
    fn sender_threshold_is_two_intervals() {
        let mut peer = RemoteParticipant::new(0xcafe);
        peer.process_rtp_packet(&data_packet(0, 0), seconds(0));
        assert!(peer.is_sender());

        peer.next_interval(seconds(5));
        assert!(peer.is_sender());

        peer.next_interval(seconds(10));
        assert!(!peer.is_sender());

        peer.process_rtp_packet(&data_packet(1, 160), seconds(11));
        assert!(peer.is_sender());
    }

    #[test]
    fn local_sender_report_snapshot() {
        let start = seconds(100);
        let mut local =
            LocalParticipant::new("panda@raspberry", 8000, start, &mut rand::rng());

        for i in 0..10u16 {
            let mut packet = data_packet(i, i as u32 * 160);
            packet.sequence_number = local.next_sequence_number();
            local.process_rtp_packet(&packet);
        }

        let now = seconds(102);
        let info = local.sender_report(now);

        assert_eq!(info.packet_count, 10);
        assert_eq!(info.byte_count, 1400);
        // Two seconds at 8000 ticks per second, relative to the
        // random timestamp base.
        assert_eq!(
            info.rtp_timestamp.wrapping_sub(local.rtp_timestamp(start)),
            16000
        );
        assert_eq!(info.ntp_timestamp >> 32, 102 + 2_208_988_800);
    }

    #[test]
    fn lossless_stream_reports_no_loss() {
        let mut peer = RemoteParticipant::new(0xcafe);
        for i in 0..10u16 {
            peer.process_rtp_packet(&data_packet(i, i as u32 * 160), seconds(i as u64));
        }

        let report = peer.reception_report(seconds(10)).unwrap();
        assert_eq!(report.cumulative_lost, 0);
        assert_eq!(report.fraction_lost, 0);
        assert_eq!(report.extended_highest_sequence_number, 9);
    }

    #[test]
    fn interval_loss_is_scoped_to_the_interval() {
        let mut peer = RemoteParticipant::new(0xcafe);
        for i in 0..10u16 {
            peer.process_rtp_packet(&data_packet(i, i as u32 * 160), seconds(i as u64));
        }
        let _ = peer.reception_report(seconds(10)).unwrap();

        // Second interval: sequence numbers 10..20 with half of them
        // dropped on the way.
        for i in [10u16, 12, 14, 16, 18] {
            peer.process_rtp_packet(&data_packet(i, i as u32 * 160), seconds(i as u64));
        }

        let report = peer.reception_report(seconds(20)).unwrap();
        assert_eq!(report.cumulative_lost, 4);
        // 4 lost of 9 expected within the interval.
        assert_eq!(report.fraction_lost as u32, (4u32 << 8) / 9);
    }

    #[test]
    fn no_report_from_a_silent_source() {
        let mut peer = RemoteParticipant::new(0xcafe);
        peer.process_rtp_packet(&data_packet(0, 0), seconds(0));

        peer.next_interval(seconds(5));
        peer.next_interval(seconds(10));
        assert!(peer.reception_report(seconds(10)).is_none());
    }

    #[test]
    fn clock_rate_derived_from_consecutive_sender_reports() {
        let mut peer = RemoteParticipant::new(0xcafe);

        let first = SenderInfo {
            ntp_timestamp: ntp_timestamp(seconds(100)),
            rtp_timestamp: 0,
            packet_count: 0,
            byte_count: 0,
        };
        peer.process_sender_report(first, seconds(100));
        assert_eq!(peer.clock_rate(), 0.0);

        let second = SenderInfo {
            ntp_timestamp: ntp_timestamp(seconds(102)),
            rtp_timestamp: 16000,
            packet_count: 10,
            byte_count: 1400,
        };
        peer.process_sender_report(second, seconds(102));
        assert!((peer.clock_rate() - 8000.0).abs() < 1.0);

        // The rate is computed once and stays fixed.
        let third = SenderInfo {
            ntp_timestamp: ntp_timestamp(seconds(104)),
            rtp_timestamp: 48000,
            packet_count: 20,
            byte_count: 2800,
        };
        peer.process_sender_report(third, seconds(104));
        assert!((peer.clock_rate() - 8000.0).abs() < 1.0);
    }

    #[test]
    fn jitter_follows_arrival_variation() {
        let mut peer = RemoteParticipant::new(0xcafe);
        peer.process_sender_report(
            SenderInfo {
                ntp_timestamp: ntp_timestamp(seconds(0)),
                rtp_timestamp: 0,
                packet_count: 0,
                byte_count: 0,
            },
            seconds(0),
        );
        peer.process_sender_report(
            SenderInfo {
                ntp_timestamp: ntp_timestamp(seconds(1)),
                rtp_timestamp: 8000,
                packet_count: 0,
                byte_count: 0,
            },
            seconds(1),
        );

        // Perfectly paced packets: 160 ticks per 20 ms at 8000 Hz.
        let mut now = Duration::from_secs(2);
        for i in 0..50u16 {
            peer.process_rtp_packet(&data_packet(i, i as u32 * 160), now);
            now += Duration::from_millis(20);
        }
        assert!(peer.jitter() < 1e-9);

        // A delayed packet bumps the estimate.
        now += Duration::from_millis(60);
        peer.process_rtp_packet(&data_packet(50, 50 * 160), now);
        assert!(peer.jitter() > 0.0);
    }

    #[test]
    fn reordered_packet_keeps_jitter_small() {
        let mut peer = RemoteParticipant::new(0xcafe);
        peer.process_sender_report(
            SenderInfo {
                ntp_timestamp: ntp_timestamp(seconds(0)),
                rtp_timestamp: 0,
                packet_count: 0,
                byte_count: 0,
            },
            seconds(0),
        );
        peer.process_sender_report(
            SenderInfo {
                ntp_timestamp: ntp_timestamp(seconds(1)),
                rtp_timestamp: 8000,
                packet_count: 0,
                byte_count: 0,
            },
            seconds(1),
        );

        // The second and third packets arrive swapped: the RTP
        // timestamp steps backwards while the arrival clock moves
        // forward.  The transit delta is a few ticks, not 2^32.
        let mut now = Duration::from_secs(2);
        peer.process_rtp_packet(&data_packet(1, 160), now);
        now += Duration::from_millis(20);
        peer.process_rtp_packet(&data_packet(3, 480), now);
        now += Duration::from_millis(20);
        peer.process_rtp_packet(&data_packet(2, 320), now);

        assert!(peer.jitter() < 0.1);
    }
}
