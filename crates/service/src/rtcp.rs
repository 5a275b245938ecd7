use std::net::SocketAddr;
use std::time::Duration;

use ahash::AHashMap;
use codec::rtcp::{
    CompoundPacket, RtcpPacket,
    bye::Goodbye,
    report::{RECEPTION_REPORT_SIZE, ReceptionReport},
    rr::ReceiverReport,
    sdes::SourceDescription,
    sr::SenderReport,
};
use codec::rtp::RtpPacket;
use rand::Rng;

use crate::participant::{LocalParticipant, RemoteParticipant};
use crate::{LeaveReason, SessionHandler};

/// Fixed IP + UDP header overhead folded into the average packet size
/// that drives the report interval.
const TRANSPORT_OVERHEAD: usize = 28;

/// The report interval never drops below five seconds, applied before
/// randomization.
const MINIMUM_INTERVAL: f64 = 5.0;

/// Damping divisor applied to the randomized interval, `e - 1.5`.
const INTERVAL_DAMPING: f64 = std::f64::consts::E - 1.5;

pub struct RtcpSessionOptions {
    /// Canonical name carried in the CNAME SDES item of every report.
    pub cname: String,
    /// Upper bound on the encoded size of an outbound compound packet.
    pub mtu: usize,
    /// Session bandwidth in bytes per second.
    pub bandwidth: u32,
    /// Fraction of the session bandwidth given to RTCP, in percent.
    pub rtcp_percentage: u8,
    /// Media clock rate in ticks per second.
    pub clock_rate: u32,
}

/// The RTCP session controller.
///
/// Owns the participant table and the compound packet send/receive
/// cycle.  The controller itself never touches a socket or a timer:
/// [`RtcpSession::on_interval`] is called when the transport's report
/// timer fires and returns both the compound packet to transmit and
/// the duration until the next firing, and inbound compound packets
/// are handed to [`RtcpSession::process_compound`].
pub struct RtcpSession<T> {
    handler: T,
    mtu: usize,
    bandwidth: u32,
    rtcp_percentage: u8,
    local: LocalParticipant,
    peers: AHashMap<u32, RemoteParticipant>,
    average_packet_size: f64,
    packets_counted: u32,
    ssrc_chosen: bool,
    leaving: bool,
}

impl<T: SessionHandler> RtcpSession<T> {
    pub fn new(
        options: RtcpSessionOptions,
        handler: T,
        now: Duration,
        rng: &mut impl Rng,
    ) -> Self {
        Self {
            handler,
            mtu: options.mtu,
            bandwidth: options.bandwidth,
            rtcp_percentage: options.rtcp_percentage,
            local: LocalParticipant::new(&options.cname, options.clock_rate, now, rng),
            peers: AHashMap::new(),
            average_packet_size: 0.0,
            packets_counted: 0,
            ssrc_chosen: false,
            leaving: false,
        }
    }

    /// The local SSRC, once one has been chosen on the first report
    /// interval.  RTP data transmission must wait for this.
    pub fn ssrc(&self) -> Option<u32> {
        self.ssrc_chosen.then(|| self.local.ssrc())
    }

    pub fn local(&self) -> &LocalParticipant {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut LocalParticipant {
        &mut self.local
    }

    pub fn peers(&self) -> impl Iterator<Item = &RemoteParticipant> {
        self.peers.values()
    }

    /// Announce departure: the next report interval emits a BYE and
    /// the session stops scheduling further intervals.
    pub fn leave(&mut self) {
        self.leaving = true;
    }

    /// Delay before the first report: uniformly random in
    /// `[1.25, 3.75)` seconds.
    pub fn first_interval(&self, rng: &mut impl Rng) -> Duration {
        Duration::from_secs_f64(2.5 * (rng.random::<f64>() + 0.5))
    }

    /// The deterministic part of the report interval: average packet
    /// size scaled by the participant count over the RTCP bandwidth
    /// share, floored at five seconds.  Receivers get three quarters
    /// of the share.  The floor applies here, before the random
    /// multiplier.
    fn base_interval(&self) -> f64 {
        let participants = (self.peers.len() + 1) as f64;
        let share = if self.local.is_sender() { 1.0 } else { 0.75 };
        let bandwidth = self.bandwidth as f64 * self.rtcp_percentage as f64 / 100.0 * share;

        let interval = self.average_packet_size * participants / bandwidth;

        // A zero bandwidth share divides to infinity; fall back to the
        // floor rather than hand a non-finite value to `Duration`.
        if interval.is_finite() {
            interval.max(MINIMUM_INTERVAL)
        } else {
            MINIMUM_INTERVAL
        }
    }

    /// The delay until the next report: the base interval spread by a
    /// uniform multiplier in `[0.5, 1.5)` to decorrelate participants,
    /// then damped by `e - 1.5`.
    fn interval(&self, rng: &mut impl Rng) -> Duration {
        let randomized = self.base_interval() * rng.random_range(0.5..1.5);
        Duration::from_secs_f64(randomized / INTERVAL_DAMPING)
    }

    /// Pick a random 31-bit SSRC, retrying until it collides with no
    /// known participant.
    fn choose_ssrc(&mut self, rng: &mut impl Rng) {
        let mut ssrc = rng.random::<u32>() & 0x7FFF_FFFF;
        while self.peers.contains_key(&ssrc) {
            ssrc = rng.random::<u32>() & 0x7FFF_FFFF;
        }

        self.local.set_ssrc(ssrc);
        self.ssrc_chosen = true;
    }

    fn find_or_create(&mut self, ssrc: u32) -> &mut RemoteParticipant {
        let handler = &self.handler;
        self.peers.entry(ssrc).or_insert_with(|| {
            handler.on_peer_join(ssrc);
            RemoteParticipant::new(ssrc)
        })
    }

    /// Incremental mean over every RTCP packet sent or received, with
    /// the transport overhead added per packet.
    fn calculate_average_packet_size(&mut self, size: usize) {
        let n = self.packets_counted as f64;
        self.average_packet_size =
            (self.average_packet_size * n + (size + TRANSPORT_OVERHEAD) as f64) / (n + 1.0);
        self.packets_counted += 1;
    }

    /// The report timer fired.  Returns the compound packet to send
    /// and the delay until the next firing, `None` once the session
    /// has been left.
    pub fn on_interval(
        &mut self,
        now: Duration,
        rng: &mut impl Rng,
    ) -> (CompoundPacket, Option<Duration>) {
        if !self.ssrc_chosen {
            self.choose_ssrc(rng);
            self.handler.on_rtcp_initialized(self.local.ssrc());
        }

        let compound = self.build_compound(now);
        self.calculate_average_packet_size(compound.len());

        if self.leaving {
            self.handler.on_session_left();
            (compound, None)
        } else {
            let next = self.interval(rng);
            (compound, Some(next))
        }
    }

    /// Build one outbound compound packet: an SR (when the local
    /// participant is a sender) or RR carrying a reception report for
    /// every peer that produces one, the local SDES chunk, and a BYE
    /// when leaving.  Advances every participant's liveness counters
    /// by one interval and drops the peers that aged out.
    fn build_compound(&mut self, now: Duration) -> CompoundPacket {
        let sender = self.local.is_sender();
        self.local.next_interval();

        let mut reports = Vec::new();
        let handler = &self.handler;
        self.peers.retain(|ssrc, peer| {
            if let Some(report) = peer.reception_report(now) {
                reports.push(report);
            }

            peer.next_interval(now);
            if peer.to_be_deleted(now) {
                handler.on_peer_leave(*ssrc, LeaveReason::Timeout);
                false
            } else {
                true
            }
        });

        let mut sdes = SourceDescription::new();
        // A single chunk is always within the chunk limit.
        let _ = sdes.add_chunk(self.local.sdes().clone());

        // Reception reports take whatever room the MTU leaves after
        // the report header, the SDES and a possible BYE.
        let reserved = sdes.len() + if self.leaving { 8 } else { 0 };
        let base = if sender { 28 } else { 8 };
        let budget = self.mtu.saturating_sub(reserved + base) / RECEPTION_REPORT_SIZE;

        let mut compound = CompoundPacket::new();
        if sender {
            let mut packet = SenderReport::new(self.local.ssrc(), self.local.sender_report(now));
            for report in reports.into_iter().take(budget) {
                if packet.add_reception_report(report).is_err() {
                    break;
                }
            }

            compound.push(RtcpPacket::SenderReport(packet));
        } else {
            let mut packet = ReceiverReport::new(self.local.ssrc());
            for report in reports.into_iter().take(budget) {
                if packet.add_reception_report(report).is_err() {
                    break;
                }
            }

            compound.push(RtcpPacket::ReceiverReport(packet));
        }

        compound.push(RtcpPacket::SourceDescription(sdes));

        if self.leaving {
            compound.push(RtcpPacket::Goodbye(Goodbye {
                ssrc: self.local.ssrc(),
            }));
        }

        compound
    }

    /// Account for one inbound RTP data packet.  An unknown SSRC
    /// creates a participant entry (lazy join); a packet carrying the
    /// local SSRC is reported as a conflict and dropped, nothing else
    /// is done about it.
    pub fn process_rtp_packet(&mut self, packet: &RtpPacket, source: SocketAddr, now: Duration) {
        if self.ssrc_chosen && packet.ssrc == self.local.ssrc() {
            self.handler.on_ssrc_conflict(packet.ssrc, source);
            return;
        }

        let handler = &self.handler;
        let peer = self.peers.entry(packet.ssrc).or_insert_with(|| {
            handler.on_peer_join(packet.ssrc);
            RemoteParticipant::new(packet.ssrc)
        });

        match peer.address() {
            Some(address) if address != source => handler.on_ssrc_conflict(packet.ssrc, source),
            None => peer.set_address(source),
            _ => {}
        }

        peer.process_rtp_packet(packet, now);
    }

    /// Fold one inbound compound packet into the participant table.
    ///
    /// Protocol anomalies are absorbed: a report from an unknown SSRC
    /// creates the participant, a report carrying the local SSRC or a
    /// known SSRC from the wrong address is flagged to the handler and
    /// otherwise left alone.  Nothing here fails.
    pub fn process_compound(&mut self, compound: CompoundPacket, source: SocketAddr, now: Duration) {
        self.calculate_average_packet_size(compound.len());

        for packet in compound.into_packets() {
            match packet {
                RtcpPacket::SenderReport(sr) => {
                    if self.is_local(sr.ssrc) {
                        self.handler.on_ssrc_conflict(sr.ssrc, source);
                    } else {
                        let peer = self.find_or_create(sr.ssrc);
                        peer.process_sender_report(sr.sender_info, now);
                        self.note_address(sr.ssrc, source);
                    }

                    self.process_feedback(sr.ssrc, sr.reports());
                }
                RtcpPacket::ReceiverReport(rr) => {
                    if self.is_local(rr.ssrc) {
                        self.handler.on_ssrc_conflict(rr.ssrc, source);
                    } else {
                        self.find_or_create(rr.ssrc).process_receiver_report();
                        self.note_address(rr.ssrc, source);
                    }

                    self.process_feedback(rr.ssrc, rr.reports());
                }
                RtcpPacket::SourceDescription(sdes) => {
                    for chunk in sdes.chunks() {
                        if self.is_local(chunk.ssrc) {
                            self.handler.on_ssrc_conflict(chunk.ssrc, source);
                            continue;
                        }

                        self.find_or_create(chunk.ssrc).process_sdes_chunk(chunk);
                    }
                }
                RtcpPacket::Goodbye(bye) => {
                    if self.is_local(bye.ssrc) {
                        continue;
                    }

                    if self.peers.remove(&bye.ssrc).is_some() {
                        self.handler.on_peer_leave(bye.ssrc, LeaveReason::Bye);
                    }
                }
            }
        }
    }

    fn is_local(&self, ssrc: u32) -> bool {
        self.ssrc_chosen && ssrc == self.local.ssrc()
    }

    fn note_address(&mut self, ssrc: u32, source: SocketAddr) {
        let Some(peer) = self.peers.get_mut(&ssrc) else {
            return;
        };

        match peer.address() {
            Some(address) if address != source => self.handler.on_ssrc_conflict(ssrc, source),
            None => peer.set_address(source),
            _ => {}
        }
    }

    /// Extract the reception reports a peer addressed to the local
    /// sender and fold them into the local feedback state.
    fn process_feedback(&mut self, from: u32, reports: &[ReceptionReport]) {
        if !self.ssrc_chosen {
            return;
        }

        for report in reports {
            if report.ssrc == self.local.ssrc() {
                self.handler.on_feedback(from, report);
                self.local.process_reception_report(*report);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn options() -> RtcpSessionOptions {
        RtcpSessionOptions {
            cname: "panda@raspberry".to_string(),
            mtu: 1472,
            bandwidth: 8000,
            rtcp_percentage: 5,
            clock_rate: 8000,
        }
    }

    fn data_packet(ssrc: u32, sequence_number: u16) -> RtpPacket {
        RtpPacket {
            padding: false,
            extension: false,
            marker: false,
            payload_type: 96,
            sequence_number,
            timestamp: sequence_number as u32 * 160,
            ssrc,
            payload: Bytes::from_static(&[0u8; 140]),
        }
    }

    fn address(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    fn seconds(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn first_interval_is_bounded() {
        let mut rng = rand::rng();
        let session = RtcpSession::new(options(), (), seconds(0), &mut rng);

        for _ in 0..1000 {
            let interval = session.first_interval(&mut rng).as_secs_f64();
            assert!((1.25..3.75).contains(&interval));
        }
    }

    #[test]
    fn interval_floor_applies_before_randomization() {
        let mut rng = rand::rng();
        let mut session = RtcpSession::new(options(), (), seconds(0), &mut rng);

        // Two peers plus the local sender: three participants.  With
        // an average packet size of 200 bytes the raw interval is
        // 200 * 3 / (8000 * 0.05) = 1.5 seconds, below the floor.
        session.process_rtp_packet(&data_packet(0x1111, 0), address(2000), seconds(0));
        session.process_rtp_packet(&data_packet(0x2222, 0), address(2002), seconds(0));
        session.average_packet_size = 200.0;
        session.packets_counted = 1;

        assert_eq!(session.base_interval(), 5.0);

        // Randomization and damping act on the floored value.
        for _ in 0..1000 {
            let interval = session.interval(&mut rng).as_secs_f64();
            assert!(interval >= 5.0 * 0.5 / INTERVAL_DAMPING - 1e-9);
            assert!(interval < 5.0 * 1.5 / INTERVAL_DAMPING);
        }
    }

    #[test]
    fn average_packet_size_is_an_incremental_mean() {
        let mut rng = rand::rng();
        let mut session = RtcpSession::new(options(), (), seconds(0), &mut rng);

        session.calculate_average_packet_size(172);
        assert_eq!(session.average_packet_size, 200.0);

        session.calculate_average_packet_size(72);
        assert_eq!(session.average_packet_size, 150.0);
    }

    #[test]
    fn first_interval_chooses_an_ssrc() {
        let mut rng = rand::rng();
        let mut session = RtcpSession::new(options(), (), seconds(0), &mut rng);
        assert!(session.ssrc().is_none());

        let (compound, next) = session.on_interval(seconds(2), &mut rng);
        let ssrc = session.ssrc().unwrap();
        assert!(ssrc <= 0x7FFF_FFFF);
        assert!(next.is_some());

        // A fresh local participant still counts as a sender, so the
        // compound opens with an SR, followed by the CNAME SDES.
        let packets = compound.packets();
        assert_eq!(packets.len(), 2);
        let RtcpPacket::SenderReport(sr) = &packets[0] else {
            panic!("expected a sender report");
        };
        assert_eq!(sr.ssrc, ssrc);
        let RtcpPacket::SourceDescription(sdes) = &packets[1] else {
            panic!("expected a source description");
        };
        assert_eq!(sdes.chunks()[0].ssrc, ssrc);
    }

    #[test]
    fn silent_local_participant_sends_rr() {
        let mut rng = rand::rng();
        let mut session = RtcpSession::new(options(), (), seconds(0), &mut rng);

        // Two intervals without outbound data tip the local
        // participant out of sender state.
        let _ = session.on_interval(seconds(2), &mut rng);
        let _ = session.on_interval(seconds(7), &mut rng);
        let (compound, _) = session.on_interval(seconds(12), &mut rng);

        assert!(matches!(
            compound.packets()[0],
            RtcpPacket::ReceiverReport(_)
        ));
    }

    #[test]
    fn zero_bandwidth_falls_back_to_the_interval_floor() {
        let mut rng = rand::rng();
        let mut options = options();
        options.bandwidth = 0;

        let mut session = RtcpSession::new(options, (), seconds(0), &mut rng);

        // The second interval is the first computed from the bandwidth
        // share; it must come out finite despite the zero divisor.
        let (_, next) = session.on_interval(seconds(2), &mut rng);
        let delay = next.unwrap();
        let (_, next) = session.on_interval(seconds(2) + delay, &mut rng);

        let delay = next.unwrap().as_secs_f64();
        assert!(delay >= MINIMUM_INTERVAL * 0.5 / INTERVAL_DAMPING - 1e-9);
        assert!(delay < MINIMUM_INTERVAL * 1.5 / INTERVAL_DAMPING);
    }

    #[test]
    fn leaving_appends_a_bye_and_stops_the_timer() {
        let mut rng = rand::rng();
        let mut session = RtcpSession::new(options(), (), seconds(0), &mut rng);
        let _ = session.on_interval(seconds(2), &mut rng);

        session.leave();
        let (compound, next) = session.on_interval(seconds(7), &mut rng);

        assert!(next.is_none());
        let RtcpPacket::Goodbye(bye) = compound.packets().last().unwrap() else {
            panic!("expected a trailing BYE");
        };
        assert_eq!(bye.ssrc, session.ssrc().unwrap());
    }

    #[test]
    fn active_sender_peer_gets_a_reception_report() {
        let mut rng = rand::rng();
        let mut session = RtcpSession::new(options(), (), seconds(0), &mut rng);

        for i in 0..10u16 {
            session.process_rtp_packet(&data_packet(0xcafe, i), address(2000), seconds(i as u64));
        }

        let (compound, _) = session.on_interval(seconds(10), &mut rng);
        let RtcpPacket::SenderReport(sr) = &compound.packets()[0] else {
            panic!("expected a sender report");
        };

        assert_eq!(sr.reports().len(), 1);
        assert_eq!(sr.reports()[0].ssrc, 0xcafe);
        assert_eq!(sr.reports()[0].cumulative_lost, 0);
    }

    #[test]
    fn bye_removes_the_peer() {
        let mut rng = rand::rng();
        let mut session = RtcpSession::new(options(), (), seconds(0), &mut rng);

        session.process_rtp_packet(&data_packet(0xcafe, 0), address(2000), seconds(0));
        assert_eq!(session.peers().count(), 1);

        let mut compound = CompoundPacket::new();
        compound.push(RtcpPacket::ReceiverReport(ReceiverReport::new(0xcafe)));
        compound.push(RtcpPacket::Goodbye(Goodbye { ssrc: 0xcafe }));
        session.process_compound(compound, address(2001), seconds(1));

        assert_eq!(session.peers().count(), 0);
    }

    #[test]
    fn unvalidated_peer_ages_out_of_the_table() {
        let mut rng = rand::rng();
        let mut session = RtcpSession::new(options(), (), seconds(0), &mut rng);

        session.process_rtp_packet(&data_packet(0xcafe, 0), address(2000), seconds(0));

        // Five report intervals without another item from the peer.
        let mut now = seconds(2);
        for _ in 0..5 {
            let _ = session.on_interval(now, &mut rng);
            now += seconds(5);
        }

        assert_eq!(session.peers().count(), 0);
    }

    #[test]
    fn feedback_addressed_to_the_local_ssrc_is_folded_in() {
        let mut rng = rand::rng();
        let mut session = RtcpSession::new(options(), (), seconds(0), &mut rng);
        let _ = session.on_interval(seconds(2), &mut rng);
        let ssrc = session.ssrc().unwrap();

        let mut rr = ReceiverReport::new(0xcafe);
        rr.add_reception_report(ReceptionReport {
            ssrc,
            fraction_lost: 3,
            cumulative_lost: 7,
            extended_highest_sequence_number: 42,
            jitter: 1,
            last_sr: 0,
            delay_since_last_sr: 0,
        })
        .unwrap();

        let mut compound = CompoundPacket::new();
        compound.push(RtcpPacket::ReceiverReport(rr));
        session.process_compound(compound, address(2001), seconds(3));

        let feedback = session.local().feedback().unwrap();
        assert_eq!(feedback.cumulative_lost, 7);
        assert_eq!(feedback.fraction_lost, 3);
    }
}
