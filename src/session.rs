use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use bytes::BytesMut;
use codec::rtcp::CompoundPacket;
use codec::rtcp::report::ReceptionReport;
use rand::{SeedableRng, rngs::StdRng};
use service::rtcp::RtcpSessionOptions;
use service::rtp::RtpSession;
use service::{LeaveReason, SessionHandler};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::Receiver;
use tokio::time::{Instant, sleep_until};

use crate::config::Config;
use crate::sender::{PayloadSender, SenderControl};
use crate::statistics::{Statistics, Stats};

/// Commands the session event loop accepts while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Sender(SenderControl),
    /// Emit a BYE on the next report and shut the session down.
    Leave,
}

/// Wallclock time since the unix epoch, the time base for NTP
/// timestamps and all session state.
fn wallclock() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// Session event callbacks surface as log lines.
struct Logger;

impl SessionHandler for Logger {
    fn on_rtcp_initialized(&self, ssrc: u32) {
        log::info!("rtcp initialized: ssrc={ssrc:08x}");
    }

    fn on_peer_join(&self, ssrc: u32) {
        log::info!("peer joined: ssrc={ssrc:08x}");
    }

    fn on_peer_leave(&self, ssrc: u32, reason: LeaveReason) {
        log::info!("peer left: ssrc={ssrc:08x}, reason={reason:?}");
    }

    fn on_ssrc_conflict(&self, ssrc: u32, address: SocketAddr) {
        log::warn!("ssrc conflict detected, not remediated: ssrc={ssrc:08x}, address={address}");
    }

    fn on_feedback(&self, from: u32, report: &ReceptionReport) {
        log::debug!(
            "feedback received: from={from:08x}, lost={}, fraction={}, jitter={}",
            report.cumulative_lost,
            report.fraction_lost,
            report.jitter
        );
    }

    fn on_session_left(&self) {
        log::info!("session left");
    }
}

/// One RTP/RTCP session as a single task.
///
/// All session state lives behind this event loop: the RTP and RTCP
/// sockets, the report interval timer, the payload pacing timer and
/// the control channel are multiplexed with `select!`, so every state
/// transition runs to completion before the next event fires.  The
/// loop ends after the BYE report has been sent.
pub async fn start(
    config: Arc<Config>,
    statistics: Statistics,
    mut commands: Receiver<Command>,
) -> Result<()> {
    let rtp_socket = UdpSocket::bind(("0.0.0.0", config.session.port)).await?;
    let rtcp_socket = UdpSocket::bind(("0.0.0.0", config.session.port + 1)).await?;

    let rtp_target = config.session.destination;
    let rtcp_target = SocketAddr::new(rtp_target.ip(), rtp_target.port() + 1);

    let mut rng = StdRng::from_os_rng();
    let mut session = RtpSession::new(
        RtcpSessionOptions {
            cname: config.session.common_name.clone(),
            mtu: config.session.mtu,
            bandwidth: config.session.bandwidth,
            rtcp_percentage: config.session.rtcp_percentage,
            clock_rate: config.media.clock_rate,
        },
        config.media.payload_type,
        Logger,
        wallclock(),
        &mut rng,
    );

    let mut sender = match &config.media.file_name {
        Some(file_name) => Some(PayloadSender::new(
            tokio::fs::read(file_name).await?.into(),
            config.media.packet_size,
            Duration::from_millis(config.media.packet_interval),
        )),
        None => None,
    };

    let mut report_at = Instant::now() + session.rtcp().first_interval(&mut rng);
    let mut pace_at = Instant::now();
    let mut leaving = false;

    let mut rtp_buffer = vec![0u8; config.session.mtu * 2];
    let mut rtcp_buffer = vec![0u8; config.session.mtu * 2];
    let mut bytes = BytesMut::with_capacity(config.session.mtu);

    log::info!(
        "session started: port={}, destination={rtp_target}, mode={}",
        config.session.port,
        if sender.is_some() { "send" } else { "receive-only" }
    );

    loop {
        tokio::select! {
            _ = sleep_until(report_at) => {
                let (compound, next) = session.rtcp_mut().on_interval(wallclock(), &mut rng);
                compound.encode(&mut bytes);
                rtcp_socket.send_to(&bytes, rtcp_target).await?;
                statistics.send(&[Stats::SendBytes(bytes.len()), Stats::SendPkts(1)]);

                match next {
                    Some(delay) => report_at = Instant::now() + delay,
                    None => break,
                }
            }
            _ = sleep_until(pace_at), if session.rtcp().ssrc().is_some()
                && sender.as_ref().is_some_and(|sender| sender.is_playing()) =>
            {
                if let Some(sender) = sender.as_mut() {
                    if let Some((chunk, marker)) = sender.next_chunk() {
                        if let Some(packet) = session.send_payload(chunk, marker, wallclock()) {
                            bytes.clear();
                            packet.encode(&mut bytes);
                            rtp_socket.send_to(&bytes, rtp_target).await?;
                            statistics.send(&[Stats::SendBytes(bytes.len()), Stats::SendPkts(1)]);
                        }
                    }

                    pace_at = Instant::now() + sender.interval();
                }
            }
            result = rtp_socket.recv_from(&mut rtp_buffer) => {
                let (size, source) = result?;
                statistics.send(&[Stats::ReceivedBytes(size), Stats::ReceivedPkts(1)]);

                if let Err(e) = session.receive(&rtp_buffer[..size], source, wallclock()) {
                    statistics.send(&[Stats::ErrorPkts(1)]);
                    log::warn!("malformed rtp packet dropped: source={source}, error={e}");
                }
            }
            result = rtcp_socket.recv_from(&mut rtcp_buffer) => {
                let (size, source) = result?;
                statistics.send(&[Stats::ReceivedBytes(size), Stats::ReceivedPkts(1)]);

                match CompoundPacket::decode(&rtcp_buffer[..size]) {
                    Ok(compound) => {
                        session.rtcp_mut().process_compound(compound, source, wallclock());
                    }
                    Err(e) => {
                        statistics.send(&[Stats::ErrorPkts(1)]);
                        log::warn!("malformed rtcp packet dropped: source={source}, error={e}");
                    }
                }
            }
            command = commands.recv(), if !leaving => {
                match command {
                    Some(Command::Sender(control)) => {
                        if let Some(sender) = sender.as_mut() {
                            sender.control(control);
                            pace_at = Instant::now();
                        }
                    }
                    // A closed channel means the controller is gone;
                    // leave cleanly either way.
                    Some(Command::Leave) | None => {
                        leaving = true;
                        session.rtcp_mut().leave();
                        report_at = Instant::now();
                    }
                }
            }
        }
    }

    let counts = statistics.get();
    log::info!(
        "session closed: sent={}/{}B, received={}/{}B, errors={}",
        counts.send_pkts,
        counts.send_bytes,
        counts.received_pkts,
        counts.received_bytes,
        counts.error_pkts
    );

    Ok(())
}
