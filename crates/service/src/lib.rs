//! Session-layer state machines for an RTP/RTCP endpoint.
//!
//! This crate is deliberately free of IO: there are no sockets, no
//! timers and no ambient clock.  Every operation that depends on time
//! takes `now` explicitly and every operation that needs randomness
//! takes an [`rand::Rng`].  The transport layer above owns the event
//! loop, feeds datagrams and timer expirations in, and transmits the
//! buffers handed back out.

pub mod participant;
pub mod rtcp;
pub mod rtp;

use codec::rtcp::report::ReceptionReport;

use std::net::SocketAddr;

/// Why a remote participant left the session table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// The participant announced its departure with a BYE packet.
    Bye,
    /// The participant aged out of the table without a BYE.
    Timeout,
}

/// Session event callbacks.
///
/// Held by the RTCP session controller and invoked synchronously from
/// within its state transitions.  All methods have empty default
/// implementations; a typical handler logs.
pub trait SessionHandler {
    /// The local SSRC has been chosen and RTCP is running; RTP data
    /// transmission may begin.
    #[allow(unused_variables)]
    fn on_rtcp_initialized(&self, ssrc: u32) {}

    /// A previously unknown SSRC appeared in an RTP or RTCP packet
    /// and a participant entry was created for it (lazy join).
    #[allow(unused_variables)]
    fn on_peer_join(&self, ssrc: u32) {}

    /// A remote participant was removed from the table.
    #[allow(unused_variables)]
    fn on_peer_leave(&self, ssrc: u32, reason: LeaveReason) {}

    /// An incoming packet carried the local SSRC, or a known SSRC
    /// arrived from an unexpected transport address.  Collisions are
    /// detected but intentionally not remediated: no rekeying takes
    /// place and the packet is otherwise processed normally.
    #[allow(unused_variables)]
    fn on_ssrc_conflict(&self, ssrc: u32, address: SocketAddr) {}

    /// A remote participant reported reception statistics about the
    /// local sender.
    #[allow(unused_variables)]
    fn on_feedback(&self, from: u32, report: &ReceptionReport) {}

    /// The local BYE has been emitted; the session is over.
    fn on_session_left(&self) {}
}

/// The no-op handler, for sessions that ignore events.
impl SessionHandler for () {}
