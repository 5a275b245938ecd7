use crate::Error;

/// # BYE: Goodbye RTCP Packet
///
/// ```text
///     0                   1                   2                   3
///     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |V=2|P|    SC   |   PT=BYE=203  |             length            |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |                           SSRC/CSRC                           |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The BYE packet indicates that one or more sources are no longer
/// active.  This implementation emits and accepts the single-source
/// form only: one SSRC, no reason string.  A multi-source BYE from a
/// mixer would name sources this endpoint never aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Goodbye {
    pub ssrc: u32,
}

impl Goodbye {
    /// Encoded size of the packet, header included.
    pub fn len(&self) -> usize {
        8
    }

    pub(super) fn decode(body: &[u8]) -> Result<Self, Error> {
        if body.len() < 4 {
            return Err(Error::InvalidInput);
        }

        Ok(Self {
            ssrc: u32::from_be_bytes(body[0..4].try_into()?),
        })
    }
}
