use bytes::{BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::Error;

/// SDES item type: 8 bits
///
/// The END item (type 0) terminates an item list and is not
/// representable here; it is produced and consumed by the chunk codec
/// itself.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum SdesItemKind {
    /// CNAME: Canonical End-Point Identifier.  The CNAME item is
    /// mandatory in every SDES packet and MUST be unique among all
    /// participants within one RTP session.
    Cname = 1,
    /// NAME: User Name.
    Name = 2,
    /// EMAIL: Electronic Mail Address.
    Email = 3,
    /// PHONE: Phone Number.
    Phone = 4,
    /// LOC: Geographic User Location.
    Location = 5,
    /// TOOL: Application or Tool Name.
    Tool = 6,
    /// NOTE: Notice/Status.
    Note = 7,
    /// PRIV: Private Extensions.
    Private = 8,
}

/// One SDES item: an 8-bit type, an 8-bit octet count describing the
/// length of the text (thus, not including this two-octet header), and
/// the text itself.  Note that the text can be no longer than 255
/// octets, but this is consistent with the need to limit RTCP
/// bandwidth consumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesItem {
    pub kind: SdesItemKind,
    pub content: String,
}

impl SdesItem {
    pub fn cname(content: impl Into<String>) -> Self {
        Self {
            kind: SdesItemKind::Cname,
            content: content.into(),
        }
    }

    /// Encoded size: the two-octet type/length header plus the text.
    pub fn len(&self) -> usize {
        2 + self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// # SDES chunk
///
/// Each chunk consists of an SSRC/CSRC identifier followed by a list
/// of zero or more items, which carry information about the SSRC/CSRC.
/// Each chunk starts on a 32-bit boundary.  The item list is
/// terminated by one or more null octets, the first of which is
/// interpreted as an item type of zero to denote the end of the list,
/// padding the chunk to the next 32-bit boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesChunk {
    pub ssrc: u32,
    items: Vec<SdesItem>,
}

impl SdesChunk {
    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrc,
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[SdesItem] {
        &self.items
    }

    /// Find the item of the given kind, if the chunk carries one.
    pub fn item(&self, kind: SdesItemKind) -> Option<&SdesItem> {
        self.items.iter().find(|item| item.kind == kind)
    }

    /// Add an item to the chunk.  A chunk holds at most one item per
    /// kind; adding an item of a kind already present replaces the old
    /// item in place, preserving the list order.
    ///
    /// # Test
    ///
    /// ```
    /// use rtp_endpoint_codec::rtcp::sdes::{SdesChunk, SdesItem, SdesItemKind};
    ///
    /// let mut chunk = SdesChunk::new(0x79266955);
    /// chunk.add_item(SdesItem::cname("panda"));
    /// chunk.add_item(SdesItem::cname("raspberry"));
    ///
    /// assert_eq!(chunk.items().len(), 1);
    /// assert_eq!(chunk.item(SdesItemKind::Cname).unwrap().content, "raspberry");
    /// ```
    pub fn add_item(&mut self, item: SdesItem) {
        match self.items.iter_mut().find(|it| it.kind == item.kind) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    /// Merge another chunk's items into this one, kind by kind.
    pub fn merge(&mut self, other: &SdesChunk) {
        for item in &other.items {
            self.add_item(item.clone());
        }
    }

    /// Encoded size of the chunk: the SSRC plus the item list, the
    /// terminating null octet and the padding to the next 32-bit
    /// boundary.
    pub fn len(&self) -> usize {
        let items: usize = self.items.iter().map(|item| item.len()).sum();
        4 + (items + 1).next_multiple_of(4)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use rtp_endpoint_codec::rtcp::sdes::{SdesChunk, SdesItem};
    ///
    /// let mut chunk = SdesChunk::new(0x79266955);
    /// chunk.add_item(SdesItem::cname("panda"));
    ///
    /// let mut bytes = BytesMut::new();
    /// chunk.encode(&mut bytes);
    ///
    /// assert_eq!(
    ///     &bytes[..],
    ///     &[
    ///         0x79, 0x26, 0x69, 0x55, 0x01, 0x05, 0x70, 0x61,
    ///         0x6e, 0x64, 0x61, 0x00,
    ///     ]
    /// );
    ///
    /// assert_eq!(bytes.len(), chunk.len());
    /// ```
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.put_u32(self.ssrc);

        let mut size = 0;
        for item in &self.items {
            bytes.put_u8(item.kind.into());
            bytes.put_u8(item.content.len() as u8);
            bytes.extend_from_slice(item.content.as_bytes());
            size += item.len();
        }

        for _ in size..(size + 1).next_multiple_of(4) {
            bytes.put_u8(0);
        }
    }

    /// Decode one chunk, returning it together with the number of
    /// bytes consumed, so that a caller can walk the chunk list of an
    /// SDES packet.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), Error> {
        if buf.len() < 8 {
            return Err(Error::InvalidInput);
        }

        let mut chunk = Self::new(u32::from_be_bytes(buf[0..4].try_into()?));
        let mut offset = 4;

        loop {
            if offset >= buf.len() {
                return Err(Error::InvalidInput);
            }

            let kind = buf[offset];
            if kind == 0 {
                // End of list: the terminator and padding round the
                // item area up to the next 32-bit boundary.
                offset = 4 + (offset - 4 + 1).next_multiple_of(4);
                break;
            }

            if offset + 2 > buf.len() {
                return Err(Error::InvalidInput);
            }

            let size = buf[offset + 1] as usize;
            if offset + 2 + size > buf.len() {
                return Err(Error::InvalidInput);
            }

            chunk.add_item(SdesItem {
                kind: SdesItemKind::try_from(kind).map_err(|_| Error::UnknownSdesKind)?,
                content: std::str::from_utf8(&buf[offset + 2..offset + 2 + size])?.to_string(),
            });

            offset += 2 + size;
        }

        if offset > buf.len() {
            return Err(Error::InvalidInput);
        }

        Ok((chunk, offset))
    }
}

/// # SDES: Source Description RTCP Packet
///
/// ```text
///     0                   1                   2                   3
///     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |V=2|P|    SC   |  PT=SDES=202  |             length            |
///    +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
///    |                          SSRC/CSRC_1                          |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |                           SDES items                          |
///    |                              ...                              |
///    +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// ```
///
/// The SDES packet is a three-level structure composed of a header and
/// zero or more chunks, each of which is composed of items describing
/// the source identified in that chunk.  The source count (SC) field
/// holds the number of chunks contained in the packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDescription {
    chunks: Vec<SdesChunk>,
}

impl SourceDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> &[SdesChunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<SdesChunk> {
        self.chunks
    }

    /// Append a chunk.  An SDES packet holds at most 31 chunks, the
    /// capacity of the 5-bit source count field.
    pub fn add_chunk(&mut self, chunk: SdesChunk) -> Result<(), Error> {
        if self.chunks.len() >= 31 {
            return Err(Error::TooManyChunks);
        }

        self.chunks.push(chunk);
        Ok(())
    }

    /// Encoded size of the packet body and header.
    pub fn len(&self) -> usize {
        4 + self.chunks.iter().map(|chunk| chunk.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub(super) fn decode(count: u8, body: &[u8]) -> Result<Self, Error> {
        let mut chunks = Vec::with_capacity(count as usize);
        let mut offset = 0;

        for _ in 0..count {
            let (chunk, consumed) = SdesChunk::decode(&body[offset..])?;
            chunks.push(chunk);
            offset += consumed;
        }

        Ok(Self { chunks })
    }
}
