use std::time::Duration;

use bytes::Bytes;

/// Sender control surface: the commands a session accepts for its
/// payload sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderControl {
    Play,
    Pause,
    Stop,
    /// Play until the given media time is reached, then pause.
    PlayUntilTime(Duration),
    /// Play until the given byte offset is reached, then pause.
    PlayUntilByte(u64),
    SeekTime(Duration),
    SeekByte(u64),
}

enum Limit {
    Time(Duration),
    Byte(u64),
}

/// Paces the bytes of a media file out as fixed-size payload chunks.
///
/// Payload-opaque: the file's content is never inspected, only cut
/// into `packet_size` slices emitted one per `interval`.  The session
/// event loop asks for a chunk whenever the pacing timer fires;
/// `None` means the sender is paused, exhausted, or has reached a
/// play-until limit.
pub struct PayloadSender {
    data: Bytes,
    position: usize,
    packet_size: usize,
    interval: Duration,
    playing: bool,
    marker: bool,
    limit: Option<Limit>,
}

impl PayloadSender {
    pub fn new(data: Bytes, packet_size: usize, interval: Duration) -> Self {
        Self {
            data,
            position: 0,
            packet_size,
            interval,
            playing: true,
            marker: true,
            limit: None,
        }
    }

    /// The pacing period between chunks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_playing(&self) -> bool {
        self.playing && self.position < self.data.len()
    }

    /// The media time corresponding to the current position: one
    /// interval per emitted packet.
    fn media_time(&self) -> Duration {
        self.interval * (self.position / self.packet_size) as u32
    }

    pub fn control(&mut self, control: SenderControl) {
        match control {
            SenderControl::Play => {
                self.playing = true;
                self.marker = true;
                self.limit = None;
            }
            SenderControl::Pause => {
                self.playing = false;
            }
            SenderControl::Stop => {
                self.playing = false;
                self.position = 0;
                self.limit = None;
            }
            SenderControl::PlayUntilTime(time) => {
                self.playing = true;
                self.marker = true;
                self.limit = Some(Limit::Time(time));
            }
            SenderControl::PlayUntilByte(byte) => {
                self.playing = true;
                self.marker = true;
                self.limit = Some(Limit::Byte(byte));
            }
            SenderControl::SeekTime(time) => {
                let packets = (time.as_secs_f64() / self.interval.as_secs_f64()) as usize;
                self.position = (packets * self.packet_size).min(self.data.len());
                self.marker = true;
            }
            SenderControl::SeekByte(byte) => {
                self.position = (byte as usize).min(self.data.len());
                self.marker = true;
            }
        }
    }

    /// Take the next payload chunk, with the marker flag set on the
    /// first chunk after a play or seek.
    pub fn next_chunk(&mut self) -> Option<(Bytes, bool)> {
        if !self.playing || self.position >= self.data.len() {
            return None;
        }

        if let Some(limit) = &self.limit {
            let reached = match limit {
                Limit::Time(time) => self.media_time() >= *time,
                Limit::Byte(byte) => self.position as u64 >= *byte,
            };

            if reached {
                self.playing = false;
                self.limit = None;
                return None;
            }
        }

        let end = (self.position + self.packet_size).min(self.data.len());
        let chunk = self.data.slice(self.position..end);
        self.position = end;

        let marker = self.marker;
        self.marker = false;
        Some((chunk, marker))
    }
}
