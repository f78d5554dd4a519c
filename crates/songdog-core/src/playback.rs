//! Playback device seam.
//!
//! The core only ever talks to a [`PlaybackDevice`]; decoding and audio output
//! live behind it.  Two devices ship here: [`NullDevice`] for headless runs
//! (always unavailable, so the clock stays inert and the game is guess-only)
//! and [`SilentDevice`], which keeps time like a real player without producing
//! sound.

use std::time::{Duration, Instant};

use songdog_proto::protocol::Track;

pub trait PlaybackDevice: Send {
    /// False when the device cannot play at all.  Callers check this before
    /// starting the clock.
    fn is_available(&self) -> bool;
    fn load(&mut self, track: &Track) -> anyhow::Result<()>;
    fn play(&mut self) -> anyhow::Result<()>;
    fn pause(&mut self);
    fn seek_to_zero(&mut self);
    fn set_volume(&mut self, volume: f32);
    /// Seconds since the start of the clip.
    fn elapsed(&self) -> f64;
    /// The clip played to its natural end.
    fn ended(&self) -> bool;
}

/// A device with no output.  Every call is a no-op.
#[derive(Debug, Default)]
pub struct NullDevice;

impl PlaybackDevice for NullDevice {
    fn is_available(&self) -> bool {
        false
    }

    fn load(&mut self, _track: &Track) -> anyhow::Result<()> {
        Ok(())
    }

    fn play(&mut self) -> anyhow::Result<()> {
        anyhow::bail!("no playback device")
    }

    fn pause(&mut self) {}

    fn seek_to_zero(&mut self) {}

    fn set_volume(&mut self, _volume: f32) {}

    fn elapsed(&self) -> f64 {
        0.0
    }

    fn ended(&self) -> bool {
        false
    }
}

/// Store previews are 30 seconds long.
pub const PREVIEW_LENGTH: Duration = Duration::from_secs(30);

/// Wall-clock player: tracks position and end-of-clip exactly like a real
/// device, but produces no sound.
#[derive(Debug)]
pub struct SilentDevice {
    clip_length: Duration,
    loaded: Option<String>,
    /// Position accumulated before the current play run.
    offset: Duration,
    started: Option<Instant>,
    volume: f32,
}

impl SilentDevice {
    pub fn new(clip_length: Duration) -> Self {
        Self {
            clip_length,
            loaded: None,
            offset: Duration::ZERO,
            started: None,
            volume: 1.0,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn loaded(&self) -> Option<&str> {
        self.loaded.as_deref()
    }

    fn position(&self) -> Duration {
        let running = self.started.map(|s| s.elapsed()).unwrap_or_default();
        (self.offset + running).min(self.clip_length)
    }
}

impl Default for SilentDevice {
    fn default() -> Self {
        Self::new(PREVIEW_LENGTH)
    }
}

impl PlaybackDevice for SilentDevice {
    fn is_available(&self) -> bool {
        true
    }

    fn load(&mut self, track: &Track) -> anyhow::Result<()> {
        self.loaded = Some(track.preview_url.clone());
        self.offset = Duration::ZERO;
        self.started = None;
        Ok(())
    }

    fn play(&mut self) -> anyhow::Result<()> {
        if self.loaded.is_none() {
            anyhow::bail!("nothing loaded");
        }
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.offset = self.position();
        self.started = None;
    }

    fn seek_to_zero(&mut self) {
        self.offset = Duration::ZERO;
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn elapsed(&self) -> f64 {
        self.position().as_secs_f64()
    }

    fn ended(&self) -> bool {
        self.loaded.is_some() && self.position() >= self.clip_length
    }
}
