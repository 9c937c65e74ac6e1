//! Simulated media handle
//!
//! A headless [`MediaHandle`] that advances its own clock while playing and
//! reports through the media event channel the way a browser element does.
//! Used by the CLI to drive a whole watch session without a decoder.

use crate::{
    media::{MediaEvent, MediaEventSender, MediaHandle, SessionEvent, TimeRange},
    Error, Result, SessionId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use url::Url;

/// Native time update cadence
const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Seconds buffered ahead of the play head
const BUFFER_AHEAD: f64 = 30.0;

#[derive(Debug, Default)]
struct ClockState {
    session: Option<SessionId>,
    current_time: f64,
    duration: f64,
    paused: bool,
}

/// Media handle with a simulated play head
pub struct SimulatedMedia {
    state: Arc<Mutex<ClockState>>,
    events: MediaEventSender,
    speed: f64,
    default_duration: f64,
    durations: HashMap<Url, f64>,
    volume: f64,
    muted: bool,
    clock: Option<JoinHandle<()>>,
}

fn lock(state: &Mutex<ClockState>) -> MutexGuard<'_, ClockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimulatedMedia {
    /// `speed` is media seconds per wall-clock second
    pub fn new(events: MediaEventSender, speed: f64, default_duration: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                paused: true,
                ..Default::default()
            })),
            events,
            speed: if speed > 0.0 { speed } else { 1.0 },
            default_duration: default_duration.max(0.0),
            durations: HashMap::new(),
            volume: 1.0,
            muted: false,
            clock: None,
        }
    }

    /// Known duration for a locator
    pub fn with_duration(mut self, locator: Url, seconds: f64) -> Self {
        self.durations.insert(locator, seconds.max(0.0));
        self
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    fn emit(&self, session: SessionId, event: MediaEvent) {
        // The receiver is gone only after the runtime stopped
        let _ = self.events.send(SessionEvent::new(session, event));
    }

    fn stop_clock(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
    }

    fn start_clock(&mut self, session: SessionId) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Media(format!("no async runtime for the media clock: {}", e)))?;

        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let step = TIME_UPDATE_INTERVAL.as_secs_f64() * self.speed;

        self.clock = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(TIME_UPDATE_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;

                let ended = {
                    let mut s = lock(&state);
                    if s.session != Some(session) || s.paused {
                        break;
                    }
                    s.current_time = (s.current_time + step).min(s.duration);
                    let ended = s.current_time >= s.duration;
                    if ended {
                        s.paused = true;
                    }
                    trace!(current_time = s.current_time, "Clock tick");
                    ended
                };

                let _ = events.send(SessionEvent::new(session, MediaEvent::TimeUpdate));
                if ended {
                    let _ = events.send(SessionEvent::new(session, MediaEvent::Pause));
                    let _ = events.send(SessionEvent::new(session, MediaEvent::Ended));
                    break;
                }
            }
        }));
        Ok(())
    }
}

impl MediaHandle for SimulatedMedia {
    fn set_source(&mut self, locator: &Url, session: SessionId) {
        self.stop_clock();
        let duration = self.durations.get(locator).copied().unwrap_or(self.default_duration);
        {
            let mut s = lock(&self.state);
            s.session = Some(session);
            s.current_time = 0.0;
            s.duration = duration;
            s.paused = true;
        }
        debug!(%locator, duration, "Simulated source set");
        self.emit(session, MediaEvent::LoadedMetadata);
    }

    fn clear_source(&mut self) {
        self.stop_clock();
        let mut s = lock(&self.state);
        s.session = None;
        s.current_time = 0.0;
        s.duration = 0.0;
        s.paused = true;
    }

    fn play(&mut self) -> Result<()> {
        let session = {
            let mut s = lock(&self.state);
            let session = s.session.ok_or_else(|| Error::Media("no source bound".into()))?;
            if !s.paused {
                return Ok(());
            }
            if s.current_time >= s.duration {
                s.current_time = 0.0;
            }
            s.paused = false;
            session
        };

        self.stop_clock();
        if let Err(e) = self.start_clock(session) {
            lock(&self.state).paused = true;
            return Err(e);
        }
        self.emit(session, MediaEvent::Play);
        self.emit(session, MediaEvent::Playing);
        Ok(())
    }

    fn pause(&mut self) {
        let session = {
            let mut s = lock(&self.state);
            if s.paused {
                return;
            }
            s.paused = true;
            s.session
        };
        self.stop_clock();
        if let Some(session) = session {
            self.emit(session, MediaEvent::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }

    fn current_time(&self) -> f64 {
        lock(&self.state).current_time
    }

    fn set_current_time(&mut self, time: f64) {
        let session = {
            let mut s = lock(&self.state);
            s.current_time = time.clamp(0.0, s.duration);
            s.session
        };
        if let Some(session) = session {
            self.emit(session, MediaEvent::TimeUpdate);
        }
    }

    fn duration(&self) -> f64 {
        lock(&self.state).duration
    }

    fn buffered(&self) -> Vec<TimeRange> {
        let s = lock(&self.state);
        if s.session.is_none() || s.duration <= 0.0 {
            return Vec::new();
        }
        vec![TimeRange::new(0.0, (s.current_time + BUFFER_AHEAD).min(s.duration))]
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }
}

impl Drop for SimulatedMedia {
    fn drop(&mut self) {
        self.stop_clock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn url(name: &str) -> Url {
        Url::parse(&format!("https://cdn.example.com/{}.mp4", name)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_to_end_and_reports() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut media = SimulatedMedia::new(tx, 1.0, 60.0).with_duration(url("a"), 1.0);
        let session = SessionId::new();

        media.set_source(&url("a"), session);
        assert_eq!(media.duration(), 1.0);
        media.play().unwrap();

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            assert_eq!(ev.session, session);
            events.push(ev.event);
            if ev.event == MediaEvent::Ended {
                break;
            }
        }

        assert_eq!(&events[..3], &[MediaEvent::LoadedMetadata, MediaEvent::Play, MediaEvent::Playing]);
        assert_eq!(events.iter().filter(|e| **e == MediaEvent::TimeUpdate).count(), 4);
        assert_eq!(events.last(), Some(&MediaEvent::Ended));
        assert!(media.is_paused());
        assert_eq!(media.current_time(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_clock() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut media = SimulatedMedia::new(tx, 2.0, 60.0);
        media.set_source(&url("a"), SessionId::new());
        media.play().unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        media.pause();
        let at_pause = media.current_time();
        assert_eq!(at_pause, 2.0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(media.current_time(), at_pause);
        assert_eq!(media.buffered(), vec![TimeRange::new(0.0, 32.0)]);
    }

    #[test]
    fn test_play_without_source_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut media = SimulatedMedia::new(tx, 1.0, 60.0);
        assert!(matches!(media.play(), Err(Error::Media(_))));
    }
}
