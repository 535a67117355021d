//! Scripted collaborators for tests and headless demos
//!
//! [`SimContentPlayer`] and [`SimAdEngine`] implement the collaborator
//! traits without any real media engine behind them: commands are recorded
//! for assertion and mirrored back as lifecycle events, and optional drivers
//! advance a simulated playhead in (scaled) real time. The integration
//! suite, the examples, and the CLI all run against these.

use crate::{
    ads::{AdBreakManager, AdEngine, AdEvent},
    coordinator::EventSink,
    error::{Error, Result},
    player::{ContentEvent, ContentPlayer},
    types::{AdMetadata, AdRequest, ContentSource},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Commands observed by the simulated content player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Prepare,
    Play,
    Pause,
    Seek(f64),
    SetMuted(bool),
    Stop,
}

/// Commands observed by the simulated ad break
#[derive(Debug, Clone, PartialEq)]
pub enum AdCommand {
    Start,
    Pause,
    Resume,
    Skip,
    SetVolume(f64),
    Release,
}

/// Build a consistent pod of `count` ads, each `duration` seconds long
pub fn ad_pod(count: u32, duration: f64, skippable: bool) -> Vec<AdMetadata> {
    (1..=count)
        .map(|position| AdMetadata {
            ad_id: format!("ad-{position}"),
            title: Some(format!("Creative {position}")),
            pod_position: position,
            pod_size: count,
            duration,
            skippable,
            skip_offset: skippable.then(|| 5.0_f64.min(duration)),
        })
        .collect()
}

struct PlayerSimState {
    sink: Option<EventSink>,
    playing: bool,
    position: f64,
}

/// Simulated content player.
///
/// Mirrors commands back as lifecycle events (`play` emits `Playing`, and so
/// on) unless built with [`silent`](Self::silent), and records every command
/// it receives.
pub struct SimContentPlayer {
    duration: f64,
    fail_prepare: Option<String>,
    prepare_delay: Option<Duration>,
    echo: bool,
    state: Mutex<PlayerSimState>,
    commands: Mutex<Vec<PlayerCommand>>,
}

impl SimContentPlayer {
    /// Player for a `duration`-second asset that echoes lifecycle events
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            fail_prepare: None,
            prepare_delay: None,
            echo: true,
            state: Mutex::new(PlayerSimState {
                sink: None,
                playing: false,
                position: 0.0,
            }),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Player whose `prepare` fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        let mut player = Self::new(0.0);
        player.fail_prepare = Some(message.into());
        player
    }

    /// Player that records commands but emits no events on its own,
    /// for scripted replays
    pub fn silent(duration: f64) -> Self {
        let mut player = Self::new(duration);
        player.echo = false;
        player
    }

    /// Delay `prepare` by `delay`, for exercising in-flight load guards
    pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = Some(delay);
        self
    }

    /// Commands received so far, in order
    pub fn commands(&self) -> Vec<PlayerCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Current simulated playhead
    pub fn position(&self) -> f64 {
        self.state.lock().unwrap().position
    }

    fn log(&self, command: PlayerCommand) {
        self.commands.lock().unwrap().push(command);
    }

    fn emit(&self, event: ContentEvent) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.content(event);
        }
    }

    /// Advance the playhead while playing, emitting a time sample every
    /// `tick` of wall time for `tick * rate` seconds of media. Emits
    /// `Completed` and returns once the asset ends.
    pub async fn drive(&self, tick: Duration, rate: f64) {
        let step = tick.as_secs_f64() * rate;
        loop {
            tokio::time::sleep(tick).await;
            let mut finished = false;
            let mut sample = None;
            {
                let mut state = self.state.lock().unwrap();
                if state.playing {
                    state.position = (state.position + step).min(self.duration);
                    sample = Some(state.position);
                    if state.position >= self.duration {
                        state.playing = false;
                        finished = true;
                    }
                }
            }
            if let Some(position) = sample {
                self.emit(ContentEvent::TimeUpdate {
                    position,
                    duration: Some(self.duration),
                });
                if finished {
                    self.emit(ContentEvent::Completed);
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl ContentPlayer for SimContentPlayer {
    async fn prepare(&self, source: &ContentSource, events: EventSink) -> Result<()> {
        self.log(PlayerCommand::Prepare);
        if let Some(delay) = self.prepare_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_prepare {
            return Err(Error::ContentPrepareFailed(message.clone()));
        }
        {
            let mut state = self.state.lock().unwrap();
            state.sink = Some(events);
            state.position = source.start_position.max(0.0);
            state.playing = false;
        }
        if self.echo {
            self.emit(ContentEvent::Ready {
                duration: Some(self.duration),
            });
        }
        Ok(())
    }

    async fn play(&self) {
        self.log(PlayerCommand::Play);
        self.state.lock().unwrap().playing = true;
        if self.echo {
            self.emit(ContentEvent::Playing);
        }
    }

    async fn pause(&self) {
        self.log(PlayerCommand::Pause);
        self.state.lock().unwrap().playing = false;
        if self.echo {
            self.emit(ContentEvent::Paused);
        }
    }

    async fn seek(&self, position: f64) {
        self.log(PlayerCommand::Seek(position));
        self.state.lock().unwrap().position = position;
        if self.echo {
            self.emit(ContentEvent::TimeUpdate {
                position,
                duration: Some(self.duration),
            });
        }
    }

    async fn set_muted(&self, muted: bool) {
        self.log(PlayerCommand::SetMuted(muted));
    }

    async fn stop(&self) {
        self.log(PlayerCommand::Stop);
        self.state.lock().unwrap().playing = false;
    }
}

struct BreakState {
    current: usize,
    position: f64,
    playing: bool,
}

/// Simulated ad break handed out by [`SimAdEngine`]
pub struct SimAdBreak {
    pod: Vec<AdMetadata>,
    sink: EventSink,
    scripted: bool,
    state: Mutex<BreakState>,
    commands: Mutex<Vec<AdCommand>>,
}

impl SimAdBreak {
    fn new(pod: Vec<AdMetadata>, sink: EventSink, scripted: bool) -> Self {
        Self {
            pod,
            sink,
            scripted,
            state: Mutex::new(BreakState {
                current: 0,
                position: 0.0,
                playing: false,
            }),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Commands received so far, in order
    pub fn commands(&self) -> Vec<AdCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Metadata of the ad the break is currently on
    pub fn current_ad(&self) -> Option<AdMetadata> {
        let state = self.state.lock().unwrap();
        self.pod.get(state.current).cloned()
    }

    fn log(&self, command: AdCommand) {
        self.commands.lock().unwrap().push(command);
    }

    /// Play the pod through, one time sample per `tick` of wall time at
    /// `tick * rate` seconds of media, advancing across ads until the pod
    /// completes.
    pub async fn drive(&self, tick: Duration, rate: f64) {
        let step = tick.as_secs_f64() * rate;
        loop {
            tokio::time::sleep(tick).await;
            let mut events = Vec::new();
            let mut done = false;
            {
                let mut state = self.state.lock().unwrap();
                if state.playing && state.current < self.pod.len() {
                    let ad = self.pod[state.current].clone();
                    state.position = (state.position + step).min(ad.duration);
                    events.push(AdEvent::TimeUpdate {
                        position: state.position,
                        duration: ad.duration,
                    });
                    if state.position >= ad.duration {
                        events.push(AdEvent::Completed);
                        if state.current + 1 < self.pod.len() {
                            state.current += 1;
                            state.position = 0.0;
                            events.push(AdEvent::Started {
                                ad: self.pod[state.current].clone(),
                            });
                        } else {
                            state.playing = false;
                            events.push(AdEvent::PodCompleted);
                            done = true;
                        }
                    }
                }
            }
            for event in events {
                self.sink.ad(event);
            }
            if done {
                return;
            }
        }
    }
}

/// Shared handle so the engine can retain the break for inspection while the
/// coordinator owns the manager box
struct SharedAdBreak(Arc<SimAdBreak>);

#[async_trait]
impl AdBreakManager for SharedAdBreak {
    async fn start(&self) {
        self.0.log(AdCommand::Start);
        if self.0.scripted {
            return;
        }
        self.0.sink.ad(AdEvent::Loaded);
        if self.0.pod.is_empty() {
            self.0.sink.ad(AdEvent::PodCompleted);
            return;
        }
        self.0.state.lock().unwrap().playing = true;
        self.0.sink.ad(AdEvent::Started {
            ad: self.0.pod[0].clone(),
        });
    }

    async fn pause(&self) {
        self.0.log(AdCommand::Pause);
        self.0.state.lock().unwrap().playing = false;
        if !self.0.scripted {
            self.0.sink.ad(AdEvent::Paused);
        }
    }

    async fn resume(&self) {
        self.0.log(AdCommand::Resume);
        self.0.state.lock().unwrap().playing = true;
        if !self.0.scripted {
            self.0.sink.ad(AdEvent::Resumed);
        }
    }

    async fn skip(&self) {
        self.0.log(AdCommand::Skip);
        if self.0.scripted {
            return;
        }
        let skippable = self.0.current_ad().is_some_and(|ad| ad.skippable);
        if skippable {
            self.0.state.lock().unwrap().playing = false;
            self.0.sink.ad(AdEvent::Skipped);
        }
    }

    async fn set_volume(&self, volume: f64) {
        self.0.log(AdCommand::SetVolume(volume));
    }

    async fn release(&self) {
        self.0.log(AdCommand::Release);
        self.0.state.lock().unwrap().playing = false;
    }
}

/// Simulated ad-decision service.
///
/// Resolves every request into a [`SimAdBreak`] over a fixed pod, fails every
/// request, or hands out an inert break for scripted replays.
pub struct SimAdEngine {
    pod: Vec<AdMetadata>,
    fail_request: Option<String>,
    scripted: bool,
    last_break: Mutex<Option<Arc<SimAdBreak>>>,
}

impl SimAdEngine {
    /// Engine that serves `pod` for every request
    pub fn with_pod(pod: Vec<AdMetadata>) -> Self {
        Self {
            pod,
            fail_request: None,
            scripted: false,
            last_break: Mutex::new(None),
        }
    }

    /// Engine with no fill: every request fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        let mut engine = Self::with_pod(Vec::new());
        engine.fail_request = Some(message.into());
        engine
    }

    /// Engine whose breaks accept commands but emit nothing on their own,
    /// for scripted replays
    pub fn scripted() -> Self {
        let mut engine = Self::with_pod(Vec::new());
        engine.scripted = true;
        engine
    }

    /// The break created by the most recent request, for driving and
    /// inspection
    pub fn last_break(&self) -> Option<Arc<SimAdBreak>> {
        self.last_break.lock().unwrap().clone()
    }
}

#[async_trait]
impl AdEngine for SimAdEngine {
    async fn request_ads(
        &self,
        request: &AdRequest,
        events: EventSink,
    ) -> Result<Box<dyn AdBreakManager>> {
        if let Some(message) = &self.fail_request {
            return Err(Error::AdRequestFailed(message.clone()));
        }

        let mut pod = self.pod.clone();
        if let Some(cap) = request.max_pod_size {
            pod.truncate(cap as usize);
            let size = pod.len() as u32;
            for (index, ad) in pod.iter_mut().enumerate() {
                ad.pod_position = index as u32 + 1;
                ad.pod_size = size;
            }
        }

        let ad_break = Arc::new(SimAdBreak::new(pod, events, self.scripted));
        *self.last_break.lock().unwrap() = Some(ad_break.clone());
        Ok(Box::new(SharedAdBreak(ad_break)))
    }
}
