//! Playback Controller - adaptive-quality playback state machine
//!
//! Coordinates:
//! - Rendition resolution for the opened video
//! - Default rendition selection
//! - The rendition handoff (capture position, swap source, seek, resume)
//! - State and event broadcasting
//!
//! The controller runs as a single task that exclusively owns the session
//! and the media element. Callers talk to it through [`PlaybackController`]
//! messages and observe it through a `watch` channel.

use crate::{
    config::ControllerConfig,
    delivery::DeliveryOrigin,
    events::{EventBus, PlaybackEvent, PlaybackEventRecord},
    media::MediaElement,
    resolver::{into_metadata_error, validate_details, RenditionResolver},
    types::*,
    Error, Result,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Messages accepted by the controller task
#[derive(Debug)]
enum Command {
    Open(VideoId),
    ChangeQuality(String),
    Play,
    Pause,
    Seek(f64),
    Close,
    Flush(oneshot::Sender<()>),
}

impl Command {
    /// Commands that end a run of coalescable quality changes
    fn is_barrier(&self) -> bool {
        matches!(self, Command::Open(_) | Command::Close | Command::Flush(_))
    }
}

/// Outcome of a resolver call, tagged with the open it belongs to
struct Resolution {
    generation: u64,
    video_id: VideoId,
    result: Result<VideoDetails>,
}

/// Handle to a running playback controller.
///
/// Cloning is cheap; all clones drive the same controller. The controller
/// task stops once every handle is dropped.
#[derive(Clone)]
pub struct PlaybackController {
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ControllerState>,
    events_tx: broadcast::Sender<PlaybackEventRecord>,
}

impl PlaybackController {
    /// Start a controller task on the current tokio runtime
    pub fn spawn<R, M>(
        config: ControllerConfig,
        origin: DeliveryOrigin,
        resolver: R,
        media: M,
    ) -> Result<(Self, JoinHandle<()>)>
    where
        R: RenditionResolver + 'static,
        M: MediaElement + 'static,
    {
        config.validate()?;

        let (commands, command_rx) = mpsc::channel(config.command_buffer);
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ControllerState::Idle);
        let (events_tx, _) = broadcast::channel(config.event_buffer);

        let task = ControllerTask {
            config,
            origin,
            resolver: Arc::new(resolver),
            media: Box::new(media),
            session: None,
            generation: 0,
            inflight: None,
            state_tx,
            events: EventBus::new(events_tx.clone()),
            resolved_tx,
            queue: VecDeque::new(),
        };
        let join = tokio::spawn(task.run(command_rx, resolved_rx));

        Ok((
            Self {
                commands,
                state_rx,
                events_tx,
            },
            join,
        ))
    }

    /// Open a video, replacing whatever was open. Also the retry path after
    /// a failed resolution.
    pub async fn open(&self, video_id: VideoId) -> Result<()> {
        self.send(Command::Open(video_id)).await
    }

    /// Switch to another rendition of the open video.
    ///
    /// Unknown or already-active renditions are ignored. Requests that pile
    /// up behind a running switch collapse to the most recent one.
    pub async fn request_quality_change(&self, quality: impl Into<String>) -> Result<()> {
        self.send(Command::ChangeQuality(quality.into())).await
    }

    /// Resume playback. Does nothing unless the controller is ready.
    pub async fn play(&self) -> Result<()> {
        self.send(Command::Play).await
    }

    /// Pause playback. Does nothing unless the controller is ready.
    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    /// Seek to `position` seconds. Does nothing unless the controller is ready.
    pub async fn seek(&self, position: f64) -> Result<()> {
        self.send(Command::Seek(position)).await
    }

    /// Discard the session. A resolution still in flight is dropped.
    pub async fn close(&self) -> Result<()> {
        self.send(Command::Close).await
    }

    /// Wait until every message sent before this call has been handled.
    ///
    /// Resolver calls started by those messages may still be in flight.
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx)).await?;
        rx.await.map_err(|_| Error::ControllerClosed)
    }

    /// Current controller state
    pub fn state(&self) -> ControllerState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state_rx.clone()
    }

    /// Subscribe to playback events
    pub fn events(&self) -> broadcast::Receiver<PlaybackEventRecord> {
        self.events_tx.subscribe()
    }

    /// Wait for a state matching `predicate`, starting with the current one
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<ControllerState>
    where
        F: FnMut(&ControllerState) -> bool,
    {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(|state| predicate(state))
            .await
            .map_err(|_| Error::ControllerClosed)?;
        Ok(state.clone())
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::ControllerClosed)
    }
}

/// Transient state of one open video
#[derive(Debug)]
struct PlaybackSession {
    id: SessionId,
    video_id: VideoId,
    phase: PlaybackPhase,
    details: Option<VideoDetails>,
    quality: Option<String>,
    stream_url: Option<Url>,
    /// Target of the switch in flight
    switch_target: Option<String>,
    last_handoff: Option<TransportSnapshot>,
    error: Option<String>,
}

impl PlaybackSession {
    fn new(id: SessionId, video_id: VideoId) -> Self {
        Self {
            id,
            video_id,
            phase: PlaybackPhase::Idle,
            details: None,
            quality: None,
            stream_url: None,
            switch_target: None,
            last_handoff: None,
            error: None,
        }
    }

    fn ready_view(&self) -> Option<ReadyView> {
        let details = self.details.as_ref()?;
        Some(ReadyView {
            session_id: self.id,
            video: details.video.clone(),
            quality: self.quality.clone()?,
            stream_url: self.stream_url.clone()?,
            qualities: details
                .available_qualities
                .keys()
                .map(str::to_string)
                .collect(),
            last_handoff: self.last_handoff,
        })
    }

    fn view(&self) -> ControllerState {
        match self.phase {
            PlaybackPhase::Idle => ControllerState::Idle,
            PlaybackPhase::LoadingDetails => ControllerState::LoadingDetails {
                video_id: self.video_id,
            },
            PlaybackPhase::Failed => ControllerState::Failed {
                video_id: self.video_id,
                message: self.error.clone().unwrap_or_default(),
            },
            PlaybackPhase::Ready => match self.ready_view() {
                Some(view) => ControllerState::Ready(view),
                None => ControllerState::LoadingDetails {
                    video_id: self.video_id,
                },
            },
            PlaybackPhase::SwitchingRendition => match self.ready_view() {
                Some(view) => ControllerState::SwitchingRendition {
                    view,
                    target: self.switch_target.clone().unwrap_or_default(),
                },
                None => ControllerState::LoadingDetails {
                    video_id: self.video_id,
                },
            },
        }
    }
}

/// The controller task. Owns the session and the media element.
struct ControllerTask {
    config: ControllerConfig,
    origin: DeliveryOrigin,
    resolver: Arc<dyn RenditionResolver>,
    media: Box<dyn MediaElement>,
    session: Option<PlaybackSession>,
    /// Bumped on every open and close; stale resolutions carry an old value
    generation: u64,
    inflight: Option<JoinHandle<()>>,
    state_tx: watch::Sender<ControllerState>,
    events: EventBus,
    resolved_tx: mpsc::UnboundedSender<Resolution>,
    queue: VecDeque<Command>,
}

impl ControllerTask {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut resolved: mpsc::UnboundedReceiver<Resolution>,
    ) {
        info!("Playback controller started");

        loop {
            // Pull in everything already sent so switch requests can be coalesced
            while let Ok(command) = commands.try_recv() {
                self.queue.push_back(command);
            }

            if let Some(command) = self.next_command() {
                self.dispatch(command).await;
                continue;
            }

            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.queue.push_back(command),
                    None => break,
                },
                Some(resolution) = resolved.recv() => {
                    if let Err(e) = self.on_resolved(resolution).await {
                        warn!(error = %e, code = e.error_code(), "Failed to apply resolution");
                    }
                }
            }
        }

        self.cancel_resolution();
        self.media.unload();
        info!("Playback controller stopped");
    }

    /// Next queued command. Requests for renditions the open video lacks
    /// are dropped, and a quality change is skipped when a later valid one
    /// in the same run supersedes it.
    fn next_command(&mut self) -> Option<Command> {
        loop {
            let target = match self.queue.pop_front()? {
                Command::ChangeQuality(target) => target,
                other => return Some(other),
            };

            if self.offers(&target) == Some(false) {
                let err = Error::InvalidRenditionRequested(target.clone());
                debug!(error = %err, code = err.error_code(), "Ignoring quality change");
                self.emit(PlaybackEvent::InvalidRendition { requested: target });
                continue;
            }

            let superseded = self
                .queue
                .iter()
                .take_while(|c| !c.is_barrier())
                .any(|c| match c {
                    Command::ChangeQuality(later) => self.offers(later) != Some(false),
                    _ => false,
                });
            if !superseded {
                return Some(Command::ChangeQuality(target));
            }

            debug!(skipped = %target, "Quality change superseded by a newer request");
            self.emit(PlaybackEvent::SwitchCoalesced { skipped: target });
        }
    }

    /// Whether the open video has rendition `key`; `None` until its
    /// renditions are known
    fn offers(&self, key: &str) -> Option<bool> {
        let details = self.session.as_ref()?.details.as_ref()?;
        Some(details.available_qualities.contains(key))
    }

    async fn dispatch(&mut self, command: Command) {
        let result = match command {
            Command::Open(video_id) => self.open(video_id),
            Command::ChangeQuality(target) => self.change_quality(target).await,
            Command::Play => self.play().await,
            Command::Pause => {
                self.pause();
                Ok(())
            }
            Command::Seek(position) => self.seek(position).await,
            Command::Close => {
                self.close();
                Ok(())
            }
            Command::Flush(done) => {
                let _ = done.send(());
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(error = %e, code = e.error_code(), "Playback command failed");
        }
    }

    // ------------------------------------------------------------------
    // Open / resolve
    // ------------------------------------------------------------------

    fn open(&mut self, video_id: VideoId) -> Result<()> {
        // Re-opening the video that is already open keeps its session
        let session_id = match &self.session {
            Some(session) if session.video_id == video_id => session.id,
            _ => SessionId::new(),
        };

        self.cancel_resolution();
        self.media.unload();
        self.generation += 1;
        self.session = Some(PlaybackSession::new(session_id, video_id));
        self.set_phase(PlaybackPhase::LoadingDetails)?;

        info!(video_id, session_id = %session_id, "Opening video");
        self.emit(PlaybackEvent::Opened { video_id });

        let resolver = Arc::clone(&self.resolver);
        let tx = self.resolved_tx.clone();
        let generation = self.generation;
        self.inflight = Some(tokio::spawn(async move {
            let result = resolver.resolve(video_id).await;
            let _ = tx.send(Resolution {
                generation,
                video_id,
                result,
            });
        }));

        Ok(())
    }

    #[instrument(skip(self, resolution), fields(video_id = resolution.video_id))]
    async fn on_resolved(&mut self, resolution: Resolution) -> Result<()> {
        let Resolution {
            generation,
            video_id,
            result,
        } = resolution;

        let awaiting = self
            .session
            .as_ref()
            .is_some_and(|s| s.video_id == video_id && s.phase == PlaybackPhase::LoadingDetails);
        if generation != self.generation || !awaiting {
            debug!(generation, current = self.generation, "Discarding stale resolution");
            return Ok(());
        }
        self.inflight = None;

        let details = match result.and_then(|d| validate_details(video_id, &d).map(|_| d)) {
            Ok(details) => details,
            Err(e) => {
                self.fail(into_metadata_error(video_id, e));
                return Ok(());
            }
        };

        let (quality, location) = {
            let qualities = &details.available_qualities;
            let quality = qualities
                .default_key(&self.config.default_quality)
                .ok_or_else(|| Error::metadata(video_id, "no renditions available"))?;
            let location = qualities.get(quality).unwrap_or_default();
            (quality.to_string(), location.to_string())
        };

        let url = match self.origin.resolve(&location) {
            Ok(url) => url,
            Err(e) => {
                self.fail(e);
                return Ok(());
            }
        };

        if let Err(e) = self.media.load(&url).await {
            self.fail(e);
            return Ok(());
        }

        let qualities: Vec<String> = details
            .available_qualities
            .keys()
            .map(str::to_string)
            .collect();
        if let Some(session) = self.session.as_mut() {
            session.details = Some(details);
            session.quality = Some(quality.clone());
            session.stream_url = Some(url.clone());
        }
        self.set_phase(PlaybackPhase::Ready)?;

        info!(quality = %quality, url = %url, "Initial rendition selected");
        self.emit(PlaybackEvent::DetailsResolved {
            video_id,
            quality,
            qualities,
        });

        // Playback begins from time zero
        self.resume().await;
        Ok(())
    }

    fn fail(&mut self, error: Error) {
        warn!(error = %error, code = error.error_code(), "Video could not be opened");

        let message = error.to_string();
        let video_id = match self.session.as_mut() {
            Some(session) => {
                session.details = None;
                session.quality = None;
                session.stream_url = None;
                session.error = Some(message.clone());
                session.video_id
            }
            None => return,
        };
        self.media.unload();

        if let Err(e) = self.set_phase(PlaybackPhase::Failed) {
            warn!(error = %e, "Could not enter failed state");
        }
        self.emit(PlaybackEvent::ResolveFailed {
            video_id,
            code: error.error_code().to_string(),
            message,
        });
    }

    // ------------------------------------------------------------------
    // Rendition handoff
    // ------------------------------------------------------------------

    async fn change_quality(&mut self, target: String) -> Result<()> {
        let (location, previous, previous_url) = {
            let Some(session) = self.session.as_ref() else {
                debug!(requested = %target, "No video open; ignoring quality change");
                return Ok(());
            };
            if session.phase != PlaybackPhase::Ready {
                debug!(phase = %session.phase, requested = %target, "Not ready; ignoring quality change");
                return Ok(());
            }
            let location = session
                .details
                .as_ref()
                .and_then(|d| d.available_qualities.get(&target))
                .map(str::to_string);
            (location, session.quality.clone(), session.stream_url.clone())
        };

        let Some(location) = location else {
            let err = Error::InvalidRenditionRequested(target.clone());
            debug!(error = %err, code = err.error_code(), "Ignoring quality change");
            self.emit(PlaybackEvent::InvalidRendition { requested: target });
            return Ok(());
        };
        let previous = previous.unwrap_or_default();
        if previous == target {
            debug!(quality = %target, "Rendition already active");
            return Ok(());
        }

        // 1. Capture transport state from the live element
        let snapshot = TransportSnapshot {
            position: self.media.current_time(),
            paused: self.media.is_paused(),
        };
        if let Some(session) = self.session.as_mut() {
            session.switch_target = Some(target.clone());
        }
        self.set_phase(PlaybackPhase::SwitchingRendition)?;
        info!(
            from = %previous,
            to = %target,
            position = snapshot.position,
            paused = snapshot.paused,
            "Switching rendition"
        );

        // 2. Absolute URL for the target, independent of the previous one
        let url = match self.origin.resolve(&location) {
            Ok(url) => url,
            Err(e) => {
                self.end_switch(None)?;
                return Err(e);
            }
        };

        // 3. Swap the source; the element restarts from zero
        if let Err(e) = self.media.load(&url).await {
            warn!(error = %e, url = %url, "New rendition failed to load; restoring previous");
            if let Some(previous_url) = previous_url {
                self.restore(&previous_url, snapshot).await;
            }
            self.end_switch(None)?;
            return Err(e);
        }

        // 4. Seek back to the captured position and restore play state
        let position = self.seek_target(snapshot.position);
        if let Err(e) = self.media.seek(position).await {
            warn!(error = %e, position, "Seek after rendition switch failed");
        }
        if !snapshot.paused {
            self.resume().await;
        }

        self.end_switch(Some((target.clone(), url, snapshot)))?;
        self.emit(PlaybackEvent::QualitySwitched {
            from: previous,
            to: target,
            position,
            paused: self.media.is_paused(),
        });
        Ok(())
    }

    /// Leave `SwitchingRendition`, committing the new rendition if given
    fn end_switch(&mut self, committed: Option<(String, Url, TransportSnapshot)>) -> Result<()> {
        if let Some(session) = self.session.as_mut() {
            session.switch_target = None;
            if let Some((quality, url, snapshot)) = committed {
                session.quality = Some(quality);
                session.stream_url = Some(url);
                session.last_handoff = Some(snapshot);
            }
        }
        self.set_phase(PlaybackPhase::Ready)
    }

    /// Put the previous rendition back after a failed swap
    async fn restore(&mut self, url: &Url, snapshot: TransportSnapshot) {
        if let Err(e) = self.media.load(url).await {
            warn!(error = %e, url = %url, "Previous rendition failed to reload");
            return;
        }
        let position = self.seek_target(snapshot.position);
        if let Err(e) = self.media.seek(position).await {
            warn!(error = %e, position, "Seek on restore failed");
        }
        if !snapshot.paused {
            self.resume().await;
        }
    }

    /// Position to seek to on the loaded source. Positions past its end
    /// land at the end, less the configured margin.
    fn seek_target(&self, position: f64) -> f64 {
        let position = if position.is_finite() {
            position.max(0.0)
        } else {
            0.0
        };
        match self.media.duration() {
            Some(duration) if position > duration => {
                (duration - self.config.clamp_margin_secs).max(0.0)
            }
            _ => position,
        }
    }

    /// Resume playback. A rejection leaves playback paused and is reported
    /// as an event only.
    async fn resume(&mut self) -> bool {
        match self.media.play().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Playback resume rejected; staying paused");
                self.media.pause();
                self.emit(PlaybackEvent::ResumeBlocked {
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Transport passthrough
    // ------------------------------------------------------------------

    fn is_ready(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.phase == PlaybackPhase::Ready)
    }

    async fn play(&mut self) -> Result<()> {
        if self.is_ready() {
            self.resume().await;
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.is_ready() {
            self.media.pause();
        }
    }

    async fn seek(&mut self, position: f64) -> Result<()> {
        if !self.is_ready() {
            debug!(position, "Not ready; ignoring seek");
            return Ok(());
        }
        let target = self.seek_target(position);
        self.media.seek(target).await
    }

    // ------------------------------------------------------------------
    // Close
    // ------------------------------------------------------------------

    fn close(&mut self) {
        self.cancel_resolution();
        self.generation += 1;

        let Some(session) = self.session.take() else {
            return;
        };
        self.media.pause();
        self.media.unload();
        self.publish();

        info!(video_id = session.video_id, session_id = %session.id, "Playback closed");
        self.events.emit(
            Some(session.id),
            PlaybackEvent::Closed {
                video_id: session.video_id,
            },
        );
    }

    fn cancel_resolution(&mut self) {
        if let Some(inflight) = self.inflight.take() {
            inflight.abort();
        }
    }

    // ------------------------------------------------------------------
    // State plumbing
    // ------------------------------------------------------------------

    fn set_phase(&mut self, next: PlaybackPhase) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::Internal("no open session".to_string()))?;

        if !session.phase.can_transition_to(next) {
            return Err(Error::Internal(format!(
                "invalid phase transition: {} -> {}",
                session.phase, next
            )));
        }

        debug!(from = %session.phase, to = %next, "Phase transition");
        session.phase = next;
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        let state = self
            .session
            .as_ref()
            .map(PlaybackSession::view)
            .unwrap_or(ControllerState::Idle);
        self.state_tx.send_replace(state);
    }

    fn emit(&mut self, event: PlaybackEvent) {
        let session_id = self.session.as_ref().map(|s| s.id);
        self.events.emit(session_id, event);
    }
}
