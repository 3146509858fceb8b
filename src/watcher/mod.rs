//! Surface watcher: the per-surface dispatch loop.
//!
//! One task per watched surface owns the [`SignalBus`], the [`Popup`] and
//! the [`RefreshCoordinator`] handle. Host events, refresh results and the
//! earliest pending deadline are multiplexed with `tokio::select!`, so all
//! state changes happen on that single task and need no locking.
//!
//! ```text
//! host ──SurfaceEvent──→ ┐
//! coordinator ──result──→├─ select! ─→ SignalBus ─intent─→ Popup ─ticket─→ coordinator
//! deadline elapsed ─────→ ┘
//! ```

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::HoverConfig;
use crate::error::{HoverError, HoverResult};
use crate::geometry::{GeometryOracle, GridGeometry};
use crate::popup::{Decorations, HoverObserver, Popup, PopupRenderer, PopupTimings, PopupView};
use crate::provider::ProviderRegistry;
use crate::refresh::{RefreshCoordinator, RefreshResult};
use crate::signal::{HoverIntent, PointerSample, SignalBus};
use crate::surface::{Position, SurfaceEvent, SurfaceHandle, SurfaceId};

/// Grid used when the host supplies no geometry oracle.
const DEFAULT_CHAR_WIDTH: f64 = 8.0;
const DEFAULT_LINE_HEIGHT: f64 = 16.0;

enum Command {
    Event(SurfaceEvent),
    Update(Position),
    Close,
    View(oneshot::Sender<PopupView>),
    Bind(SurfaceId, oneshot::Sender<HoverResult<()>>),
}

/// Builder for a [`SurfaceWatcher`].
pub struct SurfaceWatcherBuilder {
    surface: SurfaceHandle,
    registry: ProviderRegistry,
    config: HoverConfig,
    geometry: Option<Box<dyn GeometryOracle>>,
    decorations: Option<Box<dyn Decorations>>,
    renderer: Option<Box<dyn PopupRenderer>>,
    on_hover: Option<HoverObserver>,
}

impl SurfaceWatcherBuilder {
    pub fn config(mut self, config: HoverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn geometry(mut self, geometry: impl GeometryOracle + 'static) -> Self {
        self.geometry = Some(Box::new(geometry));
        self
    }

    pub fn decorations(mut self, decorations: impl Decorations + 'static) -> Self {
        self.decorations = Some(Box::new(decorations));
        self
    }

    pub fn renderer(mut self, renderer: impl PopupRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Observer told when the popup gains or loses the pointer.
    pub fn on_hover(mut self, observer: HoverObserver) -> Self {
        self.on_hover = Some(observer);
        self
    }

    /// Build the popup and start the dispatch loop.
    ///
    /// Must be called inside a tokio runtime. Fails with
    /// [`HoverError::Initialization`] when a host collaborator is missing or
    /// the popup element cannot be created.
    pub fn spawn(self) -> HoverResult<SurfaceWatcher> {
        let renderer = self
            .renderer
            .ok_or_else(|| HoverError::Initialization("no popup renderer".into()))?;
        let decorations = self
            .decorations
            .ok_or_else(|| HoverError::Initialization("no decoration host".into()))?;
        let geometry = self.geometry.unwrap_or_else(|| {
            Box::new(GridGeometry::new(
                DEFAULT_CHAR_WIDTH,
                DEFAULT_LINE_HEIGHT,
                self.config.near_text_px,
            ))
        });

        let surface_id = self.surface.id();
        let mut popup = Popup::new(
            surface_id,
            PopupTimings::from(&self.config),
            renderer,
            decorations,
        )?;
        if let Some(observer) = self.on_hover {
            popup.on_hover(observer);
        }

        let (results_tx, results) = mpsc::unbounded_channel();
        let coordinator =
            RefreshCoordinator::spawn(self.registry, self.surface.clone(), results_tx);
        let session = Session {
            surface: self.surface,
            geometry,
            bus: SignalBus::new(self.config.quiet_period()),
            popup,
            coordinator,
        };

        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(dispatch(session, rx, results));
        tracing::info!(surface = %surface_id, "surface watcher started");
        Ok(SurfaceWatcher {
            surface: surface_id,
            commands,
            task,
        })
    }
}

/// Handle to a running watcher. Dropping it stops the loop; prefer
/// [`SurfaceWatcher::shutdown`] to wait for teardown.
pub struct SurfaceWatcher {
    surface: SurfaceId,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl SurfaceWatcher {
    pub fn builder(surface: SurfaceHandle, registry: ProviderRegistry) -> SurfaceWatcherBuilder {
        SurfaceWatcherBuilder {
            surface,
            registry,
            config: HoverConfig::default(),
            geometry: None,
            decorations: None,
            renderer: None,
            on_hover: None,
        }
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Forward a host event.
    pub fn send(&self, event: SurfaceEvent) -> HoverResult<()> {
        self.command(Command::Event(event))
    }

    /// Show the popup for `position` now, bypassing the debounce.
    pub fn update(&self, position: Position) -> HoverResult<()> {
        self.command(Command::Update(position))
    }

    pub fn close(&self) -> HoverResult<()> {
        self.command(Command::Close)
    }

    /// Snapshot of what the popup currently shows.
    pub async fn view(&self) -> HoverResult<PopupView> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::View(tx))?;
        rx.await.map_err(|_| HoverError::WatcherClosed)
    }

    /// Ask the popup to attach to `surface`. Only its own surface is accepted.
    pub async fn bind_surface(&self, surface: SurfaceId) -> HoverResult<()> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Bind(surface, tx))?;
        rx.await.map_err(|_| HoverError::WatcherClosed)?
    }

    /// Stop the loop, close the popup and wait for the in-flight query.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(e) = self.task.await {
            tracing::warn!(surface = %self.surface, error = %e, "surface watcher task failed");
        }
    }

    fn command(&self, command: Command) -> HoverResult<()> {
        self.commands
            .send(command)
            .map_err(|_| HoverError::WatcherClosed)
    }
}

struct Session {
    surface: SurfaceHandle,
    geometry: Box<dyn GeometryOracle>,
    bus: SignalBus,
    popup: Popup,
    coordinator: RefreshCoordinator,
}

impl Session {
    fn handle(&mut self, command: Command, now: Instant) {
        match command {
            Command::Event(event) => self.on_event(event, now),
            Command::Update(position) => self.show(position, now),
            Command::Close => self.close_popup(),
            Command::View(reply) => {
                let _ = reply.send(self.popup.view());
            }
            Command::Bind(surface, reply) => {
                let _ = reply.send(self.popup.bind_surface(surface));
            }
        }
    }

    fn on_event(&mut self, event: SurfaceEvent, now: Instant) {
        let intent = match event {
            SurfaceEvent::PointerMove(pointer) => {
                let position = self
                    .geometry
                    .position_for_pointer_event(self.surface.as_ref(), &pointer);
                let near_text = self
                    .geometry
                    .is_near_text(self.surface.as_ref(), position, &pointer);
                self.bus.pointer_moved(
                    PointerSample {
                        position,
                        near_text,
                    },
                    now,
                )
            }
            SurfaceEvent::PointerEnter => {
                self.bus.surface_entered();
                None
            }
            SurfaceEvent::PointerLeave => Some(self.bus.surface_left()),
            // Enter/leave queued behind a close refer to a popup that is gone.
            SurfaceEvent::PopupEnter | SurfaceEvent::PopupLeave if !self.popup.is_visible() => {
                tracing::trace!(?event, "popup hover event ignored, popup closed");
                None
            }
            SurfaceEvent::PopupEnter => self.bus.popup_entered(),
            SurfaceEvent::PopupLeave => self.bus.popup_left(),
            SurfaceEvent::KeyPress => Some(self.bus.key_pressed()),
            SurfaceEvent::ContentChanged => Some(HoverIntent::Close),
        };
        if let Some(intent) = intent {
            self.apply(intent, now);
        }
    }

    fn apply(&mut self, intent: HoverIntent, now: Instant) {
        tracing::trace!(?intent, "hover intent");
        match intent {
            HoverIntent::Moved(_) => self.popup.pointer_moved(now),
            HoverIntent::Settled(position) => self.show(position, now),
            HoverIntent::Close => self.close_popup(),
            HoverIntent::PopupHover(hovered) => self.popup.set_hovered(hovered),
        }
    }

    fn show(&mut self, position: Position, now: Instant) {
        if let Some(ticket) = self.popup.update(position, now) {
            self.coordinator.request(ticket.request, ticket.position);
        }
    }

    fn close_popup(&mut self) {
        if self.popup.close() {
            self.bus.reset_popup_hover();
        }
    }

    fn deadline(&self) -> Option<Instant> {
        [self.bus.deadline(), self.popup.deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    fn fire_due(&mut self, now: Instant) {
        if let Some(intent) = self.bus.fire_due(now) {
            self.apply(intent, now);
        }
        if self.popup.fire_due(now) {
            self.bus.reset_popup_hover();
        }
    }

    fn on_refresh(&mut self, result: RefreshResult, now: Instant) {
        self.popup.on_refresh(result, now);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn dispatch(
    mut session: Session,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut results: mpsc::UnboundedReceiver<RefreshResult>,
) {
    loop {
        let deadline = session.deadline();
        tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(command) => session.handle(command, Instant::now()),
                None => break,
            },
            Some(result) = results.recv() => {
                session.on_refresh(result, Instant::now());
            }
            _ = sleep_until(deadline) => {
                session.fire_due(Instant::now());
            }
        }
    }

    session.close_popup();
    let surface = session.surface.id();
    session.coordinator.shutdown().await;
    tracing::info!(surface = %surface, "surface watcher stopped");
}
