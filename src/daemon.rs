use anyhow::{Context, Result};
use signal_hook::{
    consts::{SIGINT, SIGTERM, SIGUSR1},
    iterator::Signals,
};
use std::{
    ops::ControlFlow,
    sync::mpsc::{self, Receiver},
    thread,
};
use tracing::{debug, info, warn};

use crate::backend::{Hyprctl, SnapshotProvider, WindowQuery};
use crate::config::Config;
use crate::desktop;
use crate::events::EventListener;
use crate::panel::LayerPanel;
use crate::planner::RenderPlanner;
use crate::render::RenderTarget;
use crate::resolver::IconResolver;
use crate::scheduler::UpdateScheduler;
use crate::types::{ActiveWorkspaceState, UiMsg};

pub fn run_daemon(config: Config) -> Result<()> {
    let descriptors = desktop::scan(&desktop::application_dirs());
    let target = LayerPanel::connect(&config)?;

    let (tx, rx) = mpsc::channel::<UiMsg>();
    let scheduler = UpdateScheduler::new(tx);
    info!(workspace = %config.workspace, "tracking workspace");

    let mut indicator = Indicator::new(
        config,
        IconResolver::new(descriptors),
        Hyprctl,
        target,
        scheduler.clone(),
        rx,
    );
    let events = EventListener::from_env(scheduler.clone());
    let signals = spawn_signal_watcher(scheduler.clone())?;

    scheduler.request_update();
    indicator.run();

    signals.close();
    // Joins the event thread before the surface it feeds goes away.
    drop(events);
    drop(indicator);
    Ok(())
}

fn spawn_signal_watcher(scheduler: UpdateScheduler) -> Result<signal_hook::iterator::Handle> {
    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGUSR1]).context("install signal handlers")?;
    let handle = signals.handle();
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                if signal == SIGUSR1 {
                    scheduler.request_update();
                    continue;
                }
                debug!(signal, "shutdown requested");
                scheduler.send(UiMsg::Shutdown);
                break;
            }
        })
        .context("spawn signal thread")?;
    Ok(handle)
}

/// The UI side: sole owner of the active-workspace state and the render
/// target. All renders run here, one at a time.
pub struct Indicator<Q, T> {
    config: Config,
    resolver: IconResolver,
    snapshots: SnapshotProvider<Q>,
    planner: RenderPlanner,
    active: ActiveWorkspaceState,
    target: T,
    scheduler: UpdateScheduler,
    rx: Receiver<UiMsg>,
    renders: u64,
}

impl<Q: WindowQuery, T: RenderTarget> Indicator<Q, T> {
    pub fn new(
        config: Config,
        resolver: IconResolver,
        query: Q,
        target: T,
        scheduler: UpdateScheduler,
        rx: Receiver<UiMsg>,
    ) -> Self {
        Self {
            config,
            resolver,
            snapshots: SnapshotProvider::new(query),
            planner: RenderPlanner::default(),
            active: ActiveWorkspaceState::default(),
            target,
            scheduler,
            rx,
            renders: 0,
        }
    }

    /// Blocks until `UiMsg::Shutdown` arrives or every sender is gone.
    pub fn run(&mut self) {
        while let Ok(msg) = self.rx.recv() {
            if self.handle(msg).is_break() || self.dispatch_pending().is_break() {
                break;
            }
        }
    }

    /// Handles whatever is queued right now without blocking.
    pub fn dispatch_pending(&mut self) -> ControlFlow<()> {
        while let Ok(msg) = self.rx.try_recv() {
            if self.handle(msg).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn handle(&mut self, msg: UiMsg) -> ControlFlow<()> {
        match msg {
            UiMsg::Render => self.render(),
            UiMsg::Shutdown => ControlFlow::Break(()),
            UiMsg::ActiveWorkspace(name) => {
                self.active.normal = name;
                ControlFlow::Continue(())
            }
            UiMsg::ActiveSpecial(name) => {
                self.active.special = name;
                ControlFlow::Continue(())
            }
        }
    }

    fn render(&mut self) -> ControlFlow<()> {
        self.scheduler.begin_render();
        // Apply state that arrived before this render started; a render
        // request among it is covered by this render.
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                UiMsg::Render => self.scheduler.begin_render(),
                UiMsg::Shutdown => return ControlFlow::Break(()),
                other => {
                    let _ = self.handle(other);
                }
            }
        }

        let windows = self.snapshots.snapshot(&self.config.workspace);
        let decision = self
            .planner
            .plan(&windows, &self.resolver, &self.active, &self.config);
        decision.apply(&mut self.target);
        if let Err(err) = self.target.flush() {
            warn!("render failed: {err:#}");
        }
        self.renders += 1;
        debug!(
            render = self.renders,
            windows = windows.len(),
            rebuilt = decision.content.is_some(),
            icon_scans = self.resolver.scan_count(),
            "rendered"
        );
        ControlFlow::Continue(())
    }
}
