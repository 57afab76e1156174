//! UI-thread state shared by every off-screen window.
//!
//! [`ShellState`] is the state type of the `ui_thread` runner: posted tasks get
//! `&mut ShellState` and resolve their target window through the registry.
//! Frame ticks and deferred shows come back through [`UiWindowPoster`]; other
//! threads drive a window through a [`WindowHandle`].

use std::time::Duration;

use frame_scheduler::{Clock, ScheduledTick};
use renderer::FrameCompositor;
use ui_thread::{UiTaskSender, UiThreadError};

use crate::config::ShellConfig;
use crate::host::{BrowserHost, WindowTaskPoster};
use crate::osr_window::OsrWindow;
use crate::registry::{MapRegistry, ViewId, ViewIdAllocator, WindowRegistry};

type WindowMap<H, C> = Box<dyn WindowRegistry<ViewId, OsrWindow<H, C>>>;

pub struct ShellState<H: BrowserHost + 'static, C: FrameCompositor + 'static> {
    windows: WindowMap<H, C>,
    ids: ViewIdAllocator,
    tasks: UiTaskSender<ShellState<H, C>>,
}

impl<H: BrowserHost + 'static, C: FrameCompositor + 'static> ShellState<H, C> {
    pub fn new(tasks: UiTaskSender<Self>) -> Self {
        Self::with_registry(tasks, Box::new(MapRegistry::new()))
    }

    pub fn with_registry(tasks: UiTaskSender<Self>, windows: WindowMap<H, C>) -> Self {
        Self {
            windows,
            ids: ViewIdAllocator::new(),
            tasks,
        }
    }

    pub fn tasks(&self) -> &UiTaskSender<Self> {
        &self.tasks
    }

    pub fn create_window(
        &mut self,
        config: &ShellConfig,
        compositor: C,
        clock: Box<dyn Clock>,
    ) -> ViewId {
        let view_id = self.ids.allocate();
        let poster = UiWindowPoster {
            tasks: self.tasks.clone(),
        };
        let window = OsrWindow::new(view_id, config, compositor, clock, Box::new(poster));
        let replaced = self.windows.register(view_id, window);
        assert!(replaced.is_none(), "view id {view_id:?} registered twice");
        log::debug!(target: "osr_shell", "created view {view_id:?}");
        view_id
    }

    /// Drops the window. Ticks already posted for it become no-ops.
    pub fn close_window(&mut self, view_id: ViewId) -> Option<OsrWindow<H, C>> {
        let window = self.windows.remove(&view_id);
        if window.is_some() {
            log::debug!(target: "osr_shell", "closed view {view_id:?}");
        }
        window
    }

    pub fn window(&self, view_id: ViewId) -> Option<&OsrWindow<H, C>> {
        self.windows.lookup(&view_id)
    }

    pub fn window_mut(&mut self, view_id: ViewId) -> Option<&mut OsrWindow<H, C>> {
        self.windows.lookup_mut(&view_id)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn for_each_window(&mut self, mut visit: impl FnMut(&mut OsrWindow<H, C>)) {
        self.windows.for_each_mut(&mut |_, window| visit(window));
    }

    pub fn on_tick(&mut self, view_id: ViewId, tick: ScheduledTick) {
        match self.windows.lookup_mut(&view_id) {
            Some(window) => window.on_tick(tick),
            None => log::trace!(target: "osr_shell", "dropping tick for closed view {view_id:?}"),
        }
    }

    pub fn handle(&self, view_id: ViewId) -> WindowHandle<H, C> {
        WindowHandle {
            view_id,
            tasks: self.tasks.clone(),
        }
    }
}

/// Posts window work back onto the UI task runner.
pub struct UiWindowPoster<H: BrowserHost + 'static, C: FrameCompositor + 'static> {
    tasks: UiTaskSender<ShellState<H, C>>,
}

impl<H: BrowserHost + 'static, C: FrameCompositor + 'static> WindowTaskPoster
    for UiWindowPoster<H, C>
{
    fn post_tick(&self, view: ViewId, tick: ScheduledTick, after: Duration) {
        let posted = self
            .tasks
            .post_delayed(after, move |shell: &mut ShellState<H, C>| {
                shell.on_tick(view, tick)
            });
        if let Err(error) = posted {
            log::warn!(target: "osr_shell", "frame tick for {view:?} not posted: {error}");
        }
    }

    fn post_show(&self, view: ViewId) {
        let posted = self.tasks.post(move |shell: &mut ShellState<H, C>| {
            if let Some(window) = shell.window_mut(view) {
                window.show();
            }
        });
        if let Err(error) = posted {
            log::warn!(target: "osr_shell", "show for {view:?} not posted: {error}");
        }
    }
}

/// Thread-safe handle to one window. Every call is posted to the UI thread and
/// returns immediately; calls on a closed window do nothing.
pub struct WindowHandle<H: BrowserHost + 'static, C: FrameCompositor + 'static> {
    view_id: ViewId,
    tasks: UiTaskSender<ShellState<H, C>>,
}

impl<H: BrowserHost + 'static, C: FrameCompositor + 'static> Clone for WindowHandle<H, C> {
    fn clone(&self) -> Self {
        Self {
            view_id: self.view_id,
            tasks: self.tasks.clone(),
        }
    }
}

impl<H: BrowserHost + 'static, C: FrameCompositor + 'static> WindowHandle<H, C> {
    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    pub fn set_device_scale_factor(&self, device_scale_factor: f32) -> Result<(), UiThreadError> {
        self.post(move |window| window.set_device_scale_factor(device_scale_factor))
    }

    pub fn show(&self) -> Result<(), UiThreadError> {
        self.post(|window| window.show())
    }

    pub fn hide(&self) -> Result<(), UiThreadError> {
        self.post(|window| window.hide())
    }

    pub fn set_focus(&self, focus: bool) -> Result<(), UiThreadError> {
        self.post(move |window| window.set_focus(focus))
    }

    pub fn invalidate(&self) -> Result<(), UiThreadError> {
        self.post(|window| window.invalidate())
    }

    pub fn close(&self) -> Result<(), UiThreadError> {
        let view_id = self.view_id;
        self.tasks.post(move |shell: &mut ShellState<H, C>| {
            shell.close_window(view_id);
        })
    }

    fn post(
        &self,
        task: impl FnOnce(&mut OsrWindow<H, C>) + Send + 'static,
    ) -> Result<(), UiThreadError> {
        let view_id = self.view_id;
        self.tasks.post(move |shell: &mut ShellState<H, C>| {
            match shell.window_mut(view_id) {
                Some(window) => task(window),
                None => {
                    log::trace!(target: "osr_shell", "dropping task for closed view {view_id:?}")
                }
            }
        })
    }
}
