mod input;
pub mod interact;
mod timing;

use crate::assets::AssetManager;
use crate::render::{OrbitCamera, RenderContext};
use crate::scene::resources::ResourceLedger;
use crate::scene::serialization::WallDocument;
use crate::scene::WallScene;
use input::PointerState;
use interact::{InteractionController, SceneEvent};
use timing::FrameTiming;

use glam::Vec2;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "Wallviz";

const RENDER_RETRY_INTERVAL: Duration = Duration::from_secs(2);

pub struct App {
    window: Option<Arc<Window>>,
    render: Option<RenderContext>,
    document: WallDocument,
    scene: WallScene,
    ledger: ResourceLedger,
    assets: AssetManager,
    camera: OrbitCamera,
    interact: InteractionController,
    pointer: PointerState,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    next_render_retry: Instant,
}

impl App {
    fn new(document: WallDocument) -> Self {
        Self {
            window: None,
            render: None,
            document,
            scene: WallScene::new(),
            ledger: ResourceLedger::new(),
            assets: AssetManager::new(),
            camera: OrbitCamera::new(),
            interact: InteractionController::new(),
            pointer: PointerState::default(),
            timing: FrameTiming::new(WINDOW_TITLE.to_string()),
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
            next_render_retry: Instant::now(),
        }
    }

    fn viewport(&self) -> Vec2 {
        self.window
            .as_ref()
            .map(|window| {
                let size = window.inner_size();
                Vec2::new(size.width as f32, size.height as f32)
            })
            .unwrap_or(Vec2::new(1.0, 1.0))
    }

    /// Full teardown and rebuild from the current document, then refit the
    /// camera. Any in-flight gesture is cancelled first since object indices
    /// do not survive a rebuild.
    fn rebuild_scene(&mut self) {
        self.interact.cancel();
        self.scene.rebuild(
            &self.document.wall,
            &self.document.frames,
            &self.document.frame_placements,
            &mut self.ledger,
        );
        self.request_scene_textures();
        self.camera
            .fit_to_backdrop(self.document.wall.backdrop_size());
    }

    fn request_scene_textures(&mut self) {
        if let Some(backdrop) = self.scene.backdrop() {
            if let Some(url) = &backdrop.material.texture_url {
                self.assets.request(url);
            }
        }
        let urls: Vec<String> = self
            .scene
            .objects()
            .iter()
            .flat_map(|object| &object.parts)
            .filter_map(|part| part.material.texture_url.clone())
            .collect();
        for url in urls {
            self.assets.request(&url);
        }
    }

    fn handle_scene_event(&mut self, event: SceneEvent) {
        match event {
            SceneEvent::FrameSelected {
                frame_id,
                placement_index,
            } => {
                log::info!("frame {} selected (placement {})", frame_id, placement_index);
            }
            SceneEvent::FrameMoved {
                placement_index,
                x,
                y,
            } => {
                if let Some(placement) = self.document.frame_placements.get_mut(placement_index) {
                    placement.position.x = x;
                    placement.position.y = y;
                    log::info!(
                        "frame {} moved to ({:.4}, {:.4})",
                        placement.frame_id,
                        x,
                        y
                    );
                } else {
                    log::warn!("move event for unknown placement {}", placement_index);
                }
            }
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(render) = &mut self.render {
            render.resize(new_size);
        }
        self.camera.set_viewport(new_size.width, new_size.height);
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let frame_start = Instant::now();
        self.assets.poll();
        self.timing
            .update(self.window.as_ref().map(|w| w.as_ref()), frame_start);
        self.camera.update(self.timing.frame_dt);

        if self.render.is_none() {
            let now = Instant::now();
            if now < self.next_render_retry {
                return;
            }
            self.next_render_retry = now + RENDER_RETRY_INTERVAL;
            let Some(window) = self.window.clone() else {
                return;
            };
            match RenderContext::new(window) {
                Ok(render) => {
                    log::info!("renderer recovered");
                    self.render = Some(render);
                }
                Err(err) => {
                    log::warn!("renderer retry failed: {}", err);
                    return;
                }
            }
        }

        let Some(render) = &mut self.render else {
            return;
        };
        render.sync_scene(&self.scene, &mut self.ledger, &self.assets);
        match render.render(&self.scene, &self.camera) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    render.resize(size);
                }
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("surface out of memory, exiting");
                self.shutdown();
                event_loop.exit();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface frame timed out");
            }
        }
    }

    /// Release scene resources first so the renderer's final sweep sees them
    /// in the ledger's released set, then drop every GPU mirror.
    fn shutdown(&mut self) {
        self.interact.cancel();
        self.scene.clear(&mut self.ledger);
        if let Some(render) = &mut self.render {
            render.destroy();
        }
        self.render = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(1280u32, 720u32))
            .with_resizable(true);

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .expect("Failed to create window"),
        );

        match RenderContext::new(window.clone()) {
            Ok(render) => self.render = Some(render),
            Err(err) => {
                // Run without a renderer and retry from the frame loop; scene
                // state and interaction stay functional in the meantime.
                log::error!("renderer initialization failed: {}", err);
                self.next_render_retry = Instant::now() + RENDER_RETRY_INTERVAL;
            }
        }

        let size = window.inner_size();
        self.camera.set_viewport(size.width, size.height);
        self.update_target_frame_duration(&window);
        self.window = Some(window);
        self.rebuild_scene();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    self.shutdown();
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::Focused(focused) => {
                if !focused {
                    self.interact.cancel();
                    self.pointer.clear();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let screen = Vec2::new(position.x as f32, position.y as f32);
                let delta = self.pointer.track_motion(screen);
                if self.interact.is_capturing() {
                    let viewport = self.viewport();
                    self.interact
                        .pointer_move(screen, viewport, &self.camera, &mut self.scene);
                } else if self.pointer.right_down {
                    self.camera.orbit(delta.x, delta.y);
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer.position = None;
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state == ElementState::Pressed;
                match button {
                    MouseButton::Left => {
                        if pressed {
                            if let Some(screen) = self.pointer.position {
                                let viewport = self.viewport();
                                self.interact.pointer_down(
                                    screen,
                                    viewport,
                                    &self.camera,
                                    &self.scene,
                                );
                            }
                        } else if let Some(event) = self.interact.pointer_up(&self.scene) {
                            self.handle_scene_event(event);
                        }
                    }
                    MouseButton::Right => {
                        // Orbit never starts while a frame gesture holds the
                        // pointer capture.
                        self.pointer.right_down = pressed && !self.interact.is_capturing();
                    }
                    _ => {}
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if !self.interact.is_capturing() {
                    let scroll = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y,
                        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 40.0,
                    };
                    self.camera.zoom(scroll);
                }
            }
            WindowEvent::RedrawRequested => {
                self.frame(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

pub fn run(document: WallDocument) {
    log::info!(
        "starting viewer: {} frames, {} placements",
        document.frames.len(),
        document.frame_placements.len()
    );

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(document);
    event_loop.run_app(&mut app).expect("Event loop error");

    log::info!("viewer closed");
}
