use log::{error, info};
use std::sync::Arc;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};

mod config;
mod frame;
mod lv;
mod renderer;
mod scheduler;
mod utility;
mod vertex;

use config::AppConfig;
use renderer::VulkanRenderer;
use scheduler::{FrameOutcome, FrameScheduler};

struct VulkanApp {
    scheduler: Option<FrameScheduler<VulkanRenderer>>,
    fatal: Option<lv::Error>,
}

impl VulkanApp {
    pub fn new(config: AppConfig, event_loop: &EventLoop<()>) -> lv::Result<VulkanApp> {
        let window = Arc::new(VulkanApp::init_window(&config, event_loop)?);
        let renderer = VulkanRenderer::new(config, window)?;

        Ok(VulkanApp {
            scheduler: Some(FrameScheduler::new(renderer)),
            fatal: None,
        })
    }

    fn init_window(
        config: &AppConfig,
        event_loop: &EventLoop<()>,
    ) -> lv::Result<winit::window::Window> {
        let window = winit::window::WindowBuilder::new()
            .with_title(config.window_title)
            .with_inner_size(winit::dpi::LogicalSize::new(
                config.window_width,
                config.window_height,
            ))
            .build(event_loop)?;
        Ok(window)
    }

    /// Waits for the GPU and releases every Vulkan object before the event
    /// loop exits.
    fn shutdown(&mut self, elwt: &EventLoopWindowTarget<()>) {
        if let Some(mut scheduler) = self.scheduler.take() {
            if let Err(err) = scheduler.shutdown() {
                self.fatal.get_or_insert(err);
            }
            info!("Shutting down after {} frames", scheduler.frame_counter());
        }
        elwt.exit();
    }

    fn draw_frame(&mut self, elwt: &EventLoopWindowTarget<()>) {
        let Some(scheduler) = self.scheduler.as_mut() else {
            return;
        };
        match scheduler.tick() {
            Ok(outcome) => elwt.set_control_flow(control_flow(
                outcome,
                scheduler.is_recreation_pending(),
            )),
            Err(err) => {
                self.fatal = Some(err);
                self.shutdown(elwt);
            }
        }
    }

    pub fn main_loop(mut self, event_loop: EventLoop<()>) -> lv::Result<()> {
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run(|event, elwt| match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    info!("Exiting application!");
                    self.shutdown(elwt);
                }
                WindowEvent::Resized(size) => {
                    if let Some(scheduler) = self.scheduler.as_mut() {
                        scheduler.notify_resized();
                        if size.width > 0 && size.height > 0 {
                            elwt.set_control_flow(ControlFlow::Poll);
                            scheduler.backend().window().request_redraw();
                        }
                    }
                }
                WindowEvent::RedrawRequested => self.draw_frame(elwt),
                _ => (),
            },
            Event::AboutToWait => {
                if let Some(scheduler) = self.scheduler.as_ref() {
                    if scheduler.is_recreation_pending() {
                        elwt.set_control_flow(ControlFlow::Wait);
                    } else {
                        scheduler.backend().window().request_redraw();
                    }
                }
            }
            Event::LoopExiting => {
                if self.scheduler.is_some() {
                    self.shutdown(elwt);
                }
            }
            _ => (),
        })?;

        match self.fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Block on events while the swapchain cannot be rebuilt (zero-sized
/// window); the next non-empty `Resized` wakes the loop up again.
fn control_flow(outcome: FrameOutcome, recreation_pending: bool) -> ControlFlow {
    if outcome == FrameOutcome::Suspended || recreation_pending {
        ControlFlow::Wait
    } else {
        ControlFlow::Poll
    }
}

fn run() -> lv::Result<()> {
    let event_loop = EventLoop::new()?;
    let app = VulkanApp::new(AppConfig::default(), &event_loop)?;
    app.main_loop(event_loop)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        error!("{}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_while_minimized() {
        assert_eq!(control_flow(FrameOutcome::Suspended, true), ControlFlow::Wait);
        // A frame still presents on the tick that observes the zero size
        let presented = FrameOutcome::Presented {
            slot: 0,
            image_index: 0,
        };
        assert_eq!(control_flow(presented, true), ControlFlow::Wait);
        assert_eq!(
            control_flow(FrameOutcome::SkippedOutOfDate, true),
            ControlFlow::Wait
        );
    }

    #[test]
    fn polls_while_drawing() {
        let presented = FrameOutcome::Presented {
            slot: 1,
            image_index: 2,
        };
        assert_eq!(control_flow(presented, false), ControlFlow::Poll);
        assert_eq!(
            control_flow(FrameOutcome::SkippedOutOfDate, false),
            ControlFlow::Poll
        );
    }
}
