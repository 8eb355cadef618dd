//! Per-frame scheduling and swapchain recreation.
//!
//! [`FrameScheduler`] cycles through `N` frame slots. Each tick waits for the
//! slot's fence, acquires a swapchain image, re-records the slot's command
//! buffer, submits and presents. Stale swapchains and window resizes lead to a
//! recreation that is always preceded by a device-idle wait. A zero-sized
//! framebuffer (minimized window) keeps the recreation pending and the
//! scheduler idle until the window has an area again.
//!
//! The GPU side lives behind [`RenderBackend`], so the scheduling rules can be
//! exercised without a device.

use crate::lv;
use ash::vk;
use log::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A suboptimal image is still drawn to; present will report it stale.
    Ready { image_index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Optimal,
    /// Out of date or suboptimal. Either way the swapchain gets rebuilt.
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { slot: usize, image_index: u32 },
    SkippedOutOfDate,
    /// The framebuffer has no area; nothing was acquired.
    Suspended,
}

/// Operations the scheduler needs from the renderer. `slot` is always in
/// `0..frames_in_flight()`.
pub trait RenderBackend {
    fn frames_in_flight(&self) -> usize;

    /// Blocks until the slot's previous submission has finished on the GPU.
    fn wait_for_frame(&mut self, slot: usize) -> lv::Result<()>;

    fn acquire_next_image(&mut self, slot: usize) -> lv::Result<AcquireOutcome>;

    fn update_uniforms(&mut self, slot: usize) -> lv::Result<()>;

    /// Unsignals the slot's fence. Only called once an image was acquired.
    fn reset_frame(&mut self, slot: usize) -> lv::Result<()>;

    fn record(&mut self, slot: usize, image_index: u32) -> lv::Result<()>;

    fn submit(&mut self, slot: usize) -> lv::Result<()>;

    fn present(&mut self, slot: usize, image_index: u32) -> lv::Result<PresentOutcome>;

    fn framebuffer_extent(&self) -> vk::Extent2D;

    fn wait_idle(&mut self) -> lv::Result<()>;

    /// Rebuilds the swapchain, its image views and framebuffers. The device
    /// is idle when this is called.
    fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> lv::Result<()>;
}

pub struct FrameScheduler<B: RenderBackend> {
    backend: B,
    frames_in_flight: usize,
    frame_counter: u64,
    resized: bool,
    recreation_pending: bool,
}

impl<B: RenderBackend> FrameScheduler<B> {
    pub fn new(backend: B) -> Self {
        let frames_in_flight = backend.frames_in_flight();
        debug_assert!(frames_in_flight > 0, "a renderer needs at least one frame slot");
        FrameScheduler {
            backend,
            frames_in_flight,
            frame_counter: 0,
            resized: false,
            recreation_pending: false,
        }
    }

    /// Runs one frame.
    pub fn tick(&mut self) -> lv::Result<FrameOutcome> {
        if self.recreation_pending && !self.recreate_swapchain()? {
            return Ok(FrameOutcome::Suspended);
        }

        let slot = self.current_slot();
        self.backend.wait_for_frame(slot)?;

        let image_index = match self.backend.acquire_next_image(slot)? {
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    trace!("Acquired suboptimal image {}", image_index);
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                self.recreation_pending = true;
                self.recreate_swapchain()?;
                return Ok(FrameOutcome::SkippedOutOfDate);
            }
        };

        self.backend.update_uniforms(slot)?;
        self.backend.reset_frame(slot)?;
        self.backend.record(slot, image_index)?;
        self.backend.submit(slot)?;
        let presented = self.backend.present(slot, image_index)?;
        self.frame_counter += 1;

        let resized = std::mem::take(&mut self.resized);
        if presented == PresentOutcome::Stale || resized {
            debug!(
                "Swapchain needs recreation (stale: {}, resized: {})",
                presented == PresentOutcome::Stale,
                resized
            );
            self.recreation_pending = true;
            self.recreate_swapchain()?;
        }

        Ok(FrameOutcome::Presented { slot, image_index })
    }

    /// Marks the window as resized. The flag is only looked at after the
    /// next successful present.
    pub fn notify_resized(&mut self) {
        self.resized = true;
    }

    pub fn current_slot(&self) -> usize {
        (self.frame_counter % self.frames_in_flight as u64) as usize
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn is_recreation_pending(&self) -> bool {
        self.recreation_pending
    }

    /// Waits for all outstanding GPU work so the backend can be dropped.
    pub fn shutdown(&mut self) -> lv::Result<()> {
        self.backend.wait_idle()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Returns `false` and leaves the recreation pending while the
    /// framebuffer has no area.
    fn recreate_swapchain(&mut self) -> lv::Result<bool> {
        let extent = self.backend.framebuffer_extent();
        if extent.width == 0 || extent.height == 0 {
            trace!("Framebuffer is zero-sized, deferring swapchain recreation");
            return Ok(false);
        }

        self.backend.wait_idle()?;
        self.backend.recreate_swapchain(extent)?;
        self.recreation_pending = false;
        debug!(
            "Recreated swapchain at {}x{}",
            extent.width, extent.height
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Update(usize),
        Reset(usize),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
        WaitIdle,
        Recreate(u32, u32),
    }

    /// Records every call and simulates fences: a submission keeps its slot
    /// busy until the slot is waited on or the device goes idle.
    struct SimulatedBackend {
        frames_in_flight: usize,
        image_count: u32,
        next_image: u32,
        extent: vk::Extent2D,
        in_flight: Vec<bool>,
        fence_signalled: Vec<bool>,
        acquire_script: VecDeque<AcquireOutcome>,
        present_script: VecDeque<PresentOutcome>,
        fail_submit: bool,
        calls: Vec<Call>,
    }

    impl SimulatedBackend {
        fn new(frames_in_flight: usize, image_count: u32) -> Self {
            SimulatedBackend {
                frames_in_flight,
                image_count,
                next_image: 0,
                extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                in_flight: vec![false; frames_in_flight],
                fence_signalled: vec![true; frames_in_flight],
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                fail_submit: false,
                calls: Vec::new(),
            }
        }

        fn set_extent(&mut self, width: u32, height: u32) {
            self.extent = vk::Extent2D { width, height };
        }

        fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|call| predicate(call)).count()
        }

        fn submitted_slots(&self) -> Vec<usize> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Submit(slot) => Some(*slot),
                    _ => None,
                })
                .collect()
        }
    }

    impl RenderBackend for SimulatedBackend {
        fn frames_in_flight(&self) -> usize {
            self.frames_in_flight
        }

        fn wait_for_frame(&mut self, slot: usize) -> lv::Result<()> {
            self.calls.push(Call::Wait(slot));
            if self.in_flight[slot] {
                self.in_flight[slot] = false;
                self.fence_signalled[slot] = true;
            }
            assert!(
                self.fence_signalled[slot],
                "waited on an unsignalled fence nothing will signal"
            );
            Ok(())
        }

        fn acquire_next_image(&mut self, slot: usize) -> lv::Result<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            if let Some(outcome) = self.acquire_script.pop_front() {
                return Ok(outcome);
            }
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal: false,
            })
        }

        fn update_uniforms(&mut self, slot: usize) -> lv::Result<()> {
            assert!(!self.in_flight[slot], "uniforms of a busy slot were written");
            self.calls.push(Call::Update(slot));
            Ok(())
        }

        fn reset_frame(&mut self, slot: usize) -> lv::Result<()> {
            self.calls.push(Call::Reset(slot));
            self.fence_signalled[slot] = false;
            Ok(())
        }

        fn record(&mut self, slot: usize, image_index: u32) -> lv::Result<()> {
            assert!(!self.in_flight[slot], "slot re-recorded while in flight");
            self.calls.push(Call::Record(slot, image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> lv::Result<()> {
            self.calls.push(Call::Submit(slot));
            if self.fail_submit {
                return Err(lv::Error::Vulkan(vk::Result::ERROR_DEVICE_LOST));
            }
            self.in_flight[slot] = true;
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> lv::Result<PresentOutcome> {
            self.calls.push(Call::Present(slot, image_index));
            Ok(self
                .present_script
                .pop_front()
                .unwrap_or(PresentOutcome::Optimal))
        }

        fn framebuffer_extent(&self) -> vk::Extent2D {
            self.extent
        }

        fn wait_idle(&mut self) -> lv::Result<()> {
            self.calls.push(Call::WaitIdle);
            for slot in 0..self.frames_in_flight {
                if self.in_flight[slot] {
                    self.in_flight[slot] = false;
                    self.fence_signalled[slot] = true;
                }
            }
            Ok(())
        }

        fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> lv::Result<()> {
            assert!(
                self.in_flight.iter().all(|busy| !busy),
                "swapchain recreated while GPU work was outstanding"
            );
            self.calls.push(Call::Recreate(extent.width, extent.height));
            self.next_image = 0;
            Ok(())
        }
    }

    fn presented(slot: usize, image_index: u32) -> FrameOutcome {
        FrameOutcome::Presented { slot, image_index }
    }

    #[test]
    fn tick_uses_frame_counter_modulo_slots() {
        let mut scheduler = FrameScheduler::new(SimulatedBackend::new(2, 3));
        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(scheduler.tick().unwrap());
        }

        assert_eq!(
            outcomes,
            vec![
                presented(0, 0),
                presented(1, 1),
                presented(0, 2),
                presented(1, 0),
                presented(0, 1),
            ]
        );
        assert_eq!(scheduler.frame_counter(), 5);
        assert_eq!(scheduler.current_slot(), 1);
    }

    #[test]
    fn frame_follows_wait_acquire_update_reset_record_submit_present() {
        let mut scheduler = FrameScheduler::new(SimulatedBackend::new(2, 2));
        scheduler.tick().unwrap();

        assert_eq!(
            scheduler.backend().calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Update(0),
                Call::Reset(0),
                Call::Record(0, 0),
                Call::Submit(0),
                Call::Present(0, 0),
            ]
        );
    }

    #[test]
    fn slot_count_ignores_swapchain_image_count() {
        for image_count in [2, 3, 5] {
            let mut scheduler = FrameScheduler::new(SimulatedBackend::new(2, image_count));
            for _ in 0..(image_count as usize * 2) {
                scheduler.tick().unwrap();
            }
            let backend = scheduler.backend();
            assert!(backend.submitted_slots().iter().all(|&slot| slot < 2));
            assert_eq!(backend.in_flight.len(), 2);
        }
    }

    #[test]
    fn k_plus_one_ticks_alternate_slots() {
        let image_count = 3;
        let mut scheduler = FrameScheduler::new(SimulatedBackend::new(2, image_count));
        for _ in 0..=image_count {
            scheduler.tick().unwrap();
        }

        assert_eq!(scheduler.backend().submitted_slots(), vec![0, 1, 0, 1]);
        assert_eq!(scheduler.backend().count(|c| matches!(c, Call::Recreate(..))), 0);
    }

    #[test]
    fn stale_present_recreates_before_next_acquire() {
        let mut backend = SimulatedBackend::new(2, 3);
        backend.present_script.push_back(PresentOutcome::Optimal);
        backend.present_script.push_back(PresentOutcome::Stale);
        let mut scheduler = FrameScheduler::new(backend);

        scheduler.tick().unwrap();
        scheduler.tick().unwrap();
        scheduler.tick().unwrap();

        let calls = &scheduler.backend().calls;
        let stale_present = calls
            .iter()
            .position(|c| *c == Call::Present(1, 1))
            .unwrap();
        let recreate = calls
            .iter()
            .position(|c| matches!(c, Call::Recreate(..)))
            .unwrap();
        let next_acquire = calls
            .iter()
            .rposition(|c| matches!(c, Call::Acquire(_)))
            .unwrap();
        assert!(stale_present < recreate && recreate < next_acquire);
        // The recreated swapchain hands out images from the start again
        assert_eq!(calls.last(), Some(&Call::Present(0, 0)));
        assert!(!scheduler.is_recreation_pending());
    }

    #[test]
    fn recreation_is_preceded_by_wait_idle() {
        let mut backend = SimulatedBackend::new(2, 2);
        backend.present_script.extend([
            PresentOutcome::Stale,
            PresentOutcome::Optimal,
            PresentOutcome::Stale,
        ]);
        backend.acquire_script.extend([
            AcquireOutcome::Ready {
                image_index: 0,
                suboptimal: false,
            },
            AcquireOutcome::OutOfDate,
        ]);
        let mut scheduler = FrameScheduler::new(backend);
        scheduler.notify_resized();
        for _ in 0..6 {
            scheduler.tick().unwrap();
        }

        let calls = &scheduler.backend().calls;
        let mut recreations = 0;
        for (i, call) in calls.iter().enumerate() {
            if matches!(call, Call::Recreate(..)) {
                recreations += 1;
                assert_eq!(calls[i - 1], Call::WaitIdle);
            }
        }
        assert_eq!(recreations, 3);
    }

    #[test]
    fn out_of_date_acquire_skips_frame_without_resetting_fence() {
        let mut backend = SimulatedBackend::new(2, 2);
        backend.acquire_script.push_back(AcquireOutcome::OutOfDate);
        let mut scheduler = FrameScheduler::new(backend);

        assert_eq!(scheduler.tick().unwrap(), FrameOutcome::SkippedOutOfDate);
        assert_eq!(scheduler.frame_counter(), 0);
        assert_eq!(
            scheduler.backend().calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::WaitIdle,
                Call::Recreate(800, 600)
            ]
        );
        assert!(scheduler.backend().fence_signalled[0]);

        // Same slot again, and its fence can still be waited on
        assert_eq!(scheduler.tick().unwrap(), presented(0, 0));
    }

    #[test]
    fn suboptimal_acquire_still_draws() {
        let mut backend = SimulatedBackend::new(2, 2);
        backend.acquire_script.push_back(AcquireOutcome::Ready {
            image_index: 1,
            suboptimal: true,
        });
        let mut scheduler = FrameScheduler::new(backend);

        assert_eq!(scheduler.tick().unwrap(), presented(0, 1));
        assert_eq!(scheduler.backend().count(|c| matches!(c, Call::Submit(_))), 1);
    }

    #[test]
    fn resize_flag_is_consumed_after_present() {
        let mut scheduler = FrameScheduler::new(SimulatedBackend::new(2, 2));
        scheduler.notify_resized();
        scheduler.notify_resized();

        scheduler.tick().unwrap();
        let calls = &scheduler.backend().calls;
        assert_eq!(
            &calls[calls.len() - 3..],
            &[Call::Present(0, 0), Call::WaitIdle, Call::Recreate(800, 600)]
        );

        scheduler.tick().unwrap();
        scheduler.tick().unwrap();
        assert_eq!(scheduler.backend().count(|c| matches!(c, Call::Recreate(..))), 1);
    }

    #[test]
    fn zero_area_suspends_until_window_has_size() {
        let mut scheduler = FrameScheduler::new(SimulatedBackend::new(2, 2));
        scheduler.tick().unwrap();

        scheduler.backend_mut().set_extent(0, 600);
        scheduler.notify_resized();
        assert_eq!(scheduler.tick().unwrap(), presented(1, 1));
        assert!(scheduler.is_recreation_pending());

        let calls_before = scheduler.backend().calls.len();
        for _ in 0..3 {
            assert_eq!(scheduler.tick().unwrap(), FrameOutcome::Suspended);
        }
        assert_eq!(scheduler.backend().calls.len(), calls_before);

        scheduler.backend_mut().set_extent(1024, 768);
        assert_eq!(scheduler.tick().unwrap(), presented(0, 0));
        let calls = &scheduler.backend().calls[calls_before..];
        assert_eq!(calls[0], Call::WaitIdle);
        assert_eq!(calls[1], Call::Recreate(1024, 768));
        assert_eq!(calls[2], Call::Wait(0));
        assert!(!scheduler.is_recreation_pending());
    }

    #[test]
    fn out_of_date_while_minimized_stays_pending() {
        let mut backend = SimulatedBackend::new(2, 2);
        backend.acquire_script.push_back(AcquireOutcome::OutOfDate);
        backend.set_extent(0, 0);
        let mut scheduler = FrameScheduler::new(backend);

        assert_eq!(scheduler.tick().unwrap(), FrameOutcome::SkippedOutOfDate);
        assert!(scheduler.is_recreation_pending());
        assert_eq!(scheduler.tick().unwrap(), FrameOutcome::Suspended);
        assert_eq!(scheduler.backend().count(|c| *c == Call::WaitIdle), 0);
    }

    #[test]
    #[should_panic(expected = "at least one frame slot")]
    fn zero_frame_slots_are_rejected() {
        FrameScheduler::new(SimulatedBackend::new(0, 2));
    }

    #[test]
    fn submit_failure_is_propagated() {
        let mut backend = SimulatedBackend::new(2, 2);
        backend.fail_submit = true;
        let mut scheduler = FrameScheduler::new(backend);

        assert!(matches!(
            scheduler.tick(),
            Err(lv::Error::Vulkan(vk::Result::ERROR_DEVICE_LOST))
        ));
        assert_eq!(scheduler.backend().count(|c| matches!(c, Call::Present(..))), 0);
    }

    #[test]
    fn shutdown_waits_for_device_idle() {
        let mut scheduler = FrameScheduler::new(SimulatedBackend::new(2, 2));
        scheduler.tick().unwrap();
        scheduler.shutdown().unwrap();

        assert_eq!(scheduler.backend().calls.last(), Some(&Call::WaitIdle));
        assert!(scheduler.backend().in_flight.iter().all(|busy| !busy));
    }
}
