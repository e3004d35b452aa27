//! Frame loop scenarios against a backend that models fences, semaphores
//! and swapchain resources in memory.

use std::collections::VecDeque;

use vkrender_renderer::{
    Acquired, FrameBackend, FrameLoop, FrameOutcome, MAX_FRAMES_IN_FLIGHT, Presented,
    RendererResult, ShaderData,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Call {
    Wait(usize),
    Reset(usize),
    Acquire(usize, u32),
    Release(usize),
    Write(usize),
    Record(usize, u32),
    Submit(usize, u32),
    Present(u32),
    Recreate(u32, u32),
}

#[derive(Default, Clone, Copy)]
struct SlotState {
    /// Submitted work the CPU has not yet observed complete.
    in_flight: bool,
    signaled: bool,
    waits: u32,
    /// Stand-in for the fence/semaphore/buffer handles.
    handle: u64,
}

struct Chain {
    width: u32,
    height: u32,
    image_count: u32,
    /// Views, depth buffer and render-complete semaphores.
    handles: Vec<u64>,
}

struct MockBackend {
    calls: Vec<Call>,
    slots: [SlotState; MAX_FRAMES_IN_FLIGHT],
    chain: Chain,
    next_handle: u64,
    next_image: u32,
    /// Per image: signalled by a submit, consumed by the matching present.
    render_complete: Vec<bool>,
    /// Presents per image since the chain was last built.
    presents: Vec<u32>,
    /// Image counts the surface reports on successive rebuilds; empty keeps
    /// the current count.
    rebuild_image_counts: VecDeque<u32>,
    out_of_date_acquires: u32,
    suboptimal_presents: u32,
}

impl MockBackend {
    fn new(width: u32, height: u32, image_count: u32) -> Self {
        let mut backend = Self {
            calls: Vec::new(),
            slots: [SlotState::default(); MAX_FRAMES_IN_FLIGHT],
            chain: Chain {
                width: 0,
                height: 0,
                image_count: 0,
                handles: Vec::new(),
            },
            next_handle: 1,
            next_image: 0,
            render_complete: Vec::new(),
            presents: Vec::new(),
            rebuild_image_counts: VecDeque::new(),
            out_of_date_acquires: 0,
            suboptimal_presents: 0,
        };
        for i in 0..MAX_FRAMES_IN_FLIGHT {
            backend.slots[i] = SlotState {
                signaled: true,
                handle: backend.alloc_handle(),
                ..Default::default()
            };
        }
        backend.build_chain(width, height, image_count);
        backend
    }

    fn alloc_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn build_chain(&mut self, width: u32, height: u32, image_count: u32) {
        // views + render-complete semaphores per image, plus one depth buffer
        let count = image_count as usize * 2 + 1;
        let handles = (0..count).map(|_| self.alloc_handle()).collect();
        self.chain = Chain {
            width,
            height,
            image_count,
            handles,
        };
        self.render_complete = vec![false; image_count as usize];
        self.presents = vec![0; image_count as usize];
        self.next_image = 0;
    }

    fn live_handles(&self) -> usize {
        self.slots.len() + self.chain.handles.len()
    }

    fn slot_handles(&self) -> Vec<u64> {
        self.slots.iter().map(|s| s.handle).collect()
    }

    fn assert_image_in_range(&self, image: u32) {
        assert!(
            image < self.chain.image_count,
            "image {image} used with a {}-image chain",
            self.chain.image_count
        );
    }
}

impl FrameBackend for MockBackend {
    fn wait_slot(&mut self, slot: usize) -> RendererResult<()> {
        self.calls.push(Call::Wait(slot));
        let state = &mut self.slots[slot];
        assert!(
            state.signaled || state.in_flight,
            "slot {slot} waited on a fence that can never signal"
        );
        // The GPU finishes whatever was submitted.
        state.in_flight = false;
        state.signaled = true;
        state.waits += 1;
        Ok(())
    }

    fn reset_slot(&mut self, slot: usize) -> RendererResult<()> {
        self.calls.push(Call::Reset(slot));
        assert!(self.slots[slot].signaled, "reset of an unsignaled fence");
        self.slots[slot].signaled = false;
        Ok(())
    }

    fn acquire(&mut self, slot: usize) -> RendererResult<Acquired> {
        if self.out_of_date_acquires > 0 {
            self.out_of_date_acquires -= 1;
            self.calls.push(Call::Acquire(slot, u32::MAX));
            return Ok(Acquired::OutOfDate);
        }
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.chain.image_count;
        self.calls.push(Call::Acquire(slot, index));
        Ok(Acquired::Image {
            index,
            suboptimal: false,
        })
    }

    fn release_slot(&mut self, slot: usize) -> RendererResult<()> {
        self.calls.push(Call::Release(slot));
        self.slots[slot].in_flight = true;
        Ok(())
    }

    fn write_shader_data(&mut self, slot: usize, _data: &ShaderData) -> RendererResult<()> {
        self.calls.push(Call::Write(slot));
        assert!(
            !self.slots[slot].in_flight,
            "shader data of slot {slot} written while the GPU may read it"
        );
        Ok(())
    }

    fn record(&mut self, slot: usize, image: u32) -> RendererResult<()> {
        self.calls.push(Call::Record(slot, image));
        self.assert_image_in_range(image);
        assert!(!self.slots[slot].in_flight, "re-recorded an in-flight command buffer");
        Ok(())
    }

    fn submit(&mut self, slot: usize, image: u32) -> RendererResult<()> {
        self.calls.push(Call::Submit(slot, image));
        self.assert_image_in_range(image);
        assert!(
            !self.render_complete[image as usize],
            "render-complete semaphore of image {image} signalled twice"
        );
        self.render_complete[image as usize] = true;
        self.slots[slot].in_flight = true;
        Ok(())
    }

    fn present(&mut self, image: u32) -> RendererResult<Presented> {
        self.calls.push(Call::Present(image));
        self.assert_image_in_range(image);
        assert!(
            std::mem::take(&mut self.render_complete[image as usize]),
            "present of image {image} without a matching submit"
        );
        self.presents[image as usize] += 1;
        if self.suboptimal_presents > 0 {
            self.suboptimal_presents -= 1;
            return Ok(Presented::RecreateRequired);
        }
        Ok(Presented::Ok)
    }

    fn recreate(&mut self, width: u32, height: u32) -> RendererResult<()> {
        self.calls.push(Call::Recreate(width, height));
        assert!(
            self.slots.iter().all(|s| !s.in_flight),
            "recreate must only run once the device is idle"
        );
        let image_count = self
            .rebuild_image_counts
            .pop_front()
            .unwrap_or(self.chain.image_count);
        self.build_chain(width, height, image_count);
        Ok(())
    }
}

// The real chain idles the device before rebuilding; model that here.
fn drain(frames: &mut FrameLoop<MockBackend>) {
    for slot in frames.backend_mut().slots.iter_mut() {
        if slot.in_flight {
            slot.in_flight = false;
            slot.signaled = true;
        }
    }
}

fn render(frames: &mut FrameLoop<MockBackend>) -> FrameOutcome {
    if frames.recreate_pending() {
        drain(frames);
    }
    frames.render(&ShaderData::default()).expect("mock frame")
}

#[test]
fn test_three_images_two_slots_six_frames() {
    let mut frames = FrameLoop::new(MockBackend::new(1280, 720, 3), 1280, 720);
    for _ in 0..6 {
        assert_eq!(render(&mut frames), FrameOutcome::Presented);
    }

    let backend = frames.backend();
    assert_eq!(backend.slots[0].waits, 3);
    assert_eq!(backend.slots[1].waits, 3);
    assert!(backend.presents.iter().all(|&n| n >= 1), "{:?}", backend.presents);
    assert_eq!(frames.frames_presented(), 6);
    assert_eq!(frames.current_slot(), 0);
}

#[test]
fn test_shader_data_written_after_fence_wait() {
    let mut frames = FrameLoop::new(MockBackend::new(800, 600, 3), 800, 600);
    for _ in 0..4 {
        render(&mut frames);
    }

    // Every write is preceded by a wait and reset of the same slot in this frame.
    let calls = &frames.backend().calls;
    for (i, call) in calls.iter().enumerate() {
        if let Call::Write(slot) = *call {
            assert_eq!(calls[i - 3], Call::Wait(slot));
            assert_eq!(calls[i - 2], Call::Reset(slot));
            assert!(matches!(calls[i - 1], Call::Acquire(s, _) if s == slot));
        }
    }
}

#[test]
fn test_present_waits_on_same_iteration_submit() {
    let mut frames = FrameLoop::new(MockBackend::new(800, 600, 2), 800, 600);
    for _ in 0..5 {
        render(&mut frames);
    }

    let calls = &frames.backend().calls;
    for (i, call) in calls.iter().enumerate() {
        if let Call::Present(image) = *call {
            assert!(matches!(calls[i - 1], Call::Submit(_, k) if k == image));
            assert!(matches!(calls[i - 2], Call::Record(_, k) if k == image));
        }
    }
}

#[test]
fn test_resize_rebuilds_chain_and_keeps_slots() {
    let mut frames = FrameLoop::new(MockBackend::new(1280, 720, 3), 1280, 720);
    render(&mut frames);
    render(&mut frames);

    let slot_handles = frames.backend().slot_handles();
    let old_chain = frames.backend().chain.handles.clone();

    frames.request_resize(640, 480);
    render(&mut frames);

    let backend = frames.backend();
    assert_eq!((backend.chain.width, backend.chain.height), (640, 480));
    assert!(backend.chain.handles.iter().all(|h| !old_chain.contains(h)));
    assert_eq!(backend.slot_handles(), slot_handles);
    assert!(backend.calls.contains(&Call::Recreate(640, 480)));
}

#[test]
fn test_rebuild_resizes_per_image_state_to_new_image_count() {
    let mut backend = MockBackend::new(1280, 720, 3);
    backend.rebuild_image_counts = VecDeque::from([2, 4]);
    let mut frames = FrameLoop::new(backend, 1280, 720);
    for _ in 0..3 {
        render(&mut frames);
    }

    frames.request_resize(1024, 768);
    for _ in 0..4 {
        assert_eq!(render(&mut frames), FrameOutcome::Presented);
    }
    let backend = frames.backend();
    assert_eq!(backend.chain.image_count, 2);
    assert_eq!(backend.render_complete.len(), 2);
    assert_eq!(backend.presents, vec![2, 2]);
    // views + semaphores per image, plus the depth buffer
    assert_eq!(backend.chain.handles.len(), 2 * 2 + 1);

    frames.request_resize(1280, 720);
    for _ in 0..8 {
        assert_eq!(render(&mut frames), FrameOutcome::Presented);
    }
    let backend = frames.backend();
    assert_eq!(backend.chain.image_count, 4);
    assert_eq!(backend.render_complete.len(), 4);
    assert_eq!(backend.presents, vec![2, 2, 2, 2]);
    assert_eq!(backend.chain.handles.len(), 4 * 2 + 1);

    // Every image index used after a rebuild fits the chain it was built for.
    let mut counts = [3u32, 2, 4].into_iter();
    let mut count = counts.next().unwrap();
    for call in &backend.calls {
        match *call {
            Call::Recreate(..) => count = counts.next().unwrap(),
            Call::Acquire(_, image) | Call::Record(_, image) | Call::Submit(_, image)
            | Call::Present(image) => assert!(image < count, "{call:?} with {count} images"),
            _ => {}
        }
    }
    assert!(counts.next().is_none());
}

#[test]
fn test_recreate_same_extent_is_idempotent() {
    let mut frames = FrameLoop::new(MockBackend::new(1024, 768, 3), 1024, 768);
    render(&mut frames);
    let live = frames.backend().live_handles();

    for _ in 0..2 {
        frames.request_resize(1024, 768);
        render(&mut frames);
        assert_eq!(frames.backend().chain.image_count, 3);
        assert_eq!(frames.backend().live_handles(), live);
    }
    let recreates = frames
        .backend()
        .calls
        .iter()
        .filter(|c| matches!(c, Call::Recreate(..)))
        .count();
    assert_eq!(recreates, 2);
}

#[test]
fn test_resize_flag_consumed_once() {
    let mut frames = FrameLoop::new(MockBackend::new(800, 600, 3), 800, 600);
    frames.request_resize(900, 700);
    frames.request_resize(1000, 700);
    render(&mut frames);
    render(&mut frames);

    let recreates: Vec<_> = frames
        .backend()
        .calls
        .iter()
        .filter(|c| matches!(c, Call::Recreate(..)))
        .copied()
        .collect();
    assert_eq!(recreates, vec![Call::Recreate(1000, 700)]);
}

#[test]
fn test_out_of_date_acquire_recovers() {
    let mut backend = MockBackend::new(800, 600, 3);
    backend.out_of_date_acquires = 1;
    let mut frames = FrameLoop::new(backend, 800, 600);

    assert_eq!(render(&mut frames), FrameOutcome::OutOfDate);
    assert_eq!(frames.current_slot(), 0);
    assert_eq!(frames.backend().calls.last(), Some(&Call::Release(0)));

    // The released fence lets the retry wait on slot 0 without deadlocking.
    assert_eq!(render(&mut frames), FrameOutcome::Presented);
    assert!(frames.backend().calls.contains(&Call::Recreate(800, 600)));
    assert_eq!(frames.backend().slots[0].waits, 2);
}

#[test]
fn test_suboptimal_present_schedules_recreate() {
    let mut backend = MockBackend::new(800, 600, 3);
    backend.suboptimal_presents = 1;
    let mut frames = FrameLoop::new(backend, 800, 600);

    assert_eq!(render(&mut frames), FrameOutcome::Presented);
    assert!(frames.recreate_pending());
    render(&mut frames);
    assert!(!frames.recreate_pending());
    assert_eq!(
        frames
            .backend()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Recreate(..)))
            .count(),
        1
    );
}

#[test]
fn test_minimized_window_skips_frames() {
    let mut frames = FrameLoop::new(MockBackend::new(800, 600, 3), 800, 600);
    render(&mut frames);
    let calls_before = frames.backend().calls.len();

    frames.request_resize(0, 0);
    assert_eq!(render(&mut frames), FrameOutcome::Skipped);
    assert_eq!(frames.backend().calls.len(), calls_before);

    frames.request_resize(800, 600);
    assert_eq!(render(&mut frames), FrameOutcome::Presented);
    assert_eq!(frames.backend().calls[calls_before], Call::Recreate(800, 600));
}
