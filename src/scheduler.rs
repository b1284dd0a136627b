//! Deferred, coalesced regeneration scheduling.
//!
//! Property setters call [`RegenerationScheduler::request_update`] as often
//! as they like.  Only the first request since the last drain puts an entry
//! on the [`UpdateQueue`]; later ones see the pending flag and return.  The
//! queue is drained once per frame by [`crate::drain_update_queue`], which
//! calls [`crate::texture::NoiseTexture::perform_update`] on every texture
//! that asked.  `perform_update` clears the flag before generating, so a
//! request that arrives mid-generation queues a fresh pass instead of being
//! swallowed.
//!
//! In [`GenerationMode::Background`] the pixel work runs on a private,
//! bounded [`rayon`] pool.  Each texture has at most one task in flight; a
//! pass requested while one is running is remembered and started when the
//! running one has been published.

use std::sync::{
    Arc, Mutex, OnceLock, PoisonError, Weak,
    atomic::{AtomicBool, AtomicU64, Ordering},
    mpsc,
};

use bevy::prelude::Resource;

use crate::{
    generator::{GenerationRequest, generate},
    image::TextureImage,
};

/// Maximum number of texture generation tasks that run concurrently across
/// all textures.
const MAX_GENERATION_THREADS: usize = 4;

/// Returns the library-private rayon thread pool used for texture generation.
///
/// Isolated from the application's global rayon pool so texture work does not
/// starve unrelated parallel workloads.
fn gen_pool() -> &'static rayon::ThreadPool {
    static POOL: OnceLock<rayon::ThreadPool> = OnceLock::new();
    POOL.get_or_init(|| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(MAX_GENERATION_THREADS)
            .thread_name(|i| format!("noise-texture-gen-{i}"))
            .build()
            .expect("failed to build noise texture generation thread pool")
    })
}

/// Where `perform_update` runs the pixel work.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GenerationMode {
    /// Generate on the calling thread and publish immediately.
    Blocking,
    /// Generate on the worker pool; publish from `poll_generation_tasks`.
    #[default]
    Background,
}

/// Stable identity of one texture's scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Queue of textures waiting for a regeneration pass.
///
/// Cloning shares the same queue.  Entries are weak, so a texture dropped
/// while queued simply disappears at the next [`drain`](Self::drain).
#[derive(Resource, Clone)]
pub struct UpdateQueue {
    tx: mpsc::Sender<Weak<SchedulerCore>>,
    // Wrapped in Mutex so the queue is Sync, which Bevy's Resource bound requires.
    rx: Arc<Mutex<mpsc::Receiver<Weak<SchedulerCore>>>>,
}

impl Default for UpdateQueue {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued request whose texture is still alive.
    pub fn drain(&self) -> Vec<QueuedUpdate> {
        let rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        rx.try_iter()
            .filter_map(|core| {
                let id = core.upgrade()?.id;
                Some(QueuedUpdate { id, core })
            })
            .collect()
    }

    /// Put a drained request back for the next drain, e.g. when its texture
    /// has been built but not yet spawned into the world.
    pub fn requeue(&self, update: QueuedUpdate) {
        self.tx.send(update.core).ok();
    }
}

/// One drained entry of an [`UpdateQueue`].
pub struct QueuedUpdate {
    id: TextureId,
    core: Weak<SchedulerCore>,
}

impl QueuedUpdate {
    pub fn id(&self) -> TextureId {
        self.id
    }
}

pub(crate) struct SchedulerCore {
    id: TextureId,
    pending: AtomicBool,
    queue: mpsc::Sender<Weak<SchedulerCore>>,
}

impl SchedulerCore {
    fn request_update(self: &Arc<Self>) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        if self.queue.send(Arc::downgrade(self)).is_err() {
            bevy::log::debug!("update queue closed; dropping request for {:?}", self.id);
        }
        true
    }
}

/// Per-texture scheduling state.
pub struct RegenerationScheduler {
    core: Arc<SchedulerCore>,
    in_flight: Option<InFlight>,
    /// A pass was requested while `in_flight` was running.
    rerun: bool,
}

/// A generation task running on the worker pool.
struct InFlight {
    // Wrapped in Mutex so the owning component is Sync.
    rx: Mutex<mpsc::Receiver<Generated>>,
    /// Set on teardown; a task that has not started yet skips its work.
    cancelled: Arc<AtomicBool>,
}

/// Output of one pass, tagged with the tiling mode it was sampled with.
pub(crate) struct Generated {
    /// `None` when there was no noise source to sample.
    pub image: Option<TextureImage>,
    pub seamless: bool,
}

impl Generated {
    pub(crate) fn run(request: &GenerationRequest) -> Self {
        Self {
            image: generate(request),
            seamless: request.seamless,
        }
    }
}

/// Result of checking the in-flight task.
pub(crate) enum Poll {
    /// Nothing running.
    Idle,
    /// Still running.
    Running,
    Done(Generated),
    /// The worker went away without answering (it panicked).
    Failed,
}

impl RegenerationScheduler {
    pub fn new(queue: &UpdateQueue) -> Self {
        Self {
            core: Arc::new(SchedulerCore {
                id: TextureId::next(),
                pending: AtomicBool::new(false),
                queue: queue.tx.clone(),
            }),
            in_flight: None,
            rerun: false,
        }
    }

    pub fn id(&self) -> TextureId {
        self.core.id
    }

    /// Schedule a regeneration pass unless one is already pending.
    ///
    /// Returns `true` if this call queued a new pass.
    pub fn request_update(&self) -> bool {
        self.core.request_update()
    }

    pub fn is_pending(&self) -> bool {
        self.core.pending.load(Ordering::Acquire)
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// A callback for change signals.  It holds the scheduler weakly and does
    /// nothing once the texture is gone.
    pub(crate) fn requester(&self) -> impl Fn() + Send + Sync + 'static {
        let core = Arc::downgrade(&self.core);
        move || {
            if let Some(core) = core.upgrade() {
                core.request_update();
            }
        }
    }

    /// Mark the start of a deferred pass.
    pub(crate) fn begin_pass(&self) {
        self.core.pending.store(false, Ordering::Release);
    }

    /// Start `request` on the worker pool, or remember to do so once the
    /// running task completes.  Returns `true` if a task was started.
    pub(crate) fn start_background(&mut self, request: GenerationRequest) -> bool {
        if self.in_flight.is_some() {
            self.rerun = true;
            return false;
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let (tx, rx) = mpsc::sync_channel(1);
        gen_pool().spawn(move || {
            // Skip the work entirely if the texture was torn down first.
            let generated = (!flag.load(Ordering::Relaxed)).then(|| Generated::run(&request));
            // Release the noise source before the owner can observe completion.
            drop(request);
            if let Some(generated) = generated {
                tx.send(generated).ok();
            }
        });
        self.in_flight = Some(InFlight {
            rx: Mutex::new(rx),
            cancelled,
        });
        true
    }

    /// Non-blocking check of the in-flight task.
    pub(crate) fn poll(&mut self) -> Poll {
        let Some(task) = &self.in_flight else {
            return Poll::Idle;
        };
        let received = task
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv();
        let poll = match received {
            Ok(image) => Poll::Done(image),
            Err(mpsc::TryRecvError::Empty) => return Poll::Running,
            Err(mpsc::TryRecvError::Disconnected) => Poll::Failed,
        };
        self.in_flight = None;
        poll
    }

    /// Block until the in-flight task (if any) has finished, returning its
    /// result.  Used by teardown and by callers that need a settled texture.
    pub(crate) fn wait(&mut self) -> Poll {
        let Some(task) = self.in_flight.take() else {
            return Poll::Idle;
        };
        let rx = task.rx.into_inner().unwrap_or_else(PoisonError::into_inner);
        match rx.recv() {
            Ok(image) => Poll::Done(image),
            Err(mpsc::RecvError) => Poll::Failed,
        }
    }

    /// Ask a not-yet-started task to skip its work, then wait for it.
    pub(crate) fn cancel_and_join(&mut self) {
        if let Some(task) = &self.in_flight {
            task.cancelled.store(true, Ordering::Relaxed);
        }
        self.wait();
        self.rerun = false;
    }

    /// Consume the "requested while running" flag.
    pub(crate) fn take_rerun(&mut self) -> bool {
        std::mem::take(&mut self.rerun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_coalesce_until_the_pass_begins() {
        let queue = UpdateQueue::new();
        let scheduler = RegenerationScheduler::new(&queue);

        assert!(scheduler.request_update());
        for _ in 0..10 {
            assert!(!scheduler.request_update());
        }
        let drained: Vec<_> = queue.drain().iter().map(QueuedUpdate::id).collect();
        assert_eq!(drained, vec![scheduler.id()]);
        assert!(queue.drain().is_empty());

        scheduler.begin_pass();
        assert!(!scheduler.is_pending());
        assert!(scheduler.request_update());
        assert_eq!(queue.drain().len(), 1);
    }

    #[test]
    fn dropped_schedulers_vanish_from_the_queue() {
        let queue = UpdateQueue::new();
        let kept = RegenerationScheduler::new(&queue);
        let dropped = RegenerationScheduler::new(&queue);
        kept.request_update();
        dropped.request_update();
        drop(dropped);
        let drained: Vec<_> = queue.drain().iter().map(QueuedUpdate::id).collect();
        assert_eq!(drained, vec![kept.id()]);
    }

    #[test]
    fn requeued_entries_survive_to_the_next_drain() {
        let queue = UpdateQueue::new();
        let scheduler = RegenerationScheduler::new(&queue);
        scheduler.request_update();
        for update in queue.drain() {
            queue.requeue(update);
        }
        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id(), scheduler.id());
        assert!(scheduler.is_pending(), "requeueing must not reset the pending flag");
    }

    #[test]
    fn requester_is_inert_after_drop() {
        let queue = UpdateQueue::new();
        let scheduler = RegenerationScheduler::new(&queue);
        let request = scheduler.requester();
        request();
        assert!(scheduler.is_pending());
        assert_eq!(queue.drain().len(), 1);

        drop(scheduler);
        request();
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn background_allows_one_task_in_flight() {
        let queue = UpdateQueue::new();
        let mut scheduler = RegenerationScheduler::new(&queue);
        let request = GenerationRequest {
            width: 2,
            height: 2,
            noise_offset: bevy::math::Vec2::ZERO,
            seamless: false,
            as_normal_map: false,
            bump_strength: 1.0,
            noise: None,
        };
        assert!(scheduler.start_background(request.clone()));
        assert!(!scheduler.start_background(request.clone()));
        assert!(scheduler.is_generating());

        assert!(matches!(scheduler.wait(), Poll::Done(Generated { image: None, .. })));
        assert!(!scheduler.is_generating());
        assert!(scheduler.take_rerun());
        assert!(!scheduler.take_rerun());
        assert!(matches!(scheduler.poll(), Poll::Idle));
    }
}
