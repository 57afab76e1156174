//! UI-affine task runner.
//!
//! All compositor state lives on one thread. Other threads hold a
//! [`UiTaskSender`] and post closures that receive `&mut S` once the owning
//! loop calls [`UiTaskRunner::run_due`]. Delayed tasks wait in a deadline heap;
//! the loop sleeps until [`UiTaskRunner::next_deadline`].

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use thiserror::Error;

pub type UiTask<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

type WakeCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UiThreadError {
    #[error("ui task runner is gone")]
    Disconnected,
}

struct PostedTask<S> {
    deadline: Option<Instant>,
    task: UiTask<S>,
}

struct DelayedTask<S> {
    deadline: Instant,
    sequence: u64,
    task: UiTask<S>,
}

impl<S> DelayedTask<S> {
    fn key(&self) -> (Instant, u64) {
        (self.deadline, self.sequence)
    }
}

impl<S> PartialEq for DelayedTask<S> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<S> Eq for DelayedTask<S> {}

impl<S> PartialOrd for DelayedTask<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> Ord for DelayedTask<S> {
    // Reversed: the heap pops the earliest deadline first, FIFO among equal deadlines.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Creates a sender/runner pair bound to the calling thread.
pub fn ui_task_channel<S>() -> (UiTaskSender<S>, UiTaskRunner<S>) {
    let (sender, receiver) = unbounded();
    let ui_thread = std::thread::current().id();
    (
        UiTaskSender {
            sender,
            ui_thread,
            wake: None,
        },
        UiTaskRunner {
            receiver,
            ready: VecDeque::new(),
            delayed: BinaryHeap::new(),
            next_sequence: 0,
            _not_send: PhantomData,
        },
    )
}

pub struct UiTaskSender<S> {
    sender: Sender<PostedTask<S>>,
    ui_thread: ThreadId,
    wake: Option<WakeCallback>,
}

impl<S> Clone for UiTaskSender<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            ui_thread: self.ui_thread,
            wake: self.wake.clone(),
        }
    }
}

impl<S> UiTaskSender<S> {
    /// Installs a callback run after every post, used to rouse a sleeping loop.
    pub fn with_wake(mut self, wake: impl Fn() + Send + Sync + 'static) -> Self {
        self.wake = Some(Arc::new(wake));
        self
    }

    pub fn currently_on(&self) -> bool {
        std::thread::current().id() == self.ui_thread
    }

    pub fn post(&self, task: impl FnOnce(&mut S) + Send + 'static) -> Result<(), UiThreadError> {
        self.send(PostedTask {
            deadline: None,
            task: Box::new(task),
        })
    }

    pub fn post_delayed(
        &self,
        delay: Duration,
        task: impl FnOnce(&mut S) + Send + 'static,
    ) -> Result<(), UiThreadError> {
        self.send(PostedTask {
            deadline: Some(Instant::now() + delay),
            task: Box::new(task),
        })
    }

    fn send(&self, posted: PostedTask<S>) -> Result<(), UiThreadError> {
        self.sender
            .send(posted)
            .map_err(|_| UiThreadError::Disconnected)?;
        if let Some(wake) = self.wake.as_ref() {
            wake();
        }
        Ok(())
    }
}

pub struct UiTaskRunner<S> {
    receiver: Receiver<PostedTask<S>>,
    ready: VecDeque<UiTask<S>>,
    delayed: BinaryHeap<DelayedTask<S>>,
    next_sequence: u64,
    // Stays on the thread that created it.
    _not_send: PhantomData<*const ()>,
}

impl<S> UiTaskRunner<S> {
    /// Runs every immediate task and every delayed task due at `now`.
    ///
    /// Tasks posted while this batch runs wait for the next call, so a task
    /// that reposts itself cannot starve the loop. Returns the number run.
    pub fn run_due(&mut self, state: &mut S, now: Instant) -> usize {
        self.collect_incoming();
        while self
            .delayed
            .peek()
            .is_some_and(|delayed| delayed.deadline <= now)
        {
            let Some(delayed) = self.delayed.pop() else {
                break;
            };
            self.ready.push_back(delayed.task);
        }

        let batch = self.ready.len();
        for _ in 0..batch {
            let Some(task) = self.ready.pop_front() else {
                break;
            };
            task(state);
        }
        if batch > 0 {
            log::trace!(target: "ui_thread", "ran {batch} ui tasks");
        }
        batch
    }

    /// Earliest instant at which `run_due` has work. `now` when tasks are ready.
    pub fn next_deadline(&mut self, now: Instant) -> Option<Instant> {
        self.collect_incoming();
        if !self.ready.is_empty() {
            return Some(now);
        }
        self.delayed.peek().map(|delayed| delayed.deadline)
    }

    pub fn pending_count(&mut self) -> usize {
        self.collect_incoming();
        self.ready.len() + self.delayed.len()
    }

    fn collect_incoming(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(PostedTask {
                    deadline: None,
                    task,
                }) => self.ready.push_back(task),
                Ok(PostedTask {
                    deadline: Some(deadline),
                    task,
                }) => {
                    let sequence = self.next_sequence;
                    self.next_sequence = self
                        .next_sequence
                        .checked_add(1)
                        .expect("delayed task sequence overflow");
                    self.delayed.push(DelayedTask {
                        deadline,
                        sequence,
                        task,
                    });
                }
                Err(TryRecvError::Empty) => return,
                // The runner holds no sender; disconnection only means every sender dropped.
                Err(TryRecvError::Disconnected) => return,
            }
        }
    }
}
