//! Fixed-slot task launcher on top of the RTOS kernel.
//!
//! Every slot owns a pre-sized stack region. A task is started in the first
//! free slot whose stack is large enough and the slot is only reused once the
//! task has been stopped and joined.

use crate::Error;

/// Task entry point. The argument is the opaque user value given to
/// [Scheduler::start].
pub type Entry = fn(usize) -> i32;

/// Thread primitives of the underlying kernel.
pub trait Kernel {
    type Thread: Copy + PartialEq + core::fmt::Debug;

    /// Create a thread running `entry(arg)` on `stack`.
    ///
    /// # Returns
    /// The thread handle, or `None` if the kernel refused to create it.
    fn spawn(
        &mut self,
        name: &'static str,
        priority: u8,
        stack: &mut [u8],
        entry: Entry,
        arg: usize,
    ) -> Option<Self::Thread>;

    /// Ask `thread` to terminate at its next cooperative check.
    fn terminate(&mut self, thread: Self::Thread);

    /// Block until `thread` has exited.
    ///
    /// # Returns
    /// The thread's exit code.
    fn join(&mut self, thread: Self::Thread) -> i32;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State<T> {
    Free,
    Reserved,
    Running(T),
}

struct Slot<'a, T> {
    stack: &'a mut [u8],
    state: State<T>,
    name: &'static str,
}

/// Handle of a task started by [Scheduler::start].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Task<T> {
    slot: usize,
    thread: T,
}

impl<T: Copy> Task<T> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn thread(&self) -> T {
        self.thread
    }
}

pub struct Scheduler<'a, K: Kernel, const SLOTS: usize> {
    kernel: K,
    slots: [Slot<'a, K::Thread>; SLOTS],
}

impl<'a, K: Kernel, const SLOTS: usize> Scheduler<'a, K, SLOTS> {
    /// # Args
    /// * `kernel` - Thread backend.
    /// * `stacks` - One stack region per slot.
    pub fn new(kernel: K, stacks: [&'a mut [u8]; SLOTS]) -> Self {
        Self {
            kernel,
            slots: stacks.map(|stack| Slot {
                stack,
                state: State::Free,
                name: "",
            }),
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    /// Number of slots not holding a task.
    pub fn free_slots(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state == State::Free)
            .count()
    }

    /// Start a task.
    ///
    /// # Args
    /// * `name` - Thread name for the kernel registry.
    /// * `priority` - Kernel priority.
    /// * `stack_size` - Minimum stack size in bytes.
    /// * `entry` - Task body.
    /// * `arg` - User value passed to `entry`.
    ///
    /// # Returns
    /// `Err(NoFreeSlot)` if no free slot has a large enough stack and
    /// `Err(LaunchFailed)` if the kernel refused the thread. In both cases
    /// no slot stays reserved.
    pub fn start(
        &mut self,
        name: &'static str,
        priority: u8,
        stack_size: usize,
        entry: Entry,
        arg: usize,
    ) -> Result<Task<K::Thread>, Error> {
        let index = self
            .slots
            .iter()
            .position(|s| s.state == State::Free && s.stack.len() >= stack_size)
            .ok_or(Error::NoFreeSlot)?;
        let slot = &mut self.slots[index];
        slot.state = State::Reserved;

        match self
            .kernel
            .spawn(name, priority, &mut *slot.stack, entry, arg)
        {
            Some(thread) => {
                slot.state = State::Running(thread);
                slot.name = name;
                log::debug!("task {} started in slot {}", name, index);
                Ok(Task {
                    slot: index,
                    thread,
                })
            }
            None => {
                slot.state = State::Free;
                log::warn!("task {} failed to launch", name);
                Err(Error::LaunchFailed)
            }
        }
    }

    /// Terminate `task`, wait for it to exit and free its slot.
    ///
    /// # Returns
    /// The exit code, or `None` if the handle no longer refers to a running
    /// task.
    pub fn stop(&mut self, task: Task<K::Thread>) -> Option<i32> {
        let slot = self.slots.get_mut(task.slot)?;
        if slot.state != State::Running(task.thread) {
            return None;
        }
        self.kernel.terminate(task.thread);
        let code = self.kernel.join(task.thread);
        log::debug!("task {} exited with {}", slot.name, code);
        slot.state = State::Free;
        slot.name = "";
        Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Kernel double that runs the entry immediately and hands out
    /// sequential thread ids.
    #[derive(Default)]
    struct Immediate {
        next: u32,
        refuse: bool,
        exits: std::vec::Vec<(u32, i32)>,
        terminated: std::vec::Vec<u32>,
        stack_lens: std::vec::Vec<usize>,
    }

    impl Kernel for Immediate {
        type Thread = u32;

        fn spawn(
            &mut self,
            _name: &'static str,
            _priority: u8,
            stack: &mut [u8],
            entry: Entry,
            arg: usize,
        ) -> Option<u32> {
            if self.refuse {
                return None;
            }
            self.next += 1;
            self.stack_lens.push(stack.len());
            self.exits.push((self.next, entry(arg)));
            Some(self.next)
        }

        fn terminate(&mut self, thread: u32) {
            self.terminated.push(thread);
        }

        fn join(&mut self, thread: u32) -> i32 {
            self.exits
                .iter()
                .find(|(t, _)| *t == thread)
                .map(|(_, code)| *code)
                .unwrap()
        }
    }

    fn echo(arg: usize) -> i32 {
        arg as i32
    }

    #[test]
    fn fills_slots_then_refuses() {
        let mut stacks = [[0u8; 256]; 4];
        let [a, b, c, d] = &mut stacks;
        let mut scheduler = Scheduler::new(
            Immediate::default(),
            [&mut a[..], &mut b[..], &mut c[..], &mut d[..]],
        );
        let tasks: std::vec::Vec<_> = (0..4)
            .map(|i| scheduler.start("worker", 1, 128, echo, i).unwrap())
            .collect();
        assert_eq!(scheduler.free_slots(), 0);
        assert_eq!(
            scheduler.start("worker", 1, 128, echo, 9),
            Err(Error::NoFreeSlot)
        );

        assert_eq!(scheduler.stop(tasks[2]), Some(2));
        assert_eq!(scheduler.kernel().terminated, [tasks[2].thread()]);
        // Stale handle.
        assert_eq!(scheduler.stop(tasks[2]), None);
        let again = scheduler.start("worker", 1, 128, echo, 7).unwrap();
        assert_eq!(again.slot(), 2);
        assert_eq!(scheduler.stop(again), Some(7));
    }

    #[test]
    fn picks_first_large_enough_stack() {
        let mut small = [0u8; 64];
        let mut large = [0u8; 512];
        let mut scheduler = Scheduler::new(Immediate::default(), [&mut small[..], &mut large[..]]);
        let task = scheduler.start("big", 2, 300, echo, 0).unwrap();
        assert_eq!(task.slot(), 1);
        assert_eq!(scheduler.kernel().stack_lens, [512]);
        assert_eq!(
            scheduler.start("big", 2, 300, echo, 0),
            Err(Error::NoFreeSlot)
        );
        assert_eq!(scheduler.start("small", 2, 64, echo, 0).unwrap().slot(), 0);
    }

    #[test]
    fn launch_failure_releases_slot() {
        let mut stack = [0u8; 128];
        let mut scheduler = Scheduler::new(Immediate::default(), [&mut stack[..]]);
        scheduler.kernel_mut().refuse = true;
        assert_eq!(
            scheduler.start("t", 1, 64, echo, 0),
            Err(Error::LaunchFailed)
        );
        assert_eq!(scheduler.free_slots(), 1);
        scheduler.kernel_mut().refuse = false;
        assert!(scheduler.start("t", 1, 64, echo, 0).is_ok());
    }
}
