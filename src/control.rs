//! Run/pause control of the measurement task.
//!
//! The sweep task owns the mode flags. Other tasks request changes through a
//! small command mailbox which the sweep task drains between passes.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU8, Ordering};

use bitbybit::bitfield;
use critical_section::Mutex;
use heapless::Deque;

use crate::{
    design_parameters::PAUSE_TIMEOUT,
    snapshot::SweepBuffers,
    time::{wait_until, Timebase},
    Error,
};

/// Mailbox depth.
pub const COMMAND_QUEUE_SIZE: usize = 4;

#[bitfield(u8, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct SweepMode {
    /// Continuous sweeping.
    #[bit(0, rw)]
    pub enable: bool,
    /// One more pass is owed.
    #[bit(1, rw)]
    pub once: bool,
    /// Console output is binary.
    #[bit(3, rw)]
    pub binary: bool,
    /// Display is mirrored to a remote host.
    #[bit(6, rw)]
    pub remote: bool,
    /// The UI is being serviced from the sweep task.
    #[bit(7, rw)]
    pub ui_mode: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Start { once: bool },
    Stop,
    Single,
    /// Settings changed; the sweep task reloads them before the next pass.
    UpdateConfig,
}

/// Where a control call originates.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Caller {
    /// The measurement task itself, e.g. a console command it services.
    SweepTask,
    Other,
}

pub struct SweepControl {
    mode: AtomicU8,
    commands: Mutex<RefCell<Deque<Command, COMMAND_QUEUE_SIZE>>>,
}

impl Default for SweepControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepControl {
    /// Sweeping enabled with one pass owed, as after power-up.
    pub const fn new() -> Self {
        Self {
            mode: AtomicU8::new(0b11),
            commands: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    pub fn mode(&self) -> SweepMode {
        SweepMode::new_with_raw_value(self.mode.load(Ordering::Acquire))
    }

    fn update(&self, f: impl Fn(SweepMode) -> SweepMode) {
        // fetch_update only fails when the closure returns None.
        let _ = self
            .mode
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                Some(f(SweepMode::new_with_raw_value(raw)).raw_value())
            });
    }

    pub fn set_ui_mode(&self, active: bool) {
        self.update(|m| m.with_ui_mode(active));
    }

    pub fn set_binary(&self, binary: bool) {
        self.update(|m| m.with_binary(binary));
    }

    pub fn set_remote(&self, remote: bool) {
        self.update(|m| m.with_remote(remote));
    }

    pub fn is_enabled(&self) -> bool {
        self.mode().enable()
    }

    /// Queue a command for the sweep task.
    ///
    /// # Returns
    /// `Err(QueueExhausted)` if the mailbox is full. The command is dropped.
    pub fn post(&self, command: Command) -> Result<(), Error> {
        critical_section::with(|cs| {
            self.commands
                .borrow_ref_mut(cs)
                .push_back(command)
                .map_err(|_| Error::QueueExhausted)
        })
    }

    /// Whether commands are waiting to be drained.
    pub fn has_pending(&self) -> bool {
        critical_section::with(|cs| !self.commands.borrow_ref(cs).is_empty())
    }

    fn apply(&self, command: Command) {
        match command {
            Command::Start { once } => {
                self.update(|m| m.with_enable(true).with_once(once))
            }
            Command::Stop => self.update(|m| m.with_enable(false)),
            Command::Single => self.update(|m| m.with_enable(true).with_once(true)),
            Command::UpdateConfig => {}
        }
    }

    /// Apply all queued commands. Sweep task only.
    ///
    /// # Returns
    /// Whether a configuration update was among them.
    pub fn drain(&self) -> bool {
        let mut config_changed = false;
        while let Some(command) =
            critical_section::with(|cs| self.commands.borrow_ref_mut(cs).pop_front())
        {
            log::trace!("sweep command {:?}", command);
            config_changed |= command == Command::UpdateConfig;
            self.apply(command);
        }
        config_changed
    }

    /// Stop continuous sweeping.
    ///
    /// From the sweep task this takes effect immediately. Other callers post a
    /// stop and wait until the sweep task has applied it and no pass is in
    /// flight.
    ///
    /// # Returns
    /// `Err(ResourceBusy)` if the sweep task did not go idle within
    /// [PAUSE_TIMEOUT].
    pub fn request_pause<T: Timebase + ?Sized, const N: usize>(
        &self,
        caller: Caller,
        buffers: &SweepBuffers<N>,
        timebase: &T,
    ) -> Result<(), Error> {
        if caller == Caller::SweepTask {
            self.apply(Command::Stop);
            log::info!("sweep paused");
            return Ok(());
        }
        self.post(Command::Stop)?;
        let idle = wait_until(timebase, PAUSE_TIMEOUT, || {
            !self.is_enabled() && !self.has_pending() && !buffers.sweep_in_progress()
        });
        if !idle {
            log::warn!("sweep task did not pause");
            return Err(Error::ResourceBusy);
        }
        log::info!("sweep paused");
        Ok(())
    }

    /// Resume continuous sweeping.
    pub fn resume(&self, caller: Caller) -> Result<(), Error> {
        let command = Command::Start { once: false };
        if caller == Caller::SweepTask {
            self.apply(command);
        } else {
            self.post(command)?;
        }
        log::info!("sweep resumed");
        Ok(())
    }

    /// Request exactly one more complete pass.
    pub fn single(&self) -> Result<(), Error> {
        self.post(Command::Single)
    }

    /// Whether the measurement task may start a pass.
    pub fn can_start(&self) -> bool {
        let mode = self.mode();
        mode.enable() || mode.once()
    }

    /// Account for a finished pass. A completed pass discharges ONCE.
    pub fn finish(&self, completed: bool) {
        if completed {
            self.update(|m| m.with_once(false));
        }
    }
}
