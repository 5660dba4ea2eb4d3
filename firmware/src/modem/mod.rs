//! GNSS provider backed by the cellular modem's AT interface.
//!
//! Commands are written as CR/LF terminated lines and each one waits for its
//! final result code. Completed fixes arrive as unsolicited lines on the
//! receive half and are forwarded by the modem task through the notifier
//! registered here.

use core::fmt;

#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::once_lock::OnceLock;
#[cfg(target_os = "none")]
use embassy_sync::signal::Signal;
use embedded_io_async::{Error as _, ErrorKind, Write};
use gnss_core::acquisition::FixProvider;
use gnss_core::mailbox::FixNotifier;

use notification::FinalResult;

pub mod notification;

/// Slot through which the acquisition side hands its notifier to the modem task.
pub type NotifierSlot = OnceLock<FixNotifier<'static>>;

/// Final result codes raised by the modem task for the command in flight.
#[cfg(target_os = "none")]
pub type ReplySignal = Signal<CriticalSectionRawMutex, FinalResult>;

/// AT commands issued by [`ModemGnss`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ModemCommand {
    ConfigureGnss,
    SetClock,
    GnssOnlyMode,
    ApproximatePosition,
    SingleFix,
}

impl ModemCommand {
    /// Setup sequence issued once by `configure`, in order.
    pub const SETUP: [ModemCommand; 4] = [
        ModemCommand::ConfigureGnss,
        ModemCommand::SetClock,
        ModemCommand::GnssOnlyMode,
        ModemCommand::ApproximatePosition,
    ];

    #[must_use]
    pub const fn line(self) -> &'static str {
        match self {
            ModemCommand::ConfigureGnss => "AT+LPGNSSCFG=0,1,2,,1,0",
            ModemCommand::SetClock => "AT+CCLK=\"24/02/21,12:26:00+04\"",
            // Receiver only, radio off.
            ModemCommand::GnssOnlyMode => "AT+CFUN=4",
            ModemCommand::ApproximatePosition => "AT+LPGNSSUSEAPPROXPOS=1",
            ModemCommand::SingleFix => "AT+LPGNSSFIXPROG=\"single\"",
        }
    }
}

/// Why a command did not complete.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ModemFailure {
    /// The UART refused the write.
    Io(ErrorKind),
    /// The modem answered with an error result.
    Rejected(FinalResult),
    /// No final result within the reply timeout.
    NoReply,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ModemError {
    pub command: ModemCommand,
    pub failure: ModemFailure,
}

impl ModemError {
    const fn new(command: ModemCommand, failure: ModemFailure) -> Self {
        Self { command, failure }
    }
}

impl fmt::Display for ModemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failure {
            ModemFailure::Io(kind) => write!(f, "{:?}: write failed: {kind:?}", self.command),
            ModemFailure::Rejected(result) => write!(f, "{:?}: modem replied {result}", self.command),
            ModemFailure::NoReply => write!(f, "{:?}: no reply from modem", self.command),
        }
    }
}

/// Where [`ModemGnss`] waits for the final result of the command it just wrote.
pub trait ModemReplies {
    /// Drops a result left over from an earlier command.
    fn reset(&mut self);

    /// Next final result, or `None` once the reply timeout has passed.
    async fn final_result(&mut self) -> Option<FinalResult>;
}

/// Replies raised on a [`ReplySignal`] by the modem task, bounded by a timeout.
#[cfg(target_os = "none")]
pub struct SignalledReplies {
    signal: &'static ReplySignal,
    timeout: embassy_time::Duration,
}

#[cfg(target_os = "none")]
impl SignalledReplies {
    #[must_use]
    pub const fn new(signal: &'static ReplySignal, timeout: embassy_time::Duration) -> Self {
        Self { signal, timeout }
    }
}

#[cfg(target_os = "none")]
impl ModemReplies for SignalledReplies {
    fn reset(&mut self) {
        self.signal.reset();
    }

    async fn final_result(&mut self) -> Option<FinalResult> {
        embassy_time::with_timeout(self.timeout, self.signal.wait())
            .await
            .ok()
    }
}

/// [`FixProvider`] driving the modem over its command UART.
pub struct ModemGnss<W, R> {
    tx: W,
    replies: R,
    notifier_slot: &'static NotifierSlot,
}

impl<W: Write, R: ModemReplies> ModemGnss<W, R> {
    pub fn new(tx: W, replies: R, notifier_slot: &'static NotifierSlot) -> Self {
        Self {
            tx,
            replies,
            notifier_slot,
        }
    }

    async fn send(&mut self, command: ModemCommand) -> Result<(), ModemError> {
        let io = |err: W::Error| ModemError::new(command, ModemFailure::Io(err.kind()));

        self.replies.reset();
        self.tx.write_all(command.line().as_bytes()).await.map_err(io)?;
        self.tx.write_all(b"\r\n").await.map_err(io)?;
        self.tx.flush().await.map_err(io)?;

        match self.replies.final_result().await {
            Some(FinalResult::Ok) => Ok(()),
            Some(result) => Err(ModemError::new(command, ModemFailure::Rejected(result))),
            None => Err(ModemError::new(command, ModemFailure::NoReply)),
        }
    }
}

impl<W: Write, R: ModemReplies> FixProvider<'static> for ModemGnss<W, R> {
    type Error = ModemError;

    async fn configure(&mut self) -> Result<(), ModemError> {
        for command in ModemCommand::SETUP {
            self.send(command).await?;
        }
        Ok(())
    }

    fn register_fix_notifier(&mut self, notifier: FixNotifier<'static>) {
        // Only the first registration is kept.
        let _ = self.notifier_slot.init(notifier);
    }

    async fn start_fix_attempt(&mut self) -> Result<(), ModemError> {
        self.send(ModemCommand::SingleFix).await
    }
}
