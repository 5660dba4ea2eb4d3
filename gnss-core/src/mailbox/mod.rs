//! Single-slot handoff between the fix provider and the acquisition controller.
//!
//! The provider completes fixes on its own execution context (a modem task, an
//! interrupt, or a host thread) and writes the record through a
//! [`FixNotifier`]. The controller drains it through its [`FixInbox`]. The
//! ready flag and the slot only change together inside one critical section,
//! so a raised flag always has a record behind it.

use core::cell::RefCell;

use critical_section::Mutex;
use portable_atomic::{AtomicBool, Ordering};

use crate::fix::FixRecord;

/// Storage for at most one undelivered [`FixRecord`].
pub struct FixMailbox {
    ready: AtomicBool,
    slot: Mutex<RefCell<Option<FixRecord>>>,
}

impl FixMailbox {
    /// Creates an empty mailbox. Usable in a `static`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            slot: Mutex::new(RefCell::new(None)),
        }
    }

    /// Returns the producer capability handed to the fix provider.
    #[must_use]
    pub const fn notifier(&self) -> FixNotifier<'_> {
        FixNotifier { mailbox: self }
    }

    /// Returns the consuming side owned by the acquisition controller.
    #[must_use]
    pub const fn inbox(&self) -> FixInbox<'_> {
        FixInbox { mailbox: self }
    }

    fn store(&self, fix: FixRecord) -> bool {
        critical_section::with(|cs| {
            let replaced = self.slot.borrow_ref_mut(cs).replace(fix).is_some();
            self.ready.store(true, Ordering::SeqCst);
            replaced
        })
    }

    fn take(&self) -> Option<FixRecord> {
        if !self.ready.load(Ordering::SeqCst) {
            return None;
        }

        critical_section::with(|cs| {
            self.ready.store(false, Ordering::SeqCst);
            self.slot.borrow_ref_mut(cs).take()
        })
    }

    fn clear(&self) {
        critical_section::with(|cs| {
            self.ready.store(false, Ordering::SeqCst);
            self.slot.borrow_ref_mut(cs).take();
        });
    }
}

impl Default for FixMailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Narrow capability allowing the provider to publish a completed fix.
#[derive(Copy, Clone)]
pub struct FixNotifier<'a> {
    mailbox: &'a FixMailbox,
}

impl FixNotifier<'_> {
    /// Publishes `fix` and raises the ready flag.
    ///
    /// Returns `true` when an unconsumed record was overwritten.
    pub fn deliver(&self, fix: FixRecord) -> bool {
        self.mailbox.store(fix)
    }
}

/// Consuming side of the mailbox.
pub struct FixInbox<'a> {
    mailbox: &'a FixMailbox,
}

impl FixInbox<'_> {
    /// Returns `true` when a delivered record is waiting.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.mailbox.ready.load(Ordering::SeqCst)
    }

    /// Takes the delivered record, if the ready flag is set.
    pub fn try_take(&mut self) -> Option<FixRecord> {
        self.mailbox.take()
    }

    /// Lowers the ready flag and drops any stale record.
    pub fn clear(&mut self) {
        self.mailbox.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_is_empty_until_delivery() {
        let mailbox = FixMailbox::new();
        let mut inbox = mailbox.inbox();

        assert!(!inbox.is_pending());
        assert!(inbox.try_take().is_none());

        let replaced = mailbox.notifier().deliver(FixRecord::new(1, 20.0, 1.0, 2.0));
        assert!(!replaced);
        assert!(inbox.is_pending());

        let fix = inbox.try_take().expect("delivered fix missing");
        assert_eq!(fix.fix_id, 1);
        assert!(!inbox.is_pending());
        assert!(inbox.try_take().is_none());
    }

    #[test]
    fn clear_discards_stale_record() {
        let mailbox = FixMailbox::new();
        let mut inbox = mailbox.inbox();
        let notifier = mailbox.notifier();

        notifier.deliver(FixRecord::new(1, 20.0, 1.0, 2.0));
        inbox.clear();

        assert!(!inbox.is_pending());
        assert!(inbox.try_take().is_none());
    }

    #[test]
    fn second_delivery_overwrites_unconsumed_record() {
        let mailbox = FixMailbox::new();
        let mut inbox = mailbox.inbox();
        let notifier = mailbox.notifier();

        assert!(!notifier.deliver(FixRecord::new(1, 20.0, 1.0, 2.0)));
        assert!(notifier.deliver(FixRecord::new(2, 10.0, 1.0, 2.0)));

        assert_eq!(inbox.try_take().map(|fix| fix.fix_id), Some(2));
    }

    #[test]
    fn notifier_delivers_across_threads() {
        static MAILBOX: FixMailbox = FixMailbox::new();
        let notifier = MAILBOX.notifier();

        std::thread::spawn(move || {
            notifier.deliver(FixRecord::new(9, 5.0, 48.1, 11.5));
        })
        .join()
        .expect("delivery thread panicked");

        let fix = MAILBOX.inbox().try_take().expect("fix from thread missing");
        assert_eq!(fix.fix_id, 9);
        assert_eq!(fix.latitude, 48.1);
    }

    #[test]
    fn pending_flag_always_has_a_record_under_contention() {
        static MAILBOX: FixMailbox = FixMailbox::new();
        const DELIVERIES: u16 = 20_000;
        let notifier = MAILBOX.notifier();
        let mut inbox = MAILBOX.inbox();

        let producer = std::thread::spawn(move || {
            for id in 0..DELIVERIES {
                let fix_id = u8::try_from(id % 256).expect("bounded id");
                notifier.deliver(FixRecord::new(fix_id, 5.0, 48.1, 11.5));
            }
        });

        let mut empty_takes = 0u32;
        while !producer.is_finished() {
            if inbox.is_pending() && inbox.try_take().is_none() {
                empty_takes += 1;
            }
        }
        producer.join().expect("delivery thread panicked");

        assert_eq!(empty_takes, 0, "ready flag was raised over an empty slot");
        inbox.try_take();
        assert!(!inbox.is_pending());
    }
}
