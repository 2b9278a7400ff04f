//! Current identity, observable through a watch channel.

use medi_core::conversation::Identity;
use tokio::sync::watch;

/// Shared handle over the session identity.
///
/// Cloned handles observe the same value. Whoever owns sign-in state calls
/// [`IdentityHandle::set`]; the controller picks the change up before its
/// next cycle.
#[derive(Clone, Debug)]
pub struct IdentityHandle {
    tx: watch::Sender<Identity>,
}

impl IdentityHandle {
    /// Handle starting at `identity`.
    pub fn new(identity: Identity) -> Self {
        let (tx, _) = watch::channel(identity);
        Self { tx }
    }

    /// Handle starting anonymous.
    pub fn anonymous() -> Self {
        Self::new(Identity::Anonymous)
    }

    /// Current value.
    pub fn current(&self) -> Identity {
        self.tx.borrow().clone()
    }

    /// Replace the identity. Receivers are notified only if it differs.
    pub fn set(&self, identity: Identity) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == identity {
                false
            } else {
                *current = identity;
                true
            }
        })
    }

    /// Receiver that sees every later change.
    pub fn subscribe(&self) -> watch::Receiver<Identity> {
        self.tx.subscribe()
    }
}

impl Default for IdentityHandle {
    fn default() -> Self {
        Self::anonymous()
    }
}
