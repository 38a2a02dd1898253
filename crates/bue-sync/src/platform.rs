//! Host-driven implementations of the device seams. The embedding app
//! flips these as the OS reports network and sign-in changes.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::backend::{AuthSession, Connectivity};

pub struct NetworkStatus {
    online: AtomicBool,
}

impl NetworkStatus {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        if self.online.swap(online, Ordering::SeqCst) != online {
            info!("Network is now {}", if online { "reachable" } else { "unreachable" });
        }
    }
}

impl Connectivity for NetworkStatus {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct Session {
    uid: RwLock<Option<String>>,
}

impl Session {
    pub fn signed_in(uid: impl Into<String>) -> Self {
        Self {
            uid: RwLock::new(Some(uid.into())),
        }
    }

    pub fn sign_in(&self, uid: impl Into<String>) {
        let uid = uid.into();
        info!("Signed in as {}", uid);
        *self.uid.write().unwrap_or_else(|p| p.into_inner()) = Some(uid);
    }

    pub fn sign_out(&self) {
        *self.uid.write().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

impl AuthSession for Session {
    fn current_uid(&self) -> Option<String> {
        self.uid
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .filter(|uid| !uid.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_transitions() {
        let session = Session::default();
        assert_eq!(session.current_uid(), None);

        session.sign_in("u1");
        assert_eq!(session.current_uid().as_deref(), Some("u1"));

        session.sign_out();
        assert_eq!(session.current_uid(), None);

        assert_eq!(Session::signed_in("").current_uid(), None);
    }

    #[test]
    fn network_toggle() {
        let net = NetworkStatus::new(false);
        assert!(!net.is_online());
        net.set_online(true);
        assert!(net.is_online());
    }
}
