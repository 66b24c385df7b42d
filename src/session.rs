//! Scoped session acquisition.
//!
//! A [`SessionGuard`] starts a client when it is created and closes it when
//! dropped, whether the scope ends normally, through `?`, or by unwinding.

use crate::error::Error;
use std::ops::{Deref, DerefMut};

/// A client whose transport resource can be started and released.
pub trait Lifecycle {
    /// Acquires the session resource.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyStarted`] if a session is already active.
    fn start(&mut self) -> Result<(), Error>;

    /// Releases the session resource. Calling it on a closed client is a no-op.
    fn close(&mut self);

    /// Returns true while a session is active.
    fn is_started(&self) -> bool;
}

/// RAII handle over a started client.
///
/// Dereferences to the client, so requests are issued through the guard.
#[must_use = "the session is closed as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SessionGuard<'a, T: Lifecycle> {
    client: &'a mut T,
}

impl<'a, T: Lifecycle> SessionGuard<'a, T> {
    /// Starts `client` and returns a guard that closes it on drop.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyStarted`] if the client already has a session.
    pub fn open(client: &'a mut T) -> Result<Self, Error> {
        client.start()?;
        Ok(Self { client })
    }
}

impl<T: Lifecycle> Deref for SessionGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.client
    }
}

impl<T: Lifecycle> DerefMut for SessionGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.client
    }
}

impl<T: Lifecycle> Drop for SessionGuard<'_, T> {
    fn drop(&mut self) {
        self.client.close();
    }
}
