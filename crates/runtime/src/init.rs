use std::{
    collections::HashSet,
    sync::{Arc, PoisonError},
    thread::{self, ThreadId},
};

use crate::{error::catch_panic, Class, ErrorKind, Result, VmError};

/// Initialization state of a class.
///
/// `Failed` is terminal: later requests get the recorded failure without running the static
/// initializer again.
#[derive(Debug, Clone)]
pub enum InitState {
    NotInitialized,
    Initializing(ThreadId),
    Initialized,
    Failed(VmError),
}

/// Decides which static initializer failures are wrapped in an `ExceptionInInitializerError`.
#[derive(Debug, Clone)]
pub struct InitializationPolicy {
    unwrapped: HashSet<ErrorKind>,
}

impl Default for InitializationPolicy {
    /// Every `Error`-category failure propagates as is; exceptions are wrapped.
    fn default() -> Self {
        Self {
            unwrapped: [
                ErrorKind::ClassFormatError,
                ErrorKind::NoClassDefFoundError,
                ErrorKind::NoSuchFieldError,
                ErrorKind::IncompatibleClassChangeError,
                ErrorKind::InstantiationError,
                ErrorKind::InternalError,
                ErrorKind::ExceptionInInitializerError,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl InitializationPolicy {
    /// A policy that wraps every failure.
    pub fn wrap_all() -> Self {
        Self {
            unwrapped: HashSet::new(),
        }
    }

    pub fn propagate_unwrapped(mut self, kind: ErrorKind) -> Self {
        self.unwrapped.insert(kind);
        self
    }

    pub fn wrap(&self, class_name: &str, err: VmError) -> VmError {
        if self.unwrapped.contains(&err.kind()) {
            return err;
        }

        VmError::ExceptionInInitializer {
            class: class_name.to_owned(),
            cause: Arc::new(err),
        }
    }
}

impl Class {
    pub fn init_state(&self) -> InitState {
        self.init_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs the static initializer once.
    ///
    /// Concurrent callers wait for the initializing thread and then see its outcome. A request
    /// from the initializing thread itself returns immediately. A panicking initializer fails
    /// the class with an `InternalError`.
    pub fn initialize(self: &Arc<Self>) -> Result<()> {
        let current = thread::current().id();
        let mut state = self
            .init_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        loop {
            let owned_elsewhere = match &*state {
                InitState::Initialized => return Ok(()),
                InitState::Failed(err) => return Err(err.clone()),
                InitState::Initializing(owner) => *owner != current,
                InitState::NotInitialized => break,
            };
            if !owned_elsewhere {
                return Ok(());
            }

            state = self
                .init_done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        *state = InitState::Initializing(current);
        drop(state);
        log::debug!("Initializing class {}", self.name());

        let outcome = catch_panic(|| match &self.code().static_initializer {
            Some(static_initializer) => static_initializer(self),
            None => Ok(()),
        });

        let mut state = self
            .init_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let result = match outcome {
            Ok(()) => {
                log::debug!("Initialized class {}", self.name());
                *state = InitState::Initialized;
                Ok(())
            }
            Err(err) => {
                let err = self.policy.wrap(self.name(), err);
                log::debug!("Initialization of class {} failed: {}", self.name(), err);
                *state = InitState::Failed(err.clone());
                Err(err)
            }
        };
        self.init_done.notify_all();

        result
    }
}
