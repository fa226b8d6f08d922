use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, Weak},
    thread::{self, ThreadId},
};

use lworld_class_file::ClassFile;

use crate::{error::catch_panic, Class, InitializationPolicy, Object, ObjectRef, Result, VmError};

/// Body of a static initializer.
pub type StaticInitializer = Arc<dyn Fn(&Arc<Class>) -> Result<()> + Send + Sync>;

/// Body of a constructor: receives the freshly allocated object and returns the constructed
/// one, which for a value class is the result of its last `withfield`.
pub type Constructor = Arc<dyn Fn(ObjectRef) -> Result<ObjectRef> + Send + Sync>;

/// Executable bodies of a class, supplied by the host alongside its bytes.
#[derive(Clone, Default)]
pub struct ClassCode {
    pub static_initializer: Option<StaticInitializer>,
    pub constructor: Option<Constructor>,
}

impl ClassCode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_static_initializer(
        mut self,
        f: impl Fn(&Arc<Class>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.static_initializer = Some(Arc::new(f));
        self
    }

    pub fn with_constructor(
        mut self,
        f: impl Fn(ObjectRef) -> Result<ObjectRef> + Send + Sync + 'static,
    ) -> Self {
        self.constructor = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for ClassCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassCode")
            .field("static_initializer", &self.static_initializer.is_some())
            .field("constructor", &self.constructor.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ClassDefinition {
    pub bytes: Vec<u8>,
    pub code: ClassCode,
}

/// Where a loader finds the definition of a class it is asked to define.
pub trait ClassSource: Send + Sync {
    fn find_class(&self, name: &str) -> Option<ClassDefinition>;
}

#[derive(Debug, Default)]
pub struct InMemoryClassSource {
    classes: RwLock<HashMap<String, ClassDefinition>>,
}

impl InMemoryClassSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, bytes: Vec<u8>) {
        self.insert_with_code(name, bytes, ClassCode::new())
    }

    pub fn insert_with_code(&self, name: impl Into<String>, bytes: Vec<u8>, code: ClassCode) {
        self.classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), ClassDefinition { bytes, code });
    }
}

impl ClassSource for InMemoryClassSource {
    fn find_class(&self, name: &str) -> Option<ClassDefinition> {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

/// Loading state of one class name in one loader.
#[derive(Default)]
enum LoadState {
    #[default]
    Absent,
    /// Defined; the given thread is loading its `Preload` targets.
    Preloading(Arc<Class>, ThreadId),
    Loaded(Arc<Class>),
    /// Terminal: a `Preload` target failed to load.
    Failed(VmError),
    /// Dropped from the table after a failed definition; look the name up again.
    Removed,
}

// One per class name; holding `state` serializes definition of that name.
#[derive(Default)]
struct Slot {
    state: Mutex<LoadState>,
    done: Condvar,
}

impl Slot {
    fn lock_state(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Which thread each blocked loading thread waits on, and on which slot. Shared by a loader
/// and its ancestors.
#[derive(Default)]
struct WaitGraph(Mutex<HashMap<ThreadId, (ThreadId, usize)>>);

impl WaitGraph {
    /// Records that `waiter` blocks on `slot`, preloaded by `owner`, unless `owner` already
    /// waits on `waiter`.
    fn begin_wait(&self, waiter: ThreadId, owner: ThreadId, slot: &Arc<Slot>) -> bool {
        let mut edges = self.lock_edges();

        let mut next = Some(owner);
        while let Some(thread) = next {
            if thread == waiter {
                return false;
            }
            next = edges.get(&thread).map(|&(blocker, _)| blocker);
        }

        edges.insert(waiter, (owner, slot_id(slot)));
        true
    }

    fn end_wait(&self, waiter: ThreadId) {
        self.lock_edges().remove(&waiter);
    }

    /// Drops every wait on `slot`, which is about to wake its waiters.
    fn release(&self, slot: &Arc<Slot>) {
        let slot = slot_id(slot);
        self.lock_edges().retain(|_, (_, waited)| *waited != slot);
    }

    fn lock_edges(&self) -> MutexGuard<'_, HashMap<ThreadId, (ThreadId, usize)>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn slot_id(slot: &Arc<Slot>) -> usize {
    Arc::as_ptr(slot) as usize
}

/// A defining class loader.
///
/// Requests are delegated to the parent first. Each name this loader defines gets its own lock,
/// so loads of different classes never wait on each other. A class is only handed out once all
/// of its `Preload` targets are loaded, and a failed preload fails every request for the class.
pub struct ClassLoader {
    name: String,
    this: Weak<ClassLoader>,
    parent: Option<Arc<ClassLoader>>,
    source: Arc<dyn ClassSource>,
    policy: Arc<InitializationPolicy>,
    classes: Mutex<HashMap<String, Arc<Slot>>>,
    waits: Arc<WaitGraph>,
}

pub struct ClassLoaderBuilder {
    name: String,
    parent: Option<Arc<ClassLoader>>,
    policy: InitializationPolicy,
}

impl ClassLoaderBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn parent(mut self, parent: Arc<ClassLoader>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn policy(mut self, policy: InitializationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self, source: Arc<dyn ClassSource>) -> Arc<ClassLoader> {
        let waits = self
            .parent
            .as_ref()
            .map(|p| p.waits.clone())
            .unwrap_or_default();

        Arc::new_cyclic(|this| ClassLoader {
            name: self.name,
            this: this.clone(),
            parent: self.parent,
            source,
            policy: Arc::new(self.policy),
            classes: Mutex::new(HashMap::new()),
            waits,
        })
    }
}

impl ClassLoader {
    pub fn builder() -> ClassLoaderBuilder {
        ClassLoaderBuilder {
            name: "app".to_owned(),
            parent: None,
            policy: InitializationPolicy::default(),
        }
    }

    pub fn new(source: Arc<dyn ClassSource>) -> Arc<Self> {
        Self::builder().build(source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<ClassLoader>> {
        self.parent.as_ref()
    }

    /// Loads, validates and defines `name` unless it is already loaded, then loads every class
    /// its `Preload` attribute names.
    pub fn load_class(&self, name: &str) -> Result<Arc<Class>> {
        self.find_or_define(name)?
            .ok_or_else(|| VmError::NoClassDefFound(name.to_owned()))
    }

    /// Looks `name` up without loading it. A class whose preloading is still in progress is not
    /// reported.
    pub fn find_loaded_class(&self, name: &str) -> Option<Arc<Class>> {
        if let Some(class) = self.parent.as_ref().and_then(|p| p.find_loaded_class(name)) {
            return Some(class);
        }

        let slot = self.lock_classes().get(name).cloned()?;
        let state = slot.lock_state();
        match &*state {
            LoadState::Loaded(class) => Some(class.clone()),
            _ => None,
        }
    }

    /// Loads and initializes `name`.
    pub fn initialize_class(&self, name: &str) -> Result<Arc<Class>> {
        let class = self.load_class(name)?;
        class.initialize()?;
        Ok(class)
    }

    /// Allocates an instance of `name` and runs its constructor.
    pub fn new_instance(&self, name: &str) -> Result<ObjectRef> {
        let class = self.load_class(name)?;
        if class.is_abstract() || class.is_interface() {
            return Err(VmError::Instantiation(name.to_owned()));
        }
        class.initialize()?;

        let object = Arc::new(Object::new(class.clone()));
        match &class.code().constructor {
            Some(constructor) => constructor(object),
            None => Ok(object),
        }
    }

    fn find_or_define(&self, name: &str) -> Result<Option<Arc<Class>>> {
        if let Some(parent) = &self.parent {
            if let Some(class) = parent.find_or_define(name)? {
                return Ok(Some(class));
            }
        }

        loop {
            let slot = self
                .lock_classes()
                .entry(name.to_owned())
                .or_default()
                .clone();

            if let Some(outcome) = self.define_in(name, &slot) {
                return outcome;
            }
        }
    }

    // Returns `None` when the slot was dropped while this thread waited on it.
    fn define_in(&self, name: &str, slot: &Arc<Slot>) -> Option<Result<Option<Arc<Class>>>> {
        let current = thread::current().id();
        let mut state = slot.lock_state();

        loop {
            let owner = match &*state {
                LoadState::Absent => break,
                LoadState::Removed => return None,
                LoadState::Loaded(class) => return Some(Ok(Some(class.clone()))),
                LoadState::Failed(err) => return Some(Err(err.clone())),
                LoadState::Preloading(class, owner) => {
                    // A request from inside the preload chain that is loading this class.
                    if *owner == current || !self.waits.begin_wait(current, *owner, slot) {
                        return Some(Ok(Some(class.clone())));
                    }
                    *owner
                }
            };

            log::trace!("Waiting for {:?} to finish preloading {}", owner, name);
            state = slot.done.wait(state).unwrap_or_else(PoisonError::into_inner);
            self.waits.end_wait(current);
        }

        let defined = match self.source.find_class(name) {
            Some(definition) => self.define_class(name, definition).map(Some),
            None => Ok(None),
        };
        let class = match defined {
            Ok(Some(class)) => Arc::new(class),
            missing_or_rejected => {
                *state = LoadState::Removed;
                drop(state);
                self.remove_slot(name, slot);
                slot.done.notify_all();
                return Some(missing_or_rejected.map(|_| None));
            }
        };

        *state = LoadState::Preloading(class.clone(), current);
        drop(state);

        // Outside the slot lock, so classes that preload each other do not deadlock.
        let outcome = catch_panic(|| self.preload(&class));

        let mut state = slot.lock_state();
        let result = match outcome {
            Ok(()) => {
                *state = LoadState::Loaded(class.clone());
                Ok(Some(class))
            }
            Err(err) => {
                *state = LoadState::Failed(err.clone());
                Err(err)
            }
        };
        self.waits.release(slot);
        slot.done.notify_all();

        Some(result)
    }

    fn define_class(&self, name: &str, definition: ClassDefinition) -> Result<Class> {
        let class_file = ClassFile::load(&definition.bytes).map_err(|e| {
            log::debug!("Rejected class {}: {}", name, e);
            e
        })?;

        let actual_name = class_file.class_name()?;
        if actual_name != name {
            return Err(VmError::NoClassDefFound(format!(
                "{} (wrong name: {})",
                name, actual_name
            )));
        }

        let class = Class::define(
            &class_file,
            definition.code,
            self.this.clone(),
            self.policy.clone(),
        )?;
        log::debug!("Defined class {} in loader {}", name, self.name);

        Ok(class)
    }

    fn preload(&self, class: &Class) -> Result<()> {
        for name in class.preload_classes() {
            log::debug!("Preloading {} for {}", name, class.name());
            if let Err(e) = self.load_class(name) {
                log::warn!("Preloading {} for {} failed: {}", name, class.name(), e);
                return Err(e);
            }
        }

        Ok(())
    }

    fn remove_slot(&self, name: &str, slot: &Arc<Slot>) {
        let mut classes = self.lock_classes();
        if classes.get(name).map_or(false, |s| Arc::ptr_eq(s, slot)) {
            classes.remove(name);
        }
    }

    fn lock_classes(&self) -> MutexGuard<'_, HashMap<String, Arc<Slot>>> {
        self.classes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.lock_classes().len()
    }
}

impl fmt::Debug for ClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassLoader")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .finish_non_exhaustive()
    }
}
