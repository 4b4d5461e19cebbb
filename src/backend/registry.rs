use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::Settings;

use super::{Backend, ExecuteBackend, LogfileBackend, SoundBackend};

type Factory = Box<dyn Fn() -> Box<dyn Backend> + Send>;

/// Fallback source of backends for names without a registered factory.
pub trait BackendProvider: Send {
    fn create(&mut self, name: &str) -> Option<Box<dyn Backend>>;
}

/// Name → backend mapping with lazily created, never evicted instances.
#[derive(Default)]
pub struct BackendRegistry {
    factories: HashMap<String, Factory>,
    providers: Vec<Box<dyn BackendProvider>>,
    instances: HashMap<String, Box<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in backend available on this platform.
    pub fn with_builtins(settings: &Settings) -> Self {
        let mut registry = Self::new();
        registry.register("Logfile", || Box::new(LogfileBackend::new()));
        let display_name = settings.manager.app_name.clone();
        registry.register("Execute", move || {
            Box::new(ExecuteBackend::new(display_name.clone()))
        });

        let sound = settings.backends.clone();
        registry.register("Sound", move || {
            Box::new(SoundBackend::new(&sound.sound_player, &sound.sound_dir))
        });

        #[cfg(target_os = "linux")]
        {
            let timeout = settings.backends.popup_timeout;
            registry.register("Popup", move || Box::new(super::PopupBackend::new(timeout)));
        }

        registry
    }

    /// Register (or replace) the factory for `name`. An instance already
    /// created under that name is kept.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Backend> + Send + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn add_provider(&mut self, provider: impl BackendProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    /// Make sure an instance for `name` exists, creating it on first use.
    pub(crate) fn ensure(&mut self, name: &str) -> bool {
        if self.instances.contains_key(name) {
            return true;
        }

        let created = match self.factories.get(name) {
            Some(factory) => Some(factory()),
            None => self
                .providers
                .iter_mut()
                .find_map(|provider| provider.create(name)),
        };

        match created {
            Some(backend) => {
                if backend.option_name() != name {
                    warn!(
                        requested = name,
                        reported = backend.option_name(),
                        "backend reports a different name than it was registered under"
                    );
                }
                debug!(backend = name, "instantiated backend");
                self.instances.insert(name.to_string(), backend);
                true
            }
            None => false,
        }
    }

    /// Instance for `name` if one was already created.
    pub(crate) fn loaded(&mut self, name: &str) -> Option<&mut (dyn Backend + 'static)> {
        self.instances.get_mut(name).map(|backend| &mut **backend)
    }

    pub(crate) fn loaded_mut(&mut self) -> impl Iterator<Item = &mut (dyn Backend + 'static)> {
        self.instances.values_mut().map(|backend| &mut **backend)
    }

    /// Names of instantiated backends, sorted.
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.instances.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}
