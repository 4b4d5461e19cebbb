use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use tracing::{debug, warn};

use crate::config::NotifyRcSettings;
use crate::types::Context;

use super::{ConfigResolver, EventConfig, NotifyRc};

const FILE_SUFFIX: &str = "notifyrc";

/// Resolver reading `<app>.notifyrc` from a user directory and a bundled
/// defaults directory, with parsed files kept in a bounded LRU cache.
pub struct FileResolver {
    user_dir: PathBuf,
    defaults_dir: PathBuf,
    cache: LruCache<PathBuf, Arc<NotifyRc>>,
}

impl FileResolver {
    pub fn new(
        user_dir: impl Into<PathBuf>,
        defaults_dir: impl Into<PathBuf>,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            user_dir: user_dir.into(),
            defaults_dir: defaults_dir.into(),
            cache: LruCache::new(capacity),
        }
    }

    pub fn from_settings(settings: &NotifyRcSettings) -> Self {
        Self::new(
            settings.config_dir.clone(),
            settings.data_dir.clone(),
            settings.cache_size,
        )
    }

    fn paths(&self, app_name: &str) -> [PathBuf; 2] {
        let file_name = format!("{app_name}.{FILE_SUFFIX}");
        [self.user_dir.join(&file_name), self.defaults_dir.join(file_name)]
    }

    fn layer(&mut self, path: &Path) -> Arc<NotifyRc> {
        if let Some(rc) = self.cache.get(path) {
            return Arc::clone(rc);
        }
        let rc = match NotifyRc::load(path) {
            Ok(Some(rc)) => {
                debug!(path = %path.display(), "loaded event file");
                rc
            }
            Ok(None) => NotifyRc::default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable event file");
                NotifyRc::default()
            }
        };
        let rc = Arc::new(rc);
        self.cache.put(path.to_path_buf(), Arc::clone(&rc));
        rc
    }

    pub fn cached_files(&self) -> usize {
        self.cache.len()
    }
}

impl ConfigResolver for FileResolver {
    fn resolve(&mut self, app_name: &str, contexts: &[Context], event_id: &str) -> EventConfig {
        let layers = self
            .paths(app_name)
            .iter()
            .map(|path| self.layer(path))
            .filter(|rc| !rc.is_empty())
            .collect();
        EventConfig::new(app_name, event_id, contexts.to_vec(), layers)
    }

    fn invalidate(&mut self, app_name: &str) {
        for path in self.paths(app_name) {
            if self.cache.pop(&path).is_some() {
                debug!(app = app_name, path = %path.display(), "evicted cached event file");
            }
        }
    }
}
