//! Local draft cache: one JSON file per event inside the data directory.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use shared::{DraftBundle, DraftPatch};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

const DRAFT_PREFIX: &str = "drafts_";
const DRAFT_SUFFIX: &str = ".json";

#[derive(Debug, Clone)]
pub struct DraftStore {
    base_path: PathBuf,
}

impl DraftStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// File backing the cache entry of an event
    pub fn path_for(&self, event_id: &str) -> PathBuf {
        self.base_path
            .join(format!("{}{}{}", DRAFT_PREFIX, encode_key(event_id), DRAFT_SUFFIX))
    }

    /// Read the cached bundle. Unreadable or corrupt entries count as absent.
    pub fn get(&self, event_id: &str) -> Option<DraftBundle> {
        let path = self.path_for(event_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable draft cache {:?}: {}", path, e);
                return None;
            }
        };

        match serde_json::from_str::<DraftBundle>(&content) {
            Ok(bundle) => Some(bundle),
            Err(e) => {
                tracing::warn!("Ignoring corrupt draft cache {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.get(event_id).is_some()
    }

    /// Overwrite the cache entry with `bundle`
    pub fn put(&self, event_id: &str, bundle: &DraftBundle) -> Result<()> {
        fs::create_dir_all(&self.base_path)?;

        let path = self.path_for(event_id);
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(bundle)?;
        fs::write(&tmp_path, content)?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        tracing::debug!("Saved drafts for {} to {:?}", event_id, path);
        Ok(())
    }

    /// Merge a partial bundle into the cached one (or an empty skeleton).
    ///
    /// Top-level fields in the patch replace the cached ones, except
    /// `uploaded_images`, which is appended to.
    pub fn merge(&self, event_id: &str, patch: DraftPatch) -> Result<DraftBundle> {
        let mut bundle = self
            .get(event_id)
            .unwrap_or_else(|| DraftBundle::skeleton(event_id));
        bundle.apply(patch);
        bundle.event_id = event_id.to_string();

        self.put(event_id, &bundle)?;
        Ok(bundle)
    }

    pub fn clear(&self, event_id: &str) -> Result<()> {
        match fs::remove_file(self.path_for(event_id)) {
            Ok(()) => {
                tracing::debug!("Cleared cached drafts for {}", event_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Event ids with a cache entry, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(key) = name
                .strip_prefix(DRAFT_PREFIX)
                .and_then(|rest| rest.strip_suffix(DRAFT_SUFFIX))
            {
                if let Some(id) = decode_key(key) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Everything outside `[A-Za-z0-9_-]` is escaped so ids stay inside the directory
const KEY_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'-');

fn encode_key(event_id: &str) -> String {
    utf8_percent_encode(event_id, KEY_ESCAPES).to_string()
}

fn decode_key(key: &str) -> Option<String> {
    percent_decode_str(key).decode_utf8().ok().map(|id| id.into_owned())
}
