use std::{
    fs,
    path::{Path, PathBuf},
};

use rand::{Rng, seq::SliceRandom};

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AudioClip {
    path: PathBuf,
    label: String,
}

impl AudioClip {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Self { path, label }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// File name without its extension.
    pub(crate) fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Debug, Default)]
pub(crate) struct AudioCatalog {
    clips: Vec<AudioClip>,
}

impl AudioCatalog {
    /// Reads `directory` once, keeping regular files whose extension is in `extensions`.
    pub(crate) fn load(directory: impl AsRef<Path>, extensions: &[String]) -> Result<Self, CatalogError> {
        let directory = directory.as_ref();
        let unavailable = |source| CatalogError::CatalogUnavailable {
            path: directory.to_path_buf(),
            source,
        };

        let mut clips = Vec::new();
        for entry in fs::read_dir(directory).map_err(unavailable)? {
            let entry = entry.map_err(unavailable)?;
            let path = entry.path();

            if !entry.file_type().map_err(unavailable)?.is_file() {
                continue;
            }

            let accepted = path
                .extension()
                .map(|extension| extension.to_string_lossy())
                .is_some_and(|extension| extensions.iter().any(|accepted| accepted.eq_ignore_ascii_case(&extension)));
            if !accepted {
                tracing::debug!("skipping {} because of its extension", path.display());
                continue;
            }

            clips.push(AudioClip::new(path));
        }
        clips.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));

        tracing::info!("loaded {} audio clips from {}", clips.len(), directory.display());

        Ok(Self { clips })
    }

    #[cfg(test)]
    pub(crate) fn from_clips(clips: impl IntoIterator<Item = AudioClip>) -> Self {
        Self {
            clips: clips.into_iter().collect(),
        }
    }

    pub(crate) fn list(&self) -> &[AudioClip] {
        &self.clips
    }

    pub(crate) fn pick_random(&self) -> Result<&AudioClip, CatalogError> {
        self.pick_random_with(&mut rand::thread_rng())
    }

    pub(crate) fn pick_random_with(&self, rng: &mut impl Rng) -> Result<&AudioClip, CatalogError> {
        self.clips.choose(rng).ok_or(CatalogError::EmptyCatalog)
    }
}
