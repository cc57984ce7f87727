use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::TracksideError;

/// The pool of previous reports available for one-shot and few-shot
/// prompts. Enumerated fresh per prompt build; the directory is the
/// source of truth and nothing is cached across calls.
pub struct ExampleSet {
    files: Vec<PathBuf>,
}

impl ExampleSet {
    /// Enumerate plain files in `dir`. Subdirectories are skipped.
    pub fn load(dir: &Path) -> Result<Self, TracksideError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        // Stable order so seeded sampling is deterministic regardless of
        // directory iteration order.
        files.sort();
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sample `count` distinct examples without replacement and read their
    /// contents. A pool smaller than `count` fails explicitly instead of
    /// silently under-sampling.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<String>, TracksideError> {
        if self.files.len() < count {
            return Err(TracksideError::MissingExamples {
                needed: count,
                available: self.files.len(),
            });
        }

        let mut examples = Vec::with_capacity(count);
        for path in self.files.choose_multiple(rng, count) {
            tracing::info!(path = %path.display(), "using example report");
            examples.push(fs::read_to_string(path)?);
        }
        Ok(examples)
    }
}
