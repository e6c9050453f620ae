//! Checkpoint writing and retention

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::{Model, ModelCheckpoint};

/// Writes model checkpoints under a directory and enforces the retention
/// cap on periodic saves.
///
/// `checkpoint_step_N.json` files count toward `max_checkpoints` and the
/// oldest is pruned first; `checkpoint_best.json` and
/// `checkpoint_final.json` are exempt. The directory is created lazily on
/// the first write, so a run that fails before training leaves nothing
/// behind.
#[derive(Debug)]
pub struct CheckpointWriter {
    dir: PathBuf,
    max_checkpoints: Option<usize>,
    periodic: Vec<PathBuf>,
}

impl CheckpointWriter {
    /// Create a writer rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>, max_checkpoints: Option<usize>) -> Self {
        Self {
            dir: dir.into(),
            max_checkpoints,
            periodic: Vec::new(),
        }
    }

    /// Checkpoint directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of periodic checkpoints currently retained
    #[must_use]
    pub fn retained(&self) -> usize {
        self.periodic.len()
    }

    /// Write a periodic checkpoint, pruning the oldest beyond the cap
    pub fn save_step(&mut self, model: &Model, step: u64) -> Result<PathBuf> {
        let path = self.dir.join(format!("checkpoint_step_{step}.json"));
        self.write(model, step, &path)?;
        self.periodic.push(path.clone());

        if let Some(cap) = self.max_checkpoints {
            while self.periodic.len() > cap.max(1) {
                let oldest = self.periodic.remove(0);
                std::fs::remove_file(&oldest)
                    .map_err(|e| Error::Io(format!("cannot prune {}: {e}", oldest.display())))?;
            }
        }
        Ok(path)
    }

    /// Write/overwrite the best-so-far checkpoint
    pub fn save_best(&self, model: &Model, step: u64) -> Result<PathBuf> {
        let path = self.dir.join("checkpoint_best.json");
        self.write(model, step, &path)?;
        Ok(path)
    }

    /// Write the end-of-run checkpoint
    pub fn save_final(&self, model: &Model, step: u64) -> Result<PathBuf> {
        let path = self.dir.join("checkpoint_final.json");
        self.write(model, step, &path)?;
        Ok(path)
    }

    fn write(&self, model: &Model, step: u64, path: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Io(format!("cannot create {}: {e}", self.dir.display())))?;
        let ckpt = ModelCheckpoint {
            model_str: model.model_str().to_string(),
            step,
            params: model.params_snapshot(),
        };
        let body = serde_json::to_string(&ckpt)
            .map_err(|e| Error::Io(format!("cannot serialize checkpoint: {e}")))?;
        std::fs::write(path, body)
            .map_err(|e| Error::Io(format!("cannot write {}: {e}", path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        Model::new("ckpt-test", None, false, false, 32).expect("model")
    }

    #[test]
    fn test_directory_created_lazily() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("checkpoints");
        let writer = CheckpointWriter::new(&dir, None);
        assert!(!dir.exists());
        writer.save_best(&model(), 1).expect("save");
        assert!(dir.join("checkpoint_best.json").exists());
    }

    #[test]
    fn test_retention_prunes_oldest() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut writer = CheckpointWriter::new(tmp.path().join("ck"), Some(2));
        let m = model();
        for step in [10, 20, 30] {
            writer.save_step(&m, step).expect("save");
        }
        assert_eq!(writer.retained(), 2);
        let dir = writer.dir().to_path_buf();
        assert!(!dir.join("checkpoint_step_10.json").exists());
        assert!(dir.join("checkpoint_step_20.json").exists());
        assert!(dir.join("checkpoint_step_30.json").exists());
    }

    #[test]
    fn test_no_cap_keeps_everything() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut writer = CheckpointWriter::new(tmp.path().join("ck"), None);
        let m = model();
        for step in 1..=5 {
            writer.save_step(&m, step).expect("save");
        }
        assert_eq!(writer.retained(), 5);
    }

    #[test]
    fn test_best_and_final_not_counted() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut writer = CheckpointWriter::new(tmp.path().join("ck"), Some(1));
        let m = model();
        writer.save_best(&m, 1).expect("best");
        writer.save_final(&m, 2).expect("final");
        writer.save_step(&m, 3).expect("step");
        assert_eq!(writer.retained(), 1);
        assert!(writer.dir().join("checkpoint_best.json").exists());
        assert!(writer.dir().join("checkpoint_final.json").exists());
    }

    #[test]
    fn test_checkpoint_is_loadable() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let writer = CheckpointWriter::new(tmp.path().join("ck"), None);
        let m = model();
        let path = writer.save_final(&m, 7).expect("save");
        let restored = Model::new("ckpt-test", Some(path.as_path()), false, false, 32).expect("load");
        assert_eq!(restored.params_snapshot(), m.params_snapshot());
    }
}
