//! Where stage outputs live and what they are called.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::stage::StageName;
use crate::codec::ImageRef;
use crate::errors::Result;

/// Naming scheme for stage outputs in result maps and on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputNaming {
    /// `person_added`, `composite`, `final_swap`.
    #[default]
    Session,
    /// `edited_a`, `composite_b`, `final_blend`.
    Legacy,
}

impl OutputNaming {
    /// Key under which `stage`'s output is reported.
    #[must_use]
    pub fn key(self, stage: StageName) -> &'static str {
        match (self, stage) {
            (Self::Session, StageName::AddContent) => "person_added",
            (Self::Session, StageName::Composite) => "composite",
            (Self::Session, StageName::Swap) => "final_swap",
            (Self::Legacy, StageName::AddContent) => "edited_a",
            (Self::Legacy, StageName::Composite) => "composite_b",
            (Self::Legacy, StageName::Swap) => "final_blend",
        }
    }

    /// File name of `stage`'s output inside a run directory.
    #[must_use]
    pub fn file_name(self, stage: StageName) -> String {
        format!("{}.jpg", self.key(stage))
    }
}

/// Images produced so far by one run.
///
/// A slot is filled only once its stage has fully succeeded and the file
/// exists, so a failed run keeps exactly its completed prefix.
///
/// The record is keyed by [`StageName`] when serialized, whatever naming the
/// run uses. [`to_map`](Self::to_map) applies an [`OutputNaming`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutputs {
    /// Stage 1 output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_content: Option<ImageRef>,
    /// Stage 2 output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<ImageRef>,
    /// Stage 3 output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap: Option<ImageRef>,
}

impl StageOutputs {
    /// The output of `stage`, if it completed.
    #[must_use]
    pub fn get(&self, stage: StageName) -> Option<&ImageRef> {
        match stage {
            StageName::AddContent => self.add_content.as_ref(),
            StageName::Composite => self.composite.as_ref(),
            StageName::Swap => self.swap.as_ref(),
        }
    }

    pub(crate) fn set(&mut self, stage: StageName, image: ImageRef) {
        let slot = match stage {
            StageName::AddContent => &mut self.add_content,
            StageName::Composite => &mut self.composite,
            StageName::Swap => &mut self.swap,
        };
        *slot = Some(image);
    }

    /// Number of completed stages.
    #[must_use]
    pub fn len(&self) -> usize {
        StageName::ALL.iter().filter(|s| self.get(**s).is_some()).count()
    }

    /// Returns true if no stage has completed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if all three stages completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.len() == StageName::ALL.len()
    }

    /// Completed outputs keyed by `naming`.
    #[must_use]
    pub fn to_map(&self, naming: OutputNaming) -> BTreeMap<String, ImageRef> {
        StageName::ALL
            .iter()
            .filter_map(|stage| {
                self.get(*stage)
                    .map(|image| (naming.key(*stage).to_string(), image.clone()))
            })
            .collect()
    }
}

/// The directory a run writes its stage outputs into.
///
/// Each stage has one fixed file name, so a run directory holds at most
/// three outputs. [`prepare`](Self::prepare) clears them, so a rerun never
/// reports a previous run's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    dir: PathBuf,
    naming: OutputNaming,
}

impl RunLayout {
    /// Creates a layout rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>, naming: OutputNaming) -> Self {
        Self {
            dir: dir.into(),
            naming,
        }
    }

    /// The run directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The naming scheme.
    #[must_use]
    pub fn naming(&self) -> OutputNaming {
        self.naming
    }

    /// Destination of `stage`'s output.
    #[must_use]
    pub fn path_for(&self, stage: StageName) -> PathBuf {
        self.dir.join(self.naming.file_name(stage))
    }

    /// Creates the run directory if needed and removes stage outputs left
    /// by an earlier run. Other files in the directory are untouched.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        for stage in StageName::ALL {
            match std::fs::remove_file(self.path_for(stage)) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    }

    /// Which stage outputs currently exist on disk, keyed by name.
    #[must_use]
    pub fn available_outputs(&self) -> BTreeMap<String, bool> {
        StageName::ALL
            .iter()
            .map(|stage| {
                (
                    self.naming.key(*stage).to_string(),
                    self.path_for(*stage).is_file(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_naming_schemes() {
        assert_eq!(OutputNaming::Session.key(StageName::Swap), "final_swap");
        assert_eq!(OutputNaming::Legacy.key(StageName::AddContent), "edited_a");
        assert_eq!(
            OutputNaming::Legacy.file_name(StageName::Composite),
            "composite_b.jpg"
        );
    }

    #[test]
    fn test_outputs_fill_in_order() {
        let mut outputs = StageOutputs::default();
        assert!(outputs.is_empty());

        outputs.set(StageName::AddContent, ImageRef::new("/run/person_added.jpg"));
        assert_eq!(outputs.len(), 1);
        assert!(!outputs.is_complete());

        let map = outputs.to_map(OutputNaming::Session);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["person_added"]);
    }

    #[test]
    fn test_outputs_serialize_only_completed() {
        let mut outputs = StageOutputs::default();
        outputs.set(StageName::AddContent, ImageRef::new("/run/a.jpg"));
        let json = serde_json::to_value(&outputs).unwrap();
        assert_eq!(json, serde_json::json!({"add_content": "/run/a.jpg"}));
    }

    #[test]
    fn test_outputs_serialize_by_stage_under_either_naming() {
        let mut outputs = StageOutputs::default();
        outputs.set(StageName::AddContent, ImageRef::new("/run/edited_a.jpg"));
        outputs.set(StageName::Composite, ImageRef::new("/run/composite_b.jpg"));

        let json = serde_json::to_value(&outputs).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "add_content": "/run/edited_a.jpg",
                "composite": "/run/composite_b.jpg"
            })
        );
        let legacy = outputs.to_map(OutputNaming::Legacy);
        assert_eq!(
            legacy.keys().collect::<Vec<_>>(),
            vec!["composite_b", "edited_a"]
        );

        let back: StageOutputs = serde_json::from_value(json).unwrap();
        assert_eq!(back, outputs);
    }

    #[test]
    fn test_layout_paths_and_availability() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path().join("run-1"), OutputNaming::Session);
        layout.prepare().unwrap();

        assert_eq!(
            layout.path_for(StageName::Composite),
            dir.path().join("run-1").join("composite.jpg")
        );

        std::fs::write(layout.path_for(StageName::AddContent), b"x").unwrap();
        let available = layout.available_outputs();
        assert_eq!(available.get("person_added"), Some(&true));
        assert_eq!(available.get("composite"), Some(&false));
        assert_eq!(available.get("final_swap"), Some(&false));
    }

    #[test]
    fn test_prepare_clears_previous_stage_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), OutputNaming::Legacy);
        layout.prepare().unwrap();
        for stage in StageName::ALL {
            std::fs::write(layout.path_for(stage), b"old").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        layout.prepare().unwrap();

        assert!(layout.available_outputs().values().all(|exists| !exists));
        assert!(dir.path().join("notes.txt").exists());
    }
}
