//! Plain-text situation reports.
//!
//! A report is a small fixed-layout artifact: four lines — target name,
//! address, timestamp, free-text note. Ownership of the file transfers to
//! the filesystem; the core does not track it afterwards.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::error::Result;
use crate::target::Target;

/// A situation report ready to be written.
#[derive(Debug, Clone)]
pub struct SituationReport {
    /// Display name of the target device.
    pub target_name: String,
    /// Target address.
    pub address: String,
    /// Free-text note.
    pub note: String,
}

impl SituationReport {
    /// Build a report for a target.
    pub fn new(target: &Target, target_name: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            address: target.address().to_owned(),
            note: note.into(),
        }
    }

    /// Filename for this report, derived from the address.
    pub fn file_name(&self) -> String {
        format!("report_{}.txt", self.address.replace(':', "_"))
    }

    /// Render the four-line layout.
    pub fn render(&self) -> String {
        format!(
            "Target: {}\nAddress: {}\nTime: {}\nNote: {}\n",
            self.target_name,
            self.address,
            Utc::now().to_rfc3339(),
            self.note
        )
    }

    /// Write the report into `dir`, creating it as needed, and return the
    /// file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.render())?;
        info!("report saved to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn report() -> SituationReport {
        let target = Target::classic("AA:BB:CC:DD:EE:FF").unwrap();
        SituationReport::new(&target, "Kitchen Speaker", "responds to silent pairing")
    }

    #[test]
    fn renders_four_line_layout() {
        let rendered = report().render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Target: Kitchen Speaker");
        assert_eq!(lines[1], "Address: aa:bb:cc:dd:ee:ff");
        assert!(lines[2].starts_with("Time: "));
        assert_eq!(lines[3], "Note: responds to silent pairing");
    }

    #[test]
    fn file_name_is_address_derived() {
        assert_eq!(report().file_name(), "report_aa_bb_cc_dd_ee_ff.txt");
    }

    #[test]
    fn writes_into_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = report().write_to(dir.path()).unwrap();
        assert!(path.exists());
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Address: aa:bb:cc:dd:ee:ff"));
    }
}
