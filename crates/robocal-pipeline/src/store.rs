//! Result persistence.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use robocal_core::{Edge, Rpy};

use crate::ResultStore;

/// Appends results to a text file, creating its directory on first use.
#[derive(Debug, Clone)]
pub struct FileResultStore {
    path: PathBuf,
}

impl FileResultStore {
    pub fn new(directory: impl AsRef<Path>, file_name: impl AsRef<Path>) -> Self {
        Self {
            path: directory.as_ref().join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultStore for FileResultStore {
    fn append(&self, text: &str) -> io::Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(text.as_bytes())?;
        debug!("appended {} bytes to {}", text.len(), self.path.display());
        Ok(())
    }
}

/// URDF property block for one calibrated edge.
pub fn format_edge_record(edge: &Edge) -> String {
    let t = edge.transform.translation.vector;
    let rpy = Rpy::from_iso(&edge.transform);
    let child = &edge.child;
    format!(
        "<!-- {child} mount positions | relative to {parent} -->\n\
         \x20 <property name=\"{child}_x\" value=\"{x}\"/>\n\
         \x20 <property name=\"{child}_y\" value=\"{y}\"/>\n\
         \x20 <property name=\"{child}_z\" value=\"{z}\"/>\n\
         \x20 <property name=\"{child}_roll\" value=\"{roll}\"/>\n\
         \x20 <property name=\"{child}_pitch\" value=\"{pitch}\"/>\n\
         \x20 <property name=\"{child}_yaw\" value=\"{yaw}\"/>\n\n",
        parent = edge.parent,
        x = t.x,
        y = t.y,
        z = t.z,
        roll = rpy.roll,
        pitch = rpy.pitch,
        yaw = rpy.yaw,
    )
}

/// All edge records behind a header line.
pub fn format_chain_record(edges: &[Edge]) -> String {
    let mut out =
        String::from("\n----- Replace the following parameters within the URDF file of your robot -----\n\n");
    for edge in edges {
        out.push_str(&format_edge_record(edge));
    }
    out
}
