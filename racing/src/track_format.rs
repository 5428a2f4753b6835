use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

pub const TRACK_EXTENSION: &str = "track";

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid track {}: {reason}", path.display())]
    InvalidTrack { path: PathBuf, reason: String },
    #[error("track node {index} is degenerate: {reason}")]
    DegenerateNode { index: usize, reason: String },
    #[error("no track named `{0}`")]
    UnknownTrack(String),
    #[error("no .track files in {}", .0.display())]
    EmptyCatalog(PathBuf),
}

/// Coarse authoring unit of a track: `length` sub-segments of `width` pixels,
/// heading `rotation` degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackNode {
    pub length: i32,
    pub width: i32,
    pub rotation: i32,
}

impl TrackNode {
    pub fn new(length: i32, width: i32, rotation: i32) -> Self {
        Self {
            length,
            width,
            rotation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub name: String,
    pub laps: u32,
    /// Length of one sub-segment in pixels.
    pub segment_length: u32,
    pub nodes: Vec<TrackNode>,
}

impl Track {
    /// Parse the plain-text track format: `laps segmentLength` followed by
    /// `length width rotation` triples until the end of input.
    pub fn parse(name: &str, text: &str) -> Result<Self, TrackError> {
        let path = PathBuf::from(name);
        let parse_error = |message: String| TrackError::Parse {
            path: path.clone(),
            message,
        };

        let mut numbers = Vec::new();
        for (index, token) in text.split_whitespace().enumerate() {
            let value = token
                .parse::<i32>()
                .map_err(|e| parse_error(format!("token {} `{token}`: {e}", index + 1)))?;
            numbers.push(value);
        }

        let [laps, segment_length, node_values @ ..] = numbers.as_slice() else {
            return Err(parse_error(
                "expected lap count and segment length".to_string(),
            ));
        };
        if node_values.len() % 3 != 0 {
            return Err(parse_error(format!(
                "incomplete node: {} trailing value(s)",
                node_values.len() % 3
            )));
        }

        let invalid = |reason: String| TrackError::InvalidTrack {
            path: path.clone(),
            reason,
        };
        if *laps <= 0 {
            return Err(invalid(format!("lap count must be positive, got {laps}")));
        }
        if *segment_length <= 0 {
            return Err(invalid(format!(
                "segment length must be positive, got {segment_length}"
            )));
        }
        if node_values.is_empty() {
            return Err(invalid("track has no nodes".to_string()));
        }

        let nodes = node_values
            .chunks_exact(3)
            .map(|n| TrackNode::new(n[0], n[1], n[2]))
            .collect();

        Ok(Self {
            name: name.to_string(),
            laps: *laps as u32,
            segment_length: *segment_length as u32,
            nodes,
        })
    }

    /// Load a track from a `.track` file; the name is the file stem.
    pub fn load(path: &Path) -> Result<Self, TrackError> {
        let text = std::fs::read_to_string(path).map_err(|source| TrackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(&name, &text).map_err(|err| match err {
            TrackError::Parse { message, .. } => TrackError::Parse {
                path: path.to_path_buf(),
                message,
            },
            TrackError::InvalidTrack { reason, .. } => TrackError::InvalidTrack {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Reject nodes that cannot produce geometry.
    pub fn validate_nodes(&self) -> Result<(), TrackError> {
        for (index, node) in self.nodes.iter().enumerate() {
            if node.length <= 0 {
                return Err(TrackError::DegenerateNode {
                    index,
                    reason: format!("length must be positive, got {}", node.length),
                });
            }
            if node.width <= 0 {
                return Err(TrackError::DegenerateNode {
                    index,
                    reason: format!("width must be positive, got {}", node.width),
                });
            }
        }
        Ok(())
    }

    /// Number of sub-segments over all nodes.
    pub fn total_segments(&self) -> usize {
        self.nodes.iter().map(|node| node.length.max(0) as usize).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEntry {
    pub name: String,
    pub path: PathBuf,
}

/// The `.track` files found in one directory, sorted by name.
#[derive(Debug, Clone)]
pub struct TrackCatalog {
    dir: PathBuf,
    entries: Vec<TrackEntry>,
}

impl TrackCatalog {
    pub fn scan(dir: &Path) -> Result<Self, TrackError> {
        let io_error = |source| TrackError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(TRACK_EXTENSION)
            {
                continue;
            }
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            debug!(track = %name, path = %path.display(), "found track");
            entries.push(TrackEntry { name, path });
        }

        if entries.is_empty() {
            return Err(TrackError::EmptyCatalog(dir.to_path_buf()));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        info!(dir = %dir.display(), tracks = entries.len(), "scanned track catalog");

        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[TrackEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn find(&self, name: &str) -> Result<&TrackEntry, TrackError> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| TrackError::UnknownTrack(name.to_string()))
    }

    /// Load the named track, or the first one in catalog order.
    pub fn load(&self, name: Option<&str>) -> Result<Track, TrackError> {
        let entry = match name {
            Some(name) => self.find(name)?,
            None => self
                .entries
                .first()
                .ok_or_else(|| TrackError::EmptyCatalog(self.dir.clone()))?,
        };
        let track = Track::load(&entry.path)?;
        info!(
            track = %track.name,
            laps = track.laps,
            nodes = track.nodes.len(),
            "loaded track"
        );
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_nodes() {
        let track = Track::parse("mini", "3 4 10 20 0").unwrap();
        assert_eq!(track.name, "mini");
        assert_eq!(track.laps, 3);
        assert_eq!(track.segment_length, 4);
        assert_eq!(track.nodes, vec![TrackNode::new(10, 20, 0)]);
    }

    #[test]
    fn whitespace_and_newlines_are_equivalent() {
        let track = Track::parse("two", "2 60\n4 100 -90\n  4 100 90\n").unwrap();
        assert_eq!(track.nodes.len(), 2);
        assert_eq!(track.nodes[1], TrackNode::new(4, 100, 90));
        assert_eq!(track.total_segments(), 8);
    }

    #[test]
    fn rejects_garbage_and_incomplete_nodes() {
        assert!(matches!(
            Track::parse("bad", "3 x 1 2 3"),
            Err(TrackError::Parse { .. })
        ));
        assert!(matches!(
            Track::parse("bad", "3 60 1 2"),
            Err(TrackError::Parse { .. })
        ));
        assert!(matches!(Track::parse("bad", "3"), Err(TrackError::Parse { .. })));
    }

    #[test]
    fn rejects_invalid_header() {
        assert!(matches!(
            Track::parse("bad", "0 60 1 2 3"),
            Err(TrackError::InvalidTrack { .. })
        ));
        assert!(matches!(
            Track::parse("bad", "3 -1 1 2 3"),
            Err(TrackError::InvalidTrack { .. })
        ));
        assert!(matches!(
            Track::parse("bad", "3 60"),
            Err(TrackError::InvalidTrack { .. })
        ));
    }

    #[test]
    fn degenerate_nodes_are_reported_with_index() {
        let track = Track::parse("bad", "1 60 4 100 0 0 100 90").unwrap();
        match track.validate_nodes() {
            Err(TrackError::DegenerateNode { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected {other:?}"),
        }
        let track = Track::parse("bad", "1 60 4 -5 0").unwrap();
        assert!(track.validate_nodes().is_err());
    }

    #[test]
    fn load_round_trips_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sprint.track");
        std::fs::write(&path, "3 4\n10 20 0\n").unwrap();

        let track = Track::load(&path).unwrap();
        assert_eq!(track.name, "sprint");
        assert_eq!(track.laps, 3);
        assert_eq!(track.segment_length, 4);
        assert_eq!(track.nodes, vec![TrackNode::new(10, 20, 0)]);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Track::load(&dir.path().join("nope.track")).unwrap_err();
        assert!(matches!(err, TrackError::Io { .. }));
        assert!(err.to_string().contains("nope.track"));
    }

    #[test]
    fn catalog_lists_track_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zigzag.track"), "1 60 4 100 0").unwrap();
        std::fs::write(dir.path().join("alpha.track"), "2 60 4 100 0").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a track").unwrap();

        let catalog = TrackCatalog::scan(dir.path()).unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["alpha", "zigzag"]);

        let first = catalog.load(None).unwrap();
        assert_eq!(first.name, "alpha");
        assert_eq!(first.laps, 2);
        assert_eq!(catalog.load(Some("zigzag")).unwrap().laps, 1);
        assert!(matches!(
            catalog.load(Some("missing")),
            Err(TrackError::UnknownTrack(_))
        ));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            TrackCatalog::scan(dir.path()),
            Err(TrackError::EmptyCatalog(_))
        ));
    }
}
