use std::path::{Path, PathBuf};

use glob::glob;
use image::ImageReader;
use log::{debug, warn};

use crate::session::{Frame, FrameSource};

/// Parses the timestamp from a file path. Assumes the filename (without
/// extension) is a timestamp in nanoseconds; falls back to a synthetic
/// index-based clock otherwise.
fn path_to_timestamp(path: &Path, fallback_idx: usize) -> i64 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback_idx as i64 * 100_000_000)
}

fn img_filter(rp: glob::GlobResult) -> Option<PathBuf> {
    if let Ok(p) = rp {
        for ext in &[".png", ".jpg"] {
            if p.as_os_str().to_string_lossy().ends_with(ext) {
                return Some(p);
            }
        }
    }
    None
}

/// Frame source backed by a folder of png/jpg images, walked in sorted
/// order. Undecodable files are skipped; running off the end is the
/// end-of-stream signal.
pub struct ImageFolderSource {
    paths: Vec<PathBuf>,
    idx: usize,
}

impl ImageFolderSource {
    pub fn new(root_folder: &str) -> std::io::Result<ImageFolderSource> {
        let pattern = format!("{}/*", root_folder);
        let img_paths = glob(&pattern).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
        })?;
        let mut paths: Vec<PathBuf> = img_paths.into_iter().filter_map(img_filter).collect();
        paths.sort();
        if paths.is_empty() {
            warn!("no images found under {}", root_folder);
        }
        Ok(ImageFolderSource { paths, idx: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageFolderSource {
    fn next_frame(&mut self) -> Option<Frame> {
        while self.idx < self.paths.len() {
            let path = &self.paths[self.idx];
            let time_ns = path_to_timestamp(path, self.idx);
            self.idx += 1;
            match ImageReader::open(path) {
                Ok(reader) => match reader.decode() {
                    Ok(image) => return Some(Frame { time_ns, image }),
                    Err(e) => debug!("skipping undecodable {:?}: {}", path, e),
                },
                Err(e) => debug!("skipping unreadable {:?}: {}", path, e),
            }
        }
        None
    }
}
