use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::settings::FrameSourceConfig;

const REPLAY_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Something the capture loop can pull still frames from.
///
/// Calls are blocking; the loop runs them on the blocking pool.
pub trait FrameSource: Send + 'static {
    fn open(&mut self) -> Result<()>;

    /// Current frame at the source's native resolution.
    fn snapshot(&mut self) -> Result<RgbImage>;

    fn close(&mut self);

    fn describe(&self) -> String;
}

pub fn build_source(config: &FrameSourceConfig) -> Result<Box<dyn FrameSource>> {
    match config {
        FrameSourceConfig::Replay { dir } => Ok(Box::new(ReplaySource::new(dir.clone()))),
        FrameSourceConfig::Camera { device_id } => camera_source(*device_id),
    }
}

#[cfg(feature = "camera")]
fn camera_source(device_id: i32) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(super::camera::CameraSource::new(device_id)))
}

#[cfg(not(feature = "camera"))]
fn camera_source(device_id: i32) -> Result<Box<dyn FrameSource>> {
    bail!(
        "camera {device_id} unavailable: built without the `camera` feature, configure a replay directory instead"
    )
}

/// Cycles through the still images of a directory in file-name order.
pub struct ReplaySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl ReplaySource {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            files: Vec::new(),
            cursor: 0,
        }
    }
}

fn is_replay_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| REPLAY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ReplaySource {
    fn open(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("cannot read replay directory {}", self.dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_replay_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            bail!("no images found in {}", self.dir.display());
        }

        self.files = files;
        self.cursor = 0;
        Ok(())
    }

    fn snapshot(&mut self) -> Result<RgbImage> {
        let Some(path) = self.files.get(self.cursor) else {
            bail!("replay source is not open");
        };

        let frame = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        self.cursor = (self.cursor + 1) % self.files.len();
        Ok(frame)
    }

    fn close(&mut self) {
        self.files.clear();
        self.cursor = 0;
    }

    fn describe(&self) -> String {
        format!("replay:{}", self.dir.display())
    }
}

/// JPEG-encode a frame as a `data:` URL, the payload shape the backend expects.
pub fn encode_data_url(frame: &RgbImage, quality: u8) -> Result<String> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(frame)
        .context("jpeg encoding failed")?;

    Ok(format!(
        "data:image/jpeg;base64,{}",
        STANDARD.encode(buf.into_inner())
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgb;

    pub(crate) fn write_frames(dir: &Path, colors: &[[u8; 3]]) {
        for (idx, color) in colors.iter().enumerate() {
            let frame = RgbImage::from_pixel(160, 120, Rgb(*color));
            frame.save(dir.join(format!("frame_{idx:02}.png"))).unwrap();
        }
    }

    #[test]
    fn replay_cycles_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), &[[255, 0, 0], [0, 255, 0]]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ReplaySource::new(dir.path().to_path_buf());
        source.open().unwrap();

        let first = source.snapshot().unwrap();
        let second = source.snapshot().unwrap();
        let third = source.snapshot().unwrap();

        assert_eq!(first.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(second.get_pixel(0, 0), &Rgb([0, 255, 0]));
        assert_eq!(third.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(first.dimensions(), (160, 120));
    }

    #[test]
    fn replay_open_fails_without_images() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ReplaySource::new(dir.path().to_path_buf());
        assert!(source.open().is_err());
        assert!(source.snapshot().is_err());
    }

    #[test]
    fn closed_replay_refuses_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), &[[1, 2, 3]]);

        let mut source = ReplaySource::new(dir.path().to_path_buf());
        source.open().unwrap();
        source.close();
        assert!(source.snapshot().is_err());
    }

    #[test]
    fn data_url_decodes_back_to_jpeg() {
        let frame = RgbImage::from_pixel(32, 24, Rgb([10, 20, 30]));
        let url = encode_data_url(&frame, 80).unwrap();

        let payload = url.strip_prefix("data:image/jpeg;base64,").unwrap();
        let bytes = STANDARD.decode(payload).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }
}
