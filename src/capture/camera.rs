use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{VideoCapture, VideoCaptureAPIs},
};

use super::source::FrameSource;

/// Webcam opened through OpenCV's `VideoCapture`.
pub struct CameraSource {
    device_id: i32,
    capture: Option<VideoCapture>,
}

impl CameraSource {
    pub fn new(device_id: i32) -> Self {
        Self {
            device_id,
            capture: None,
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> Result<()> {
        let capture = VideoCapture::new(self.device_id, VideoCaptureAPIs::CAP_ANY as i32)
            .with_context(|| format!("failed to open camera {}", self.device_id))?;

        if !capture.is_opened()? {
            bail!("Unable to access camera {}. Please check permissions.", self.device_id);
        }

        self.capture = Some(capture);
        Ok(())
    }

    fn snapshot(&mut self) -> Result<RgbImage> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| anyhow!("camera {} is not open", self.device_id))?;

        let mut frame = Mat::default();
        capture.read(&mut frame)?;
        if frame.empty() {
            bail!("Empty frame");
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(&frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let data = rgb.data_bytes()?.to_vec();

        RgbImage::from_raw(width, height, data)
            .ok_or_else(|| anyhow!("camera frame {width}x{height} has an unexpected layout"))
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(err) = capture.release() {
                log::warn!("failed to release camera {}: {err}", self.device_id);
            }
        }
    }

    fn describe(&self) -> String {
        format!("camera:{}", self.device_id)
    }
}
