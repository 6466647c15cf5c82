// thin wrapper around openpnp_capture
use std::ffi::CStr;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use image::{DynamicImage, ImageBuffer};
use log::{debug, info};
use openpnp_sys::{CapContext, CapFormatInfo, CapStream};

use openpnp_capture_sys as openpnp_sys;

// how long `read_frame` waits for the driver to deliver a new frame
const FRAME_TIMEOUT: Duration = Duration::from_secs(1);
const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Anything that hands out RGB video frames.
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<DynamicImage>;
    fn resolution(&self) -> (u32, u32);
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Picks the format with exactly the requested size, otherwise the one whose
/// pixel count is closest to it. Ties go to the higher frame rate.
pub fn select_format(formats: &[CaptureFormat], width: u32, height: u32) -> Option<CaptureFormat> {
    let wanted = width as i64 * height as i64;
    formats
        .iter()
        .min_by_key(|f| {
            let exact = f.width == width && f.height == height;
            let pixels = f.width as i64 * f.height as i64;
            (!exact, (pixels - wanted).abs(), std::cmp::Reverse(f.fps))
        })
        .copied()
}

/// An open camera stream. The stream and the capture context are released on drop.
pub struct Webcam {
    ctx: CapContext,
    stream: CapStream,
    name: String,
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl Webcam {
    pub fn open(device: u32, width: u32, height: u32) -> Result<Self> {
        let ctx = unsafe { openpnp_sys::Cap_createContext() };
        if ctx.is_null() {
            bail!("Failed to create capture context");
        }

        // from here on `Drop` of the half-built camera takes care of the context
        let mut webcam = Webcam {
            ctx,
            stream: -1,
            name: String::new(),
            width: 0,
            height: 0,
            buffer: Vec::new(),
        };

        let count = unsafe { openpnp_sys::Cap_getDeviceCount(ctx) };
        if device >= count {
            bail!("Camera {} not found ({} available)", device, count);
        }

        webcam.name = device_name(ctx, device);

        let formats = read_formats(ctx, device);
        let format = select_format(&formats, width, height)
            .ok_or_else(|| anyhow!("Camera {} reports no capture formats", webcam.name))?;

        let stream = unsafe { openpnp_sys::Cap_openStream(ctx, device, format.id) };
        if stream < 0 {
            bail!("Failed to open stream on camera {}", webcam.name);
        }

        webcam.stream = stream;
        webcam.width = format.width;
        webcam.height = format.height;
        webcam.buffer = vec![0u8; (format.width * format.height * 3) as usize];

        info!(
            "Opened camera {} at {}x{} ({} fps)",
            webcam.name, format.width, format.height, format.fps
        );

        Ok(webcam)
    }
}

impl FrameSource for Webcam {
    fn read_frame(&mut self) -> Result<DynamicImage> {
        let started = Instant::now();
        while unsafe { openpnp_sys::Cap_hasNewFrame(self.ctx, self.stream) } == 0 {
            if started.elapsed() > FRAME_TIMEOUT {
                bail!("No frame from camera within {:?}", FRAME_TIMEOUT);
            }
            thread::sleep(FRAME_POLL_INTERVAL);
        }

        let res = unsafe {
            openpnp_sys::Cap_captureFrame(
                self.ctx,
                self.stream,
                self.buffer.as_mut_ptr() as *mut std::os::raw::c_void,
                self.buffer.len() as u32,
            )
        };
        if res != openpnp_sys::CAPRESULT_OK {
            bail!("Frame capture failed with result {}", res);
        }

        let image = ImageBuffer::from_raw(self.width, self.height, self.buffer.clone())
            .ok_or_else(|| anyhow!("Frame buffer does not match {}x{}", self.width, self.height))?;

        Ok(DynamicImage::ImageRgb8(image))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        unsafe {
            if self.stream >= 0 {
                openpnp_sys::Cap_closeStream(self.ctx, self.stream);
            }
            openpnp_sys::Cap_releaseContext(self.ctx);
        }
        debug!("Released camera {}", self.name);
    }
}

/// Names of all cameras the capture backend can see, in device index order.
pub fn list_devices() -> Vec<String> {
    let ctx = unsafe { openpnp_sys::Cap_createContext() };
    if ctx.is_null() {
        return Vec::new();
    }

    let count = unsafe { openpnp_sys::Cap_getDeviceCount(ctx) };
    let devices = (0..count).map(|i| device_name(ctx, i)).collect();

    unsafe { openpnp_sys::Cap_releaseContext(ctx) };
    devices
}

fn device_name(ctx: CapContext, device: u32) -> String {
    let name = unsafe { openpnp_sys::Cap_getDeviceName(ctx, device) };
    if name.is_null() {
        return format!("camera {}", device);
    }
    unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
}

fn read_formats(ctx: CapContext, device: u32) -> Vec<CaptureFormat> {
    let count = unsafe { openpnp_sys::Cap_getNumFormats(ctx, device) };

    (0..count.max(0) as u32)
        .filter_map(|id| {
            let mut info = CapFormatInfo {
                width: 0,
                height: 0,
                fourcc: 0,
                fps: 0,
                bpp: 0,
            };
            let res = unsafe { openpnp_sys::Cap_getFormatInfo(ctx, device, id, &mut info) };
            if res == openpnp_sys::CAPRESULT_OK {
                Some(CaptureFormat {
                    id,
                    width: info.width,
                    height: info.height,
                    fps: info.fps,
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(id: u32, width: u32, height: u32, fps: u32) -> CaptureFormat {
        CaptureFormat {
            id,
            width,
            height,
            fps,
        }
    }

    #[test]
    fn exact_size_wins() {
        let formats = [
            format(0, 1920, 1080, 30),
            format(1, 640, 480, 15),
            format(2, 640, 480, 30),
            format(3, 800, 600, 60),
        ];
        assert_eq!(select_format(&formats, 640, 480).map(|f| f.id), Some(2));
    }

    #[test]
    fn closest_size_otherwise() {
        let formats = [format(0, 1920, 1080, 30), format(1, 1280, 720, 30)];
        assert_eq!(select_format(&formats, 1024, 768).map(|f| f.id), Some(1));
        assert_eq!(select_format(&[], 640, 480), None);
    }
}
