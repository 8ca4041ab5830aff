use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::capture::domain::frame_source::FrameSource;
use crate::capture::domain::latest_frame_slot::LatestFrameSlot;
use crate::shared::frame::Frame;

/// Capture backend for the current platform.
pub fn platform_input_format() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(target_os = "windows") {
        "dshow"
    } else {
        "v4l2"
    }
}

/// Device string for camera number `index` in the platform's naming scheme.
///
/// DirectShow addresses cameras by name, so Windows callers pass
/// `video=<name>` directly instead.
pub fn camera_device(index: u32) -> String {
    if cfg!(target_os = "macos") {
        index.to_string()
    } else if cfg!(target_os = "windows") {
        format!("video={index}")
    } else {
        format!("/dev/video{index}")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraSettings {
    /// Device name, file path or stream URL.
    pub device: String,
    /// Requested capture size; the device may pick the nearest mode.
    pub resolution: Option<(u32, u32)>,
    pub framerate: Option<u32>,
}

impl CameraSettings {
    pub fn camera(index: u32) -> Self {
        Self {
            device: camera_device(index),
            resolution: None,
            framerate: None,
        }
    }

    /// URLs and existing files are opened as ordinary ffmpeg inputs.
    fn is_capture_device(&self) -> bool {
        !(self.device.contains("://") || Path::new(&self.device).is_file())
    }

    fn options(&self) -> ffmpeg_next::Dictionary<'static> {
        let mut opts = ffmpeg_next::Dictionary::new();
        if let Some((w, h)) = self.resolution {
            opts.set("video_size", &format!("{w}x{h}"));
        }
        if let Some(fps) = self.framerate {
            opts.set("framerate", &fps.to_string());
        }
        opts
    }
}

/// Camera (or any ffmpeg-readable stream) decoded to RGB24 on a
/// background thread.
///
/// Only the latest decoded frame is kept; the pipeline never works through
/// a backlog.
pub struct FfmpegCameraSource {
    slot: Arc<LatestFrameSlot>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

/// Decoder state handed to the capture thread.
struct CaptureSession {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
}

// Safety: the session is moved to the capture thread once and only used
// there. The raw pointers inside ffmpeg types are never shared.
unsafe impl Send for CaptureSession {}

impl FfmpegCameraSource {
    /// Opens the device and starts decoding. Fails if the device cannot be
    /// opened or carries no video stream.
    pub fn open(settings: &CameraSettings) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = if settings.is_capture_device() {
            ffmpeg_next::device::register_all();
            let name = platform_input_format();
            let format = ffmpeg_next::device::input::video()
                .find(|f| f.name() == name)
                .ok_or_else(|| format!("capture backend {name} is not available"))?;
            let format = ffmpeg_next::format::Format::Input(format);
            ffmpeg_next::format::open_with(&settings.device, &format, settings.options())?.input()
        } else {
            ffmpeg_next::format::input_with_dictionary(&settings.device, settings.options())?
        };

        let session = CaptureSession::new(ictx)?;
        log::info!(
            "Opened {} at {}x{}",
            settings.device,
            session.width,
            session.height
        );

        let slot = Arc::new(LatestFrameSlot::new());
        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let slot = slot.clone();
            let stop = stop.clone();
            std::thread::Builder::new()
                .name("camera-capture".into())
                .spawn(move || session.run(&slot, &stop))?
        };

        Ok(Self {
            slot,
            stop,
            worker: Some(worker),
        })
    }
}

impl FrameSource for FfmpegCameraSource {
    fn current_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        Ok(self.slot.take())
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.slot.close();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("capture thread panicked");
            }
            log::info!(
                "Camera closed: {} frames decoded, {} dropped",
                self.slot.published(),
                self.slot.dropped()
            );
        }
    }

    fn dropped_frames(&self) -> u64 {
        self.slot.dropped()
    }
}

impl Drop for FfmpegCameraSource {
    fn drop(&mut self) {
        self.close();
    }
}

impl CaptureSession {
    fn new(ictx: ffmpeg_next::format::context::Input) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
        })
    }

    fn run(mut self, slot: &LatestFrameSlot, stop: &AtomicBool) {
        let mut index = 0usize;
        let mut packets = 0u64;

        for (stream, packet) in self.ictx.packets() {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            if stream.index() != self.stream_index {
                continue;
            }
            packets += 1;
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("dropping undecodable packet: {e}");
                continue;
            }
            drain(
                &mut self.decoder,
                &mut self.scaler,
                self.width,
                self.height,
                &mut index,
                slot,
            );
        }

        if !stop.load(Ordering::Relaxed) {
            if let Err(e) = self.decoder.send_eof() {
                log::debug!("decoder rejected end of stream: {e}");
            }
            drain(
                &mut self.decoder,
                &mut self.scaler,
                self.width,
                self.height,
                &mut index,
                slot,
            );
        }

        log::debug!("capture ended after {packets} packets, {index} frames");
        slot.close();
    }
}

fn drain(
    decoder: &mut ffmpeg_next::decoder::Video,
    scaler: &mut ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    index: &mut usize,
    slot: &LatestFrameSlot,
) {
    let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
    while decoder.receive_frame(&mut decoded).is_ok() {
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = scaler.run(&decoded, &mut rgb) {
            log::warn!("colour conversion failed: {e}");
            continue;
        }
        slot.publish(Frame::new(
            packed_rgb(&rgb, width, height),
            width,
            height,
            3,
            *index,
        ));
        *index += 1;
    }
}

/// Copies an RGB24 ffmpeg frame into a tightly packed buffer, dropping row
/// padding.
fn packed_rgb(frame: &ffmpeg_next::util::frame::video::Video, width: u32, height: u32) -> Vec<u8> {
    pack_rows(frame.data(0), frame.stride(0), width, height)
}

fn pack_rows(data: &[u8], stride: usize, width: u32, height: u32) -> Vec<u8> {
    let row_len = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
