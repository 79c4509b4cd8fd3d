use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};

use rgb_frame::RgbFrame;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not spawn \"ffmpeg\": {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ffmpeg exited with {}", output.status)]
    Ffmpeg { output: std::process::Output },
    #[error("frame is {got_width}x{got_height} but the video is {width}x{height}")]
    FrameSizeChanged {
        got_width: u32,
        got_height: u32,
        width: u32,
        height: u32,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Encoder parameters handed to ffmpeg.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderOptions {
    /// Output frame rate.
    pub fps: f64,
    /// ffmpeg video codec name, e.g. "libx264" or "mpeg4".
    pub codec: String,
    /// ffmpeg `-q:v` quality value (codec specific, lower is better for
    /// most codecs).
    pub quality: Option<u8>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            fps: 30.0,
            codec: "libx264".to_string(),
            quality: None,
        }
    }
}

fn zq(x: &[&str]) -> Vec<String> {
    x.iter().map(|x| String::from(*x)).collect()
}

fn encoder_args(width: u32, height: u32, opts: &EncoderOptions) -> Vec<String> {
    let mut args = zq(&["-hide_banner", "-nostdin", "-y"]);
    args.extend(zq(&["-f", "rawvideo", "-pixel_format", "rgb24"]));
    args.push("-video_size".into());
    args.push(format!("{}x{}", width, height));
    args.push("-framerate".into());
    args.push(format!("{}", opts.fps));
    args.extend(zq(&["-i", "-"]));
    args.extend(zq(&["-c:v", opts.codec.as_str()]));
    if let Some(quality) = opts.quality {
        args.push("-q:v".into());
        args.push(format!("{}", quality));
    }
    // Common encoders only accept even dimensions with yuv420p.
    args.extend(zq(&[
        "-vf",
        "pad=ceil(iw/2)*2:ceil(ih/2)*2",
        "-pix_fmt",
        "yuv420p",
    ]));
    args
}

/// Sequential video sink: raw rgb24 frames are piped to an `ffmpeg` child
/// process which owns all encoding and container work.
///
/// Frames must be appended in presentation order and must all match the
/// geometry the writer was opened with. `close` must be called to flush
/// the encoder; dropping the writer without closing abandons the output.
pub struct FfmpegRawWriter {
    ffmpeg_child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
}

impl FfmpegRawWriter {
    pub fn new(fname: &str, width: u32, height: u32, opts: &EncoderOptions) -> Result<Self> {
        let mut args = encoder_args(width, height, opts);
        args.push(fname.into());
        tracing::debug!("spawning: ffmpeg {}", args.join(" "));
        let mut ffmpeg_child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn { source })?;
        let stdin = ffmpeg_child.stdin.take();
        Ok(Self {
            ffmpeg_child,
            stdin,
            width,
            height,
        })
    }

    /// Append one frame, in order.
    pub fn append(&mut self, frame: &RgbFrame) -> Result<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(Error::FrameSizeChanged {
                got_width: frame.width,
                got_height: frame.height,
                width: self.width,
                height: self.height,
            });
        }
        let Some(stdin) = &mut self.stdin else {
            // `close` consumed the writer, so append cannot run after it;
            // stdin is only None if spawning produced no pipe.
            return Err(Error::Io(std::io::Error::other("ffmpeg stdin not open")));
        };

        let valid_stride = frame.width as usize * 3;
        let rows = frame
            .image_data
            .chunks(frame.stride as usize)
            .take(frame.height as usize);
        for row in rows {
            match stdin.write_all(&row[..valid_stride]) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    // Apparently ffmpeg died; collect its output.
                    drop(self.stdin.take());
                    let status = self.ffmpeg_child.wait()?;
                    use std::io::Read;
                    let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
                    if let Some(mut out) = self.ffmpeg_child.stdout.take() {
                        out.read_to_end(&mut stdout)?;
                    }
                    if let Some(mut err) = self.ffmpeg_child.stderr.take() {
                        err.read_to_end(&mut stderr)?;
                    }
                    let output = std::process::Output {
                        status,
                        stdout,
                        stderr,
                    };
                    return Err(Error::Ffmpeg { output });
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Close the input pipe, wait for ffmpeg to finish the file, and fail
    /// if it exited nonzero.
    pub fn close(mut self) -> Result<()> {
        drop(self.stdin.take());
        let output = self.ffmpeg_child.wait_with_output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Ffmpeg { output })
        }
    }
}
