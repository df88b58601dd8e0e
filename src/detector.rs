//! Face detector seam.
//!
//! The pipeline treats face detection as an external capability: anything
//! that maps an RGB frame to a list of detected faces can implement
//! [`FaceDetector`]. Only the number of faces is used downstream.
//!
//! [`CommandDetector`] adapts a long-running external process (for example a
//! MediaPipe face-mesh script) that speaks a one-line-per-frame protocol.

use std::{
    error::Error,
    ffi::OsStr,
    fmt::{Debug, Formatter, Result as FmtResult},
    io::{BufRead, BufReader, Write},
    path::PathBuf,
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
    sync::Mutex,
};

use image::RgbImage;
use serde_json::Value;
use tempfile::TempDir;

/// Opaque failure reported by a detector.
pub type DetectorFailure = Box<dyn Error + Send + Sync>;

/// Landmark points of one detected face, in the coordinate space of the
/// frame handed to the detector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceLandmarks {
    /// `(x, y)` points.
    pub points: Vec<(f32, f32)>,
}

/// Maps a frame to the faces detected in it.
///
/// Implementations must be `Send + Sync`; with the `rayon` feature one
/// detector instance is shared across worker threads. A detector is
/// acquired once per processing session and reused for every frame.
pub trait FaceDetector: Send + Sync {
    /// Detect faces in `frame`.
    ///
    /// # Errors
    ///
    /// Any failure is fatal for the frame; the pipeline does not retry.
    fn detect(&self, frame: &RgbImage) -> Result<Vec<FaceLandmarks>, DetectorFailure>;
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<FaceLandmarks>, DetectorFailure> {
        (**self).detect(frame)
    }
}

struct CommandChannel {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    sequence: u64,
}

/// A detector backed by a persistent child process.
///
/// For every frame the image is written as PNG into a private temporary
/// directory and its absolute path is sent on one line of the child's
/// stdin. The child must answer with exactly one line of JSON: an array of
/// faces, each an array of `[x, y]` points.
///
/// ```text
/// → /tmp/.tmpA1b2/frame_000017.png
/// ← [[[101.5, 88.0], [103.0, 90.25]], [[300, 41], [302, 44]]]
/// ```
///
/// Calls are serialized; the child sees one frame at a time.
pub struct CommandDetector {
    program: String,
    channel: Mutex<CommandChannel>,
    scratch: TempDir,
}

impl Debug for CommandDetector {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CommandDetector")
            .field("program", &self.program)
            .field("scratch", &self.scratch.path())
            .finish_non_exhaustive()
    }
}

impl CommandDetector {
    /// Spawn the detector process.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the program cannot be started or the scratch
    /// directory cannot be created.
    pub fn spawn<I, S>(program: &str, args: I) -> Result<Self, std::io::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let scratch = tempfile::Builder::new().prefix("faceclip-").tempdir()?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("detector stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("detector stdout unavailable"))?;

        log::info!("Started detector process `{program}` (pid {})", child.id());

        Ok(Self {
            program: program.to_string(),
            channel: Mutex::new(CommandChannel {
                child,
                stdin,
                stdout: BufReader::new(stdout),
                sequence: 0,
            }),
            scratch,
        })
    }
}

impl FaceDetector for CommandDetector {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<FaceLandmarks>, DetectorFailure> {
        let mut channel = self
            .channel
            .lock()
            .map_err(|_| "detector channel poisoned by an earlier panic")?;

        let written = ScratchFrame::write(
            self.scratch
                .path()
                .join(format!("frame_{:06}.png", channel.sequence)),
            frame,
        );
        channel.sequence += 1;
        let scratch_frame = written?;

        writeln!(channel.stdin, "{}", scratch_frame.0.display())?;
        channel.stdin.flush()?;

        let mut line = String::new();
        let read = channel.stdout.read_line(&mut line)?;
        if read == 0 {
            return Err(format!("detector `{}` closed its output", self.program).into());
        }

        parse_faces(&line)
    }
}

/// A frame image in the scratch directory, removed when dropped.
struct ScratchFrame(PathBuf);

impl ScratchFrame {
    fn write(path: PathBuf, frame: &RgbImage) -> Result<Self, DetectorFailure> {
        let scratch = Self(path);
        frame.save(&scratch.0)?;
        Ok(scratch)
    }
}

impl Drop for ScratchFrame {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

impl Drop for CommandDetector {
    fn drop(&mut self) {
        if let Ok(channel) = self.channel.get_mut() {
            let _ = channel.child.kill();
            let _ = channel.child.wait();
        }
    }
}

/// Parse one response line: `[[[x, y], ...], ...]`.
pub(crate) fn parse_faces(line: &str) -> Result<Vec<FaceLandmarks>, DetectorFailure> {
    let value: Value = serde_json::from_str(line.trim())?;
    let faces = value
        .as_array()
        .ok_or("detector response is not a JSON array")?;

    faces
        .iter()
        .map(|face| -> Result<FaceLandmarks, DetectorFailure> {
            let points = face.as_array().ok_or("face entry is not an array of points")?;
            let points = points
                .iter()
                .map(|point| match point.as_array().map(Vec::as_slice) {
                    Some([x, y, ..]) => match (x.as_f64(), y.as_f64()) {
                        (Some(x), Some(y)) => Ok((x as f32, y as f32)),
                        _ => Err("point coordinates must be numbers"),
                    },
                    _ => Err("point must be an [x, y] array"),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FaceLandmarks { points })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use image::RgbImage;

    use super::{CommandDetector, FaceDetector, parse_faces};

    fn scratch_is_empty(detector: &CommandDetector) -> bool {
        std::fs::read_dir(detector.scratch.path())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
    }

    #[test]
    fn child_answers_one_line_per_frame() {
        let detector = CommandDetector::spawn(
            "sh",
            ["-c", "while read path; do test -f \"$path\" && echo '[[[1,2]]]'; done"],
        )
        .unwrap();
        let frame = RgbImage::new(4, 4);

        for _ in 0..3 {
            let faces = detector.detect(&frame).unwrap();
            assert_eq!(faces.len(), 1);
            assert_eq!(faces[0].points, vec![(1.0, 2.0)]);
        }
        assert!(scratch_is_empty(&detector));
    }

    #[test]
    fn child_that_exits_is_a_failure() {
        let detector = CommandDetector::spawn("sh", ["-c", "read path; exit 0"]).unwrap();

        let error = detector.detect(&RgbImage::new(4, 4)).unwrap_err();
        assert!(
            error.to_string().contains("closed its output"),
            "unexpected error: {error}"
        );
        assert!(scratch_is_empty(&detector));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let result = CommandDetector::spawn("faceclip-no-such-detector", Vec::<String>::new());
        assert!(result.is_err());
    }

    #[test]
    fn parses_faces_and_points() {
        let faces = parse_faces("[[[1, 2], [3.5, 4]], [[10, 20, 0.9]]]\n").unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].points, vec![(1.0, 2.0), (3.5, 4.0)]);
        assert_eq!(faces[1].points, vec![(10.0, 20.0)]);
    }

    #[test]
    fn empty_array_means_no_faces() {
        assert!(parse_faces("[]").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_responses() {
        assert!(parse_faces("not json").is_err());
        assert!(parse_faces("{\"faces\": []}").is_err());
        assert!(parse_faces("[[1, 2]]").is_err());
        assert!(parse_faces("[[[\"a\", 2]]]").is_err());
    }
}
