//! Hardware encoder detection.
//!
//! ffmpeg only lists the encoders it was built with; whether a device is
//! actually present is only known once an encode is attempted. Callers are
//! expected to fall back to a software encoder when a hardware attempt fails.

use crate::{Error, Result};
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;

/// Hardware encoding backends, in detection preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HwBackend {
    /// NVIDIA NVENC (decode via CUDA).
    Nvenc,
    /// Apple VideoToolbox.
    VideoToolbox,
    /// Intel Quick Sync Video.
    Qsv,
}

impl HwBackend {
    /// All backends, most preferred first.
    pub const ALL: [HwBackend; 3] = [HwBackend::Nvenc, HwBackend::VideoToolbox, HwBackend::Qsv];

    /// Encoder name suffix used by ffmpeg (`h264_<suffix>`).
    pub fn encoder_suffix(&self) -> &'static str {
        match self {
            HwBackend::Nvenc => "nvenc",
            HwBackend::VideoToolbox => "videotoolbox",
            HwBackend::Qsv => "qsv",
        }
    }

    /// Value for ffmpeg's `-hwaccel` decode option.
    pub fn hwaccel(&self) -> &'static str {
        match self {
            HwBackend::Nvenc => "cuda",
            HwBackend::VideoToolbox => "videotoolbox",
            HwBackend::Qsv => "qsv",
        }
    }

    /// Full encoder name for a codec family such as `h264` or `hevc`.
    pub fn encoder_for(&self, family: &str) -> String {
        format!("{}_{}", family, self.encoder_suffix())
    }
}

impl std::fmt::Display for HwBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.encoder_suffix())
    }
}

impl std::str::FromStr for HwBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nvenc" | "cuda" | "nvidia" => Ok(HwBackend::Nvenc),
            "videotoolbox" | "vt" => Ok(HwBackend::VideoToolbox),
            "qsv" | "quicksync" | "intel" => Ok(HwBackend::Qsv),
            _ => Err(format!("Unknown hardware backend: {}", s)),
        }
    }
}

/// The set of encoder names a particular ffmpeg build reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderSet {
    names: BTreeSet<String>,
}

impl EncoderSet {
    /// Build a set from explicit encoder names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse the output of `ffmpeg -hide_banner -encoders`.
    ///
    /// Encoder rows look like ` V....D h264_nvenc  NVIDIA NVENC H.264 encoder`.
    /// The legend above the `------` separator is skipped.
    pub fn parse(output: &str) -> Self {
        let mut names = BTreeSet::new();
        let mut in_table = !output.contains("------");

        for line in output.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("------") {
                in_table = true;
                continue;
            }
            if !in_table {
                continue;
            }

            let mut parts = trimmed.split_whitespace();
            let (Some(flags), Some(name)) = (parts.next(), parts.next()) else {
                continue;
            };
            if flags.len() == 6 && flags.starts_with(['V', 'A', 'S']) {
                names.insert(name.to_string());
            }
        }

        Self { names }
    }

    /// Whether the named encoder is present.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of encoders known.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no encoders were found.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Backends that offer at least one of the given codec families.
    pub fn hardware_backends(&self, families: &[&str]) -> Vec<HwBackend> {
        HwBackend::ALL
            .into_iter()
            .filter(|backend| {
                families
                    .iter()
                    .any(|family| self.contains(&backend.encoder_for(family)))
            })
            .collect()
    }

    /// Pick a hardware encoder for `family`.
    ///
    /// With `preferred` set only that backend is considered; otherwise the
    /// first backend in [`HwBackend::ALL`] order that has the encoder wins.
    pub fn hardware_encoder(
        &self,
        family: &str,
        preferred: Option<HwBackend>,
    ) -> Option<(HwBackend, String)> {
        let candidates: &[HwBackend] = match preferred {
            Some(ref backend) => std::slice::from_ref(backend),
            None => &HwBackend::ALL,
        };

        candidates.iter().find_map(|backend| {
            let name = backend.encoder_for(family);
            self.contains(&name).then_some((*backend, name))
        })
    }
}

/// Query an ffmpeg binary for its encoder list.
pub fn list_encoders(ffmpeg: &Path) -> Result<EncoderSet> {
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(ffmpeg.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool_failed("ffmpeg", stderr.trim().to_string()));
    }

    let encoders = EncoderSet::parse(&String::from_utf8_lossy(&output.stdout));
    tracing::debug!("ffmpeg reports {} encoders", encoders.len());
    Ok(encoders)
}
