//! Shared test harness for integration tests.
//!
//! Provides [`StubTranscoder`], a scriptable stand-in for ffmpeg, and
//! [`TestHarness`], which builds a full [`AppContext`] writing into a temp
//! directory. The [`TestHarness::with_server`] constructor starts Axum on a
//! random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use vidbatch::config::Config;
use vidbatch::conversion::{HardwareSupport, TranscodeOutcome, Transcoder};
use vidbatch::server::{create_router, AppContext};
use vidbatch::state::AppState;

/// Behaviour keyed on the input file name:
///
/// - `broken*`: exits 1 after writing a partial output
/// - `slow*`: reports 10% then waits for cancellation
/// - anything else: reports 50% and 100%, then writes the output
///
/// Hardware attempts (`*_nvenc`, `*_qsv`, `*_videotoolbox`) fail when
/// `fail_hardware` is set.
#[derive(Default)]
pub struct StubTranscoder {
    pub fail_hardware: bool,
    calls: Mutex<Vec<Vec<String>>>,
}

impl StubTranscoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_hardware() -> Arc<Self> {
        Arc::new(Self {
            fail_hardware: true,
            ..Default::default()
        })
    }

    /// Argument lists of every invocation so far.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[async_trait]
impl Transcoder for StubTranscoder {
    fn name(&self) -> &str {
        "stub"
    }

    async fn run(
        &self,
        args: &[String],
        progress: &(dyn Fn(f32) + Send + Sync),
        cancel: &CancellationToken,
    ) -> vidbatch_av::Result<TranscodeOutcome> {
        self.calls.lock().unwrap().push(args.to_vec());

        let input = flag_value(args, "-i").unwrap_or_default().to_string();
        let encoder = flag_value(args, "-c:v").unwrap_or_default().to_string();
        let output = PathBuf::from(args.last().unwrap());
        let input_name = Path::new(&input)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let hardware = ["_nvenc", "_qsv", "_videotoolbox"]
            .iter()
            .any(|suffix| encoder.ends_with(suffix));
        if hardware && self.fail_hardware {
            std::fs::write(&output, b"partial")?;
            return Ok(TranscodeOutcome::failure(
                1,
                vec!["Cannot load libcuda.so.1".to_string()],
            ));
        }

        if input_name.starts_with("broken") {
            progress(20.0);
            std::fs::write(&output, b"partial")?;
            return Ok(TranscodeOutcome::failure(
                1,
                vec![format!("{}: Invalid data found when processing input", input)],
            ));
        }

        if input_name.starts_with("slow") {
            progress(10.0);
            cancel.cancelled().await;
            std::fs::write(&output, b"partial")?;
            return Err(vidbatch_av::Error::Cancelled);
        }

        progress(50.0);
        progress(100.0);
        std::fs::write(&output, b"converted")?;
        Ok(TranscodeOutcome::success())
    }
}

/// Write a small fake source file.
pub fn write_input(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"not really a video").unwrap();
    path
}

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub transcoder: Arc<StubTranscoder>,
    pub dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_parts(StubTranscoder::new(), HardwareSupport::none())
    }

    pub fn with_parts(transcoder: Arc<StubTranscoder>, hardware: HardwareSupport) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.conversion.output_dir = dir.path().join("converted");
        config.conversion.upload_dir = Some(dir.path().join("uploads"));
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();

        let state = AppState::new();
        let ctx = AppContext::new(config, state, transcoder.clone(), hardware);

        Self {
            ctx,
            transcoder,
            dir,
        }
    }

    /// Directory for input fixtures.
    pub fn inputs(&self) -> PathBuf {
        let path = self.dir.path().join("inputs");
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let addr = harness.serve().await;
        (harness, addr)
    }

    pub async fn serve(&self) -> SocketAddr {
        let app = create_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        addr
    }
}
