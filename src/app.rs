use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::config::BuildOptions;
use crate::error::{IsoError, Result};
use crate::events::{AbortEvent, BuildEvent, EventSink, FinishEvent, ProgressEvent};
use crate::iso::path_table::{self, Endian};
use crate::iso::{record, volume, PVD_LBA, SYSTEM_AREA_SECTORS, TERMINATOR_LBA};
use crate::layout::{self, ExtentKind};
use crate::scanner;
use crate::tree::{self, arena::IsoTree};
use crate::writer::ImageWriter;

/// Build state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// Constructed, nothing started
    Idle,
    /// Scanning the source and computing the layout
    Planning,
    /// Streaming the image to disk
    Writing,
    Finished,
    Aborted,
}

impl BuildPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildPhase::Finished | BuildPhase::Aborted)
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub output: PathBuf,
    pub bytes_written: u64,
    pub total_sectors: u32,
    pub directories: usize,
    pub files: usize,
}

/// Runs one build and reports on it. Consumed by the build call, so a new
/// creator is needed per image.
pub struct IsoCreator<S: EventSink = mpsc::Sender<BuildEvent>> {
    phase: BuildPhase,
    events: S,
    cancel: CancelToken,
    options: BuildOptions,
}

impl<S: EventSink> IsoCreator<S> {
    pub fn new(events: S, cancel: CancelToken, options: BuildOptions) -> Self {
        Self {
            phase: BuildPhase::Idle,
            events,
            cancel,
            options,
        }
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    /// Write an image of a caller-supplied tree. The volume name is the
    /// tree's root name.
    pub fn build_from_tree(mut self, tree: &IsoTree, output: &Path) -> Result<BuildSummary> {
        let result = self.write_tree(tree, output);
        self.conclude(result)
    }

    /// Scan `source` and write an image of it.
    pub fn build_from_folder(
        mut self,
        source: &Path,
        output: &Path,
        volume_name: &str,
    ) -> Result<BuildSummary> {
        let result = self
            .scan_folder(source, output, volume_name)
            .and_then(|tree| self.write_tree(&tree, output));
        self.conclude(result)
    }

    fn enter(&mut self, phase: BuildPhase) {
        tracing::debug!("Build phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn emit(&self, event: BuildEvent) {
        if self.phase.is_terminal() {
            return;
        }
        self.events.emit(event);
    }

    fn progress(&self, action: Option<String>, maximum: Option<u64>, current: u64) {
        self.emit(BuildEvent::Progress(ProgressEvent {
            action,
            maximum,
            current,
        }));
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(IsoError::Cancelled);
        }
        Ok(())
    }

    fn scan_folder(&mut self, source: &Path, output: &Path, volume_name: &str) -> Result<IsoTree> {
        if source.as_os_str().is_empty() {
            return Err(IsoError::validation("source folder path is empty"));
        }
        if volume_name.trim().is_empty() {
            return Err(IsoError::validation("volume name is empty"));
        }
        self.enter(BuildPhase::Planning);
        self.progress(Some(format!("Scanning {}", source.display())), None, 0);
        self.check_cancelled()?;

        // An earlier image inside the source would be truncated under our feet
        let scan = scanner::scan(source, Some(output))?;
        tree::build_tree(&scan, volume_name)
    }

    fn write_tree(&mut self, tree: &IsoTree, output: &Path) -> Result<BuildSummary> {
        if output.as_os_str().is_empty() {
            return Err(IsoError::validation("output path is empty"));
        }

        // Planning
        self.enter(BuildPhase::Planning);
        let node_count = tree.len() as u64;
        self.progress(Some("Planning layout".to_string()), Some(node_count), 0);
        let plan = {
            let this = &*self;
            let mut visited = 0u64;
            layout::plan(tree, |_| {
                visited += 1;
                this.progress(None, None, visited);
            })?
        };

        // Writing
        self.check_cancelled()?;
        self.enter(BuildPhase::Writing);
        let build_time = self.options.resolve_build_time();
        let mut writer = ImageWriter::create(output, self.options.copy_chunk_sectors)?;
        let extent_count = plan.extents.len() as u64;
        self.progress(Some("Writing image".to_string()), Some(extent_count), 0);

        writer.write_zero_sectors(SYSTEM_AREA_SECTORS as u64)?;
        debug_assert_eq!(writer.current_lba(), PVD_LBA as u64);
        writer.write_region(&volume::primary_volume_descriptor(
            tree,
            &plan,
            &self.options,
            &build_time,
        ))?;
        debug_assert_eq!(writer.current_lba(), TERMINATOR_LBA as u64);
        writer.write_region(&volume::terminator())?;
        debug_assert_eq!(writer.current_lba(), plan.type_l_lba as u64);
        writer.write_region(&path_table::encode(&plan, Endian::Little))?;
        debug_assert_eq!(writer.current_lba(), plan.type_m_lba as u64);
        writer.write_region(&path_table::encode(&plan, Endian::Big))?;

        for (done, extent) in plan.extents.iter().enumerate() {
            self.check_cancelled()?;
            debug_assert_eq!(writer.current_lba(), extent.lba as u64);

            let node = tree.get(extent.node);
            match extent.kind {
                ExtentKind::Directory => {
                    writer.write_region(&record::build_directory_extent(tree, &plan, extent.node))?
                }
                ExtentKind::File => writer.write_content(&node.content, node.length, extent.sectors)?,
            }
            self.progress(Some(node.name.to_string()), None, done as u64 + 1);
        }

        debug_assert_eq!(writer.current_lba(), plan.total_sectors as u64);
        let bytes_written = writer.finish()?;

        Ok(BuildSummary {
            output: output.to_path_buf(),
            bytes_written,
            total_sectors: plan.total_sectors,
            directories: tree.directory_count(),
            files: tree.file_count(),
        })
    }

    /// Emit the single terminal event and settle the phase.
    fn conclude(&mut self, result: Result<BuildSummary>) -> Result<BuildSummary> {
        match &result {
            Ok(summary) => {
                let message = format!(
                    "ISO image {} created ({} bytes)",
                    summary.output.display(),
                    summary.bytes_written
                );
                tracing::info!("{}", message);
                self.emit(BuildEvent::Finish(FinishEvent { message }));
                self.enter(BuildPhase::Finished);
            }
            Err(IsoError::Cancelled) => {
                tracing::warn!("Build cancelled during {:?}", self.phase);
                self.emit(BuildEvent::Abort(AbortEvent {
                    message: IsoError::Cancelled.to_string(),
                }));
                self.enter(BuildPhase::Aborted);
            }
            Err(err) => {
                if err.is_pre_write() {
                    tracing::error!("Build rejected before writing: {}", err);
                } else {
                    tracing::error!("Build failed during {:?}: {}", self.phase, err);
                }
                self.emit(BuildEvent::Abort(AbortEvent {
                    message: err.to_string(),
                }));
                self.enter(BuildPhase::Aborted);
            }
        }
        result
    }
}

/// Work for a background build.
#[derive(Debug)]
pub enum BuildJob {
    Tree {
        tree: IsoTree,
        output: PathBuf,
    },
    Folder {
        source: PathBuf,
        output: PathBuf,
        volume_name: String,
    },
}

impl BuildJob {
    fn run<S: EventSink>(self, creator: IsoCreator<S>) -> Result<BuildSummary> {
        match self {
            BuildJob::Tree { tree, output } => creator.build_from_tree(&tree, &output),
            BuildJob::Folder {
                source,
                output,
                volume_name,
            } => creator.build_from_folder(&source, &output, &volume_name),
        }
    }
}

/// A build running on its own thread.
pub struct BuildHandle {
    pub events: mpsc::Receiver<BuildEvent>,
    cancel: CancelToken,
    join: thread::JoinHandle<Result<BuildSummary>>,
}

impl BuildHandle {
    /// Ask the worker to stop at the next extent boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the worker and return its outcome.
    pub fn join(self) -> Result<BuildSummary> {
        self.join.join().unwrap_or(Err(IsoError::WorkerPanicked))
    }
}

/// Start `job` on a worker thread. Events arrive on the handle's receiver.
pub fn spawn_build(job: BuildJob, options: BuildOptions) -> io::Result<BuildHandle> {
    let (tx, rx) = mpsc::channel();
    let cancel = CancelToken::new();
    let creator = IsoCreator::new(tx, cancel.clone(), options);

    let join = thread::Builder::new()
        .name("iso-build".to_string())
        .spawn(move || job.run(creator))?;

    Ok(BuildHandle {
        events: rx,
        cancel,
        join,
    })
}
