//! Document import engine.
//!
//! Walks a source document and creates or updates target scene nodes so
//! that repeated imports of the same document converge on the same names.
//!
//! - [`config`]: import options
//! - [`report`]: INFO/WARNING/ERROR channel
//! - [`identity`]: identity names of nodes
//! - [`context`]: traversal context and the per-run touched set
//! - [`geometry`]: shape and mesh conversion
//! - [`materials`]: material creation and sharing
//! - [`reconcile`]: mesh and object create-or-update
//! - [`assembler`]: collections, root empty and parenting
//! - [`walker`]: node classification and recursion
//! - [`links`]: link targets and instances
//! - [`postprocess`]: cleanup and auto-smooth passes

pub mod assembler;
pub mod config;
pub mod context;
pub mod geometry;
pub mod identity;
pub mod links;
pub mod materials;
pub mod postprocess;
pub mod reconcile;
pub mod report;
pub mod walker;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::document::{
    AppearanceData, Document, DocumentProvider, GeometryKernel, KernelError, ProviderError,
    ProviderResult,
};
use crate::scene::{SceneDatabase, SceneError};

pub use assembler::SceneAssembler;
pub use config::ImportConfig;
pub use context::{TouchedSet, TraversalContext};
pub use identity::IdentityResolver;
pub use postprocess::PostPassStats;
pub use report::{CollectingReport, LogReport, ReportEntry, ReportSink, Severity};
pub use walker::{classify, Dispatch, SkipReason, WalkOutcome};

use postprocess::run_post_passes;
use walker::ImportSession;

/// Errors that abort an import.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Import engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Failed to open '{}': {source}", path.display())]
    DocumentOpen {
        path: PathBuf,
        #[source]
        source: ProviderError,
    },

    #[error("Invalid node id: {0}")]
    InvalidNode(usize),

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("Geometry error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Document error: {0}")]
    Provider(#[from] ProviderError),
}

/// Result type for imports.
pub type ImportResult<T> = Result<T, ImportError>;

/// Outcome of importing one document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Document file name
    pub document: String,

    /// Root nodes walked
    pub roots: usize,

    /// Object identity names reconciled
    pub objects_touched: usize,

    /// Mesh identity names reconciled
    pub meshes_touched: usize,

    /// Nodes skipped as hidden, filtered or unsupported
    pub skipped: usize,

    pub post: PostPassStats,
}

/// Import an opened document into `scene`.
///
/// Traversal errors are reported as ERROR before being returned; the scene
/// keeps whatever was reconciled up to that point.
pub fn import_document(
    scene: &mut SceneDatabase,
    document: &Document,
    appearance: &AppearanceData,
    config: &ImportConfig,
    kernel: &dyn GeometryKernel,
    report: &mut dyn ReportSink,
) -> ImportResult<ImportSummary> {
    report.report(
        Severity::Info,
        &format!("Importing '{}' ({} nodes)", document.file_name, document.len()),
        0,
    );

    let mut touched = TouchedSet::new();
    let result = SceneAssembler::prepare(scene, &mut touched, document, config)
        .map_err(ImportError::from)
        .and_then(|assembler| {
            ImportSession::new(
                config,
                kernel,
                &mut *report,
                &mut *scene,
                document,
                appearance,
                assembler,
            )
            .run(&mut touched)
        });
    let stats = match result {
        Ok(stats) => stats,
        Err(error) => {
            report.report(
                Severity::Error,
                &format!("Import of '{}' failed: {}", document.file_name, error),
                0,
            );
            return Err(error);
        }
    };

    let post = run_post_passes(scene, &touched, config);
    let summary = ImportSummary {
        document: document.file_name.clone(),
        roots: stats.roots,
        objects_touched: touched.object_count(),
        meshes_touched: touched.mesh_count(),
        skipped: stats.skipped,
        post,
    };
    report.report(
        Severity::Info,
        &format!(
            "Imported '{}': {} objects, {} meshes",
            summary.document, summary.objects_touched, summary.meshes_touched
        ),
        0,
    );
    Ok(summary)
}

/// Closes the opened document on every exit path.
struct DocumentGuard<'p, P: DocumentProvider + ?Sized> {
    provider: &'p mut P,
    document: Option<String>,
}

impl<'p, P: DocumentProvider + ?Sized> DocumentGuard<'p, P> {
    fn new(provider: &'p mut P) -> Self {
        Self {
            provider,
            document: None,
        }
    }

    fn open(&mut self, path: &Path) -> ProviderResult<Document> {
        let document = self.provider.open(path)?;
        self.document = Some(document.name.clone());
        Ok(document)
    }

    fn appearance(&mut self, document: &Document) -> ProviderResult<AppearanceData> {
        self.provider.appearance(document)
    }
}

impl<P: DocumentProvider + ?Sized> Drop for DocumentGuard<'_, P> {
    fn drop(&mut self) {
        log::debug!("Closing document {:?}", self.document);
        self.provider.close(self.document.as_deref());
    }
}

/// Imports document files through a provider and a geometry kernel.
pub struct Importer<P, K, R> {
    provider: P,
    kernel: K,
    report: R,
    config: ImportConfig,
}

impl<P: DocumentProvider, K: GeometryKernel, R: ReportSink> Importer<P, K, R> {
    pub fn new(provider: P, kernel: K, report: R, config: ImportConfig) -> Self {
        Self {
            provider,
            kernel,
            report,
            config,
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn report(&self) -> &R {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut R {
        &mut self.report
    }

    /// Verify the document backend and geometry kernel can be used.
    pub fn check_engine(&mut self) -> ImportResult<()> {
        let problem = match (self.provider.check_available(), self.kernel.check_available()) {
            (Err(error), _) => Some(error.to_string()),
            (_, Err(error)) => Some(error.to_string()),
            _ => None,
        };
        match problem {
            Some(problem) => {
                self.report.report(
                    Severity::Error,
                    &format!(
                        "{}. Install the CAD application's libraries or point the importer at them, then retry.",
                        problem
                    ),
                    0,
                );
                Err(ImportError::EngineUnavailable(problem))
            }
            None => Ok(()),
        }
    }

    /// Import one document file.
    pub fn import_file(
        &mut self,
        scene: &mut SceneDatabase,
        path: impl AsRef<Path>,
    ) -> ImportResult<ImportSummary> {
        self.check_engine()?;
        self.import_opened(scene, path.as_ref())
    }

    /// Import several document files in order. Stops at the first error.
    pub fn import_files<I>(
        &mut self,
        scene: &mut SceneDatabase,
        paths: I,
    ) -> ImportResult<Vec<ImportSummary>>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        self.check_engine()?;
        paths
            .into_iter()
            .map(|path| self.import_opened(scene, path.as_ref()))
            .collect()
    }

    fn import_opened(
        &mut self,
        scene: &mut SceneDatabase,
        path: &Path,
    ) -> ImportResult<ImportSummary> {
        self.report
            .report(Severity::Info, &format!("Opening '{}'", path.display()), 0);

        let mut guard = DocumentGuard::new(&mut self.provider);
        let document = match guard.open(path) {
            Ok(document) => document,
            Err(source) => {
                self.report.report(
                    Severity::Error,
                    &format!("Unable to open '{}': {}", path.display(), source),
                    0,
                );
                return Err(ImportError::DocumentOpen {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let appearance = match guard.appearance(&document) {
            Ok(appearance) => appearance,
            Err(source) => {
                self.report.report(
                    Severity::Error,
                    &format!("Unable to read appearance of '{}': {}", path.display(), source),
                    0,
                );
                return Err(ImportError::Provider(source));
            }
        };

        import_document(
            scene,
            &document,
            &appearance,
            &self.config,
            &self.kernel,
            &mut self.report,
        )
    }
}
