pub mod assemble;
pub mod docs;
pub mod fasta;
pub mod gentrome;
pub mod gtf;
pub mod hisat2;
pub mod star;
pub mod transcriptome;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{InputSource, RunContext};
use crate::consts::*;
use crate::error::{PipelineError, StageError, StageFailure, StoreError};
use crate::executor::job::{quote, quote_str, Job};
use crate::executor::runner::{JobRunner, ShellRunner};
use crate::executor::scheduler::{RunReport, Scheduler};
use crate::graph::{StageDefinition, StageGraph, StageId};
use crate::resources::ResourceContext;
use crate::store::{Artifact, ArtifactKind, ArtifactStore, Artifacts};

/// Read-only view a stage body gets of the run.
#[derive(Debug, Clone)]
pub struct StageContext<'a> {
    pub stage: StageId,
    pub run: &'a RunContext,
    pub resources: ResourceContext,
    /// Declared inputs that are present, keyed by artifact name
    pub inputs: Artifacts,
}

impl<'a> StageContext<'a> {
    /// Resolve the stage's inputs from the store.
    ///
    /// Optional inputs are picked up only when they have been produced.
    pub fn resolve(
        definition: &StageDefinition,
        run: &'a RunContext,
        store: &ArtifactStore,
    ) -> Result<Self, StoreError> {
        let mut inputs = Artifacts::new();

        for name in definition.inputs {
            inputs.insert(name.to_string(), store.artifact(name)?);
        }
        for name in definition.optional_inputs {
            if let Ok(artifact) = store.artifact(name) {
                inputs.insert(name.to_string(), artifact);
            }
        }

        Ok(Self::with_inputs(definition.id, run, inputs))
    }

    /// Inputs at their canonical layout paths, for planning without a store.
    ///
    /// Optional inputs are projected only when their producer is `included`.
    pub fn projected(
        definition: &StageDefinition,
        run: &'a RunContext,
        included: impl Fn(&str) -> Option<(StageId, ArtifactKind)>,
    ) -> Self {
        let mut inputs = Artifacts::new();

        for name in definition.consumed() {
            let (Some((producer, kind)), Some(path)) = (included(name), run.layout.expected(name))
            else {
                continue;
            };
            inputs.insert(name.to_string(), Artifact::new(name, path, producer, kind));
        }

        Self::with_inputs(definition.id, run, inputs)
    }

    fn with_inputs(stage: StageId, run: &'a RunContext, inputs: Artifacts) -> Self {
        Self {
            stage,
            run,
            resources: run.resources.for_stage(stage),
            inputs,
        }
    }

    pub fn input(&self, name: &str) -> Result<&Path, StageFailure> {
        self.inputs
            .get(name)
            .map(|artifact| artifact.path.as_path())
            .ok_or_else(|| StoreError::UnresolvedArtifact(name.to_string()).into())
    }

    pub fn output(&self, name: &str) -> Result<PathBuf, StageFailure> {
        self.run
            .layout
            .expected(name)
            .ok_or_else(|| StageFailure::MissingOutput {
                name: name.to_string(),
                path: self.run.layout.root().to_path_buf(),
            })
    }

    pub fn extra_args(&self) -> &str {
        self.run.extra_args(self.stage).unwrap_or_default()
    }

    pub fn cpus(&self) -> String {
        self.resources.cpus.to_string()
    }
}

/// Shell jobs of a stage, in execution order. Native stages have none.
pub fn stage_jobs(ctx: &StageContext) -> Result<Vec<Job>, StageFailure> {
    match ctx.stage {
        StageId::CopyFasta => fasta::copy_fasta(ctx),
        StageId::CopyGtf => gtf::copy_gtf(ctx),
        StageId::BuildStarIndex => star::build_index(ctx),
        StageId::BuildHisatSpliceSites => hisat2::extract_splice_sites(ctx),
        StageId::BuildHisatIndex => hisat2::build_index(ctx),
        StageId::BuildTranscriptome => transcriptome::build_transcriptome(ctx),
        StageId::BuildGentrome => gentrome::build_gentrome(ctx),
        StageId::AssembleConfig | StageId::RenderOutputDocs => Ok(Vec::new()),
    }
}

/// Execute one stage and return the artifacts it materialised.
///
/// Every declared output must exist once the body returns.
pub fn run_stage(
    definition: &StageDefinition,
    run: &RunContext,
    store: &ArtifactStore,
    runner: &dyn JobRunner,
) -> Result<Artifacts, StageFailure> {
    let ctx = StageContext::resolve(definition, run, store)?;

    let mut produced = Artifacts::new();
    for (name, kind) in definition.outputs {
        let path = ctx.output(name)?;
        let dir = match kind {
            ArtifactKind::IndexDir => Some(path.as_path()),
            _ => path.parent(),
        };
        if let Some(dir) = dir {
            std::fs::create_dir_all(dir)?;
        }
        produced.insert(name.to_string(), Artifact::new(*name, path, definition.id, *kind));
    }

    match definition.id {
        StageId::AssembleConfig => assemble::write_config(&ctx)?,
        StageId::RenderOutputDocs => docs::write_docs(&ctx)?,
        _ => {
            for job in stage_jobs(&ctx)? {
                runner.run(definition.id, &job)?;
            }
        }
    }

    for artifact in produced.values() {
        if !artifact.is_materialized() {
            return Err(StageFailure::MissingOutput {
                name: artifact.name.clone(),
                path: artifact.path.clone(),
            });
        }
    }

    Ok(produced)
}

/// Run the pipeline with the shell runner, rooted at the run directory.
///
/// # Example
///
/// ```rust, no_run
/// use genomeprep::config::Config;
/// use std::path::PathBuf;
///
/// let ctx = Config::read(PathBuf::from("config.toml")).unwrap().load().unwrap();
/// let report = genomeprep::core::run(&ctx).unwrap();
/// report.log_summary();
/// ```
pub fn run(ctx: &RunContext) -> Result<RunReport, PipelineError> {
    let store = ArtifactStore::new();
    let runner = Arc::new(ShellRunner::new(ctx.layout.root()));

    execute(ctx, &store, runner)
}

/// Induce the graph for the run's flags and execute it with `runner`.
///
/// `store` is left holding every artifact registered before the run ended,
/// including when a stage fails.
pub fn execute(
    ctx: &RunContext,
    store: &ArtifactStore,
    runner: Arc<dyn JobRunner>,
) -> Result<RunReport, PipelineError> {
    let graph = StageGraph::standard()?;
    let induced = graph.induce(&ctx.params.flags)?;

    log::info!(
        "INFO: building {} with {} stages: {}",
        ctx.params.namespace(),
        induced.len(),
        join_stages(&induced.order)
    );

    std::fs::create_dir_all(ctx.layout.root())?;

    let scheduler = Scheduler::new(&graph, runner, ctx.max_forks)?;
    let report = scheduler.execute(&induced, store, ctx)?;

    Ok(report)
}

/// Stage order and the commands each stage would run, without running them.
pub fn plan(ctx: &RunContext) -> Result<Vec<(StageId, Vec<String>)>, PipelineError> {
    let graph = StageGraph::standard()?;
    let induced = graph.induce(&ctx.params.flags)?;

    let included = |name: &str| {
        graph
            .origin(name)
            .filter(|(producer, _)| induced.contains(*producer))
    };

    let mut planned = Vec::with_capacity(induced.len());
    for stage in &induced.order {
        let Some(definition) = graph.get_stage(*stage) else {
            continue;
        };
        let stage_ctx = StageContext::projected(definition, ctx, included);

        let commands = match stage {
            StageId::AssembleConfig | StageId::RenderOutputDocs => definition
                .outputs
                .iter()
                .filter_map(|(name, _)| ctx.layout.expected(name))
                .map(|path| format!("writes {}", path.display()))
                .collect(),
            _ => stage_jobs(&stage_ctx)
                .map_err(|cause| StageError::new(*stage, cause))?
                .into_iter()
                .map(|job| job.cmd)
                .collect(),
        };

        planned.push((*stage, commands));
    }

    Ok(planned)
}

fn join_stages(stages: &[StageId]) -> String {
    stages
        .iter()
        .map(StageId::to_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Copy or download `source` to `dest`, decompressing gzip on the way.
pub fn fetch(source: &InputSource, dest: &Path) -> Job {
    let gzipped = source.is_gzipped();

    let job = match (source, gzipped) {
        (InputSource::Local(path), false) => Job::new().task("cp").path(path).path(dest),
        (InputSource::Local(path), true) => Job::new()
            .task("gunzip -c")
            .path(path)
            .arg(">")
            .path(dest),
        (InputSource::Remote(url), false) => Job::new()
            .task(CURL)
            .arg("-fsSL")
            .arg(&quote_str(url))
            .arg("-o")
            .path(dest),
        (InputSource::Remote(url), true) => Job::new()
            .task(CURL)
            .arg("-fsSL")
            .arg(&quote_str(url))
            .pipe(&format!("gunzip -c > {}", quote(dest))),
    };

    job.writes(dest)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;

    use crate::config::{
        InputSource, OutputLayout, ResourceProfile, RunContext, RunParameters,
    };
    use crate::core::StageContext;
    use crate::graph::{FlagSet, StageGraph, StageId};
    use crate::resources::ResourceContext;

    /// Stage context with every input projected onto the layout.
    pub fn stage<'a>(graph: &StageGraph, run: &'a RunContext, id: StageId) -> StageContext<'a> {
        let definition = graph.get_stage(id).unwrap();
        StageContext::projected(definition, run, |name| graph.origin(name))
    }

    pub fn run_context(outdir: &Path, flags: FlagSet, memory: Option<u64>) -> RunContext {
        let params = RunParameters {
            organism: "Ddummy".into(),
            genome: "Dummy".into(),
            release: "1".into(),
            fasta: InputSource::Local(outdir.join("input/dummy.fa")),
            gtf: InputSource::Local(outdir.join("input/dummy.gtf")),
            outdir: outdir.to_path_buf(),
            flags,
            hisat_build_memory_gib: 200.0,
        };
        let layout: OutputLayout = params.layout();

        RunContext {
            params,
            layout,
            resources: ResourceProfile::uniform(ResourceContext::new(4, memory)),
            extra_args: Default::default(),
            max_forks: 2,
        }
    }
}
