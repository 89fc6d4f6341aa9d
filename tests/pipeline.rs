use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;

use genomeprep::config::{Config, RunContext};
use genomeprep::core::{execute, plan};
use genomeprep::error::{GraphError, GraphErrorKind, PipelineError, StageError, StageFailure};
use genomeprep::executor::{Job, JobRunner};
use genomeprep::graph::StageId;
use genomeprep::store::ArtifactStore;

/// Records every job and materialises its declared outputs instead of running it.
#[derive(Default)]
struct FakeRunner {
    fail: Option<StageId>,
    delays: Vec<(StageId, Duration)>,
    calls: Mutex<Vec<(StageId, String)>>,
}

impl FakeRunner {
    fn failing(stage: StageId) -> Self {
        Self {
            fail: Some(stage),
            ..Self::default()
        }
    }

    fn delayed(mut self, stage: StageId, delay: Duration) -> Self {
        self.delays.push((stage, delay));
        self
    }

    fn stages(&self) -> Vec<StageId> {
        let mut stages: Vec<StageId> = self.calls.lock().unwrap().iter().map(|(s, _)| *s).collect();
        stages.dedup();
        stages
    }

    fn commands_of(&self, stage: StageId) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }
}

impl JobRunner for FakeRunner {
    fn run(&self, stage: StageId, job: &Job) -> Result<(), StageFailure> {
        self.calls.lock().unwrap().push((stage, job.cmd().to_string()));

        if let Some((_, delay)) = self.delays.iter().find(|(s, _)| *s == stage) {
            std::thread::sleep(*delay);
        }

        if self.fail == Some(stage) {
            return Err(StageFailure::Process {
                command: job.cmd().to_string(),
                code: Some(1),
                stderr: "Error: could not parse annotation\n".into(),
            });
        }

        for path in &job.writes {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, b">chr1 dummy\nACGT\n")?;
        }
        Ok(())
    }
}

fn context(dir: &Path, flags: &str) -> RunContext {
    let fasta = dir.join("dummy.fa");
    let gtf = dir.join("dummy.gtf");
    std::fs::write(&fasta, ">chr1 dummy\nACGTACGT\n").unwrap();
    std::fs::write(&gtf, "chr1\tsrc\ttranscript\t1\t8\t.\t+\t.\tgene_id \"g1\";\n").unwrap();

    let toml = format!(
        r#"
[metadata]
organism = "Ddummy"
genome = "Dummy"
release = "1"

[global]
fasta = '{}'
gtf = '{}'
outdir = '{}'
cpus = 2
max_forks = 3
{}
"#,
        fasta.display(),
        gtf.display(),
        dir.join("refs").display(),
        flags
    );

    Config::parse(&toml).unwrap().load().unwrap()
}

const HISAT_ONLY: &str = "build_star = false\nbuild_hisat2 = true\nbuild_transcriptome = true";

#[test]
fn hisat_only_build_skips_star_and_writes_config() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), HISAT_ONLY);
    let store = ArtifactStore::new();
    let runner = Arc::new(FakeRunner::default());

    let report = execute(&ctx, &store, runner.clone()).unwrap();

    let mut stages = report.stages();
    stages.sort_by_key(|s| s.to_str());
    let mut expected = vec![
        StageId::CopyFasta,
        StageId::CopyGtf,
        StageId::BuildHisatSpliceSites,
        StageId::BuildHisatIndex,
        StageId::BuildTranscriptome,
        StageId::BuildGentrome,
        StageId::AssembleConfig,
        StageId::RenderOutputDocs,
    ];
    expected.sort_by_key(|s| s.to_str());
    assert_eq!(stages, expected);

    assert_eq!(report.stages().last(), Some(&StageId::RenderOutputDocs));
    assert!(runner.commands_of(StageId::BuildStarIndex).is_empty());

    let config_path = store.get("genome-config").unwrap();
    assert_eq!(config_path, ctx.layout.root().join("Dummy.1.config"));

    let config = std::fs::read_to_string(config_path).unwrap();
    assert!(config.starts_with(&format!("// params.genome_path = {}\n", ctx.layout.outdir().display())));
    assert!(config.contains(
        "  hisat2_index = \"${params.genome_path}/Ddummy/Dummy.1/hisat2/Dummy.1.hisat2_index\"\n"
    ));
    assert!(!config.contains("star_index"));

    let docs = std::fs::read_to_string(store.get("output-docs").unwrap()).unwrap();
    assert!(docs.contains("hisat2/Dummy.1.hisat2_index"));
}

#[test]
fn failing_stage_stops_downstream_and_keeps_upstream() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), HISAT_ONLY);
    let store = ArtifactStore::new();
    let runner = Arc::new(FakeRunner::failing(StageId::BuildTranscriptome));

    let err = execute(&ctx, &store, runner.clone()).unwrap_err();

    assert_matches!(
        err,
        PipelineError::Stage(StageError {
            stage: StageId::BuildTranscriptome,
            cause: StageFailure::Process { code: Some(1), ref stderr, .. },
        }) if stderr.contains("could not parse annotation")
    );

    assert!(!runner.stages().contains(&StageId::BuildGentrome));
    assert!(!store.contains("gentrome"));
    assert!(!store.contains("genome-config"));
    assert!(!ctx.layout.root().join("Dummy.1.config").exists());

    assert_eq!(
        store.get("fasta").unwrap(),
        ctx.layout.root().join("seq/Dummy.1.fa")
    );
    assert!(store.contains("gtf"));
    assert!(store.contains("pre-gtf"));
}

#[test]
fn stage_running_at_failure_is_not_registered() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), HISAT_ONLY);
    let store = ArtifactStore::new();
    let runner = Arc::new(
        FakeRunner::failing(StageId::CopyFasta)
            .delayed(StageId::CopyFasta, Duration::from_millis(50))
            .delayed(StageId::CopyGtf, Duration::from_millis(300)),
    );

    let err = execute(&ctx, &store, runner.clone()).unwrap_err();

    assert_matches!(
        err,
        PipelineError::Stage(StageError { stage: StageId::CopyFasta, .. })
    );

    let mut stages = runner.stages();
    stages.sort_by_key(|s| s.to_str());
    assert_eq!(stages, vec![StageId::CopyFasta, StageId::CopyGtf]);

    // copy-gtf finished on disk but nothing downstream saw it
    assert!(ctx.layout.expected("gtf").unwrap().exists());
    assert!(!store.contains("gtf"));
    assert!(!store.contains("pre-gtf"));
    assert!(store.is_empty());
}

#[test]
fn stale_star_index_is_not_documented() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), HISAT_ONLY);
    let star = ctx.layout.star_dir();
    std::fs::create_dir_all(&star).unwrap();
    std::fs::write(star.join("SA"), b"").unwrap();

    let store = ArtifactStore::new();
    execute(&ctx, &store, Arc::new(FakeRunner::default())).unwrap();

    let config = std::fs::read_to_string(store.get("genome-config").unwrap()).unwrap();
    let docs = std::fs::read_to_string(store.get("output-docs").unwrap()).unwrap();

    assert!(!config.contains("star_index"));
    assert!(!docs.contains("star-index"));
    assert!(docs.contains("| hisat2-index |"));
    assert!(!docs.contains("hisat2-exons"));
}

#[test]
fn every_flag_builds_star_and_hisat2() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(
        dir.path(),
        "build_star = true\nbuild_hisat2 = true\nbuild_transcriptome = true",
    );
    let store = ArtifactStore::new();
    let runner = Arc::new(FakeRunner::default());

    let report = execute(&ctx, &store, runner.clone()).unwrap();

    assert_eq!(report.completed.len(), 9);
    let config = std::fs::read_to_string(store.get("genome-config").unwrap()).unwrap();
    let hisat = config.find("hisat2_index").unwrap();
    let star = config.find("star_index").unwrap();
    assert!(hisat < star);
    assert!(runner.commands_of(StageId::BuildStarIndex)[0].contains("--runThreadN 2"));
}

#[test]
fn disabled_transcriptome_is_rejected_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), "build_transcriptome = false");
    let store = ArtifactStore::new();
    let runner = Arc::new(FakeRunner::default());

    assert_matches!(
        execute(&ctx, &store, runner.clone()),
        Err(PipelineError::Graph(GraphError { kind: GraphErrorKind::DanglingInput, .. }))
    );
    assert!(runner.stages().is_empty());
    assert!(store.is_empty());
    assert!(!ctx.layout.root().exists());
}

#[test]
fn plan_lists_commands_without_running_them() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), HISAT_ONLY);

    let planned = plan(&ctx).unwrap();

    assert_eq!(planned.len(), 8);
    assert_eq!(planned[0].0, StageId::CopyFasta);

    let (_, hisat) = planned
        .iter()
        .find(|(stage, _)| *stage == StageId::BuildHisatIndex)
        .unwrap();
    assert_eq!(hisat.len(), 1);
    assert!(hisat[0].starts_with("hisat2-build -p 2 --ss "));

    let (_, config) = planned
        .iter()
        .find(|(stage, _)| *stage == StageId::AssembleConfig)
        .unwrap();
    assert_eq!(config[0], format!("writes {}", ctx.layout.root().join("Dummy.1.config").display()));

    assert!(!ctx.layout.root().exists());
}
