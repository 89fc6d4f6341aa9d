use hashbrown::{HashMap, HashSet};
use serde::Deserialize;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::consts::*;
use crate::error::ConfigError;
use crate::graph::{FlagSet, StageId};
use crate::resources::{parse_memory, ResourceContext};

/// A struct representing a configuration file.
///
/// # Fields
///
/// * `metadata` - Organism, genome build and release naming the output namespace.
/// * `global` - Inputs, output root, feature flags and default resources.
/// * `params` - Per-stage resource overrides and extra tool arguments.
///
/// # Example
///
/// ``` toml
/// [metadata]
/// organism = "Ddummy"
/// genome = "Dummy"
/// release = "1"
///
/// [global]
/// fasta = "dummy.fa.gz"
/// gtf = "dummy.gtf"
/// outdir = "refs"
/// build_hisat2 = true
///
/// [params.build-hisat-index]
/// memory = "256.GB"
/// ```
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub global: Global,
    #[serde(default, deserialize_with = "deserialize_to_hash")]
    pub params: HashMap<StageId, StageParams>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Metadata {
    pub organism: Option<String>,
    pub genome: Option<String>,
    pub release: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Global {
    pub fasta: Option<String>,
    pub gtf: Option<String>,
    pub outdir: Option<PathBuf>,
    pub build_star: bool,
    pub build_hisat2: bool,
    pub build_transcriptome: bool,
    /// GiB above which hisat2-build gets exon hints
    pub hisat_build_memory: f64,
    pub cpus: Option<usize>,
    pub memory: Option<String>,
    pub max_forks: Option<usize>,
}

impl Default for Global {
    fn default() -> Self {
        let flags = FlagSet::default();

        Self {
            fasta: None,
            gtf: None,
            outdir: None,
            build_star: flags.build_star,
            build_hisat2: flags.build_hisat2,
            build_transcriptome: flags.build_transcriptome,
            hisat_build_memory: DEFAULT_HISAT_BUILD_MEMORY_GIB,
            cpus: None,
            memory: None,
            max_forks: None,
        }
    }
}

impl Config {
    /// Read a configuration file and return a Config struct.
    ///
    /// # Example
    ///
    /// ``` rust, no_run
    /// use genomeprep::config::Config;
    /// use std::path::PathBuf;
    ///
    /// let config = Config::read(PathBuf::from("config.toml"));
    /// ```
    pub fn read(config: PathBuf) -> Result<Self, ConfigError> {
        let mut contents = String::new();
        File::open(&config)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .map_err(|source| ConfigError::Read {
                path: config.clone(),
                source,
            })?;

        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn flags(&self) -> FlagSet {
        FlagSet {
            build_star: self.global.build_star,
            build_hisat2: self.global.build_hisat2,
            build_transcriptome: self.global.build_transcriptome,
        }
    }

    /// Validate the config and resolve everything a run needs.
    ///
    /// Local inputs must exist; remote inputs are taken as given.
    pub fn load(&self) -> Result<RunContext, ConfigError> {
        let params = self.run_parameters()?;
        let layout = params.layout();
        let resources = self.resource_profile()?;

        let extra_args = self
            .params
            .iter()
            .map(|(stage, values)| (*stage, values.flat(Some(RESERVED_STAGE_PARAMS.to_vec()))))
            .filter(|(_, args)| !args.is_empty())
            .collect();

        let max_forks = self.global.max_forks.unwrap_or_else(num_cpus::get).max(1);

        Ok(RunContext {
            params,
            layout,
            resources,
            extra_args,
            max_forks,
        })
    }

    pub fn run_parameters(&self) -> Result<RunParameters, ConfigError> {
        let organism = required(&self.metadata.organism, "organism")?;
        let genome = required(&self.metadata.genome, "genome")?;
        let release = required(&self.metadata.release, "release")?;

        let fasta = InputSource::resolve(FASTA, required(&self.global.fasta, FASTA)?)?;
        let gtf = InputSource::resolve(ANNOTATION, required(&self.global.gtf, ANNOTATION)?)?;

        let outdir = self
            .global
            .outdir
            .clone()
            .ok_or(ConfigError::MissingParameter("outdir"))?;
        let outdir = std::path::absolute(&outdir).map_err(|source| ConfigError::Read {
            path: outdir.clone(),
            source,
        })?;

        let threshold = self.global.hisat_build_memory;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::InvalidParameter {
                key: "hisat_build_memory".into(),
                message: format!("expected a non-negative number of GiB, got {}", threshold),
            });
        }

        Ok(RunParameters {
            organism,
            genome,
            release,
            fasta,
            gtf,
            outdir,
            flags: self.flags(),
            hisat_build_memory_gib: threshold,
        })
    }

    pub fn resource_profile(&self) -> Result<ResourceProfile, ConfigError> {
        let memory = self
            .global
            .memory
            .as_deref()
            .map(parse_memory)
            .transpose()?;
        let default = ResourceContext::new(self.global.cpus.unwrap_or_else(num_cpus::get), memory);

        let mut stages = HashMap::new();
        for (stage, values) in &self.params {
            let cpus = match values.get(CPUS) {
                Some(ParamValue::Int(n)) if *n > 0 => *n as usize,
                Some(other) => {
                    return Err(ConfigError::InvalidParameter {
                        key: format!("params.{}.{}", stage, CPUS),
                        message: format!("expected a positive integer, got {}", other),
                    })
                }
                None => default.cpus,
            };
            let memory = match values.get(MEMORY) {
                Some(ParamValue::Str(s)) => Some(parse_memory(s)?),
                Some(other) => {
                    return Err(ConfigError::InvalidParameter {
                        key: format!("params.{}.{}", stage, MEMORY),
                        message: format!("expected a string such as \"64.GB\", got {}", other),
                    })
                }
                None => default.memory,
            };

            stages.insert(*stage, ResourceContext::new(cpus, memory));
        }

        Ok(ResourceProfile { default, stages })
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingParameter(name)),
    }
}

/// Everything a run needs, validated and immutable once built.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub params: RunParameters,
    pub layout: OutputLayout,
    pub resources: ResourceProfile,
    /// Extra tool arguments per stage, already flattened
    pub extra_args: HashMap<StageId, String>,
    pub max_forks: usize,
}

impl RunContext {
    pub fn extra_args(&self, stage: StageId) -> Option<&str> {
        self.extra_args.get(&stage).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    pub organism: String,
    pub genome: String,
    pub release: String,
    pub fasta: InputSource,
    pub gtf: InputSource,
    pub outdir: PathBuf,
    pub flags: FlagSet,
    pub hisat_build_memory_gib: f64,
}

impl RunParameters {
    /// `<genome>.<release>`, used as the file basename throughout the tree.
    pub fn build_name(&self) -> String {
        format!("{}.{}", self.genome, self.release)
    }

    /// `<organism>/<genome>.<release>`
    pub fn namespace(&self) -> String {
        format!("{}/{}", self.organism, self.build_name())
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.outdir, &self.organism, &self.build_name())
    }
}

/// Where an input file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Local(PathBuf),
    Remote(String),
}

impl InputSource {
    pub fn resolve(name: &'static str, value: String) -> Result<Self, ConfigError> {
        if REMOTE_SCHEMES.iter().any(|scheme| value.starts_with(scheme)) {
            return Ok(Self::Remote(value));
        }

        let path = PathBuf::from(&value);
        std::fs::canonicalize(&path)
            .map(Self::Local)
            .map_err(|_| ConfigError::UnresolvedInput { name, path })
    }

    pub fn is_gzipped(&self) -> bool {
        let location = match self {
            Self::Local(path) => path.to_string_lossy().into_owned(),
            Self::Remote(url) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
        };

        location.ends_with(&format!(".{}", GZ))
    }
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Global and per-stage resources.
#[derive(Debug, Clone)]
pub struct ResourceProfile {
    pub default: ResourceContext,
    pub stages: HashMap<StageId, ResourceContext>,
}

impl ResourceProfile {
    pub fn uniform(default: ResourceContext) -> Self {
        Self {
            default,
            stages: HashMap::new(),
        }
    }

    pub fn for_stage(&self, stage: StageId) -> ResourceContext {
        self.stages.get(&stage).copied().unwrap_or(self.default)
    }
}

/// Output tree of one run, rooted at `outdir/organism/genome.release`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    outdir: PathBuf,
    root: PathBuf,
    build: String,
}

impl OutputLayout {
    pub fn new(outdir: &Path, organism: &str, build: &str) -> Self {
        Self {
            outdir: outdir.to_path_buf(),
            root: outdir.join(organism).join(build),
            build: build.to_string(),
        }
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn seq_dir(&self) -> PathBuf {
        self.root.join(SEQ_DIR)
    }

    pub fn rnaseq_dir(&self) -> PathBuf {
        self.root.join(RNASEQ_DIR)
    }

    pub fn star_dir(&self) -> PathBuf {
        self.root.join(STAR_DIR)
    }

    pub fn hisat2_dir(&self) -> PathBuf {
        self.root.join(HISAT2_DIR)
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.root.join(DOCS_DIR)
    }

    /// Exon coordinates side-file of the exon-aware hisat2 build.
    pub fn hisat2_exons(&self) -> PathBuf {
        self.hisat2_dir()
            .join(format!("{}.{}", self.build, EXONS_SUFFIX))
    }

    /// Canonical location of a named artifact.
    pub fn expected(&self, artifact: &str) -> Option<PathBuf> {
        let b = &self.build;

        let path = match artifact {
            FASTA => self.seq_dir().join(format!("{b}.{FA}")),
            FASTA_FAI => self.seq_dir().join(format!("{b}.{FAI}")),
            ANNOTATION => self.rnaseq_dir().join(format!("{b}.{GTF}")),
            PRE_ANNOTATION => self.rnaseq_dir().join(format!("{b}{PRE_SUFFIX}.{GTF}")),
            TRANSCRIPTOME => self.rnaseq_dir().join(format!("{TX_PREFIX}{b}.{FA}")),
            PRE_TRANSCRIPTOME => self
                .rnaseq_dir()
                .join(format!("{TX_PREFIX}{b}{PRE_SUFFIX}.{FA}")),
            GENTROME => self.rnaseq_dir().join(GENTROME_FA),
            DECOYS => self.rnaseq_dir().join(DECOYS_TXT),
            STAR_INDEX => self.star_dir(),
            HISAT2_SPLICE_SITES => self
                .hisat2_dir()
                .join(format!("{b}.{SPLICE_SITES_SUFFIX}")),
            HISAT2_INDEX => self
                .hisat2_dir()
                .join(format!("{b}.{HISAT2_INDEX_SUFFIX}")),
            GENOME_CONFIG => self.root.join(format!("{b}.{CONFIG_EXT}")),
            OUTPUT_DOCS => self.docs_dir().join(OUTPUT_MD),
            _ => return None,
        };

        Some(path)
    }

    /// Path of `path` below the run root, if it is inside it.
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct StageParams {
    #[serde(flatten)]
    values: std::collections::BTreeMap<String, ParamValue>,
}

impl StageParams {
    /// Flatten into command-line arguments, skipping `exclude` keys.
    ///
    /// Keys longer than two characters become `--key value`, others `-k value`.
    pub fn flat(&self, exclude: Option<Vec<&str>>) -> String {
        let exclude = exclude
            .unwrap_or_default()
            .into_iter()
            .collect::<HashSet<_>>();

        self.values
            .iter()
            .filter(|(key, _)| !exclude.contains(key.as_str()))
            .map(|(key, value)| {
                let mut argument = if key.len() > 2 {
                    format!("--{} ", key)
                } else {
                    format!("-{} ", key)
                };

                argument.push_str(&value.to_string());
                argument
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(flt) => write!(f, "{}", flt),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Str(s) => write!(f, "{}", s),
        }
    }
}

fn deserialize_to_hash<'de, D>(deserializer: D) -> Result<HashMap<StageId, StageParams>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: std::collections::HashMap<String, StageParams> =
        std::collections::HashMap::deserialize(deserializer)?;

    raw.into_iter()
        .map(|(key, value)| StageId::from_str(&key).map(|stage| (stage, value)))
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
        let fasta = dir.join("dummy.fa.gz");
        let gtf = dir.join("dummy.gtf");
        std::fs::write(&fasta, b"").unwrap();
        std::fs::write(&gtf, b"").unwrap();
        (fasta, gtf)
    }

    fn toml_for(dir: &Path, extra: &str) -> String {
        let (fasta, gtf) = write_inputs(dir);
        format!(
            r#"
[metadata]
organism = "Ddummy"
genome = "Dummy"
release = "1"

[global]
fasta = "{}"
gtf = "{}"
outdir = "{}"
{}
"#,
            fasta.display(),
            gtf.display(),
            dir.join("refs").display(),
            extra
        )
    }

    #[test]
    fn loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::parse(&toml_for(dir.path(), "")).unwrap();
        let ctx = config.load().unwrap();

        assert_eq!(ctx.params.flags, FlagSet::default());
        assert_eq!(ctx.params.hisat_build_memory_gib, 200.0);
        assert_eq!(ctx.params.namespace(), "Ddummy/Dummy.1");
        assert!(ctx.params.fasta.is_gzipped());
        assert!(!ctx.params.gtf.is_gzipped());
        assert_eq!(ctx.resources.default.memory, None);
        assert!(ctx.extra_args.is_empty());
    }

    #[test]
    fn missing_metadata_is_reported() {
        let config = Config::parse("[global]\nfasta = \"x\"\n").unwrap();

        assert_matches!(
            config.run_parameters(),
            Err(ConfigError::MissingParameter("organism"))
        );
    }

    #[test]
    fn missing_local_input_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let contents = toml_for(dir.path(), "").replace("dummy.gtf", "absent.gtf");
        let config = Config::parse(&contents).unwrap();

        assert_matches!(
            config.run_parameters(),
            Err(ConfigError::UnresolvedInput { name: "gtf", .. })
        );
    }

    #[test]
    fn remote_inputs_are_not_checked() {
        let source = InputSource::resolve(FASTA, "https://example.org/dummy.fa.gz?raw=1".into()).unwrap();

        assert_eq!(
            source,
            InputSource::Remote("https://example.org/dummy.fa.gz?raw=1".into())
        );
        assert!(source.is_gzipped());
    }

    #[test]
    fn stage_params_override_resources_and_add_args() {
        let dir = tempfile::tempdir().unwrap();
        let contents = toml_for(
            dir.path(),
            r#"
cpus = 4
memory = "64.GB"

[params.build-hisat-index]
memory = "256.GB"

[params.build-star-index]
cpus = 2
sjdbOverhang = 100
"#,
        );
        let ctx = Config::parse(&contents).unwrap().load().unwrap();

        let hisat = ctx.resources.for_stage(StageId::BuildHisatIndex);
        assert_eq!(hisat.cpus, 4);
        assert_eq!(hisat.memory, Some(256 * GIB));

        let star = ctx.resources.for_stage(StageId::BuildStarIndex);
        assert_eq!(star.cpus, 2);
        assert_eq!(star.memory, Some(64 * GIB));

        assert_eq!(ctx.resources.for_stage(StageId::CopyFasta).memory, Some(64 * GIB));
        assert_eq!(ctx.extra_args(StageId::BuildStarIndex), Some("--sjdbOverhang 100"));
        assert_eq!(ctx.extra_args(StageId::BuildHisatIndex), None);
    }

    #[test]
    fn unknown_stage_in_params_fails_to_parse() {
        assert!(Config::parse("[params.ccs]\nmemory = \"1.GB\"\n").is_err());
    }

    #[test]
    fn invalid_memory_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let contents = toml_for(dir.path(), "\n[params.build-hisat-index]\nmemory = 12\n");
        let config = Config::parse(&contents).unwrap();

        assert_matches!(
            config.resource_profile(),
            Err(ConfigError::InvalidParameter { .. })
        );
    }

    #[test]
    fn layout_matches_the_output_tree() {
        let layout = OutputLayout::new(Path::new("/refs"), "Ddummy", "Dummy.1");
        let root = Path::new("/refs/Ddummy/Dummy.1");

        let cases = [
            (FASTA, "seq/Dummy.1.fa"),
            (FASTA_FAI, "seq/Dummy.1.fa.fai"),
            (ANNOTATION, "rnaseq/Dummy.1.gtf"),
            (PRE_ANNOTATION, "rnaseq/Dummy.1_pre.gtf"),
            (TRANSCRIPTOME, "rnaseq/tx_Dummy.1.fa"),
            (PRE_TRANSCRIPTOME, "rnaseq/tx_Dummy.1_pre.fa"),
            (GENTROME, "rnaseq/gentrome.fa"),
            (DECOYS, "rnaseq/decoys.txt"),
            (STAR_INDEX, "star"),
            (HISAT2_SPLICE_SITES, "hisat2/Dummy.1.splice_sites.txt"),
            (HISAT2_INDEX, "hisat2/Dummy.1.hisat2_index"),
            (GENOME_CONFIG, "Dummy.1.config"),
            (OUTPUT_DOCS, "docs/output.md"),
        ];

        for (name, relative) in cases {
            assert_eq!(layout.expected(name).unwrap(), root.join(relative), "{name}");
        }
        assert_eq!(layout.expected("nothing"), None);
    }

    #[test]
    fn flat_formats_short_and_long_keys() {
        let params: StageParams = toml::from_str("k = 21\nseed = 7\nmemory = \"1.GB\"\n").unwrap();

        assert_eq!(params.flat(Some(vec![MEMORY])), "-k 21 --seed 7");
    }
}
