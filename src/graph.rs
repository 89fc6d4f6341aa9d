// Stage graph
// Fixed topology of build stages wired together by artifact name

use hashbrown::{HashMap, HashSet};

use std::collections::VecDeque;

use crate::consts::*;
use crate::error::GraphError;
use crate::store::ArtifactKind;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub enum StageId {
    CopyFasta,
    CopyGtf,
    BuildStarIndex,
    BuildHisatSpliceSites,
    BuildHisatIndex,
    BuildTranscriptome,
    BuildGentrome,
    AssembleConfig,
    RenderOutputDocs,
}

impl StageId {
    pub const ALL: [StageId; 9] = [
        Self::CopyFasta,
        Self::CopyGtf,
        Self::BuildStarIndex,
        Self::BuildHisatSpliceSites,
        Self::BuildHisatIndex,
        Self::BuildTranscriptome,
        Self::BuildGentrome,
        Self::AssembleConfig,
        Self::RenderOutputDocs,
    ];

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "copy-fasta" => Ok(Self::CopyFasta),
            "copy-gtf" => Ok(Self::CopyGtf),
            "build-star-index" => Ok(Self::BuildStarIndex),
            "build-hisat-splice-sites" => Ok(Self::BuildHisatSpliceSites),
            "build-hisat-index" => Ok(Self::BuildHisatIndex),
            "build-transcriptome" => Ok(Self::BuildTranscriptome),
            "build-gentrome" | "build-gentrome-and-decoys" => Ok(Self::BuildGentrome),
            "assemble-config" => Ok(Self::AssembleConfig),
            "render-output-docs" => Ok(Self::RenderOutputDocs),
            _ => Err(format!("ERROR: Invalid pipeline stage: {}", s)),
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Self::CopyFasta => "copy-fasta",
            Self::CopyGtf => "copy-gtf",
            Self::BuildStarIndex => "build-star-index",
            Self::BuildHisatSpliceSites => "build-hisat-splice-sites",
            Self::BuildHisatIndex => "build-hisat-index",
            Self::BuildTranscriptome => "build-transcriptome",
            Self::BuildGentrome => "build-gentrome",
            Self::AssembleConfig => "assemble-config",
            Self::RenderOutputDocs => "render-output-docs",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

/// Feature flags selecting the optional branches of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagSet {
    pub build_star: bool,
    pub build_hisat2: bool,
    pub build_transcriptome: bool,
}

impl FlagSet {
    /// Every combination of the three flags.
    pub fn all() -> impl Iterator<Item = FlagSet> {
        (0u8..8).map(|bits| FlagSet {
            build_star: bits & 1 != 0,
            build_hisat2: bits & 2 != 0,
            build_transcriptome: bits & 4 != 0,
        })
    }
}

impl Default for FlagSet {
    fn default() -> Self {
        Self {
            build_star: false,
            build_hisat2: false,
            build_transcriptome: true,
        }
    }
}

/// Declaration of one stage: what it reads, what it writes, when it runs.
#[derive(Debug, Clone)]
pub struct StageDefinition {
    pub id: StageId,
    pub inputs: &'static [&'static str],
    /// Wired when the producer is included, ignored otherwise.
    pub optional_inputs: &'static [&'static str],
    pub outputs: &'static [(&'static str, ArtifactKind)],
    included: fn(&FlagSet) -> bool,
}

impl StageDefinition {
    pub fn is_included(&self, flags: &FlagSet) -> bool {
        (self.included)(flags)
    }

    pub fn produces(&self, artifact: &str) -> bool {
        self.outputs.iter().any(|(name, _)| *name == artifact)
    }

    pub fn consumed(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.inputs
            .iter()
            .chain(self.optional_inputs.iter())
            .copied()
    }
}

fn always(_: &FlagSet) -> bool {
    true
}

fn star(flags: &FlagSet) -> bool {
    flags.build_star
}

fn hisat2(flags: &FlagSet) -> bool {
    flags.build_hisat2
}

fn transcriptome(flags: &FlagSet) -> bool {
    flags.build_transcriptome
}

fn standard_stages() -> Vec<StageDefinition> {
    vec![
        StageDefinition {
            id: StageId::CopyFasta,
            inputs: &[],
            optional_inputs: &[],
            outputs: &[
                (FASTA, ArtifactKind::Sequence),
                (FASTA_FAI, ArtifactKind::SequenceIndex),
            ],
            included: always,
        },
        StageDefinition {
            id: StageId::CopyGtf,
            inputs: &[],
            optional_inputs: &[],
            outputs: &[
                (ANNOTATION, ArtifactKind::Annotation),
                (PRE_ANNOTATION, ArtifactKind::PreAnnotation),
            ],
            included: always,
        },
        StageDefinition {
            id: StageId::BuildStarIndex,
            inputs: &[FASTA, ANNOTATION],
            optional_inputs: &[],
            outputs: &[(STAR_INDEX, ArtifactKind::IndexDir)],
            included: star,
        },
        StageDefinition {
            id: StageId::BuildHisatSpliceSites,
            inputs: &[ANNOTATION],
            optional_inputs: &[],
            outputs: &[(HISAT2_SPLICE_SITES, ArtifactKind::SpliceSites)],
            included: hisat2,
        },
        StageDefinition {
            id: StageId::BuildHisatIndex,
            inputs: &[FASTA, ANNOTATION, HISAT2_SPLICE_SITES],
            optional_inputs: &[],
            outputs: &[(HISAT2_INDEX, ArtifactKind::IndexPrefix)],
            included: hisat2,
        },
        StageDefinition {
            id: StageId::BuildTranscriptome,
            inputs: &[FASTA, ANNOTATION, PRE_ANNOTATION],
            optional_inputs: &[],
            outputs: &[
                (TRANSCRIPTOME, ArtifactKind::Transcriptome),
                (PRE_TRANSCRIPTOME, ArtifactKind::PreTranscriptome),
            ],
            included: transcriptome,
        },
        StageDefinition {
            id: StageId::BuildGentrome,
            inputs: &[FASTA, ANNOTATION, TRANSCRIPTOME],
            optional_inputs: &[],
            outputs: &[
                (GENTROME, ArtifactKind::Gentrome),
                (DECOYS, ArtifactKind::Decoys),
            ],
            included: transcriptome,
        },
        StageDefinition {
            id: StageId::AssembleConfig,
            inputs: &[
                FASTA,
                ANNOTATION,
                TRANSCRIPTOME,
                PRE_TRANSCRIPTOME,
                GENTROME,
                DECOYS,
            ],
            optional_inputs: &[STAR_INDEX, HISAT2_INDEX],
            outputs: &[(GENOME_CONFIG, ArtifactKind::ConfigFile)],
            included: always,
        },
        StageDefinition {
            id: StageId::RenderOutputDocs,
            inputs: &[GENOME_CONFIG],
            optional_inputs: &[
                FASTA,
                FASTA_FAI,
                ANNOTATION,
                PRE_ANNOTATION,
                TRANSCRIPTOME,
                PRE_TRANSCRIPTOME,
                GENTROME,
                DECOYS,
                STAR_INDEX,
                HISAT2_SPLICE_SITES,
                HISAT2_INDEX,
            ],
            outputs: &[(OUTPUT_DOCS, ArtifactKind::Documentation)],
            included: always,
        },
    ]
}

/// The stages scheduled for one flag set, in execution order.
#[derive(Debug, Clone)]
pub struct InducedGraph {
    pub order: Vec<StageId>,
    /// Included stages producing each stage's inputs.
    pub dependencies: HashMap<StageId, HashSet<StageId>>,
}

impl InducedGraph {
    pub fn contains(&self, stage: StageId) -> bool {
        self.order.contains(&stage)
    }

    pub fn dependencies_of(&self, stage: StageId) -> impl Iterator<Item = StageId> + '_ {
        self.dependencies
            .get(&stage)
            .into_iter()
            .flat_map(|deps| deps.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct StageGraph {
    stages: Vec<StageDefinition>,
    /// Stage index producing each artifact
    producers: HashMap<&'static str, usize>,
}

impl StageGraph {
    /// Build and validate the reference preparation topology.
    pub fn standard() -> Result<Self, GraphError> {
        Self::from_definitions(standard_stages())
    }

    pub fn from_definitions(stages: Vec<StageDefinition>) -> Result<Self, GraphError> {
        let mut producers = HashMap::new();

        for (i, stage) in stages.iter().enumerate() {
            for (name, _) in stage.outputs {
                if let Some(existing) = producers.insert(*name, i) {
                    return Err(GraphError::duplicate_producer(format!(
                        "artifact '{}' is produced by both '{}' and '{}'",
                        name, stages[existing].id, stage.id
                    )));
                }
            }
        }

        let graph = Self { stages, producers };
        graph.validate()?;

        Ok(graph)
    }

    /// Validate the full graph (disjoint io, known artifacts, no cycles)
    pub fn validate(&self) -> Result<(), GraphError> {
        for stage in &self.stages {
            let mut seen = HashSet::new();
            for name in stage.consumed() {
                if stage.produces(name) || !seen.insert(name) {
                    return Err(GraphError::overlapping(format!(
                        "stage '{}' declares artifact '{}' more than once",
                        stage.id, name
                    )));
                }
                if !self.producers.contains_key(name) {
                    return Err(GraphError::unknown_artifact(format!(
                        "stage '{}' consumes '{}' which no stage produces",
                        stage.id, name
                    )));
                }
            }
        }

        self.detect_cycles()
    }

    /// Detect cycles in artifact dependencies using DFS
    fn detect_cycles(&self) -> Result<(), GraphError> {
        let mut visited = HashSet::new();
        let mut rec_stack = Vec::new();

        for i in 0..self.stages.len() {
            if !visited.contains(&i) {
                if let Some(cycle) = self.dfs_cycle(i, &mut visited, &mut rec_stack) {
                    return Err(GraphError::cyclic(format!(
                        "circular dependency detected in stages: {}",
                        cycle.join(" -> ")
                    )));
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle(
        &self,
        index: usize,
        visited: &mut HashSet<usize>,
        rec_stack: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        visited.insert(index);
        rec_stack.push(index);

        for name in self.stages[index].consumed() {
            let producer = self.producers[name];

            if let Some(pos) = rec_stack.iter().position(|&s| s == producer) {
                let mut cycle: Vec<String> = rec_stack[pos..]
                    .iter()
                    .map(|&s| self.stages[s].id.to_string())
                    .collect();
                cycle.push(self.stages[producer].id.to_string());
                return Some(cycle);
            }

            if !visited.contains(&producer) {
                if let Some(cycle) = self.dfs_cycle(producer, visited, rec_stack) {
                    return Some(cycle);
                }
            }
        }

        rec_stack.pop();
        None
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn get_stage(&self, id: StageId) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.id == id)
    }

    pub fn producer_of(&self, artifact: &str) -> Option<&StageDefinition> {
        self.producers.get(artifact).map(|&i| &self.stages[i])
    }

    /// Producing stage and kind of an artifact.
    pub fn origin(&self, artifact: &str) -> Option<(StageId, ArtifactKind)> {
        let producer = self.producer_of(artifact)?;
        producer
            .outputs
            .iter()
            .find(|(name, _)| *name == artifact)
            .map(|(_, kind)| (producer.id, *kind))
    }

    /// Select the stages enabled by `flags` and order them topologically.
    ///
    /// Fails with a dangling-input error, before anything runs, when an
    /// included stage requires an artifact whose producer is excluded.
    pub fn induce(&self, flags: &FlagSet) -> Result<InducedGraph, GraphError> {
        let included: Vec<usize> = (0..self.stages.len())
            .filter(|&i| self.stages[i].is_included(flags))
            .collect();
        let included_set: HashSet<usize> = included.iter().copied().collect();

        let mut indices: HashMap<StageId, HashSet<usize>> = HashMap::new();
        for &i in &included {
            let stage = &self.stages[i];
            let mut deps = HashSet::new();

            for name in stage.inputs {
                let producer = self.producers[name];
                if !included_set.contains(&producer) {
                    return Err(GraphError::dangling_input(format!(
                        "stage '{}' requires '{}' but its producer '{}' is disabled by the current flags",
                        stage.id, name, self.stages[producer].id
                    )));
                }
                deps.insert(producer);
            }

            for name in stage.optional_inputs {
                let producer = self.producers[name];
                if included_set.contains(&producer) {
                    deps.insert(producer);
                }
            }

            indices.insert(stage.id, deps);
        }

        // Kahn's algorithm; ties follow declaration order
        let mut in_degree: HashMap<usize, usize> = included
            .iter()
            .map(|&i| (i, indices[&self.stages[i].id].len()))
            .collect();
        let mut queue: VecDeque<usize> = included
            .iter()
            .copied()
            .filter(|i| in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(included.len());

        while let Some(current) = queue.pop_front() {
            order.push(self.stages[current].id);

            for &next in &included {
                if !indices[&self.stages[next].id].contains(&current) {
                    continue;
                }
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        if order.len() != included.len() {
            return Err(GraphError::cyclic(
                "induced graph contains a circular dependency",
            ));
        }

        let dependencies = indices
            .into_iter()
            .map(|(id, deps)| (id, deps.into_iter().map(|i| self.stages[i].id).collect()))
            .collect();

        Ok(InducedGraph {
            order,
            dependencies,
        })
    }
}
