// formats
pub const FA: &str = "fa";
pub const FAI: &str = "fa.fai";
pub const GTF: &str = "gtf";
pub const GZ: &str = "gz";
pub const CONFIG_EXT: &str = "config";

// artifact names
pub const FASTA: &str = "fasta";
pub const FASTA_FAI: &str = "fasta-fai";
pub const ANNOTATION: &str = "gtf";
pub const PRE_ANNOTATION: &str = "pre-gtf";
pub const STAR_INDEX: &str = "star-index";
pub const HISAT2_SPLICE_SITES: &str = "hisat2-splice-sites";
pub const HISAT2_INDEX: &str = "hisat2-index";
pub const TRANSCRIPTOME: &str = "transcriptome";
pub const PRE_TRANSCRIPTOME: &str = "pre-transcriptome";
pub const GENTROME: &str = "gentrome";
pub const DECOYS: &str = "decoys";
pub const GENOME_CONFIG: &str = "genome-config";
pub const OUTPUT_DOCS: &str = "output-docs";

// output tree
pub const SEQ_DIR: &str = "seq";
pub const RNASEQ_DIR: &str = "rnaseq";
pub const STAR_DIR: &str = "star";
pub const HISAT2_DIR: &str = "hisat2";
pub const DOCS_DIR: &str = "docs";
pub const GENTROME_FA: &str = "gentrome.fa";
pub const DECOYS_TXT: &str = "decoys.txt";
pub const OUTPUT_MD: &str = "output.md";
pub const PRE_SUFFIX: &str = "_pre";
pub const TX_PREFIX: &str = "tx_";
pub const SPLICE_SITES_SUFFIX: &str = "splice_sites.txt";
pub const EXONS_SUFFIX: &str = "exons.txt";
pub const HISAT2_INDEX_SUFFIX: &str = "hisat2_index";
pub const HT2: &str = "ht2";

// config keys
pub const CPUS: &str = "cpus";
pub const MEMORY: &str = "memory";
pub const GENOME_PATH_VAR: &str = "params.genome_path";

// tools
pub const SHELL: &str = "bash";
pub const SAMTOOLS: &str = "samtools";
pub const STAR: &str = "STAR";
pub const GFFREAD: &str = "gffread";
pub const HISAT2_BUILD: &str = "hisat2-build";
pub const HISAT2_EXTRACT_SPLICE_SITES: &str = "hisat2_extract_splice_sites.py";
pub const HISAT2_EXTRACT_EXONS: &str = "hisat2_extract_exons.py";
pub const CURL: &str = "curl";

// defaults
pub const DEFAULT_HISAT_BUILD_MEMORY_GIB: f64 = 200.0;
pub const GIB: u64 = 1024 * 1024 * 1024;

// collections
pub const REMOTE_SCHEMES: &[&str] = &["http://", "https://", "ftp://"];
pub const RESERVED_STAGE_PARAMS: &[&str] = &[CPUS, MEMORY];
