use std::fmt::Write as _;
use std::path::Path;

use crate::{
    config::OutputLayout,
    consts::*,
    core::StageContext,
    error::StageFailure,
    graph::StageId,
    resources::HisatIndexPlan,
    store::Artifacts,
};

const DESCRIBED: &[(&str, &str)] = &[
    (FASTA, "genome sequence"),
    (FASTA_FAI, "samtools faidx index of the genome"),
    (ANNOTATION, "gene annotation"),
    (PRE_ANNOTATION, "pre-mRNA annotation, transcripts as single exons"),
    (TRANSCRIPTOME, "transcript sequences"),
    (PRE_TRANSCRIPTOME, "pre-mRNA transcript sequences"),
    (GENTROME, "transcriptome followed by the genome, for decoy-aware salmon"),
    (DECOYS, "decoy sequence names"),
    (STAR_INDEX, "STAR genome index"),
    (HISAT2_SPLICE_SITES, "HISAT2 splice sites"),
    (HISAT2_INDEX, "HISAT2 index prefix"),
    (GENOME_CONFIG, "pipeline config pointing at this tree"),
];

/// Write `docs/output.md`, listing the artifacts this run registered.
pub fn write_docs(ctx: &StageContext) -> Result<(), StageFailure> {
    let path = ctx.output(OUTPUT_DOCS)?;
    let exons = exons_built(ctx).then(|| ctx.run.layout.hisat2_exons());
    let contents = render(
        &ctx.inputs,
        &ctx.run.layout,
        &ctx.run.params.namespace(),
        exons.as_deref(),
    );

    std::fs::write(&path, contents)?;
    log::info!("INFO [{}]: wrote {}", ctx.stage, path.display());

    Ok(())
}

/// Whether build-hisat-index ran and took the exon path.
fn exons_built(ctx: &StageContext) -> bool {
    if !ctx.inputs.contains_key(HISAT2_INDEX) {
        return false;
    }

    let resources = ctx.run.resources.for_stage(StageId::BuildHisatIndex);
    HisatIndexPlan::decide(&resources, ctx.run.params.hisat_build_memory_gib).use_exons_and_splices
}

fn render(artifacts: &Artifacts, layout: &OutputLayout, namespace: &str, exons: Option<&Path>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# {}\n", namespace);
    let _ = writeln!(
        out,
        "Generated {} under `{}`.\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        layout.root().display()
    );
    out.push_str("| artifact | path | description |\n");
    out.push_str("| --- | --- | --- |\n");

    for (name, description) in DESCRIBED {
        let Some(artifact) = artifacts.get(*name) else {
            continue;
        };

        let shown = layout.relative(&artifact.path).unwrap_or(&artifact.path);
        let _ = writeln!(out, "| {} | `{}` | {} |", name, shown.display(), description);
    }

    if let Some(exons) = exons {
        let shown = layout.relative(exons).unwrap_or(exons);
        let _ = writeln!(out, "| hisat2-exons | `{}` | HISAT2 exon coordinates |", shown.display());
    }

    out
}
