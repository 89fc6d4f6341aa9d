use crate::{
    consts::*,
    core::StageContext,
    error::StageFailure,
    executor::job::Job,
    resources::HisatIndexPlan,
};

/// Extract splice sites from the annotation for hisat2-build
///
/// # Arguments
/// * `ctx` - The stage context with the gtf input resolved.
///
/// # Returns
/// A vector with one job writing `hisat2/<genome>.<release>.splice_sites.txt`.
pub fn extract_splice_sites(ctx: &StageContext) -> Result<Vec<Job>, StageFailure> {
    let gtf = ctx.input(ANNOTATION)?;
    let splice_sites = ctx.output(HISAT2_SPLICE_SITES)?;

    Ok(vec![Job::new()
        .task(HISAT2_EXTRACT_SPLICE_SITES)
        .path(gtf)
        .redirect(&splice_sites)])
}

/// Build the HISAT2 index, with exon hints only if memory allows
///
/// The plan is decided here, from this stage's own resources, every time
/// the stage runs.
///
/// # Arguments
/// * `ctx` - The stage context with fasta, gtf and splice sites resolved.
///
/// # Returns
/// A vector of jobs to run
///
/// # Example
/// ```rust, ignore
/// let jobs = hisat2::build_index(&ctx)?;
/// ```
pub fn build_index(ctx: &StageContext) -> Result<Vec<Job>, StageFailure> {
    let fasta = ctx.input(FASTA)?;
    let gtf = ctx.input(ANNOTATION)?;
    let splice_sites = ctx.input(HISAT2_SPLICE_SITES)?;
    let prefix = ctx.output(HISAT2_INDEX)?;

    let threshold = ctx.run.params.hisat_build_memory_gib;
    let plan = HisatIndexPlan::decide(&ctx.resources, threshold);

    if !plan.memory_checked {
        log::info!(
            "INFO [{}]: available memory unknown, skipping the {} GiB check and building without exons",
            ctx.stage,
            threshold
        );
    } else if !plan.use_exons_and_splices {
        log::info!(
            "INFO [{}]: {:.1} GiB available, not above {} GiB: building without exons",
            ctx.stage,
            ctx.resources.memory_gib().unwrap_or_default(),
            threshold
        );
    } else {
        log::info!(
            "INFO [{}]: {:.1} GiB available: building with exons and splice sites",
            ctx.stage,
            ctx.resources.memory_gib().unwrap_or_default()
        );
    }

    let mut jobs = Vec::new();
    let mut build = Job::new()
        .task(HISAT2_BUILD)
        .args(&["-p", &ctx.cpus()])
        .opt_path("--ss", splice_sites);

    if plan.use_exons_and_splices {
        let exons = ctx.run.layout.hisat2_exons();
        jobs.push(
            Job::new()
                .task(HISAT2_EXTRACT_EXONS)
                .path(gtf)
                .redirect(&exons),
        );
        build = build.opt_path("--exon", &exons);
    }

    let first_file = format!("{}.1.{}", prefix.display(), HT2);
    jobs.push(
        build
            .arg(ctx.extra_args())
            .path(fasta)
            .path(&prefix)
            .writes(first_file),
    );

    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{run_context, stage};
    use crate::graph::{FlagSet, StageGraph, StageId};
    use std::path::Path;

    fn hisat_flags() -> FlagSet {
        FlagSet {
            build_star: false,
            build_hisat2: true,
            build_transcriptome: true,
        }
    }

    #[test]
    fn splice_sites_redirect_into_hisat2_dir() {
        let ctx = run_context(Path::new("/refs"), hisat_flags(), None);
        let graph = StageGraph::standard().unwrap();

        let jobs = extract_splice_sites(&stage(&graph, &ctx, StageId::BuildHisatSpliceSites)).unwrap();

        assert_eq!(
            jobs[0].cmd(),
            "hisat2_extract_splice_sites.py '/refs/Ddummy/Dummy.1/rnaseq/Dummy.1.gtf' > '/refs/Ddummy/Dummy.1/hisat2/Dummy.1.splice_sites.txt'"
        );
    }

    #[test]
    fn unknown_memory_builds_from_splice_sites_only() {
        let ctx = run_context(Path::new("/refs"), hisat_flags(), None);
        let graph = StageGraph::standard().unwrap();

        let jobs = build_index(&stage(&graph, &ctx, StageId::BuildHisatIndex)).unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(
            jobs[0].cmd(),
            "hisat2-build -p 4 --ss '/refs/Ddummy/Dummy.1/hisat2/Dummy.1.splice_sites.txt' \
             '/refs/Ddummy/Dummy.1/seq/Dummy.1.fa' '/refs/Ddummy/Dummy.1/hisat2/Dummy.1.hisat2_index'"
        );
    }

    #[test]
    fn enough_memory_adds_exon_hints() {
        let ctx = run_context(Path::new("/refs"), hisat_flags(), Some(256 * GIB));
        let graph = StageGraph::standard().unwrap();

        let jobs = build_index(&stage(&graph, &ctx, StageId::BuildHisatIndex)).unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(
            jobs[0].cmd(),
            "hisat2_extract_exons.py '/refs/Ddummy/Dummy.1/rnaseq/Dummy.1.gtf' > '/refs/Ddummy/Dummy.1/hisat2/Dummy.1.exons.txt'"
        );
        assert!(jobs[1]
            .cmd()
            .contains("--exon '/refs/Ddummy/Dummy.1/hisat2/Dummy.1.exons.txt'"));
        assert!(jobs[1].cmd().contains("--ss "));
    }

    #[test]
    fn threshold_memory_stays_on_the_low_path() {
        let ctx = run_context(Path::new("/refs"), hisat_flags(), Some(200 * GIB));
        let graph = StageGraph::standard().unwrap();

        let jobs = build_index(&stage(&graph, &ctx, StageId::BuildHisatIndex)).unwrap();

        assert_eq!(jobs.len(), 1);
        assert!(!jobs[0].cmd().contains("--exon"));
    }
}
