use crate::{
    consts::*,
    core::{fetch, StageContext},
    error::StageFailure,
    executor::job::Job,
};

/// Copy the genome sequence into `seq/` and index it with samtools
///
/// # Arguments
/// * `ctx` - The stage context holding the run parameters and layout.
///
/// # Returns
/// A single job: fetch (and decompress) the fasta, then `samtools faidx`.
///
/// # Example
/// ```rust, ignore
/// let jobs = fasta::copy_fasta(&ctx)?;
/// assert_eq!(jobs.len(), 1);
/// ```
pub fn copy_fasta(ctx: &StageContext) -> Result<Vec<Job>, StageFailure> {
    let fasta = ctx.output(FASTA)?;
    let fai = ctx.output(FASTA_FAI)?;

    // INFO: samtools faidx writes {fasta}.fai next to the sequence
    let index = Job::new()
        .task(SAMTOOLS)
        .arg("faidx")
        .path(&fasta)
        .writes(&fai);

    Ok(vec![fetch(&ctx.run.params.fasta, &fasta).then(index)])
}
