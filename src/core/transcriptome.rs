use crate::{consts::*, core::StageContext, error::StageFailure, executor::job::Job};

/// Extract transcript sequences with gffread, from both the gtf and the pre-mRNA gtf
///
/// # Arguments
/// * `ctx` - The stage context with fasta, gtf and pre-gtf resolved.
///
/// # Returns
/// Two jobs: `tx_<gtf>.fa` then `tx_<pre-gtf>.fa`.
pub fn build_transcriptome(ctx: &StageContext) -> Result<Vec<Job>, StageFailure> {
    let fasta = ctx.input(FASTA)?;

    let pairs = [
        (ctx.input(ANNOTATION)?, ctx.output(TRANSCRIPTOME)?),
        (ctx.input(PRE_ANNOTATION)?, ctx.output(PRE_TRANSCRIPTOME)?),
    ];

    let jobs = pairs
        .into_iter()
        .map(|(annotation, transcripts)| {
            // INFO: gffread -w {tx}.fa -g {genome}.fa {annotation}.gtf
            Job::new()
                .task(GFFREAD)
                .opt_path("-w", &transcripts)
                .opt_path("-g", fasta)
                .arg(ctx.extra_args())
                .path(annotation)
                .writes(&transcripts)
        })
        .collect();

    Ok(jobs)
}
