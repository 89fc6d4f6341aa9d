use crate::{consts::*, core::StageContext, error::StageFailure, executor::job::Job};

/// Build the decoy-aware gentrome: decoy names from the genome headers,
/// then transcriptome and genome concatenated in that order
///
/// # Arguments
/// * `ctx` - The stage context with fasta and transcriptome resolved.
///
/// # Returns
/// A vector of jobs to run
pub fn build_gentrome(ctx: &StageContext) -> Result<Vec<Job>, StageFailure> {
    let fasta = ctx.input(FASTA)?;
    let transcriptome = ctx.input(TRANSCRIPTOME)?;
    let gentrome = ctx.output(GENTROME)?;
    let decoys = ctx.output(DECOYS)?;

    // INFO: grep '^>' {genome}.fa | cut -d ' ' -f 1 | sed 's/>//g' > decoys.txt
    let names = Job::new()
        .task("grep")
        .arg("'^>'")
        .path(fasta)
        .pipe("cut -d ' ' -f 1")
        .pipe("sed 's/>//g'")
        .redirect(&decoys);

    let concat = Job::new()
        .task("cat")
        .path(transcriptome)
        .path(fasta)
        .redirect(&gentrome);

    Ok(vec![names, concat])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{run_context, stage};
    use crate::graph::{FlagSet, StageGraph, StageId};
    use std::path::Path;

    #[test]
    fn writes_decoys_then_gentrome() {
        let ctx = run_context(Path::new("/refs"), FlagSet::default(), None);
        let graph = StageGraph::standard().unwrap();

        let jobs = build_gentrome(&stage(&graph, &ctx, StageId::BuildGentrome)).unwrap();

        assert_eq!(
            jobs[0].cmd(),
            "grep '^>' '/refs/Ddummy/Dummy.1/seq/Dummy.1.fa' | cut -d ' ' -f 1 | sed 's/>//g' > '/refs/Ddummy/Dummy.1/rnaseq/decoys.txt'"
        );
        assert_eq!(
            jobs[1].cmd(),
            "cat '/refs/Ddummy/Dummy.1/rnaseq/tx_Dummy.1.fa' '/refs/Ddummy/Dummy.1/seq/Dummy.1.fa' > '/refs/Ddummy/Dummy.1/rnaseq/gentrome.fa'"
        );
    }
}
