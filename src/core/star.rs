use crate::{consts::*, core::StageContext, error::StageFailure, executor::job::Job};

/// Generate the STAR genome index under `star/`
///
/// # Arguments
/// * `ctx` - The stage context with the fasta and gtf inputs resolved.
///
/// # Returns
/// A vector of jobs to run
///
/// # Example
/// ```rust, ignore
/// let jobs = star::build_index(&ctx)?;
/// ```
pub fn build_index(ctx: &StageContext) -> Result<Vec<Job>, StageFailure> {
    let fasta = ctx.input(FASTA)?;
    let gtf = ctx.input(ANNOTATION)?;
    let star_dir = ctx.output(STAR_INDEX)?;

    let mkdir = Job::new().task("mkdir -p").path(&star_dir);
    let generate = Job::new()
        .task(STAR)
        .args(&["--runMode", "genomeGenerate", "--runThreadN", &ctx.cpus()])
        .opt_path("--sjdbGTFfile", gtf)
        .opt_path("--genomeDir", &star_dir)
        .opt_path("--genomeFastaFiles", fasta)
        .opt_path("--outFileNamePrefix", star_dir.join(""))
        .arg(ctx.extra_args())
        .writes(star_dir.join("Genome"));

    Ok(vec![mkdir.then(generate)])
}
