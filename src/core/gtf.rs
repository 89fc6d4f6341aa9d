use crate::{
    consts::*,
    core::{fetch, StageContext},
    error::StageFailure,
    executor::job::Job,
};

// INFO: keep transcript records only, relabelled as exons (pre-mRNA model)
const TRANSCRIPT_AS_EXON: &str = r#"'BEGIN{FS=OFS="\t"} $3=="transcript"{$3="exon"; print}'"#;

/// Copy the annotation into `rnaseq/` and derive the pre-mRNA gtf from it
///
/// # Arguments
/// * `ctx` - The stage context holding the run parameters and layout.
///
/// # Returns
/// A single job writing both `<genome>.<release>.gtf` and `<genome>.<release>_pre.gtf`.
pub fn copy_gtf(ctx: &StageContext) -> Result<Vec<Job>, StageFailure> {
    let gtf = ctx.output(ANNOTATION)?;
    let pre_gtf = ctx.output(PRE_ANNOTATION)?;

    let derive = Job::new()
        .task("awk")
        .arg(TRANSCRIPT_AS_EXON)
        .path(&gtf)
        .redirect(&pre_gtf);

    Ok(vec![fetch(&ctx.run.params.gtf, &gtf).then(derive)])
}
