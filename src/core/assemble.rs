use std::fmt::Write as _;

use crate::{
    config::RunParameters,
    consts::*,
    core::StageContext,
    error::{AssembleError, StageFailure},
    store::Artifacts,
};

/// Config keys in the order they are written, paired with their artifact
/// and whether the line is mandatory.
const CONFIG_ENTRIES: &[(&str, &str, bool)] = &[
    ("fasta", FASTA, true),
    ("transcriptome", TRANSCRIPTOME, true),
    ("pre_transcriptome", PRE_TRANSCRIPTOME, true),
    ("gtf", ANNOTATION, true),
    ("gentrome", GENTROME, true),
    ("decoys", DECOYS, true),
    ("hisat2_index", HISAT2_INDEX, false),
    ("star_index", STAR_INDEX, false),
];

/// Renders the consumer config of a finished build.
pub struct ConfigAssembler;

impl ConfigAssembler {
    /// Render the config from a snapshot of the produced artifacts.
    ///
    /// Paths are written relative to `${params.genome_path}` so the tree can
    /// be moved together with its config.
    ///
    /// # Example
    /// ```rust, ignore
    /// let config = ConfigAssembler::render(&store.snapshot(), &ctx.params)?;
    /// ```
    pub fn render(artifacts: &Artifacts, params: &RunParameters) -> Result<String, AssembleError> {
        let layout = params.layout();
        let namespace = params.namespace();

        let mut out = String::new();
        // INFO: writing to a String cannot fail
        let _ = writeln!(out, "// {} = {}", GENOME_PATH_VAR, params.outdir.display());
        out.push_str("params {\n");

        for (key, name, required) in CONFIG_ENTRIES {
            let Some(artifact) = artifacts.get(*name) else {
                if *required {
                    return Err(AssembleError::MissingTerminalArtifact(name.to_string()));
                }
                continue;
            };

            let relative =
                layout
                    .relative(&artifact.path)
                    .ok_or_else(|| AssembleError::OutsideRunRoot {
                        name: name.to_string(),
                        path: artifact.path.clone(),
                    })?;

            let _ = writeln!(
                out,
                "  {} = \"${{{}}}/{}/{}\"",
                key,
                GENOME_PATH_VAR,
                namespace,
                relative.display()
            );
        }

        out.push_str("}\n");
        Ok(out)
    }
}

/// Write the rendered config to `<genome>.<release>.config` in the run root.
pub fn write_config(ctx: &StageContext) -> Result<(), StageFailure> {
    let config = ConfigAssembler::render(&ctx.inputs, &ctx.run.params)?;
    let path = ctx.output(GENOME_CONFIG)?;

    std::fs::write(&path, config)?;
    log::info!("INFO [{}]: wrote {}", ctx.stage, path.display());

    Ok(())
}
