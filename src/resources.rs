use crate::consts::GIB;
use crate::error::ConfigError;

/// CPUs and memory ceiling allotted to one stage.
///
/// A missing memory ceiling means "unknown", never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceContext {
    pub cpus: usize,
    pub memory: Option<u64>,
}

impl ResourceContext {
    pub fn new(cpus: usize, memory: Option<u64>) -> Self {
        Self {
            cpus: cpus.max(1),
            memory,
        }
    }

    pub fn memory_gib(&self) -> Option<f64> {
        self.memory.map(|bytes| bytes as f64 / GIB as f64)
    }
}

impl Default for ResourceContext {
    fn default() -> Self {
        Self::new(num_cpus::get(), None)
    }
}

/// How `hisat2-build` is invoked for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HisatIndexPlan {
    pub use_exons_and_splices: bool,
    pub memory_checked: bool,
}

impl HisatIndexPlan {
    /// Pick the exon-aware build only when the stage's memory ceiling is
    /// strictly above `threshold_gib`. Unknown memory takes the low-memory
    /// path with `memory_checked` cleared.
    pub fn decide(resources: &ResourceContext, threshold_gib: f64) -> Self {
        match resources.memory_gib() {
            Some(available) => Self {
                use_exons_and_splices: available > threshold_gib,
                memory_checked: true,
            },
            None => Self {
                use_exons_and_splices: false,
                memory_checked: false,
            },
        }
    }
}

/// Parse a memory amount such as `64.GB`, `512 MB` or `1073741824`.
///
/// Units are binary multiples (`KB` = 1024 bytes). A bare number is bytes.
pub fn parse_memory(value: &str) -> Result<u64, ConfigError> {
    let trimmed = value.trim();
    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (amount, unit) = trimmed.split_at(split);
    let amount = amount.trim().trim_end_matches('.').trim();

    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => GIB,
        "T" | "TB" => GIB * 1024,
        _ => return Err(ConfigError::InvalidMemory(value.to_string())),
    };

    let amount: f64 = amount
        .parse()
        .map_err(|_| ConfigError::InvalidMemory(value.to_string()))?;

    if !amount.is_finite() || amount < 0.0 {
        return Err(ConfigError::InvalidMemory(value.to_string()));
    }

    Ok((amount * multiplier as f64).round() as u64)
}
