//! The final compiled artifact (§3, §6): a flat instruction stream plus the
//! typed register and constant layout it runs against.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationConfig {
    pub num_trials: u64,
    pub output_variable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterCounts {
    #[serde(rename = "SCALAR")]
    pub scalar: u32,
    #[serde(rename = "VECTOR")]
    pub vector: u32,
    #[serde(rename = "BOOLEAN")]
    pub boolean: u32,
    #[serde(rename = "STRING")]
    pub string: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConstantPools {
    #[serde(rename = "SCALAR")]
    pub scalar: Vec<f64>,
    #[serde(rename = "VECTOR")]
    pub vector: Vec<Vec<f64>>,
    #[serde(rename = "BOOLEAN")]
    pub boolean: Vec<bool>,
    #[serde(rename = "STRING")]
    pub string: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Instr {
    pub op: u32,
    pub dests: Vec<u32>,
    pub srcs: Vec<u32>,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub simulation_config: SimulationConfig,
    pub variable_register_counts: RegisterCounts,
    pub constants: ConstantPools,
    pub pre_trial_instructions: Vec<Instr>,
    pub per_trial_instructions: Vec<Instr>,
}
